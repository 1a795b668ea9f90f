// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Auth Request - vendor side of the challenge-response protocol
//!
//! Drives one [`AuthSession`] through `create → submit → poll → verify`,
//! performing the I/O the session itself never does: directory lookups,
//! ledger writes and queries, and holding the store connection lease.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates directory, crypto and store around the session aggregate
//!
//! # Example
//!
//! ```ignore
//! let mut request = AuthRequest::new(params, config, services)?;
//! request.create().await?;
//! request.submit().await?;
//! request.poll_for_response(config.polling.policy()).await?;
//! let outcome = request.verify().await?;
//! ```

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::document_poller;
use crate::domain::auth_session::{AuthSession, AuthSessionParams, SessionId, SessionState, VerifiedOutcome};
use crate::domain::config::{AuthConfig, PollingPolicy};
use crate::domain::crypto::CryptoFacade;
use crate::domain::directory::{DirectoryError, DirectoryLookup};
use crate::domain::document::{Document, SubmittedDocument};
use crate::domain::error::{AuthError, Party};
use crate::domain::events::AuthEvent;
use crate::domain::identity::Identity;
use crate::domain::store::{DocumentStore, StoreError};
use crate::infrastructure::connection::{ConnectionLease, StoreConnection};
use crate::infrastructure::event_bus::EventBus;

/// Collaborators an [`AuthRequest`] talks to.
#[derive(Clone)]
pub struct AuthServices {
    pub crypto: Arc<dyn CryptoFacade>,
    pub directory: Arc<dyn DirectoryLookup>,
    pub store: Arc<dyn DocumentStore>,
    pub events: Option<EventBus>,
}

pub struct AuthRequest {
    session: AuthSession,
    config: AuthConfig,
    contract_id: String,
    crypto: Arc<dyn CryptoFacade>,
    directory: Arc<dyn DirectoryLookup>,
    // public identities from successful lookups, keyed by name
    resolved_names: HashMap<String, Identity>,
    connection: StoreConnection,
    lease: Option<ConnectionLease>,
    events: Option<EventBus>,
}

impl AuthRequest {
    /// Validate the parameters and prepare a session. No I/O happens here.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Validation`] listing every invalid parameter
    /// - [`AuthError::Config`] when `config` names no login contract
    pub fn new(params: AuthSessionParams, config: AuthConfig, services: AuthServices) -> Result<Self, AuthError> {
        let session = AuthSession::new(params)?;
        let contract_id = config.login_contract_id()?.to_string();
        let connection = StoreConnection::new(&config, session.vendor_mnemonic(), services.store);

        debug!(
            session_id = %session.id,
            kind = %session.request_kind(),
            enduser = %session.enduser_name(),
            vendor = %session.vendor_name(),
            "Auth request constructed"
        );

        Ok(Self {
            session,
            config,
            contract_id,
            crypto: services.crypto,
            directory: services.directory,
            resolved_names: HashMap::new(),
            connection,
            lease: None,
            events: services.events,
        })
    }

    /// Share an existing connection; sessions on it run one at a time.
    pub fn with_connection(mut self, connection: StoreConnection) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn enduser(&self) -> Option<&Identity> {
        self.session.enduser()
    }

    pub fn vendor(&self) -> Option<&Identity> {
        self.session.vendor()
    }

    pub fn request_document(&self) -> Option<&Document> {
        self.session.request_document()
    }

    pub fn submitted_request_doc(&self) -> Option<&SubmittedDocument> {
        self.session.submitted_request_doc()
    }

    pub fn candidate_responses(&self) -> &[Document] {
        self.session.candidate_responses()
    }

    pub fn verified_response(&self) -> Option<&VerifiedOutcome> {
        self.session.verified_response()
    }

    pub fn correlation_token(&self) -> Option<&str> {
        self.session.correlation_token()
    }

    pub fn challenge_entropy(&self) -> Option<&str> {
        self.session.challenge_entropy()
    }

    /// Serialized public view of the enduser, once resolved.
    pub fn enduser_json(&self) -> Option<serde_json::Value> {
        self.session.enduser().and_then(|e| serde_json::to_value(e).ok())
    }

    /// Polling policy from the configuration.
    pub fn polling_policy(&self) -> PollingPolicy {
        self.config.polling.policy()
    }

    // ------------------------------------------------------------------
    // Identity resolution
    // ------------------------------------------------------------------

    /// Return the enduser, resolving it through the directory on first use.
    pub async fn find_enduser(&mut self) -> Result<&Identity, AuthError> {
        if self.session.identity(Party::Enduser).is_none() {
            let name = self.session.enduser_name().to_string();
            let identity = self.resolve(Party::Enduser, &name).await?;
            self.session.remember(Party::Enduser, identity);
        }
        self.resolved(Party::Enduser)
    }

    /// Return the vendor, resolving it and its account key on first use.
    pub async fn find_vendor(&mut self) -> Result<&Identity, AuthError> {
        if self.session.identity(Party::Vendor).is_none() {
            let name = self.session.vendor_name().to_string();
            let mut identity = self.resolve(Party::Vendor, &name).await?;
            if identity.private_key.is_none() {
                let key = self
                    .directory
                    .account_private_key(self.session.vendor_mnemonic())
                    .await
                    .map_err(|source| AuthError::Directory {
                        party: Party::Vendor,
                        source,
                    })?;
                identity.private_key = Some(key);
            }
            self.session.remember(Party::Vendor, identity);
        }
        self.resolved(Party::Vendor)
    }

    pub fn override_enduser(&mut self, identity: Identity) {
        self.session.override_enduser(identity);
    }

    pub fn override_vendor(&mut self, identity: Identity) {
        self.session.override_vendor(identity);
    }

    /// Look `name` up once per request. Failures are not remembered, so a
    /// retry reaches the directory again.
    async fn resolve(&mut self, party: Party, name: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.resolved_names.get(name) {
            debug!(session_id = %self.session.id, %party, name, "Identity already resolved");
            return Ok(identity.clone());
        }

        debug!(session_id = %self.session.id, %party, name, "Resolving identity");
        let identity = self.directory.resolve(name).await.map_err(|source| match source {
            DirectoryError::NotFound(_) => AuthError::NotFound {
                party,
                name: name.to_string(),
            },
            source => AuthError::Directory { party, source },
        })?;
        self.resolved_names.insert(name.to_string(), identity.clone());
        Ok(identity)
    }

    fn resolved(&self, party: Party) -> Result<&Identity, AuthError> {
        self.session.identity(party).ok_or_else(|| AuthError::NotFound {
            party,
            name: match party {
                Party::Enduser => self.session.enduser_name().to_string(),
                Party::Vendor => self.session.vendor_name().to_string(),
            },
        })
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Take the store connection now instead of on the first networked operation.
    pub async fn connect(&mut self) {
        self.store().await;
    }

    /// Release the store connection. A later networked operation reconnects.
    pub fn disconnect(&mut self) {
        if self.lease.take().is_some() {
            debug!(session_id = %self.session.id, "Disconnected from store");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lease.is_some()
    }

    async fn store(&mut self) -> Arc<dyn DocumentStore> {
        let lease = match self.lease.take() {
            Some(lease) => lease,
            None => self.connection.connect(&self.session.id.to_string()).await,
        };
        self.lease.insert(lease).store_handle()
    }

    // ------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------

    /// Resolve both parties and build the encrypted request document.
    pub async fn create(&mut self) -> Result<&Document, AuthError> {
        self.session.ensure_state("create a request", &SessionState::Constructed)?;
        self.find_enduser().await?;
        self.find_vendor().await?;

        self.session
            .build_request(self.crypto.as_ref(), &self.contract_id, Utc::now())?;

        let token = self.session.correlation_token().unwrap_or_default().to_string();
        info!(
            session_id = %self.session.id,
            kind = %self.session.request_kind(),
            correlation_token = %token,
            "Auth request created"
        );
        self.emit(AuthEvent::RequestCreated {
            session_id: self.session.id,
            request_kind: self.session.request_kind(),
            enduser: self.session.enduser_name().to_string(),
            vendor: self.session.vendor_name().to_string(),
            correlation_token: token,
            created_at: Utc::now(),
        });

        self.session.request_document().ok_or(AuthError::Precondition {
            operation: "create a request",
            state: SessionState::Constructed,
        })
    }

    /// Broadcast the request document to the ledger.
    pub async fn submit(&mut self) -> Result<&SubmittedDocument, AuthError> {
        self.session.ensure_state("submit", &SessionState::RequestBuilt)?;
        let request = self.session.request_document().cloned().ok_or(AuthError::Precondition {
            operation: "submit",
            state: SessionState::RequestBuilt,
        })?;

        let store = self.store().await;
        match store.get_identity(&request.owner_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(AuthError::Submission(StoreError::IdentityNotFound(request.owner_id))),
            Err(e) => return Err(AuthError::Submission(e)),
        }
        let submitted = store.submit(&request).await.map_err(AuthError::Submission)?;

        info!(
            session_id = %self.session.id,
            document_id = %submitted.document_id,
            document_type = %request.document_type(),
            "Auth request submitted"
        );
        self.emit(AuthEvent::RequestSubmitted {
            session_id: self.session.id,
            document_id: submitted.document_id.clone(),
            correlation_token: self.session.correlation_token().unwrap_or_default().to_string(),
            submitted_at: submitted.submitted_at,
        });

        self.session.record_submission(submitted)
    }

    /// Wait for the enduser's response documents.
    pub async fn poll_for_response(&mut self, policy: PollingPolicy) -> Result<&[Document], AuthError> {
        self.poll_for_response_with_cancel(policy, &CancellationToken::new()).await
    }

    /// [`AuthRequest::poll_for_response`] that stops early when `cancel` fires.
    /// A timed out or cancelled poll leaves the session `Submitted`.
    pub async fn poll_for_response_with_cancel(
        &mut self,
        policy: PollingPolicy,
        cancel: &CancellationToken,
    ) -> Result<&[Document], AuthError> {
        let query = self.session.response_query(&self.contract_id)?;
        let enduser_identity = self
            .session
            .enduser()
            .map(|e| e.identity_id.clone())
            .unwrap_or_default();
        let store = self.store().await;

        debug!(
            session_id = %self.session.id,
            timeout_ms = policy.timeout.as_millis() as u64,
            frequency_ms = policy.frequency.as_millis() as u64,
            "Polling for response"
        );

        let owned_by_enduser = |d: &Document| d.owner_id == enduser_identity;
        let polled = match document_poller::wait_for_matching(store.as_ref(), &query, &policy, cancel, &owned_by_enduser)
            .await
        {
            Ok(polled) => polled,
            Err(e) => {
                warn!(session_id = %self.session.id, error = %e, "No response received");
                return Err(e);
            }
        };

        let candidates = self.session.accept_responses(polled.documents)?;
        info!(
            session_id = %self.session.id,
            candidates,
            attempts = polled.attempts,
            "Responses found"
        );
        self.emit(AuthEvent::ResponsesFound {
            session_id: self.session.id,
            correlation_token: self.session.correlation_token().unwrap_or_default().to_string(),
            candidates,
            attempts: polled.attempts,
            found_at: Utc::now(),
        });

        Ok(self.session.candidate_responses())
    }

    /// Check the responses against the challenge. Releases the store
    /// connection whatever the outcome.
    pub async fn verify(&mut self) -> Result<&VerifiedOutcome, AuthError> {
        let result = self.session.verify(self.crypto.as_ref()).map(|_| ());
        self.disconnect();

        let token = self.session.correlation_token().unwrap_or_default().to_string();
        match result {
            Ok(()) => {
                metrics::counter!("ledgerauth_verifications_total", "outcome" => "accepted").increment(1);
                let response_id = self
                    .session
                    .verified_response()
                    .and_then(|o| o.matched_response.document_id.clone());
                info!(session_id = %self.session.id, response_id = ?response_id, "Auth request verified");
                self.emit(AuthEvent::VerificationSucceeded {
                    session_id: self.session.id,
                    correlation_token: token,
                    response_id,
                    verified_at: Utc::now(),
                });
                self.session.verified_response().ok_or(AuthError::Precondition {
                    operation: "verify",
                    state: self.session.state().clone(),
                })
            }
            Err(e @ AuthError::Precondition { .. }) => Err(e),
            Err(e) => {
                let outcome = match e {
                    AuthError::StatusRejected { .. } => "rejected",
                    AuthError::AmbiguousVerification { .. } => "ambiguous",
                    _ => "not_found",
                };
                metrics::counter!("ledgerauth_verifications_total", "outcome" => outcome).increment(1);
                warn!(session_id = %self.session.id, error = %e, "Auth request verification failed");
                self.emit(AuthEvent::VerificationFailed {
                    session_id: self.session.id,
                    correlation_token: token,
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
