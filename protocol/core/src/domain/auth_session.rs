// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Auth Session Aggregate
//!
//! Domain model for one vendor-initiated authentication attempt. The
//! [`AuthSession`] holds every piece of protocol state and enforces the order
//! in which the protocol may advance; the I/O around it (directory lookups,
//! ledger submission and polling) lives in
//! [`crate::application::auth_request`].
//!
//! ## Session Lifecycle
//!
//! ```text
//! AuthSession::new(params)            validates pin / message / kind
//!   └─ Constructed
//!        └─ build_request(crypto)     encrypted uid_pin + nonce, correlation token
//!   └─ RequestBuilt
//!        └─ record_submission(doc)    store-assigned request document
//!   └─ Submitted  ◀──────────────┐    (timeout / cancel keep the session here)
//!        └─ accept_responses(docs)┘
//!   └─ ResponsesFound
//!        └─ verify(crypto)
//!   └─ Verified(Accepted | Rejected) | Failed
//! ```
//!
//! ## Invariants
//!
//! - Every transition is only valid from its named predecessor; anything else
//!   is an [`AuthError::Precondition`].
//! - `enduser` / `vendor` resolve at most once. Only the explicit
//!   `override_*` calls may replace a resolved identity.
//! - `verified_response` is set only for the single-survivor, status-`0` case
//!   and is never modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::crypto::{CryptoError, CryptoFacade};
use crate::domain::document::{
    AuthRequestFields, Document, DocumentPayload, DocumentQuery, RequestKind, SubmittedDocument,
    OWNER_ID_FIELD,
};
use crate::domain::error::{AuthError, Party, ValidationError};
use crate::domain::identity::{Identity, IdentitySlot, PrivateKey};

/// Opaque identifier for a single authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a verification that found exactly one matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Constructed,
    RequestBuilt,
    Submitted,
    ResponsesFound,
    Verified(Verdict),
    /// Verification could not single out one response. Terminal.
    Failed { reason: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified(_) | Self::Failed { .. })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constructed => write!(f, "constructed"),
            Self::RequestBuilt => write!(f, "request-built"),
            Self::Submitted => write!(f, "submitted"),
            Self::ResponsesFound => write!(f, "responses-found"),
            Self::Verified(Verdict::Accepted) => write!(f, "verified"),
            Self::Verified(Verdict::Rejected) => write!(f, "rejected"),
            Self::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// The proof of a successful authentication: the request the vendor put on
/// the ledger and the single enduser response that answered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedOutcome {
    pub submitted_request: SubmittedDocument,
    pub matched_response: Document,
    pub verified_at: DateTime<Utc>,
}

/// Raw construction input, validated by [`AuthSession::new`].
#[derive(Debug, Clone, Default)]
pub struct AuthSessionParams {
    /// 1 = signup, 2 = login, 3 = message
    pub request_kind: u8,
    pub enduser_name: String,
    pub pin: String,
    pub vendor_name: String,
    pub vendor_mnemonic: String,
    pub dapp_name: String,
    pub message_body: Option<String>,
}

impl AuthSessionParams {
    /// Collect every field-level problem instead of stopping at the first one.
    pub fn validate(&self) -> Result<RequestKind, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let kind = match RequestKind::try_from(self.request_kind) {
            Ok(kind) => Some(kind),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if self.pin.is_empty() {
            errors.push(ValidationError::EmptyPin);
        }
        if self.enduser_name.is_empty() {
            errors.push(ValidationError::EmptyField("enduser_name"));
        }
        if self.vendor_name.is_empty() {
            errors.push(ValidationError::EmptyField("vendor_name"));
        }
        if kind == Some(RequestKind::Message)
            && self.message_body.as_deref().map_or(true, str::is_empty)
        {
            errors.push(ValidationError::EmptyMessage);
        }

        match kind {
            Some(kind) if errors.is_empty() => Ok(kind),
            _ => Err(errors),
        }
    }
}

/// Aggregate root for one authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: SessionId,
    request_kind: RequestKind,
    enduser_name: String,
    pin: String,
    vendor_name: String,
    vendor_mnemonic: String,
    dapp_name: String,
    message_body: Option<String>,

    enduser: IdentitySlot,
    vendor: IdentitySlot,

    challenge_entropy: Option<String>,
    correlation_token: Option<String>,
    request_document: Option<Document>,
    submitted_request_doc: Option<SubmittedDocument>,
    candidate_responses: Vec<Document>,
    verified_response: Option<VerifiedOutcome>,

    state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    /// Validate `params` and construct a session in the `Constructed` state.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] listing every invalid field.
    pub fn new(params: AuthSessionParams) -> Result<Self, AuthError> {
        let request_kind = params.validate().map_err(AuthError::Validation)?;
        let message_body = match request_kind {
            RequestKind::Message => params.message_body,
            _ => None,
        };

        Ok(Self {
            id: SessionId::new(),
            request_kind,
            enduser_name: params.enduser_name,
            pin: params.pin,
            vendor_name: params.vendor_name,
            vendor_mnemonic: params.vendor_mnemonic,
            dapp_name: params.dapp_name,
            message_body,
            enduser: IdentitySlot::Unresolved,
            vendor: IdentitySlot::Unresolved,
            challenge_entropy: None,
            correlation_token: None,
            request_document: None,
            submitted_request_doc: None,
            candidate_responses: Vec::new(),
            verified_response: None,
            state: SessionState::Constructed,
            created_at: Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors (never perform I/O)
    // ------------------------------------------------------------------

    pub fn request_kind(&self) -> RequestKind {
        self.request_kind
    }

    pub fn enduser_name(&self) -> &str {
        &self.enduser_name
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn vendor_mnemonic(&self) -> &str {
        &self.vendor_mnemonic
    }

    pub fn dapp_name(&self) -> &str {
        &self.dapp_name
    }

    pub fn message_body(&self) -> Option<&str> {
        self.message_body.as_deref()
    }

    pub(crate) fn pin(&self) -> &str {
        &self.pin
    }

    pub fn enduser(&self) -> Option<&Identity> {
        self.enduser.get()
    }

    pub fn vendor(&self) -> Option<&Identity> {
        self.vendor.get()
    }

    pub fn challenge_entropy(&self) -> Option<&str> {
        self.challenge_entropy.as_deref()
    }

    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }

    pub fn request_document(&self) -> Option<&Document> {
        self.request_document.as_ref()
    }

    pub fn submitted_request_doc(&self) -> Option<&SubmittedDocument> {
        self.submitted_request_doc.as_ref()
    }

    pub fn candidate_responses(&self) -> &[Document] {
        &self.candidate_responses
    }

    pub fn verified_response(&self) -> Option<&VerifiedOutcome> {
        self.verified_response.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    // ------------------------------------------------------------------
    // Identity resolution
    // ------------------------------------------------------------------

    /// Memoize a resolved identity. A slot that is already resolved keeps its
    /// value; use the `override_*` methods to replace it deliberately.
    pub fn remember(&mut self, party: Party, identity: Identity) {
        let slot = self.slot_mut(party);
        if !slot.is_resolved() {
            *slot = IdentitySlot::Resolved(identity);
        }
    }

    pub fn identity(&self, party: Party) -> Option<&Identity> {
        match party {
            Party::Enduser => self.enduser.get(),
            Party::Vendor => self.vendor.get(),
        }
    }

    /// Replace the enduser identity without a directory lookup.
    pub fn override_enduser(&mut self, identity: Identity) {
        debug!(session_id = %self.id, enduser = %identity.name, "Enduser identity overridden");
        self.enduser = IdentitySlot::Resolved(identity);
    }

    /// Replace the vendor identity without a directory lookup.
    pub fn override_vendor(&mut self, identity: Identity) {
        debug!(session_id = %self.id, vendor = %identity.name, "Vendor identity overridden");
        self.vendor = IdentitySlot::Resolved(identity);
    }

    fn slot_mut(&mut self, party: Party) -> &mut IdentitySlot {
        match party {
            Party::Enduser => &mut self.enduser,
            Party::Vendor => &mut self.vendor,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub fn ensure_state(&self, operation: &'static str, expected: &SessionState) -> Result<(), AuthError> {
        if &self.state != expected {
            return Err(AuthError::Precondition {
                operation,
                state: self.state.clone(),
            });
        }
        Ok(())
    }

    /// Build the encrypted request document. Requires both identities to be
    /// resolved and the vendor's private key to be known.
    ///
    /// Nothing is recorded unless every crypto step succeeds.
    pub fn build_request(
        &mut self,
        crypto: &dyn CryptoFacade,
        contract_id: &str,
        now: DateTime<Utc>,
    ) -> Result<&Document, AuthError> {
        self.ensure_state("create a request", &SessionState::Constructed)?;
        let (enduser, vendor, vendor_key) = self.parties("create a request")?;

        let uid_pin = format!("{}{}{}", vendor.id, enduser.id, self.pin);
        let hashed_uid_pin = crypto.hash(uid_pin.as_bytes());
        let encrypted_uid_pin = crypto.encrypt(vendor_key, hashed_uid_pin.as_bytes(), &enduser.public_key)?;

        let entropy = crypto.generate_entropy();
        let encrypted_entropy = crypto.encrypt(vendor_key, entropy.as_bytes(), &enduser.public_key)?;

        let correlation_token = format!("{}{}", now.timestamp_millis(), enduser.id);

        let fields = AuthRequestFields {
            reference: enduser.id.clone(),
            uid_pin: encrypted_uid_pin,
            nonce: encrypted_entropy,
            correlation_token: correlation_token.clone(),
            dapp_name: self.dapp_name.clone(),
        };
        let payload = DocumentPayload::request(self.request_kind, fields, self.message_body.as_deref())
            .map_err(|e| AuthError::Validation(vec![e]))?;
        let document = Document::new(contract_id, vendor.identity_id.clone(), payload);

        debug!(
            session_id = %self.id,
            document_type = %document.document_type(),
            correlation_token = %correlation_token,
            "Request document assembled"
        );

        self.challenge_entropy = Some(entropy);
        self.correlation_token = Some(correlation_token);
        self.state = SessionState::RequestBuilt;
        Ok(self.request_document.insert(document))
    }

    pub fn record_submission(&mut self, submitted: SubmittedDocument) -> Result<&SubmittedDocument, AuthError> {
        self.ensure_state("record a submission", &SessionState::RequestBuilt)?;
        self.state = SessionState::Submitted;
        Ok(self.submitted_request_doc.insert(submitted))
    }

    /// The ledger filter that selects responses to this session's request.
    pub fn response_query(&self, contract_id: &str) -> Result<DocumentQuery, AuthError> {
        self.ensure_state("poll for responses", &SessionState::Submitted)?;
        let (enduser, vendor) = match (self.enduser.get(), self.vendor.get()) {
            (Some(enduser), Some(vendor)) => (enduser, vendor),
            _ => {
                return Err(AuthError::Precondition {
                    operation: "poll for responses",
                    state: self.state.clone(),
                })
            }
        };
        let token = self.correlation_token.as_deref().unwrap_or_default();

        Ok(DocumentQuery::new(contract_id, self.request_kind.response_type())
            .where_eq(OWNER_ID_FIELD, enduser.identity_id.clone())
            .where_eq("reference", vendor.id.clone())
            .where_eq("correlation_token", token))
    }

    /// Keep the documents actually owned by the enduser and advance to
    /// `ResponsesFound`. Returns the number of candidates kept.
    ///
    /// An empty candidate set leaves the session in `Submitted`.
    pub fn accept_responses(&mut self, documents: Vec<Document>) -> Result<usize, AuthError> {
        self.ensure_state("accept responses", &SessionState::Submitted)?;
        let enduser_identity = self
            .enduser
            .get()
            .map(|e| e.identity_id.clone())
            .unwrap_or_default();

        let received = documents.len();
        let candidates: Vec<Document> = documents
            .into_iter()
            .filter(|d| d.owner_id == enduser_identity && d.document_type().is_response())
            .collect();

        if candidates.len() != received {
            warn!(
                session_id = %self.id,
                received,
                kept = candidates.len(),
                "Discarded response documents not owned by the enduser"
            );
        }

        let kept = candidates.len();
        if kept > 0 {
            self.candidate_responses = candidates;
            self.state = SessionState::ResponsesFound;
        }
        Ok(kept)
    }

    /// Decide the outcome of the session from the candidate responses.
    ///
    /// Enforces the following **in order**:
    /// 1. Session is `ResponsesFound`
    /// 2. Each candidate's `vid_pin` and `status` decrypt with
    ///    `(vendor.priv, enduser.pub)`; undecryptable candidates are excluded
    /// 3. Decrypted `vid_pin` equals `hash(entropy ‖ vendor.id ‖ pin)`
    /// 4. Exactly one candidate survives
    /// 5. Its status starts with `'0'`
    ///
    /// # Errors
    ///
    /// - [`AuthError::VerificationNotFound`] when no candidate matched
    /// - [`AuthError::AmbiguousVerification`] when more than one candidate matched
    /// - [`AuthError::StatusRejected`] when the single match carries a non-zero status
    pub fn verify(&mut self, crypto: &dyn CryptoFacade) -> Result<&VerifiedOutcome, AuthError> {
        self.ensure_state("verify", &SessionState::ResponsesFound)?;
        let (enduser, vendor, vendor_key) = self.parties("verify")?;
        let entropy = self.challenge_entropy.as_deref().unwrap_or_default();

        let expected_plain = format!("{}{}{}", entropy, vendor.id, self.pin);
        let expected_hash = crypto.hash(expected_plain.as_bytes());

        let mut undecryptable = 0usize;
        let mut survivors: Vec<(&Document, String)> = Vec::new();

        for candidate in &self.candidate_responses {
            let Some(fields) = candidate.payload.as_response() else {
                continue;
            };
            let opened = crypto
                .decrypt(vendor_key, &fields.vid_pin, &enduser.public_key)
                .and_then(|vid_pin| {
                    crypto
                        .decrypt(vendor_key, &fields.status, &enduser.public_key)
                        .map(|status| (vid_pin, status))
                });
            let (vid_pin, status) = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    warn!(
                        session_id = %self.id,
                        document_id = ?candidate.document_id,
                        error = %e,
                        "Response could not be decrypted with the session key pair"
                    );
                    undecryptable += 1;
                    continue;
                }
            };

            if bool::from(vid_pin.as_slice().ct_eq(expected_hash.as_bytes())) {
                survivors.push((candidate, String::from_utf8_lossy(&status).into_owned()));
            }
        }

        debug!(
            session_id = %self.id,
            candidates = self.candidate_responses.len(),
            verified = survivors.len(),
            undecryptable,
            "Responses checked against expected vid_pin"
        );

        match survivors.len() {
            0 => {
                let candidates = self.candidate_responses.len();
                self.state = SessionState::Failed {
                    reason: "no verified response".to_string(),
                };
                Err(AuthError::VerificationNotFound {
                    candidates,
                    undecryptable,
                })
            }
            1 => {
                let (matched, status) = survivors.remove(0);
                let leading: String = status.chars().take(1).collect();
                if leading != "0" {
                    self.state = SessionState::Verified(Verdict::Rejected);
                    return Err(AuthError::StatusRejected { status: leading });
                }

                let submitted_request = self.submitted_request_doc.clone().ok_or(AuthError::Precondition {
                    operation: "verify",
                    state: self.state.clone(),
                })?;
                let outcome = VerifiedOutcome {
                    submitted_request,
                    matched_response: matched.clone(),
                    verified_at: Utc::now(),
                };
                self.state = SessionState::Verified(Verdict::Accepted);
                Ok(self.verified_response.insert(outcome))
            }
            count => {
                self.state = SessionState::Failed {
                    reason: format!("{} verified responses", count),
                };
                Err(AuthError::AmbiguousVerification { count })
            }
        }
    }

    fn parties(&self, operation: &'static str) -> Result<(&Identity, &Identity, &PrivateKey), AuthError> {
        let (Some(enduser), Some(vendor)) = (self.enduser.get(), self.vendor.get()) else {
            return Err(AuthError::Precondition {
                operation,
                state: self.state.clone(),
            });
        };
        let vendor_key = vendor.private_key.as_ref().ok_or_else(|| {
            AuthError::Crypto(CryptoError::InvalidPrivateKey(format!(
                "no private key resolved for vendor '{}'",
                vendor.name
            )))
        })?;
        Ok((enduser, vendor, vendor_key))
    }
}
