// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Enduser Responder - the wallet side of the protocol
//!
//! Answers a vendor's request document the way an enduser wallet does: open
//! the challenge, check the pin, and post a response owned by the enduser.
//! Used by the demo binary and by tests that need a live counterparty.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Counterparty of [`crate::application::auth_request::AuthRequest`]

use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::document_poller;
use crate::domain::config::PollingPolicy;
use crate::domain::crypto::CryptoFacade;
use crate::domain::document::{
    AuthResponseFields, Document, DocumentPayload, DocumentQuery, RequestKind, SubmittedDocument,
    OWNER_ID_FIELD,
};
use crate::domain::identity::Identity;
use crate::domain::store::DocumentStore;

/// Status code the enduser answers with; `"0"` accepts.
pub const STATUS_ACCEPT: &str = "0";

pub struct EnduserResponder {
    crypto: Arc<dyn CryptoFacade>,
    store: Arc<dyn DocumentStore>,
    enduser: Identity,
    vendor: Identity,
    contract_id: String,
    status_code: String,
}

impl EnduserResponder {
    /// `enduser` must carry its private key; `vendor` only needs public data.
    pub fn new(
        crypto: Arc<dyn CryptoFacade>,
        store: Arc<dyn DocumentStore>,
        enduser: Identity,
        vendor: Identity,
        contract_id: impl Into<String>,
    ) -> Result<Self> {
        if enduser.private_key.is_none() {
            bail!("enduser '{}' has no private key to sign responses with", enduser.name);
        }
        Ok(Self {
            crypto,
            store,
            enduser,
            vendor,
            contract_id: contract_id.into(),
            status_code: STATUS_ACCEPT.to_string(),
        })
    }

    /// Answer with a status other than accept.
    pub fn with_status(mut self, status_code: impl Into<String>) -> Self {
        self.status_code = status_code.into();
        self
    }

    /// Build the response document for a challenge without submitting it.
    pub fn build_response(
        &self,
        kind: RequestKind,
        challenge_entropy: &str,
        pin: &str,
        correlation_token: &str,
    ) -> Result<Document> {
        let enduser_key = self
            .enduser
            .private_key
            .as_ref()
            .ok_or_else(|| anyhow!("enduser private key missing"))?;

        let vid_pin = format!("{}{}{}", challenge_entropy, self.vendor.id, pin);
        let hashed_vid_pin = self.crypto.hash(vid_pin.as_bytes());
        let encrypted_vid_pin = self
            .crypto
            .encrypt(enduser_key, hashed_vid_pin.as_bytes(), &self.vendor.public_key)
            .context("Failed to encrypt vid_pin")?;

        let status = format!("{}{}", self.status_code, self.crypto.generate_entropy());
        let encrypted_status = self
            .crypto
            .encrypt(enduser_key, status.as_bytes(), &self.vendor.public_key)
            .context("Failed to encrypt status")?;

        let fields = AuthResponseFields {
            reference: self.vendor.id.clone(),
            vid_pin: encrypted_vid_pin,
            status: encrypted_status,
            correlation_token: correlation_token.to_string(),
        };
        Ok(Document::new(
            self.contract_id.clone(),
            self.enduser.identity_id.clone(),
            DocumentPayload::response(kind, fields),
        ))
    }

    /// Open a vendor request, check it was issued for `pin`, and submit the
    /// matching response.
    pub async fn respond_to(&self, request: &Document, pin: &str) -> Result<SubmittedDocument> {
        let enduser_key = self
            .enduser
            .private_key
            .as_ref()
            .ok_or_else(|| anyhow!("enduser private key missing"))?;
        let kind = request_kind_of(request)?;
        let fields = request
            .payload
            .as_request()
            .ok_or_else(|| anyhow!("document {} is not a request", request.document_type()))?;

        let hashed_uid_pin = self
            .crypto
            .decrypt(enduser_key, &fields.uid_pin, &self.vendor.public_key)
            .context("Failed to open uid_pin")?;
        let expected = self
            .crypto
            .hash(format!("{}{}{}", self.vendor.id, self.enduser.id, pin).as_bytes());
        if !bool::from(hashed_uid_pin.as_slice().ct_eq(expected.as_bytes())) {
            bail!("request was not issued for this enduser and pin");
        }

        let entropy = self
            .crypto
            .decrypt(enduser_key, &fields.nonce, &self.vendor.public_key)
            .context("Failed to open challenge nonce")?;
        let entropy = String::from_utf8(entropy).context("Challenge nonce is not valid UTF-8")?;

        if let Some(message) = request.payload.message() {
            info!(enduser = %self.enduser.name, dapp = %fields.dapp_name, tweet = message, "Signing message request");
        }

        let response = self.build_response(kind, &entropy, pin, &fields.correlation_token)?;
        let submitted = self
            .store
            .submit(&response)
            .await
            .context("Failed to submit response document")?;

        info!(
            enduser = %self.enduser.name,
            vendor = %self.vendor.name,
            document_id = %submitted.document_id,
            status = %self.status_code,
            "Response submitted"
        );
        Ok(submitted)
    }

    /// Wait for the vendor's most recent request of `kind` and answer it.
    pub async fn wait_and_respond(
        &self,
        kind: RequestKind,
        pin: &str,
        policy: &PollingPolicy,
        cancel: &CancellationToken,
    ) -> Result<SubmittedDocument> {
        let query = DocumentQuery::new(self.contract_id.clone(), kind.request_type())
            .where_eq(OWNER_ID_FIELD, self.vendor.identity_id.clone())
            .where_eq("reference", self.enduser.id.clone());

        let polled = document_poller::wait_for(self.store.as_ref(), &query, policy, cancel)
            .await
            .context("No request document arrived for the enduser")?;
        let request = polled
            .documents
            .last()
            .ok_or_else(|| anyhow!("poller returned no documents"))?;

        self.respond_to(request, pin).await
    }
}

fn request_kind_of(request: &Document) -> Result<RequestKind> {
    match request.payload {
        DocumentPayload::SignupRequest(_) => Ok(RequestKind::Signup),
        DocumentPayload::LoginRequest(_) => Ok(RequestKind::Login),
        DocumentPayload::TweetRequest(_) => Ok(RequestKind::Message),
        _ => bail!("document {} is not a request", request.document_type()),
    }
}
