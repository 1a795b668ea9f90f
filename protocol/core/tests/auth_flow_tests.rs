// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the vendor-side authentication flow.
//!
//! Every test runs the real X25519/AES-GCM crypto against the in-memory
//! directory and ledger, with an [`EnduserResponder`] playing the wallet.

use std::sync::Arc;
use std::time::Duration;

use ledgerauth_core::application::{AuthRequest, AuthServices, EnduserResponder};
use ledgerauth_core::domain::auth_session::{AuthSessionParams, SessionState, Verdict};
use ledgerauth_core::domain::config::{AuthConfig, PollingPolicy};
use ledgerauth_core::domain::crypto::CryptoFacade;
use ledgerauth_core::domain::document::{Document, DocumentPayload, DocumentType, RequestKind};
use ledgerauth_core::domain::error::{AuthError, Party, ValidationError};
use ledgerauth_core::domain::events::AuthEvent;
use ledgerauth_core::domain::identity::Identity;
use ledgerauth_core::domain::store::{DocumentStore, StoreError};
use ledgerauth_core::infrastructure::{
    EventBus, InMemoryDirectory, InMemoryDocumentStore, StoreConnection, X25519AesGcmCrypto,
};
use tokio_util::sync::CancellationToken;

const MNEMONIC: &str = "uniform analyst paper father soldier toe lesson fetch exhaust jazz swim response";
const PIN: &str = "1234";

struct Harness {
    directory: InMemoryDirectory,
    store: InMemoryDocumentStore,
    crypto: Arc<X25519AesGcmCrypto>,
    alice: Identity,
    bob: Identity,
    config: AuthConfig,
}

async fn harness() -> Harness {
    let directory = InMemoryDirectory::new();
    let store = InMemoryDocumentStore::new();

    let alice = directory.register_generated("alice", None).await;
    let bob = directory.register_generated("bob", Some(MNEMONIC)).await;
    store.register_identity(&alice).await;
    store.register_identity(&bob).await;

    let mut config = AuthConfig::default();
    config.polling.response_polling_timeout_ms = 300;
    config.polling.response_polling_frequency_ms = 50;
    config.polling.response_polling_delay_ms = 0;

    Harness {
        directory,
        store,
        crypto: Arc::new(X25519AesGcmCrypto::new()),
        alice,
        bob,
        config,
    }
}

fn params(kind: u8, pin: &str, message: Option<&str>) -> AuthSessionParams {
    AuthSessionParams {
        request_kind: kind,
        enduser_name: "alice".to_string(),
        pin: pin.to_string(),
        vendor_name: "bob".to_string(),
        vendor_mnemonic: MNEMONIC.to_string(),
        dapp_name: "Web dApp Sample".to_string(),
        message_body: message.map(str::to_string),
    }
}

impl Harness {
    fn services(&self) -> AuthServices {
        AuthServices {
            crypto: self.crypto.clone(),
            directory: Arc::new(self.directory.clone()),
            store: Arc::new(self.store.clone()),
            events: None,
        }
    }

    fn request(&self, kind: u8) -> AuthRequest {
        let message = (kind == 3).then_some("Tweets are greets");
        AuthRequest::new(params(kind, PIN, message), self.config.clone(), self.services()).unwrap()
    }

    fn responder(&self) -> EnduserResponder {
        let mut vendor = self.bob.clone();
        vendor.private_key = None;
        EnduserResponder::new(
            self.crypto.clone(),
            Arc::new(self.store.clone()),
            self.alice.clone(),
            vendor,
            self.config.login_contract_id().unwrap(),
        )
        .unwrap()
    }

    fn policy(&self) -> PollingPolicy {
        self.config.polling.policy()
    }

    /// A response to `request` that becomes visible on the `nth` ledger query.
    async fn answer(&self, request: &AuthRequest, responder: &EnduserResponder, pin: &str, nth: u32) {
        let response = responder
            .build_response(
                request.session().request_kind(),
                request.challenge_entropy().unwrap(),
                pin,
                request.correlation_token().unwrap(),
            )
            .unwrap();
        self.store.insert_visible_from(response, nth).await;
    }
}

async fn submitted_request(h: &Harness, kind: u8) -> AuthRequest {
    let mut request = h.request(kind);
    request.create().await.unwrap();
    request.submit().await.unwrap();
    request
}

// ============================================================================
// Construction & identity resolution
// ============================================================================

#[tokio::test]
async fn test_empty_pin_is_rejected() {
    let h = harness().await;
    let result = AuthRequest::new(params(2, "", None), h.config.clone(), h.services());
    assert!(matches!(
        result,
        Err(AuthError::Validation(errors)) if errors == vec![ValidationError::EmptyPin]
    ));
}

#[tokio::test]
async fn test_message_request_requires_message() {
    let h = harness().await;
    let result = AuthRequest::new(params(3, PIN, None), h.config.clone(), h.services());
    assert!(matches!(
        result,
        Err(AuthError::Validation(errors)) if errors == vec![ValidationError::EmptyMessage]
    ));
}

#[tokio::test]
async fn test_identity_lookups_are_memoized() {
    let h = harness().await;
    let mut request = h.request(2);

    let first = request.find_enduser().await.unwrap().clone();
    let second = request.find_enduser().await.unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(h.directory.lookup_count(), 1);

    let json = request.enduser_json().unwrap();
    assert_eq!(json["name"], "alice");
    assert!(json.get("private_key").is_none());
}

#[tokio::test]
async fn test_vendor_key_comes_from_mnemonic() {
    let h = harness().await;
    let mut request = h.request(2);
    let vendor = request.find_vendor().await.unwrap();
    assert_eq!(vendor.private_key, h.bob.private_key);
}

#[tokio::test]
async fn test_unknown_enduser() {
    let h = harness().await;
    let mut p = params(2, PIN, None);
    p.enduser_name = "carol".to_string();
    let mut request = AuthRequest::new(p, h.config.clone(), h.services()).unwrap();

    assert!(matches!(
        request.create().await,
        Err(AuthError::NotFound { party: Party::Enduser, ref name }) if name == "carol"
    ));
    assert_eq!(request.state(), &SessionState::Constructed);
}

#[tokio::test]
async fn test_directory_failures_are_not_cached() {
    let h = harness().await;
    let mut request = h.request(2);

    h.directory.set_unavailable(true);
    assert!(matches!(
        request.find_enduser().await,
        Err(AuthError::Directory { party: Party::Enduser, .. })
    ));
    assert!(request.enduser().is_none());

    h.directory.set_unavailable(false);
    assert!(request.find_enduser().await.is_ok());
    assert_eq!(h.directory.lookup_count(), 2);
}

#[tokio::test]
async fn test_vendor_key_failure_keeps_resolved_name() {
    let h = harness().await;
    let mut p = params(2, PIN, None);
    p.vendor_mnemonic = "lost words".to_string();
    let mut request = AuthRequest::new(p, h.config.clone(), h.services()).unwrap();

    assert!(matches!(
        request.find_vendor().await,
        Err(AuthError::Directory { party: Party::Vendor, .. })
    ));
    assert!(request.vendor().is_none());

    h.directory
        .register_account("lost words", h.bob.private_key.clone().unwrap())
        .await;
    let vendor = request.find_vendor().await.unwrap();
    assert_eq!(vendor.private_key, h.bob.private_key);
    assert_eq!(h.directory.lookup_count(), 1);
}

#[tokio::test]
async fn test_same_name_for_both_parties_is_looked_up_once() {
    let h = harness().await;
    let mut p = params(2, PIN, None);
    p.enduser_name = "bob".to_string();
    let mut request = AuthRequest::new(p, h.config.clone(), h.services()).unwrap();

    let enduser = request.find_enduser().await.unwrap().clone();
    let vendor = request.find_vendor().await.unwrap().clone();
    assert_eq!(enduser.id, vendor.id);
    assert!(enduser.private_key.is_none());
    assert_eq!(vendor.private_key, h.bob.private_key);
    assert_eq!(h.directory.lookup_count(), 1);
}

#[tokio::test]
async fn test_overridden_identity_skips_directory() {
    let h = harness().await;
    let mut request = h.request(2);
    request.override_enduser(h.alice.clone());
    request.override_vendor(h.bob.clone());

    request.create().await.unwrap();
    assert_eq!(h.directory.lookup_count(), 0);
}

// ============================================================================
// create / submit
// ============================================================================

#[tokio::test]
async fn test_created_uid_pin_opens_to_expected_hash() {
    let h = harness().await;
    let mut request = h.request(2);
    let document = request.create().await.unwrap().clone();

    assert_eq!(document.owner_id, h.bob.identity_id);
    assert_eq!(document.document_type(), DocumentType::LoginRequest);
    let fields = document.payload.as_request().unwrap();
    assert_eq!(fields.reference, h.alice.id);
    assert!(fields.correlation_token.ends_with(&h.alice.id));

    let opened = h
        .crypto
        .decrypt(h.alice.private_key.as_ref().unwrap(), &fields.uid_pin, &h.bob.public_key)
        .unwrap();
    let expected = h.crypto.hash(format!("{}{}{}", h.bob.id, h.alice.id, PIN).as_bytes());
    assert_eq!(opened, expected.as_bytes());

    let nonce = h
        .crypto
        .decrypt(h.alice.private_key.as_ref().unwrap(), &fields.nonce, &h.bob.public_key)
        .unwrap();
    assert_eq!(nonce, request.challenge_entropy().unwrap().as_bytes());
}

#[tokio::test]
async fn test_message_request_carries_tweet() {
    let h = harness().await;
    let mut request = h.request(3);
    let document = request.create().await.unwrap();
    assert_eq!(document.document_type(), DocumentType::TweetRequest);
    assert_eq!(document.payload.message(), Some("Tweets are greets"));
}

#[tokio::test]
async fn test_submit_before_create_is_a_precondition_error() {
    let h = harness().await;
    for kind in [1, 2, 3] {
        let mut request = h.request(kind);
        assert!(matches!(
            request.submit().await,
            Err(AuthError::Precondition { state: SessionState::Constructed, .. })
        ));
    }
    assert!(h.store.documents().await.is_empty());
}

#[tokio::test]
async fn test_create_twice_is_a_precondition_error() {
    let h = harness().await;
    let mut request = h.request(1);
    request.create().await.unwrap();
    assert!(matches!(request.create().await, Err(AuthError::Precondition { .. })));
}

#[tokio::test]
async fn test_submit_failure_keeps_cause() {
    let h = harness().await;
    let mut request = h.request(2);
    request.create().await.unwrap();

    h.store.fail_next_submit(StoreError::Rejected("insufficient balance".to_string()));
    let err = request.submit().await.unwrap_err();
    assert!(matches!(err, AuthError::Submission(StoreError::Rejected(_))));
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(request.state(), &SessionState::RequestBuilt);

    let submitted = request.submit().await.unwrap();
    assert_eq!(submitted.document.owner_id, h.bob.identity_id);
}

#[tokio::test]
async fn test_submit_requires_owner_identity_on_ledger() {
    let h = harness().await;
    let mut request = h.request(2);
    let mut stranger = h.bob.clone();
    stranger.identity_id = "unregistered-identity".to_string();
    request.override_vendor(stranger);
    request.create().await.unwrap();

    assert!(matches!(
        request.submit().await,
        Err(AuthError::Submission(StoreError::IdentityNotFound(id))) if id == "unregistered-identity"
    ));
}

// ============================================================================
// poll_for_response
// ============================================================================

#[tokio::test]
async fn test_poll_matches_on_fourth_attempt() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    h.answer(&request, &h.responder(), PIN, 4).await;

    let candidates = request.poll_for_response(h.policy()).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(h.store.query_count(), 4);
    assert_eq!(request.state(), &SessionState::ResponsesFound);
}

#[tokio::test]
async fn test_poll_times_out_and_can_be_retried() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;

    let err = request.poll_for_response(h.policy()).await.unwrap_err();
    assert!(matches!(err, AuthError::ResponseTimeout { timeout_ms: 300, .. }));
    assert!(err.is_retryable());
    assert_eq!(request.state(), &SessionState::Submitted);

    h.answer(&request, &h.responder(), PIN, 0).await;
    assert_eq!(request.poll_for_response(h.policy()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancelled_poll_leaves_session_submitted() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        trigger.cancel();
    });

    let long = PollingPolicy::new(Duration::from_secs(30), Duration::from_millis(50), Duration::ZERO);
    let err = request.poll_for_response_with_cancel(long, &cancel).await.unwrap_err();
    assert!(matches!(err, AuthError::Cancelled { .. }));
    assert_eq!(request.state(), &SessionState::Submitted);

    h.answer(&request, &h.responder(), PIN, 0).await;
    assert!(request.poll_for_response(h.policy()).await.is_ok());
}

#[tokio::test]
async fn test_foreign_owned_responses_are_ignored() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    h.store.set_owner_filtering(false);

    let mallory = h.directory.register_generated("mallory", None).await;
    let forged = EnduserResponder::new(
        h.crypto.clone(),
        Arc::new(h.store.clone()),
        mallory,
        h.bob.clone(),
        h.config.login_contract_id().unwrap(),
    )
    .unwrap();
    h.answer(&request, &forged, PIN, 0).await;

    assert!(matches!(
        request.poll_for_response(h.policy()).await,
        Err(AuthError::ResponseTimeout { .. })
    ));
}

#[tokio::test]
async fn test_poll_before_submit_is_a_precondition_error() {
    let h = harness().await;
    let mut request = h.request(2);
    request.create().await.unwrap();
    assert!(matches!(
        request.poll_for_response(h.policy()).await,
        Err(AuthError::Precondition { state: SessionState::RequestBuilt, .. })
    ));
}

// ============================================================================
// verify
// ============================================================================

#[tokio::test]
async fn test_verify_before_poll_is_a_precondition_error() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    assert!(matches!(request.verify().await, Err(AuthError::Precondition { .. })));
}

#[tokio::test]
async fn test_verify_wrong_pin_finds_nothing() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    h.answer(&request, &h.responder(), "9999", 0).await;
    request.poll_for_response(h.policy()).await.unwrap();

    assert!(matches!(
        request.verify().await,
        Err(AuthError::VerificationNotFound { candidates: 1, undecryptable: 0 })
    ));
    assert!(request.verified_response().is_none());
    assert!(matches!(request.state(), SessionState::Failed { .. }));
}

#[tokio::test]
async fn test_verify_two_matches_is_ambiguous() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    let responder = h.responder();
    h.answer(&request, &responder, PIN, 0).await;
    h.answer(&request, &responder, PIN, 0).await;
    request.poll_for_response(h.policy()).await.unwrap();

    assert!(matches!(
        request.verify().await,
        Err(AuthError::AmbiguousVerification { count: 2 })
    ));
    assert!(request.verified_response().is_none());
}

#[tokio::test]
async fn test_verify_nonzero_status_is_rejected() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;
    h.answer(&request, &h.responder().with_status("1"), PIN, 0).await;
    request.poll_for_response(h.policy()).await.unwrap();

    assert!(matches!(
        request.verify().await,
        Err(AuthError::StatusRejected { ref status }) if status == "1"
    ));
    assert_eq!(request.state(), &SessionState::Verified(Verdict::Rejected));
    assert!(request.verified_response().is_none());
}

#[tokio::test]
async fn test_verify_zero_status_succeeds() {
    let h = harness().await;
    let mut request = submitted_request(&h, 1).await;
    h.answer(&request, &h.responder(), PIN, 0).await;
    request.poll_for_response(h.policy()).await.unwrap();

    let submitted = request.submitted_request_doc().unwrap().clone();
    let outcome = request.verify().await.unwrap().clone();
    assert_eq!(outcome.submitted_request, submitted);
    assert_eq!(outcome.matched_response.document_type(), DocumentType::SignupResponse);
    assert_eq!(outcome.matched_response.owner_id, h.alice.identity_id);
    assert_eq!(request.state(), &SessionState::Verified(Verdict::Accepted));
}

#[tokio::test]
async fn test_verify_excludes_undecryptable_responses() {
    let h = harness().await;
    let mut request = submitted_request(&h, 2).await;

    // sealed with a key pair the vendor does not share with alice
    let (imposter_key, imposter_pub) = X25519AesGcmCrypto::generate_keypair();
    let mut imposter = h.alice.clone();
    imposter.public_key = imposter_pub;
    imposter.private_key = Some(imposter_key);
    let forged = EnduserResponder::new(
        h.crypto.clone(),
        Arc::new(h.store.clone()),
        imposter,
        h.bob.clone(),
        h.config.login_contract_id().unwrap(),
    )
    .unwrap();
    h.answer(&request, &forged, PIN, 0).await;
    request.poll_for_response(h.policy()).await.unwrap();

    assert!(matches!(
        request.verify().await,
        Err(AuthError::VerificationNotFound { candidates: 1, undecryptable: 1 })
    ));
}

#[tokio::test]
async fn test_connection_released_after_verify() {
    let h = harness().await;
    let shared = StoreConnection::new(&h.config, MNEMONIC, Arc::new(h.store.clone()));
    let mut request = h.request(2).with_connection(shared.clone());

    request.create().await.unwrap();
    assert!(!shared.is_leased());
    request.submit().await.unwrap();
    assert!(shared.is_leased());
    assert!(request.is_connected());

    h.answer(&request, &h.responder().with_status("1"), PIN, 0).await;
    request.poll_for_response(h.policy()).await.unwrap();
    assert!(request.verify().await.is_err());

    assert!(!request.is_connected());
    assert!(!shared.is_leased());
}

#[tokio::test]
async fn test_connection_released_on_drop() {
    let h = harness().await;
    let shared = StoreConnection::new(&h.config, MNEMONIC, Arc::new(h.store.clone()));
    let mut request = h.request(2).with_connection(shared.clone());
    request.connect().await;
    assert!(shared.is_leased());

    drop(request);
    assert!(!shared.is_leased());
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_login_end_to_end_with_live_responder() {
    let h = harness().await;
    let events = EventBus::new(16);
    let mut request = h.request(2).with_event_bus(events.clone());
    let mut all_events = events.subscribe();

    let responder = h.responder();
    let wallet_policy = PollingPolicy::new(Duration::from_secs(2), Duration::from_millis(20), Duration::ZERO);
    let wallet = tokio::spawn(async move {
        responder
            .wait_and_respond(RequestKind::Login, PIN, &wallet_policy, &CancellationToken::new())
            .await
    });

    request.create().await.unwrap();
    request.submit().await.unwrap();
    let vendor_policy = PollingPolicy::new(Duration::from_secs(2), Duration::from_millis(20), Duration::ZERO);
    request.poll_for_response(vendor_policy).await.unwrap();
    let outcome = request.verify().await.unwrap().clone();

    let response = wallet.await.unwrap().unwrap();
    assert_eq!(Some(response.document_id), outcome.matched_response.document_id);

    let mut seen = Vec::new();
    while let Ok(event) = all_events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(AuthEvent::RequestCreated { .. })));
    assert!(matches!(seen.last(), Some(AuthEvent::VerificationSucceeded { .. })));
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|e| Some(e.correlation_token()) == request.correlation_token()));
}

#[tokio::test]
async fn test_responder_refuses_request_for_other_pin() {
    let h = harness().await;
    let request = submitted_request(&h, 2).await;
    let document: Document = request.submitted_request_doc().unwrap().document.clone();

    let err = h.responder().respond_to(&document, "0000").await.unwrap_err();
    assert!(err.to_string().contains("pin"));

    let ledger: Arc<dyn DocumentStore> = Arc::new(h.store.clone());
    let responses = ledger
        .query(&ledgerauth_core::domain::document::DocumentQuery::new(
            h.config.login_contract_id().unwrap(),
            DocumentType::LoginResponse,
        ))
        .await
        .unwrap();
    assert!(responses.is_empty());
    assert!(matches!(document.payload, DocumentPayload::LoginRequest(_)));
}
