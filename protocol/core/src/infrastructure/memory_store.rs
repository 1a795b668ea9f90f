// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory document ledger.
//!
//! Append-only like the real store: submitted documents are never updated or
//! removed. Test hooks allow delaying a document's visibility by a number of
//! queries and injecting store failures.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::document::{Document, DocumentId, DocumentQuery, SubmittedDocument, OWNER_ID_FIELD};
use crate::domain::identity::Identity;
use crate::domain::store::{DocumentStore, StoreError, StoreIdentity};

struct StoredDocument {
    document: Document,
    // first query number (1-based) that may see this document
    visible_from_query: u32,
}

#[derive(Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<StoredDocument>>>,
    identities: Arc<RwLock<HashMap<String, StoreIdentity>>>,
    queries: Arc<AtomicU32>,
    query_failures: Arc<Mutex<VecDeque<StoreError>>>,
    submit_failure: Arc<Mutex<Option<StoreError>>>,
    owner_filtering: Arc<AtomicBool>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            identities: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(AtomicU32::new(0)),
            query_failures: Arc::new(Mutex::new(VecDeque::new())),
            submit_failure: Arc::new(Mutex::new(None)),
            owner_filtering: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Register the ledger identity behind a directory entry.
    pub async fn register_identity(&self, identity: &Identity) {
        let record = StoreIdentity {
            id: identity.identity_id.clone(),
            public_keys: vec![identity.public_key.as_str().to_string()],
            balance: 10_000,
        };
        self.identities.write().await.insert(record.id.clone(), record);
    }

    /// Append a document that becomes visible to the `nth_query` query
    /// (1-based) and every later one. The document bypasses owner checks.
    pub async fn insert_visible_from(&self, document: Document, nth_query: u32) -> DocumentId {
        let id = DocumentId(Uuid::new_v4().simple().to_string());
        let mut document = document;
        document.document_id = Some(id.clone());
        self.documents.write().await.push(StoredDocument {
            document,
            visible_from_query: nth_query,
        });
        id
    }

    /// Fail the next queries, one error per call, in order.
    pub fn fail_queries(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.query_failures.lock().extend(errors);
    }

    /// Fail the next submission.
    pub fn fail_next_submit(&self, error: StoreError) {
        *self.submit_failure.lock() = Some(error);
    }

    /// When disabled, `$ownerId` clauses are ignored by `query`, as on ledgers
    /// that only index payload fields.
    pub fn set_owner_filtering(&self, enabled: bool) {
        self.owner_filtering.store(enabled, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents
            .read()
            .await
            .iter()
            .map(|stored| stored.document.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn submit(&self, document: &Document) -> Result<SubmittedDocument, StoreError> {
        let injected = self.submit_failure.lock().take();
        if let Some(error) = injected {
            return Err(error);
        }
        if !self.identities.read().await.contains_key(&document.owner_id) {
            return Err(StoreError::IdentityNotFound(document.owner_id.clone()));
        }

        let document_id = DocumentId(Uuid::new_v4().simple().to_string());
        let mut stored = document.clone();
        stored.document_id = Some(document_id.clone());

        let mut guard = self.documents.write().await;
        guard.push(StoredDocument {
            document: stored.clone(),
            visible_from_query: 0,
        });
        debug!(
            document_id = %document_id,
            document_type = %document.document_type(),
            total = guard.len(),
            "Document appended to ledger"
        );

        Ok(SubmittedDocument {
            document_id,
            document: stored,
            submitted_at: Utc::now(),
        })
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let attempt = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        let injected = self.query_failures.lock().pop_front();
        if let Some(error) = injected {
            return Err(error);
        }

        let effective = if self.owner_filtering.load(Ordering::SeqCst) {
            query.clone()
        } else {
            let mut relaxed = query.clone();
            relaxed.clauses.retain(|c| c.field != OWNER_ID_FIELD);
            relaxed
        };

        let guard = self.documents.read().await;
        Ok(guard
            .iter()
            .filter(|stored| stored.visible_from_query <= attempt)
            .filter(|stored| effective.matches(&stored.document))
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn get_identity(&self, identity_id: &str) -> Result<Option<StoreIdentity>, StoreError> {
        Ok(self.identities.read().await.get(identity_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{AuthResponseFields, DocumentPayload, DocumentType, RequestKind};
    use crate::domain::identity::PublicKey;

    fn response(owner: &str, token: &str) -> Document {
        Document::new(
            "contract",
            owner,
            DocumentPayload::response(
                RequestKind::Login,
                AuthResponseFields {
                    reference: "vendor-uid".to_string(),
                    vid_pin: "v".to_string(),
                    status: "s".to_string(),
                    correlation_token: token.to_string(),
                },
            ),
        )
    }

    fn query(owner: &str, token: &str) -> DocumentQuery {
        DocumentQuery::new("contract", DocumentType::LoginResponse)
            .where_eq(OWNER_ID_FIELD, owner)
            .where_eq("correlation_token", token)
    }

    #[tokio::test]
    async fn test_submit_requires_registered_owner() {
        let store = InMemoryDocumentStore::new();
        let doc = response("alice-ident", "t1");
        assert_eq!(
            store.submit(&doc).await.unwrap_err(),
            StoreError::IdentityNotFound("alice-ident".to_string())
        );

        let alice = Identity::new("alice", "alice-uid", "alice-ident", PublicKey("pub".to_string()));
        store.register_identity(&alice).await;
        let submitted = store.submit(&doc).await.unwrap();
        assert_eq!(submitted.document.document_id, Some(submitted.document_id.clone()));
        assert_eq!(store.query(&query("alice-ident", "t1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delayed_visibility() {
        let store = InMemoryDocumentStore::new();
        store.insert_visible_from(response("alice-ident", "t1"), 3).await;

        for _ in 0..2 {
            assert!(store.query(&query("alice-ident", "t1")).await.unwrap().is_empty());
        }
        assert_eq!(store.query(&query("alice-ident", "t1")).await.unwrap().len(), 1);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_injected_query_failures_are_consumed_in_order() {
        let store = InMemoryDocumentStore::new();
        store.fail_queries([StoreError::Network("reset".to_string()), StoreError::NotConnected]);

        assert_eq!(
            store.query(&query("a", "t")).await.unwrap_err(),
            StoreError::Network("reset".to_string())
        );
        assert_eq!(store.query(&query("a", "t")).await.unwrap_err(), StoreError::NotConnected);
        assert!(store.query(&query("a", "t")).await.is_ok());
    }

    #[tokio::test]
    async fn test_owner_filtering_can_be_disabled() {
        let store = InMemoryDocumentStore::new();
        store.insert_visible_from(response("mallory-ident", "t1"), 0).await;

        assert!(store.query(&query("alice-ident", "t1")).await.unwrap().is_empty());
        store.set_owner_filtering(false);
        assert_eq!(store.query(&query("alice-ident", "t1")).await.unwrap().len(), 1);
    }
}
