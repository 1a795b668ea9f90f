// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Document Store Interface
//!
//! Persistence contract for the shared ledger both parties write to. The
//! interface is defined here and implemented in
//! [`crate::infrastructure::memory_store`]; a network client for a real
//! ledger implements the same trait.
//!
//! The store is append-only: documents are never updated or deleted, and the
//! store assigns the final [`DocumentId`](crate::domain::document::DocumentId)
//! when it accepts a submission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::document::{Document, DocumentQuery, SubmittedDocument};

/// Ledger identity record, as returned by [`DocumentStore::get_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIdentity {
    pub id: String,
    pub public_keys: Vec<String>,
    pub balance: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Sign and broadcast a new document owned by `document.owner_id`.
    async fn submit(&self, document: &Document) -> Result<SubmittedDocument, StoreError>;

    /// Find documents matching every clause of `query`.
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError>;

    /// Look up the ledger identity that would own or sign a document.
    async fn get_identity(&self, identity_id: &str) -> Result<Option<StoreIdentity>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Document rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Store not connected")]
    NotConnected,

    #[error("Query did not complete before the deadline")]
    DeadlineExceeded,

    #[error("Unknown store error: {0}")]
    Unknown(String),
}
