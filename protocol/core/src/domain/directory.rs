// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::identity::{Identity, PrivateKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Name not registered: {0}")]
    NotFound(String),

    #[error("No account matches the supplied mnemonic")]
    UnknownAccount,

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves human-readable usernames to ledger identities.
///
/// Implementations perform network I/O; callers are expected to memoize.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolve a registered username to its identity (public data only).
    async fn resolve(&self, name: &str) -> Result<Identity, DirectoryError>;

    /// Derive the signing/encryption key of the account behind `mnemonic`.
    async fn account_private_key(&self, mnemonic: &str) -> Result<PrivateKey, DirectoryError>;
}
