// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

// ============================================================================
// Key Material
// ============================================================================

/// Public key of a ledger identity, base64 encoded as published in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub String);

impl PublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex encoded private key. Never serialized and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self(hex_key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// ============================================================================
// Identity
// ============================================================================

/// A registered ledger user as resolved through the directory.
///
/// `id` is the application-level user id (the value mixed into challenge
/// hashes), `identity_id` is the ledger identity that owns documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub id: String,
    pub identity_id: String,
    pub public_key: PublicKey,
    #[serde(skip)]
    pub private_key: Option<PrivateKey>,
}

impl Identity {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        identity_id: impl Into<String>,
        public_key: PublicKey,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            identity_id: identity_id.into(),
            public_key,
            private_key: None,
        }
    }

    pub fn with_private_key(mut self, private_key: PrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }
}

/// Memoized resolution state of one protocol party.
///
/// A slot moves from `Unresolved` to `Resolved` exactly once during normal
/// operation. Failed lookups leave it `Unresolved` so they are retried.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum IdentitySlot {
    #[default]
    Unresolved,
    Resolved(Identity),
}

impl IdentitySlot {
    pub fn get(&self) -> Option<&Identity> {
        match self {
            Self::Resolved(identity) => Some(identity),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}
