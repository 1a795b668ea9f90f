// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::directory::{DirectoryError, DirectoryLookup};
use crate::domain::identity::{Identity, PrivateKey};
use crate::infrastructure::crypto::X25519AesGcmCrypto;

/// Username registry held in memory.
///
/// Counts `resolve` calls so callers can assert lookups are memoized, and can
/// be switched offline to exercise directory failures.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    // Maps name -> public identity
    names: Arc<RwLock<HashMap<String, Identity>>>,
    // Maps account mnemonic -> private key
    accounts: Arc<RwLock<HashMap<String, PrivateKey>>>,
    lookups: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name. Any private key on `identity` is dropped; register
    /// the account separately with [`InMemoryDirectory::register_account`].
    pub async fn register(&self, mut identity: Identity) {
        identity.private_key = None;
        self.names.write().await.insert(identity.name.clone(), identity);
    }

    pub async fn register_account(&self, mnemonic: impl Into<String>, private_key: PrivateKey) {
        self.accounts.write().await.insert(mnemonic.into(), private_key);
    }

    /// Register `name` under a freshly generated key pair and return the
    /// identity with its private key attached.
    pub async fn register_generated(&self, name: &str, mnemonic: Option<&str>) -> Identity {
        let (private_key, public_key) = X25519AesGcmCrypto::generate_keypair();
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).simple().to_string();
        let identity_id = Uuid::new_v4().simple().to_string();

        let identity = Identity::new(name, id, identity_id, public_key);
        self.register(identity.clone()).await;
        if let Some(mnemonic) = mnemonic {
            self.register_account(mnemonic, private_key.clone()).await;
        }
        identity.with_private_key(private_key)
    }

    /// Number of `resolve` calls served so far, including failed ones.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryLookup for InMemoryDirectory {
    async fn resolve(&self, name: &str) -> Result<Identity, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let guard = self.names.read().await;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }

    async fn account_private_key(&self, mnemonic: &str) -> Result<PrivateKey, DirectoryError> {
        self.check_available()?;

        let guard = self.accounts.read().await;
        guard.get(mnemonic).cloned().ok_or(DirectoryError::UnknownAccount)
    }
}
