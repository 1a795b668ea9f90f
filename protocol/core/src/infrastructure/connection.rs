// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Store connection lifecycle.
//!
//! A [`StoreConnection`] describes how to reach the ledger (network, account
//! mnemonic, registered apps, seed endpoints) and hands out exclusive
//! [`ConnectionLease`]s. Only one session drives the connection at a time;
//! the lease is released when it is dropped, on every exit path.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::domain::config::{AuthConfig, Network};
use crate::domain::store::DocumentStore;

/// Parameters the ledger client is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionParams {
    pub network: Network,
    #[serde(skip)]
    pub mnemonic: String,
    pub apps: BTreeMap<String, String>,
    pub seeds: Vec<String>,
}

#[derive(Clone)]
pub struct StoreConnection {
    params: ConnectionParams,
    store: Arc<dyn DocumentStore>,
    gate: Arc<Mutex<()>>,
}

impl StoreConnection {
    pub fn new(config: &AuthConfig, mnemonic: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        let params = ConnectionParams {
            network: config.network,
            mnemonic: mnemonic.into(),
            apps: config
                .apps
                .iter()
                .map(|(name, app)| (name.clone(), app.contract_id.clone()))
                .collect(),
            seeds: config.seeds.clone(),
        };
        Self {
            params,
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn conn_params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Wait for exclusive use of the connection.
    pub async fn connect(&self, holder: &str) -> ConnectionLease {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        info!(
            holder,
            network = %self.params.network,
            seeds = self.params.seeds.len(),
            "Store connection acquired"
        );
        ConnectionLease {
            _guard: guard,
            store: Arc::clone(&self.store),
            holder: holder.to_string(),
            acquired_at: Instant::now(),
        }
    }

    /// Take the connection only if nobody holds it.
    pub fn try_connect(&self, holder: &str) -> Option<ConnectionLease> {
        let guard = Arc::clone(&self.gate).try_lock_owned().ok()?;
        debug!(holder, "Store connection acquired without waiting");
        Some(ConnectionLease {
            _guard: guard,
            store: Arc::clone(&self.store),
            holder: holder.to_string(),
            acquired_at: Instant::now(),
        })
    }

    pub fn is_leased(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Exclusive, scoped use of a [`StoreConnection`].
pub struct ConnectionLease {
    _guard: OwnedMutexGuard<()>,
    store: Arc<dyn DocumentStore>,
    holder: String,
    acquired_at: Instant,
}

impl ConnectionLease {
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Shared handle to the leased store, for work that outlives a borrow of the lease.
    pub fn store_handle(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        info!(
            holder = %self.holder,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Store connection released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use std::time::Duration;

    fn connection() -> StoreConnection {
        StoreConnection::new(
            &AuthConfig::default(),
            "uniform analyst paper",
            Arc::new(InMemoryDocumentStore::new()),
        )
    }

    #[test]
    fn test_conn_params_from_config() {
        let conn = connection();
        let params = conn.conn_params();
        assert_eq!(params.network, Network::Testnet);
        assert_eq!(params.mnemonic, "uniform analyst paper");
        assert!(params.apps.contains_key("loginContract"));
        assert_eq!(params.seeds.len(), 5);

        let json = serde_json::to_value(params).unwrap();
        assert!(json.get("mnemonic").is_none());
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_until_dropped() {
        let conn = connection();
        let lease = conn.connect("session-a").await;
        assert!(conn.is_leased());
        assert!(conn.try_connect("session-b").is_none());

        drop(lease);
        assert!(!conn.is_leased());
        assert!(conn.try_connect("session-b").is_some());
    }

    #[tokio::test]
    async fn test_waiting_connect_proceeds_after_release() {
        let conn = connection();
        let lease = conn.connect("session-a").await;

        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.connect("session-b").await.holder().to_string() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        assert_eq!(waiter.await.unwrap(), "session-b");
    }
}
