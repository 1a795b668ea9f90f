// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod crypto;
pub mod directory;
pub mod memory_store;
pub mod connection;
pub mod event_bus;

pub use connection::{ConnectionLease, StoreConnection};
pub use crypto::X25519AesGcmCrypto;
pub use directory::InMemoryDirectory;
pub use event_bus::EventBus;
pub use memory_store::InMemoryDocumentStore;
