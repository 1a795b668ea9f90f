// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates, value objects and collaborator contracts of the
//! authentication protocol.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure protocol state and the traits infrastructure implements

pub mod error;
pub mod identity;
pub mod document;
pub mod crypto;
pub mod directory;
pub mod store;
pub mod auth_session;
pub mod config;
pub mod events;
