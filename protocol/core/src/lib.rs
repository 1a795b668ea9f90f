// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `ledgerauth-core` - Ledger Challenge-Response Authentication
//!
//! A vendor authenticates an enduser without ever talking to them directly:
//! both parties write signed documents to a shared, append-only document
//! ledger and poll for the documents written by the counterparty.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `AuthSession` state machine, typed documents, collaborator traits, config |
//! | [`application`] | Application | `AuthRequest` orchestration, document polling, enduser responder |
//! | [`infrastructure`] | Infrastructure | X25519/AES-GCM crypto, in-memory ledger and directory, connection lease, event bus |
//!
//! ## Protocol
//!
//! ```text
//! Vendor (AuthRequest)                         Ledger                    Enduser wallet
//!   create()  → encrypted uid_pin + nonce
//!   submit()  ─── LoginRequest ──────────────▶  ◀── query ────────────────
//!                                               ◀── LoginResponse ─────── vid_pin, status
//!   poll_for_response() ── query ────────────▶
//!   verify()  → decrypt, compare hash(entropy ‖ vendor.id ‖ pin), status '0'
//! ```

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
