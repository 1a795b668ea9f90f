// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy of the authentication protocol.
//!
//! Every wrapping variant keeps the collaborator error as its `source` so the
//! original cause is never lost behind a generic failure.

use thiserror::Error;

use crate::domain::auth_session::SessionState;
use crate::domain::config::ConfigError;
use crate::domain::crypto::CryptoError;
use crate::domain::directory::DirectoryError;
use crate::domain::store::StoreError;

/// Which side of the protocol an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Enduser,
    Vendor,
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enduser => write!(f, "enduser"),
            Self::Vendor => write!(f, "vendor"),
        }
    }
}

/// A single field-level problem found while validating session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pin not supplied")]
    EmptyPin,

    #[error("no message has been provided for a message request")]
    EmptyMessage,

    #[error("incorrect request kind supplied: {0} is not a valid request kind")]
    InvalidRequestKind(u8),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyPin => "pin",
            Self::EmptyMessage => "message_body",
            Self::InvalidRequestKind(_) => "request_kind",
            Self::EmptyField(field) => field,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid auth request: {}", .0.iter().map(|e| format!("{}: {}", e.field(), e)).collect::<Vec<_>>().join(", "))]
    Validation(Vec<ValidationError>),

    #[error("{party} '{name}' not found in directory")]
    NotFound { party: Party, name: String },

    #[error("directory lookup for {party} failed")]
    Directory {
        party: Party,
        #[source]
        source: DirectoryError,
    },

    #[error("cannot {operation} while session is {state}")]
    Precondition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("request document submission failed")]
    Submission(#[source] StoreError),

    #[error("document query failed")]
    Query(#[source] StoreError),

    #[error("no response document found within {timeout_ms}ms ({attempts} attempts{})", .last_error.as_ref().map(|e| format!(", last error: {}", e)).unwrap_or_default())]
    ResponseTimeout {
        timeout_ms: u64,
        attempts: u32,
        #[source]
        last_error: Option<StoreError>,
    },

    #[error("response polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("verified response not found ({candidates} candidates, {undecryptable} undecryptable)")]
    VerificationNotFound { candidates: usize, undecryptable: usize },

    #[error("{count} responses verified against a single request")]
    AmbiguousVerification { count: usize },

    #[error("auth request was verified but status '{status}' is not 0")]
    StatusRejected { status: String },

    #[error("crypto operation failed")]
    Crypto(#[from] CryptoError),

    #[error("configuration is incomplete")]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Directory { .. }
                | Self::Submission(_)
                | Self::Query(_)
                | Self::ResponseTimeout { .. }
                | Self::Cancelled { .. }
        )
    }
}
