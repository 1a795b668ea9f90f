// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::auth_session::SessionId;
use crate::domain::document::{DocumentId, RequestKind};

/// Lifecycle events of a single authentication attempt.
///
/// Every variant after `RequestCreated` carries the correlation token so
/// observers can follow one session across the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthEvent {
    RequestCreated {
        session_id: SessionId,
        request_kind: RequestKind,
        enduser: String,
        vendor: String,
        correlation_token: String,
        created_at: DateTime<Utc>,
    },
    RequestSubmitted {
        session_id: SessionId,
        document_id: DocumentId,
        correlation_token: String,
        submitted_at: DateTime<Utc>,
    },
    ResponsesFound {
        session_id: SessionId,
        correlation_token: String,
        candidates: usize,
        attempts: u32,
        found_at: DateTime<Utc>,
    },
    VerificationSucceeded {
        session_id: SessionId,
        correlation_token: String,
        response_id: Option<DocumentId>,
        verified_at: DateTime<Utc>,
    },
    VerificationFailed {
        session_id: SessionId,
        correlation_token: String,
        reason: String, // rendered AuthError
        failed_at: DateTime<Utc>,
    },
}

impl AuthEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::RequestCreated { session_id, .. }
            | Self::RequestSubmitted { session_id, .. }
            | Self::ResponsesFound { session_id, .. }
            | Self::VerificationSucceeded { session_id, .. }
            | Self::VerificationFailed { session_id, .. } => *session_id,
        }
    }

    pub fn correlation_token(&self) -> &str {
        match self {
            Self::RequestCreated { correlation_token, .. }
            | Self::RequestSubmitted { correlation_token, .. }
            | Self::ResponsesFound { correlation_token, .. }
            | Self::VerificationSucceeded { correlation_token, .. }
            | Self::VerificationFailed { correlation_token, .. } => correlation_token,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::VerificationSucceeded { .. } | Self::VerificationFailed { .. }
        )
    }
}
