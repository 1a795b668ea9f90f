// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document Poller - time-bounded search for documents on the ledger
//!
//! The counterparty answers asynchronously, so the vendor repeats one query
//! until it returns something, the time budget runs out, or the caller
//! cancels.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retry loop around [`DocumentStore::query`]
//!
//! ```text
//! sleep(initial_delay)
//! loop {
//!     query            → non-empty: done
//!     elapsed ≥ timeout → ResponseTimeout
//!     sleep(min(frequency, remaining))   (cancellable)
//! }
//! ```

use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::config::PollingPolicy;
use crate::domain::document::{Document, DocumentQuery};
use crate::domain::error::AuthError;
use crate::domain::store::{DocumentStore, StoreError};

/// Documents returned by the attempt that first found any.
#[derive(Debug, Clone)]
pub struct Polled {
    pub documents: Vec<Document>,
    pub attempts: u32,
}

/// Run `query` once.
pub async fn find(store: &dyn DocumentStore, query: &DocumentQuery) -> Result<Vec<Document>, AuthError> {
    store.query(query).await.map_err(AuthError::Query)
}

/// Repeat `query` until it yields at least one document.
///
/// Query errors are logged and retried; when the deadline passes, the last of
/// them is reported on the [`AuthError::ResponseTimeout`]. The timeout is
/// measured from the first attempt.
///
/// # Errors
///
/// - [`AuthError::ResponseTimeout`] once `policy.timeout` has elapsed
/// - [`AuthError::Cancelled`] when `cancel` fires during the delay, a query or a sleep
pub async fn wait_for(
    store: &dyn DocumentStore,
    query: &DocumentQuery,
    policy: &PollingPolicy,
    cancel: &CancellationToken,
) -> Result<Polled, AuthError> {
    wait_for_matching(store, query, policy, cancel, &|_: &Document| true).await
}

/// [`wait_for`] with a client-side filter applied to every result set.
/// Documents rejected by `accept` do not end the wait.
pub async fn wait_for_matching(
    store: &dyn DocumentStore,
    query: &DocumentQuery,
    policy: &PollingPolicy,
    cancel: &CancellationToken,
    accept: &(dyn Fn(&Document) -> bool + Sync),
) -> Result<Polled, AuthError> {
    let mut attempts: u32 = 0;

    if !policy.initial_delay.is_zero() {
        debug!(delay_ms = policy.initial_delay.as_millis() as u64, "Waiting before first query");
        tokio::select! {
            _ = sleep(policy.initial_delay) => {}
            _ = cancel.cancelled() => return Err(AuthError::Cancelled { attempts }),
        }
    }

    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut last_error: Option<StoreError> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled { attempts });
        }

        attempts += 1;
        metrics::counter!("ledgerauth_poll_attempts_total").increment(1);

        let outcome = tokio::select! {
            outcome = timeout_at(deadline, store.query(query)) => outcome,
            _ = cancel.cancelled() => return Err(AuthError::Cancelled { attempts }),
        };

        let outcome = outcome.map(|result| {
            result.map(|mut documents| {
                let received = documents.len();
                documents.retain(|d| accept(d));
                if documents.len() != received {
                    warn!(
                        attempt = attempts,
                        discarded = received - documents.len(),
                        "Discarded documents rejected by client-side filter"
                    );
                }
                documents
            })
        });

        match outcome {
            Ok(Ok(documents)) if !documents.is_empty() => {
                debug!(
                    attempts,
                    found = documents.len(),
                    document_type = %query.document_type,
                    "Documents found"
                );
                return Ok(Polled { documents, attempts });
            }
            Ok(Ok(_)) => {
                debug!(attempt = attempts, document_type = %query.document_type, "No documents yet");
            }
            Ok(Err(e)) => {
                warn!(attempt = attempts, error = %e, "Document query failed, retrying");
                last_error = Some(e);
            }
            Err(_) => {
                last_error = Some(StoreError::DeadlineExceeded);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(AuthError::ResponseTimeout {
                timeout_ms: policy.timeout.as_millis() as u64,
                attempts,
                last_error,
            });
        }

        let pause = policy.frequency.min(deadline - now);
        tokio::select! {
            _ = sleep(pause) => {}
            _ = cancel.cancelled() => return Err(AuthError::Cancelled { attempts }),
        }
    }
}
