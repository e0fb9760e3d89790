//! # Repository Layer
//!
//! Database operations for the ledger, one repository per write path:
//!
//! - [`catalog`] - reference lookups, stock aggregate reads, low-stock
//! - [`purchase`] - purchase intake (batch creation)
//! - [`sale`] - sale recording (FIFO consumption)
//!
//! ## Write-Conflict Retry Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              The Check-Then-Act Race, and Why Retry                     │
//! │                                                                         │
//! │  Sale A: read remaining=10 ──► allocate 10 ──► UPDATE ... ──► commit   │
//! │  Sale B: read remaining=10 ──► allocate 10 ──► UPDATE ✗                │
//! │                                          │                              │
//! │                   SQLite: B's snapshot went stale (SQLITE_BUSY)        │
//! │                                          │                              │
//! │                   with_write_retry: rollback, re-read FRESH rows,      │
//! │                   re-run the allocator, try again                       │
//! │                                          │                              │
//! │                   B now sees remaining=0 → InsufficientStock           │
//! │                                                                         │
//! │  Overselling is impossible: the losing transaction never commits       │
//! │  a decision computed from stale quantities.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two mechanisms back this up:
//! 1. SQLite transactions are serializable; a writer whose snapshot is
//!    stale fails with SQLITE_BUSY instead of committing over fresh data
//! 2. Decrements are guarded (`... AND quantity_remaining >= ?`);
//!    zero rows affected aborts the attempt as a [`StoreError::Conflict`]
//!
//! The retry is bounded and invisible to callers: it only ever ends in
//! success or one of the ledger taxonomy errors.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{StoreError, StoreResult};

pub mod catalog;
pub mod purchase;
pub mod sale;

/// Upper bound on write-conflict retries before giving up.
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Base backoff between attempts; grows linearly with attempt number.
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Runs a transactional write, retrying on transient conflicts.
///
/// `attempt` must start a fresh transaction and re-read every row it
/// depends on — a retry with stale state would defeat the purpose.
/// Non-retryable errors (the whole ledger taxonomy included) pass
/// through on the first occurrence.
pub(crate) async fn with_write_retry<T, F, Fut>(op: &'static str, mut attempt: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut conflicts = 0u32;
    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && conflicts + 1 < MAX_WRITE_ATTEMPTS => {
                conflicts += 1;
                warn!(op, attempt = conflicts, "write conflict, retrying with fresh reads");
                tokio::time::sleep(RETRY_BACKOFF * conflicts).await;
            }
            other => return other,
        }
    }
}

/// Maps a unique-constraint failure on the invoice index to the
/// domain's DuplicateInvoice error; everything else passes through.
pub(crate) fn map_invoice_conflict(
    err: StoreError,
    supplier_id: &str,
    invoice_number: &str,
) -> StoreError {
    match err {
        StoreError::UniqueViolation { ref field, .. }
            if field.contains("stock_batches.supplier_id") =>
        {
            StoreError::Ledger(medstock_core::LedgerError::DuplicateInvoice {
                supplier_id: supplier_id.to_string(),
                invoice_number: invoice_number.to_string(),
            })
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_write_retry("test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Conflict) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Conflict)));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_WRITE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_conflict() {
        let calls = AtomicU32::new(0);
        let result = with_write_retry("test_op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(StoreError::Conflict)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_pass_through_immediately() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_write_retry("test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::not_found("Medicine", "m-1")) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoice_conflict_mapping() {
        let err = StoreError::UniqueViolation {
            field: "stock_batches.supplier_id, stock_batches.invoice_number".to_string(),
            value: "unknown".to_string(),
        };
        let mapped = map_invoice_conflict(err, "sup-1", "INV-9");
        assert!(matches!(
            mapped,
            StoreError::Ledger(medstock_core::LedgerError::DuplicateInvoice { .. })
        ));

        let other = StoreError::Conflict;
        assert!(matches!(
            map_invoice_conflict(other, "sup-1", "INV-9"),
            StoreError::Conflict
        ));
    }
}
