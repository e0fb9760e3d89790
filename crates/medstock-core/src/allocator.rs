//! # FIFO Sale Allocator
//!
//! Pure first-in-first-out allocation over a medicine's stock batches.
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sale Write Path                                  │
//! │                                                                         │
//! │  SaleRepository::record_sale (medstock-db)                             │
//! │       │                                                                 │
//! │       │  loads ALL batches for the medicine, inside the transaction    │
//! │       ▼                                                                 │
//! │  allocate(batches, requested)  ◄── THIS MODULE (pure, no I/O)          │
//! │       │                                                                 │
//! │       │  AllocationPlan { lines, cost_basis }                          │
//! │       ▼                                                                 │
//! │  guarded UPDATEs per batch + aggregate decrement + sale insert         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm
//! 1. Order batches by purchase_date ascending, id ascending on ties
//!    (deterministic: oldest stock leaves first, matching pharmacy
//!    expiry-risk practice)
//! 2. Zero batches at all → `NoStockHistory`
//! 3. Σ remaining < requested → `InsufficientStock` (all-or-nothing,
//!    no partial plan is ever produced)
//! 4. Walk the ordered list taking `min(still needed, remaining)`
//!    from each batch until the request is covered; batches with
//!    nothing remaining are skipped and never produce a line
//!
//! Being a pure function of `(batches, requested)`, the walk is
//! unit-testable without a database. The storage layer re-runs it on
//! every attempt with freshly read rows, so the plan can never be
//! computed from stale quantities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;
use crate::types::StockBatch;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// The slice of a batch the allocator needs to make its decision.
///
/// Built from freshly loaded [`StockBatch`] rows; kept separate so the
/// allocator can also be driven directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLot {
    pub batch_id: String,
    pub purchase_date: NaiveDate,
    pub unit_cost_cents: i64,
    pub quantity_remaining: i64,
}

impl From<&StockBatch> for BatchLot {
    fn from(batch: &StockBatch) -> Self {
        BatchLot {
            batch_id: batch.id.clone(),
            purchase_date: batch.purchase_date,
            unit_cost_cents: batch.unit_cost_cents,
            quantity_remaining: batch.quantity_remaining,
        }
    }
}

/// One planned draw against a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub batch_id: String,
    pub quantity_taken: i64,
    /// Batch unit cost at allocation time, in cents (snapshot).
    pub unit_cost_cents: i64,
}

impl AllocationLine {
    /// Cost contribution of this line.
    #[inline]
    pub fn line_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).times(self.quantity_taken)
    }
}

/// The full allocation for one sale: which batches, how much from
/// each, and the derived cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Lines in consumption order (oldest batch first).
    pub lines: Vec<AllocationLine>,
    /// Σ quantity_taken × unit_cost over all lines.
    pub cost_basis_cents: i64,
}

impl AllocationPlan {
    /// Total quantity across all lines. Always equals the requested
    /// quantity for a plan returned by [`allocate`].
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity_taken).sum()
    }

    /// Returns the cost basis as Money.
    #[inline]
    pub fn cost_basis(&self) -> Money {
        Money::from_cents(self.cost_basis_cents)
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Plans a FIFO allocation of `requested` units over `batches`.
///
/// `batches` is the medicine's FULL batch history, including fully
/// consumed batches. History matters: an empty slice means the
/// medicine was never purchased (`NoStockHistory`), while a slice
/// with only depleted batches means it is out of stock
/// (`InsufficientStock`), and callers message those differently.
///
/// The input order does not matter; the plan is deterministic for a
/// given batch set because ties on purchase_date break by batch id.
///
/// ## Errors
/// - [`LedgerError::NoStockHistory`] — `batches` is empty
/// - [`LedgerError::InsufficientStock`] — Σ remaining < requested
pub fn allocate(
    medicine_id: &str,
    batches: &[BatchLot],
    requested: i64,
) -> LedgerResult<AllocationPlan> {
    debug_assert!(requested > 0, "quantity validated before allocation");

    if batches.is_empty() {
        return Err(LedgerError::NoStockHistory {
            medicine_id: medicine_id.to_string(),
        });
    }

    let available: i64 = batches.iter().map(|b| b.quantity_remaining).sum();
    if available < requested {
        return Err(LedgerError::InsufficientStock {
            medicine_id: medicine_id.to_string(),
            available,
            requested,
        });
    }

    // Deterministic FIFO order: purchase date, then id on ties.
    let mut ordered: Vec<&BatchLot> = batches.iter().collect();
    ordered.sort_by(|a, b| {
        a.purchase_date
            .cmp(&b.purchase_date)
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });

    let mut lines = Vec::new();
    let mut cost_basis = Money::zero();
    let mut needed = requested;

    for lot in ordered {
        if needed == 0 {
            break;
        }
        // Depleted batches stay in history but never produce a line,
        // even if a stale read handed them to us.
        if lot.quantity_remaining <= 0 {
            continue;
        }

        let take = needed.min(lot.quantity_remaining);
        cost_basis += Money::from_cents(lot.unit_cost_cents).times(take);
        lines.push(AllocationLine {
            batch_id: lot.batch_id.clone(),
            quantity_taken: take,
            unit_cost_cents: lot.unit_cost_cents,
        });
        needed -= take;
    }

    // available >= requested was checked above, so the walk always
    // covers the request exactly.
    debug_assert_eq!(needed, 0);

    Ok(AllocationPlan {
        lines,
        cost_basis_cents: cost_basis.cents(),
    })
}

/// The earliest purchase date across a batch history.
///
/// Used by the sale recorder for the date-floor rule: a sale cannot
/// be dated before the medicine's first stock existed.
pub fn earliest_purchase_date(batches: &[BatchLot]) -> Option<NaiveDate> {
    batches.iter().map(|b| b.purchase_date).min()
}

// =============================================================================
// Unit Tests
// =============================================================================
