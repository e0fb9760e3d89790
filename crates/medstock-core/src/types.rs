//! # Domain Types
//!
//! Core domain types for the medicine inventory ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │    Medicine     │   │   StockBatch     │   │  SaleTransaction    │  │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────────  │  │
//! │  │  id (UUID)      │   │  id (UUID)       │   │  id (UUID)          │  │
//! │  │  current_stock  │◄──│  medicine_id     │──►│  medicine_id        │  │
//! │  │  low_stock_     │   │  qty_purchased   │   │  quantity           │  │
//! │  │    threshold    │   │  qty_remaining   │   │  total_cents        │  │
//! │  └─────────────────┘   └──────────────────┘   └──────────┬──────────┘  │
//! │                                 ▲                        │             │
//! │                                 │     ┌──────────────────▼──────────┐  │
//! │                                 └─────│      SaleAllocation         │  │
//! │                                       │  batch_id, quantity_taken,  │  │
//! │                                       │  unit_cost snapshot         │  │
//! │                                       └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants Carried Here
//! - `Medicine.current_stock` always equals the sum of its batches'
//!   `quantity_remaining` (maintained transactionally in medstock-db)
//! - `StockBatch.quantity_remaining` is the only mutable batch field,
//!   bounded by `0 ≤ remaining ≤ purchased`
//! - `SaleAllocation` rows are immutable after insert and sum to the
//!   sale's quantity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// The authenticated identity stamped onto every ledger write.
///
/// Authentication itself lives in the surrounding application; the
/// ledger only records who acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Staff member performing the operation (pharmacist, clerk).
    pub staff_id: String,
    /// Login account the operation ran under.
    pub user_id: String,
}

impl Actor {
    pub fn new(staff_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Actor {
            staff_id: staff_id.into(),
            user_id: user_id.into(),
        }
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A catalog entry with its cached stock aggregate.
///
/// Descriptive fields are owned by catalog management (out of scope
/// here); the ledger reads them and mutates only `current_stock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on dispensing screens.
    pub name: String,

    /// Generic (INN) name.
    pub generic_name: Option<String>,

    /// Dosage form (tablet, syrup, injection...).
    pub dosage_form: Option<String>,

    /// Strength per unit ("500 mg", "5 mg/ml").
    pub strength: Option<String>,

    /// Default sale price in cents, used when a sale omits unit_price.
    pub unit_price_cents: i64,

    /// Stock level at or below which the medicine is flagged low.
    pub low_stock_threshold: i64,

    /// Cached total: always equals Σ quantity_remaining over batches.
    pub current_stock: i64,

    /// Whether the medicine is active (soft archive).
    pub is_active: bool,

    /// When the catalog entry was created.
    pub created_at: DateTime<Utc>,

    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Returns the default sale price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Whether the cached stock is at or below the low-stock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.low_stock_threshold
    }
}

// =============================================================================
// Stock Batch
// =============================================================================

/// One purchase event: an immutable batch with a mutable remainder.
///
/// Created only by purchase intake; `quantity_remaining` is mutated
/// only by the FIFO allocator during a sale; never deleted (batches
/// are the historical record).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Medicine this batch belongs to.
    pub medicine_id: String,

    /// Supplier the stock was purchased from.
    pub supplier_id: String,

    /// Paper invoice number from the supplier.
    pub invoice_number: String,

    /// Manufacturer batch/lot number, when the invoice carries one.
    pub batch_number: Option<String>,

    /// Unit cost at purchase, in cents. Frozen at intake.
    pub unit_cost_cents: i64,

    /// Quantity purchased. Immutable once created.
    pub quantity_purchased: i64,

    /// Quantity not yet consumed by sales.
    /// Monotonically non-increasing: 0 ≤ remaining ≤ purchased.
    pub quantity_remaining: i64,

    /// Date on the purchase invoice. Drives FIFO ordering.
    pub purchase_date: NaiveDate,

    /// Expiry date, when known. Always ≥ purchase_date.
    pub expiry_date: Option<NaiveDate>,

    /// User who recorded the purchase.
    pub created_by: String,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl StockBatch {
    /// Returns the frozen unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Whether any stock is left in this batch.
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.quantity_remaining > 0
    }

    /// Quantity already consumed by sales.
    #[inline]
    pub fn consumed(&self) -> i64 {
        self.quantity_purchased - self.quantity_remaining
    }
}

// =============================================================================
// Sale Transaction
// =============================================================================

/// One dispensation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleTransaction {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Patient the medicine was dispensed to.
    pub patient_id: String,

    /// Medicine sold.
    pub medicine_id: String,

    /// Total quantity sold across all allocation lines.
    pub quantity: i64,

    /// Unit price charged, in cents. Defaults to the medicine's
    /// configured price when the request omits it.
    pub unit_price_cents: i64,

    /// quantity × unit_price_cents.
    pub total_cents: i64,

    /// Business date of the sale. Never in the future, never before
    /// the medicine's earliest batch purchase date.
    pub sale_date: NaiveDate,

    /// User who recorded the sale.
    pub created_by: String,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl SaleTransaction {
    /// Returns the charged unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Allocation
// =============================================================================

/// How much of a sale was drawn from a specific batch.
///
/// Uses the snapshot pattern for `unit_cost_cents`: the batch's cost
/// at the time of consumption is frozen here, so reporting reads the
/// historical cost even if batch metadata is examined much later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleAllocation {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Sale this line belongs to.
    pub sale_id: String,

    /// Batch consumed.
    pub batch_id: String,

    /// Quantity taken from this batch.
    pub quantity_taken: i64,

    /// Unit cost of the batch at consumption time (frozen).
    pub unit_cost_cents: i64,
}

impl SaleAllocation {
    /// Returns the frozen unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Cost contribution of this line: quantity × unit cost.
    #[inline]
    pub fn line_cost(&self) -> Money {
        self.unit_cost().times(self.quantity_taken)
    }
}

// =============================================================================
// Sale Receipt
// =============================================================================

/// What `record_sale` returns to the caller: the persisted sale plus
/// its batch-level breakdown and derived cost basis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: SaleTransaction,
    /// One line per batch touched, oldest batch first.
    pub allocations: Vec<SaleAllocation>,
    /// Σ quantity_taken × historical unit cost. Reporting only; does
    /// not affect the price charged to the patient.
    pub cost_basis_cents: i64,
}

impl SaleReceipt {
    /// Returns the cost basis as Money.
    #[inline]
    pub fn cost_basis(&self) -> Money {
        Money::from_cents(self.cost_basis_cents)
    }
}

// =============================================================================
// Low Stock
// =============================================================================

/// A medicine whose cached stock sits at or below its threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LowStockEntry {
    pub medicine_id: String,
    pub name: String,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
}

// =============================================================================
// Pagination
// =============================================================================

/// One-based page request for listing queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 25;
    pub const MAX_PAGE_SIZE: u32 = 200;

    /// Creates a page request, clamping the size to [1, MAX_PAGE_SIZE]
    /// and the page to ≥ 1.
    pub fn new(page: u32, page_size: u32) -> Self {
        PageRequest {
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    /// Row offset for the underlying query.
    #[inline]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Row limit for the underlying query.
    #[inline]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// A page of results plus the total row count for pagination math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

impl<T> Page<T> {
    /// Total number of pages at this page size.
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + i64::from(self.page_size) - 1) / i64::from(self.page_size)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(remaining: i64, purchased: i64) -> StockBatch {
        StockBatch {
            id: "b-1".to_string(),
            medicine_id: "m-1".to_string(),
            supplier_id: "s-1".to_string(),
            invoice_number: "INV-001".to_string(),
            batch_number: None,
            unit_cost_cents: 500,
            quantity_purchased: purchased,
            quantity_remaining: remaining,
            purchase_date: date(2024, 1, 1),
            expiry_date: None,
            created_by: "u-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_batch_consumed() {
        let b = batch(30, 100);
        assert_eq!(b.consumed(), 70);
        assert!(b.has_remaining());
        assert!(!batch(0, 100).has_remaining());
    }

    #[test]
    fn test_allocation_line_cost() {
        let line = SaleAllocation {
            id: "a-1".to_string(),
            sale_id: "s-1".to_string(),
            batch_id: "b-1".to_string(),
            quantity_taken: 30,
            unit_cost_cents: 500,
        };
        assert_eq!(line.line_cost().cents(), 15_000);
    }

    #[test]
    fn test_page_request_clamping() {
        let req = PageRequest::new(0, 0);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 1);

        let req = PageRequest::new(3, 10_000);
        assert_eq!(req.page_size, PageRequest::MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 2 * i64::from(PageRequest::MAX_PAGE_SIZE));
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            page: 1,
            page_size: 25,
            total: 51,
        };
        assert_eq!(page.total_pages(), 3);

        let empty: Page<u8> = Page {
            items: vec![],
            page: 1,
            page_size: 25,
            total: 0,
        };
        assert_eq!(empty.total_pages(), 0);
    }
}
