//! # medstock-core: Pure Business Logic for the MedStock Ledger
//!
//! This crate is the **heart** of the medicine inventory ledger. It
//! contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MedStock Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Hospital Back-Office Application (out of scope)      │   │
//! │  │    admissions, pathology orders, auth, forms, API endpoints     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ medstock-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ allocator │  │   money   │  │ validation│  │   │
//! │  │   │ Medicine  │  │ FIFO walk │  │   Money   │  │   dates   │  │   │
//! │  │   │StockBatch │  │ cost basis│  │  (cents)  │  │ quantities│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   medstock-db (Storage Layer)                   │   │
//! │  │        SQLite queries, migrations, transaction boundaries       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, StockBatch, SaleTransaction, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`allocator`] - The FIFO sale allocator as a pure function
//! - [`validation`] - Quantity, price, and date-chronology rules
//! - [`error`] - The ledger error taxonomy
//! - [`audit`] - Audit event shapes and the sink seam
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **No Clock**: "today" is always an explicit parameter
//! 4. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 5. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use medstock_core::allocator::{allocate, BatchLot};
//!
//! let batches = vec![
//!     BatchLot {
//!         batch_id: "day-1".into(),
//!         purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         unit_cost_cents: 500,
//!         quantity_remaining: 10,
//!     },
//!     BatchLot {
//!         batch_id: "day-10".into(),
//!         purchase_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
//!         unit_cost_cents: 600,
//!         quantity_remaining: 10,
//!     },
//! ];
//!
//! // Oldest stock leaves first: 10 from day-1, 5 from day-10.
//! let plan = allocate("amoxicillin", &batches, 15).unwrap();
//! assert_eq!(plan.lines.len(), 2);
//! assert_eq!(plan.cost_basis_cents, 10 * 500 + 5 * 600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod audit;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use medstock_core::Money` instead of
// `use medstock_core::money::Money`

pub use allocator::{allocate, AllocationLine, AllocationPlan, BatchLot};
pub use audit::{AuditEvent, AuditSink, NullAuditSink};
pub use error::{LedgerError, LedgerResult, RefKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity for a single purchase or sale line.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 100000 instead of
/// 100) from distorting the ledger. Hospital pharmacy orders above
/// this size go through procurement, not the dispensing desk.
pub const MAX_LINE_QUANTITY: i64 = 100_000;
