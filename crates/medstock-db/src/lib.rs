//! # MedStock Database Layer
//!
//! SQLite persistence for the medicine inventory ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         medstock-db                                     │
//! │                                                                         │
//! │  ┌──────────────┐      ┌─────────────────────────────────────────────┐  │
//! │  │   Database   │────► │               Repositories                  │  │
//! │  │  (SQLite     │      │                                             │  │
//! │  │   pool +     │      │  CatalogRepository    reads, low-stock      │  │
//! │  │   config +   │      │  PurchaseRepository   invoice → batch       │  │
//! │  │   audit)     │      │  SaleRepository       FIFO dispensation     │  │
//! │  └──────┬───────┘      └──────────────────────┬──────────────────────┘  │
//! │         │                                     │                         │
//! │         │ embedded migrations                 │ pure rules from         │
//! │         ▼                                     ▼ medstock-core           │
//! │  ┌──────────────┐      ┌─────────────────────────────────────────────┐  │
//! │  │   SQLite     │      │  allocate() · validation · Money · errors   │  │
//! │  │  (WAL mode)  │      └─────────────────────────────────────────────┘  │
//! │  └──────────────┘                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! SQLite in WAL mode admits one writer at a time; overlapping writers
//! surface as `SQLITE_BUSY`, mapped to [`StoreError::Conflict`]. Every
//! ledger write runs through a bounded retry loop that re-reads fresh
//! rows on each attempt, and the decrement statements carry
//! `quantity_remaining >= ?` guards so a stale plan can never push
//! stock negative. CHECK constraints in the schema back both up.
//!
//! ## Usage
//! ```no_run
//! use medstock_db::{Database, DbConfig};
//! use medstock_db::repository::purchase::NewPurchase;
//! use medstock_core::Actor;
//!
//! # async fn example() -> Result<(), medstock_db::StoreError> {
//! let db = Database::new(DbConfig::new("medstock.db")).await?;
//! let actor = Actor::new("staff-1", "user-1");
//!
//! let batch = db.purchases().record_purchase(&actor, NewPurchase {
//!     medicine_id: "...".into(),
//!     supplier_id: "...".into(),
//!     invoice_number: "INV-2026-0001".into(),
//!     batch_number: None,
//!     quantity: 100,
//!     unit_cost_cents: 500,
//!     purchase_date: None,
//!     expiry_date: None,
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod error;
#[cfg(test)]
mod ledger_tests;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use audit::TracingAuditSink;
pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig, InvoiceScope, LedgerConfig};
pub use repository::catalog::{CatalogRepository, NewMedicine};
pub use repository::purchase::{NewPurchase, PurchaseFilter, PurchaseRepository};
pub use repository::sale::{NewSale, SaleFilter, SaleRepository};
