//! # Purchase Intake Repository
//!
//! Turns supplier invoices into stock batches.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_purchase                                    │
//! │                                                                         │
//! │  1. VALIDATE (pure, before any I/O)                                    │
//! │     └── quantity > 0, unit cost > 0, invoice number present            │
//! │     └── purchase date not in the future, expiry ≥ purchase             │
//! │                                                                         │
//! │  2. TRANSACTION (retried on write conflict)                            │
//! │     ├── medicine active?  supplier active?                             │
//! │     ├── duplicate invoice? (UNIQUE index; pre-check for Global scope)  │
//! │     ├── INSERT stock_batches (quantity_remaining = quantity)           │
//! │     └── UPDATE medicines SET current_stock = current_stock + qty       │
//! │         (same transaction: the aggregate can never drift)              │
//! │                                                                         │
//! │  3. AFTER COMMIT                                                       │
//! │     └── audit event "purchase_recorded"                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use medstock_core::{
    validation, Actor, AuditEvent, AuditSink, LedgerError, Money, Page, PageRequest, RefKind,
    StockBatch,
};

use crate::error::{StoreError, StoreResult};
use crate::pool::InvoiceScope;
use crate::repository::{map_invoice_conflict, with_write_retry};

/// Input for recording a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub medicine_id: String,
    pub supplier_id: String,
    pub invoice_number: String,
    pub batch_number: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    /// Defaults to today when omitted.
    pub purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Filters for the purchase listing query. All optional; unset
/// filters match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseFilter {
    pub medicine_id: Option<String>,
    pub supplier_id: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Repository for purchase intake and purchase history.
#[derive(Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
    audit: Arc<dyn AuditSink>,
    invoice_scope: InvoiceScope,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool, audit: Arc<dyn AuditSink>, invoice_scope: InvoiceScope) -> Self {
        PurchaseRepository {
            pool,
            audit,
            invoice_scope,
        }
    }

    /// Records a purchase invoice as a new stock batch.
    ///
    /// On success the batch exists with `quantity_remaining ==
    /// quantity` and the medicine's `current_stock` has grown by the
    /// same amount, both from one committed transaction. On any
    /// failure nothing is written.
    ///
    /// ## Errors
    /// - `Ledger(Validation)` - non-positive quantity/cost, bad invoice number
    /// - `Ledger(InvalidReference)` - unknown or inactive medicine/supplier
    /// - `Ledger(InvalidDate)` - future purchase date, expiry before purchase
    /// - `Ledger(DuplicateInvoice)` - invoice already entered for this scope
    pub async fn record_purchase(
        &self,
        actor: &Actor,
        input: NewPurchase,
    ) -> StoreResult<StockBatch> {
        // Pure validation before touching the database.
        validation::validate_quantity(input.quantity).map_err(LedgerError::from)?;
        validation::validate_unit_price("unit_cost", Money::from_cents(input.unit_cost_cents))
            .map_err(LedgerError::from)?;
        validation::validate_invoice_number(&input.invoice_number)
            .map_err(LedgerError::from)?;

        let today = Utc::now().date_naive();
        let purchase_date = input.purchase_date.unwrap_or(today);
        validation::validate_not_future("purchase date", purchase_date, today)?;
        if let Some(expiry) = input.expiry_date {
            validation::validate_expiry(expiry, purchase_date)?;
        }

        let batch = with_write_retry("record_purchase", || {
            self.try_record_purchase(actor, &input, purchase_date)
        })
        .await?;

        self.audit.record(AuditEvent::purchase_recorded(
            actor,
            &batch.medicine_id,
            &batch.id,
            batch.quantity_purchased,
            &batch.invoice_number,
        ));

        Ok(batch)
    }

    /// One transactional attempt of the purchase write.
    async fn try_record_purchase(
        &self,
        actor: &Actor,
        input: &NewPurchase,
        purchase_date: NaiveDate,
    ) -> StoreResult<StockBatch> {
        let mut tx = self.pool.begin().await?;

        // Reference checks run inside the transaction so an archive
        // racing with this intake cannot slip through.
        let medicine_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM medicines WHERE id = ?1")
                .bind(&input.medicine_id)
                .fetch_optional(&mut *tx)
                .await?;
        if !medicine_active.unwrap_or(false) {
            return Err(LedgerError::invalid_ref(RefKind::Medicine, &input.medicine_id).into());
        }

        let supplier_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM suppliers WHERE id = ?1")
                .bind(&input.supplier_id)
                .fetch_optional(&mut *tx)
                .await?;
        if !supplier_active.unwrap_or(false) {
            return Err(LedgerError::invalid_ref(RefKind::Supplier, &input.supplier_id).into());
        }

        // Per-supplier uniqueness rides on the UNIQUE index alone;
        // the Global scope needs this wider pre-check as well.
        if self.invoice_scope == InvoiceScope::Global {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM stock_batches WHERE invoice_number = ?1)",
            )
            .bind(&input.invoice_number)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Err(LedgerError::DuplicateInvoice {
                    supplier_id: input.supplier_id.clone(),
                    invoice_number: input.invoice_number.clone(),
                }
                .into());
            }
        }

        let batch = StockBatch {
            id: Uuid::new_v4().to_string(),
            medicine_id: input.medicine_id.clone(),
            supplier_id: input.supplier_id.clone(),
            invoice_number: input.invoice_number.clone(),
            batch_number: input.batch_number.clone(),
            unit_cost_cents: input.unit_cost_cents,
            quantity_purchased: input.quantity,
            quantity_remaining: input.quantity,
            purchase_date,
            expiry_date: input.expiry_date,
            created_by: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        debug!(
            batch_id = %batch.id,
            medicine_id = %batch.medicine_id,
            quantity = batch.quantity_purchased,
            invoice = %batch.invoice_number,
            "Inserting stock batch"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, medicine_id, supplier_id, invoice_number, batch_number,
                unit_cost_cents, quantity_purchased, quantity_remaining,
                purchase_date, expiry_date, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.medicine_id)
        .bind(&batch.supplier_id)
        .bind(&batch.invoice_number)
        .bind(&batch.batch_number)
        .bind(batch.unit_cost_cents)
        .bind(batch.quantity_purchased)
        .bind(batch.quantity_remaining)
        .bind(batch.purchase_date)
        .bind(batch.expiry_date)
        .bind(&batch.created_by)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)
        .map_err(|e| map_invoice_conflict(e, &input.supplier_id, &input.invoice_number))?;

        // Equal-and-opposite aggregate update in the SAME transaction.
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET current_stock = current_stock + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(&batch.medicine_id)
        .bind(batch.quantity_purchased)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Existence was checked above inside this transaction.
            return Err(StoreError::Conflict);
        }

        tx.commit().await?;

        Ok(batch)
    }

    /// Gets a batch by ID.
    pub async fn get_batch(&self, id: &str) -> StoreResult<Option<StockBatch>> {
        let batch = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT id, medicine_id, supplier_id, invoice_number, batch_number,
                   unit_cost_cents, quantity_purchased, quantity_remaining,
                   purchase_date, expiry_date, created_by, created_at
            FROM stock_batches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Lists batches matching the filter, newest purchases first.
    pub async fn list_purchases(
        &self,
        filter: &PurchaseFilter,
        page: PageRequest,
    ) -> StoreResult<Page<StockBatch>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM stock_batches
            WHERE (?1 IS NULL OR medicine_id = ?1)
              AND (?2 IS NULL OR supplier_id = ?2)
              AND (?3 IS NULL OR purchase_date >= ?3)
              AND (?4 IS NULL OR purchase_date <= ?4)
            "#,
        )
        .bind(&filter.medicine_id)
        .bind(&filter.supplier_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT id, medicine_id, supplier_id, invoice_number, batch_number,
                   unit_cost_cents, quantity_purchased, quantity_remaining,
                   purchase_date, expiry_date, created_by, created_at
            FROM stock_batches
            WHERE (?1 IS NULL OR medicine_id = ?1)
              AND (?2 IS NULL OR supplier_id = ?2)
              AND (?3 IS NULL OR purchase_date >= ?3)
              AND (?4 IS NULL OR purchase_date <= ?4)
            ORDER BY purchase_date DESC, id DESC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(&filter.medicine_id)
        .bind(&filter.supplier_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
