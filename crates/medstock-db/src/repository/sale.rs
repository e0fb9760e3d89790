//! # Sale Repository
//!
//! Dispenses stock via FIFO allocation and keeps the cached aggregate
//! honest.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        record_sale                                      │
//! │                                                                         │
//! │  1. VALIDATE (pure, before any I/O)                                    │
//! │     └── quantity > 0, sale date not in the future                      │
//! │                                                                         │
//! │  2. TRANSACTION (retried on write conflict)                            │
//! │     ├── medicine active? patient exists? price > 0?                    │
//! │     ├── load FULL batch history (fresh rows, this transaction)         │
//! │     ├── allocate(batches, quantity)   ◄── pure FIFO planner            │
//! │     ├── INSERT sale_transactions + sale_allocations                    │
//! │     ├── per line: guarded UPDATE stock_batches                         │
//! │     │     ... WHERE id = ? AND quantity_remaining >= taken             │
//! │     └── guarded UPDATE medicines                                       │
//! │           ... WHERE id = ? AND current_stock >= quantity               │
//! │                                                                         │
//! │     Any guard matching zero rows aborts the attempt as a Conflict      │
//! │     and the retry loop re-reads and re-plans from fresh rows, so       │
//! │     two racing sales can never oversell the same units.                │
//! │                                                                         │
//! │  3. AFTER COMMIT                                                       │
//! │     └── audit event "sale_recorded" with the batch breakdown           │
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
    allocator::{self, BatchLot},
    validation, Actor, AuditEvent, AuditSink, LedgerError, Money, Page, PageRequest, RefKind,
    SaleAllocation, SaleReceipt, SaleTransaction,
};

use crate::error::{StoreError, StoreResult};
use crate::repository::with_write_retry;

/// Input for recording a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub patient_id: String,
    pub medicine_id: String,
    pub quantity: i64,
    /// Price charged per unit. Defaults to the medicine's configured
    /// price when omitted.
    pub unit_price_cents: Option<i64>,
    /// Defaults to today when omitted.
    pub sale_date: Option<NaiveDate>,
}

/// Filters for the sale listing query. All optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleFilter {
    pub medicine_id: Option<String>,
    pub patient_id: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Repository for dispensations and sale history.
#[derive(Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    audit: Arc<dyn AuditSink>,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, audit: Arc<dyn AuditSink>) -> Self {
        SaleRepository { pool, audit }
    }

    /// Records a sale, consuming stock FIFO across batches.
    ///
    /// All-or-nothing: either the sale row, its allocation lines, the
    /// batch decrements and the aggregate decrement all commit
    /// together, or nothing is written.
    ///
    /// ## Errors
    /// - `Ledger(Validation)` - non-positive quantity or price
    /// - `Ledger(InvalidReference)` - unknown/inactive medicine, unknown patient
    /// - `Ledger(InvalidDate)` - future sale date, or dated before first stock
    /// - `Ledger(NoStockHistory)` - medicine has never been purchased
    /// - `Ledger(InsufficientStock)` - available < requested
    pub async fn record_sale(&self, actor: &Actor, input: NewSale) -> StoreResult<SaleReceipt> {
        validation::validate_quantity(input.quantity).map_err(LedgerError::from)?;

        let today = Utc::now().date_naive();
        let sale_date = input.sale_date.unwrap_or(today);
        validation::validate_not_future("sale date", sale_date, today)?;

        let receipt = with_write_retry("record_sale", || {
            self.try_record_sale(actor, &input, sale_date)
        })
        .await?;

        let lines: Vec<allocator::AllocationLine> = receipt
            .allocations
            .iter()
            .map(|a| allocator::AllocationLine {
                batch_id: a.batch_id.clone(),
                quantity_taken: a.quantity_taken,
                unit_cost_cents: a.unit_cost_cents,
            })
            .collect();
        self.audit.record(AuditEvent::sale_recorded(
            actor,
            &receipt.sale.id,
            &receipt.sale.patient_id,
            &receipt.sale.medicine_id,
            receipt.sale.quantity,
            &lines,
        ));

        Ok(receipt)
    }

    /// One transactional attempt of the sale write.
    async fn try_record_sale(
        &self,
        actor: &Actor,
        input: &NewSale,
        sale_date: NaiveDate,
    ) -> StoreResult<SaleReceipt> {
        let mut tx = self.pool.begin().await?;

        // Medicine lookup doubles as the price default source.
        let medicine: Option<(bool, i64)> = sqlx::query_as(
            "SELECT is_active, unit_price_cents FROM medicines WHERE id = ?1",
        )
        .bind(&input.medicine_id)
        .fetch_optional(&mut *tx)
        .await?;
        let default_price = match medicine {
            Some((true, price)) => price,
            _ => {
                return Err(
                    LedgerError::invalid_ref(RefKind::Medicine, &input.medicine_id).into(),
                )
            }
        };

        let patient_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)")
                .bind(&input.patient_id)
                .fetch_one(&mut *tx)
                .await?;
        if !patient_exists {
            return Err(LedgerError::invalid_ref(RefKind::Patient, &input.patient_id).into());
        }

        let unit_price = Money::from_cents(input.unit_price_cents.unwrap_or(default_price));
        validation::validate_unit_price("unit_price", unit_price).map_err(LedgerError::from)?;

        // FULL batch history, fresh from this transaction. Depleted
        // batches are included on purpose: they distinguish "out of
        // stock" from "never stocked".
        let batches: Vec<BatchLot> = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, purchase_date, unit_cost_cents, quantity_remaining
            FROM stock_batches
            WHERE medicine_id = ?1
            ORDER BY purchase_date ASC, id ASC
            "#,
        )
        .bind(&input.medicine_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(BatchRow::into_lot)
        .collect();

        if let Some(earliest) = allocator::earliest_purchase_date(&batches) {
            validation::validate_sale_date_floor(sale_date, earliest)?;
        }

        let plan = allocator::allocate(&input.medicine_id, &batches, input.quantity)
            .map_err(StoreError::from)?;

        let sale = SaleTransaction {
            id: Uuid::new_v4().to_string(),
            patient_id: input.patient_id.clone(),
            medicine_id: input.medicine_id.clone(),
            quantity: input.quantity,
            unit_price_cents: unit_price.cents(),
            total_cents: unit_price.times(input.quantity).cents(),
            sale_date,
            created_by: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        debug!(
            sale_id = %sale.id,
            medicine_id = %sale.medicine_id,
            quantity = sale.quantity,
            batches_touched = plan.lines.len(),
            "Inserting sale"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_transactions (
                id, patient_id, medicine_id, quantity, unit_price_cents,
                total_cents, sale_date, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.patient_id)
        .bind(&sale.medicine_id)
        .bind(sale.quantity)
        .bind(sale.unit_price_cents)
        .bind(sale.total_cents)
        .bind(sale.sale_date)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        let mut allocations = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let allocation = SaleAllocation {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                batch_id: line.batch_id.clone(),
                quantity_taken: line.quantity_taken,
                unit_cost_cents: line.unit_cost_cents,
            };

            sqlx::query(
                r#"
                INSERT INTO sale_allocations (
                    id, sale_id, batch_id, quantity_taken, unit_cost_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&allocation.id)
            .bind(&allocation.sale_id)
            .bind(&allocation.batch_id)
            .bind(allocation.quantity_taken)
            .bind(allocation.unit_cost_cents)
            .execute(&mut *tx)
            .await?;

            // Guarded decrement: if another committed sale got here
            // first, the guard matches zero rows and this attempt
            // aborts as a Conflict for the retry loop to re-plan.
            let result = sqlx::query(
                r#"
                UPDATE stock_batches
                SET quantity_remaining = quantity_remaining - ?2
                WHERE id = ?1 AND quantity_remaining >= ?2
                "#,
            )
            .bind(&allocation.batch_id)
            .bind(allocation.quantity_taken)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict);
            }

            allocations.push(allocation);
        }

        // Equal-and-opposite aggregate update, same guard discipline.
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET current_stock = current_stock - ?2,
                updated_at = ?3
            WHERE id = ?1 AND current_stock >= ?2
            "#,
        )
        .bind(&sale.medicine_id)
        .bind(sale.quantity)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        tx.commit().await?;

        Ok(SaleReceipt {
            sale,
            allocations,
            cost_basis_cents: plan.cost_basis_cents,
        })
    }

    /// Gets a sale with its allocation lines.
    pub async fn get_sale(&self, id: &str) -> StoreResult<Option<SaleReceipt>> {
        let sale = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, patient_id, medicine_id, quantity, unit_price_cents,
                   total_cents, sale_date, created_by, created_at
            FROM sale_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let allocations = self.allocations_for(&sale.id).await?;
        let cost_basis_cents = allocations.iter().map(|a| a.line_cost().cents()).sum();

        Ok(Some(SaleReceipt {
            sale,
            allocations,
            cost_basis_cents,
        }))
    }

    /// Allocation lines for a sale, in consumption order.
    pub async fn allocations_for(&self, sale_id: &str) -> StoreResult<Vec<SaleAllocation>> {
        let allocations = sqlx::query_as::<_, SaleAllocation>(
            r#"
            SELECT a.id, a.sale_id, a.batch_id, a.quantity_taken, a.unit_cost_cents
            FROM sale_allocations a
            JOIN stock_batches b ON b.id = a.batch_id
            WHERE a.sale_id = ?1
            ORDER BY b.purchase_date ASC, b.id ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(allocations)
    }

    /// Lists sales matching the filter, newest first.
    pub async fn list_sales(
        &self,
        filter: &SaleFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SaleTransaction>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM sale_transactions
            WHERE (?1 IS NULL OR medicine_id = ?1)
              AND (?2 IS NULL OR patient_id = ?2)
              AND (?3 IS NULL OR sale_date >= ?3)
              AND (?4 IS NULL OR sale_date <= ?4)
            "#,
        )
        .bind(&filter.medicine_id)
        .bind(&filter.patient_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, patient_id, medicine_id, quantity, unit_price_cents,
                   total_cents, sale_date, created_by, created_at
            FROM sale_transactions
            WHERE (?1 IS NULL OR medicine_id = ?1)
              AND (?2 IS NULL OR patient_id = ?2)
              AND (?3 IS NULL OR sale_date >= ?3)
              AND (?4 IS NULL OR sale_date <= ?4)
            ORDER BY sale_date DESC, id DESC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(&filter.medicine_id)
        .bind(&filter.patient_id)
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

/// Row shape for the allocator's batch load.
#[derive(sqlx::FromRow)]
struct BatchRow {
    id: String,
    purchase_date: NaiveDate,
    unit_cost_cents: i64,
    quantity_remaining: i64,
}

impl BatchRow {
    fn into_lot(self) -> BatchLot {
        BatchLot {
            batch_id: self.id,
            purchase_date: self.purchase_date,
            unit_cost_cents: self.unit_cost_cents,
            quantity_remaining: self.quantity_remaining,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::NewMedicine;
    use crate::repository::purchase::NewPurchase;
    use chrono::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn actor() -> Actor {
        Actor::new("staff-1", "user-1")
    }

    /// Seeds one medicine, one supplier and one patient; returns the
    /// (medicine_id, supplier_id, patient_id) triple.
    async fn seed_refs(db: &Database) -> (String, String, String) {
        let catalog = db.catalog();
        let medicine = catalog
            .insert_medicine(NewMedicine {
                name: "Paracetamol 500mg".to_string(),
                generic_name: Some("Paracetamol".to_string()),
                dosage_form: Some("tablet".to_string()),
                strength: Some("500 mg".to_string()),
                unit_price_cents: 800,
                low_stock_threshold: 10,
            })
            .await
            .unwrap();
        let supplier = catalog.insert_supplier("HealthSupply Ltd").await.unwrap();
        let patient = catalog.insert_patient("Jane Doe").await.unwrap();
        (medicine.id, supplier, patient)
    }

    async fn stock(
        db: &Database,
        medicine_id: &str,
        supplier_id: &str,
        invoice: &str,
        qty: i64,
        unit_cost_cents: i64,
        purchase_date: NaiveDate,
    ) {
        db.purchases()
            .record_purchase(
                &actor(),
                NewPurchase {
                    medicine_id: medicine_id.to_string(),
                    supplier_id: supplier_id.to_string(),
                    invoice_number: invoice.to_string(),
                    batch_number: None,
                    quantity: qty,
                    unit_cost_cents,
                    purchase_date: Some(purchase_date),
                    expiry_date: None,
                },
            )
            .await
            .unwrap();
    }

    fn sale(patient_id: &str, medicine_id: &str, quantity: i64) -> NewSale {
        NewSale {
            patient_id: patient_id.to_string(),
            medicine_id: medicine_id.to_string(),
            quantity,
            unit_price_cents: None,
            sale_date: None,
        }
    }

    #[tokio::test]
    async fn test_sale_consumes_fifo_and_decrements_aggregate() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();

        stock(&db, &med, &sup, "INV-A", 10, 500, today - Duration::days(2)).await;
        stock(&db, &med, &sup, "INV-B", 10, 700, today - Duration::days(1)).await;

        let receipt = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 15))
            .await
            .unwrap();

        // Oldest batch drained first, remainder from the next.
        assert_eq!(receipt.allocations.len(), 2);
        assert_eq!(receipt.allocations[0].quantity_taken, 10);
        assert_eq!(receipt.allocations[0].unit_cost_cents, 500);
        assert_eq!(receipt.allocations[1].quantity_taken, 5);
        assert_eq!(receipt.allocations[1].unit_cost_cents, 700);
        assert_eq!(receipt.cost_basis_cents, 10 * 500 + 5 * 700);

        // Defaulted price from the medicine row.
        assert_eq!(receipt.sale.unit_price_cents, 800);
        assert_eq!(receipt.sale.total_cents, 15 * 800);

        assert_eq!(db.catalog().get_current_stock(&med).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_sale_with_explicit_price() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 100, 500, today).await;

        let mut input = sale(&pat, &med, 30);
        input.unit_price_cents = Some(800);
        let receipt = db.sales().record_sale(&actor(), input).await.unwrap();

        assert_eq!(receipt.sale.total_cents, 24_000);
        assert_eq!(receipt.allocations.len(), 1);
        assert_eq!(receipt.allocations[0].quantity_taken, 30);
        assert_eq!(db.catalog().get_current_stock(&med).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn test_no_stock_history_vs_insufficient() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;

        // Never purchased at all.
        let err = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::NoStockHistory { .. })
        ));

        // Stocked but not enough.
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 5, 500, today).await;
        let err = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));

        // The failed sale wrote nothing.
        assert_eq!(db.catalog().get_current_stock(&med).await.unwrap(), 5);
        let page = db
            .sales()
            .list_sales(&SaleFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_depleted_history_is_insufficient_not_no_history() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 5, 500, today).await;

        db.sales()
            .record_sale(&actor(), sale(&pat, &med, 5))
            .await
            .unwrap();

        let err = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_patient_and_inactive_medicine_rejected() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 10, 500, today).await;

        let err = db
            .sales()
            .record_sale(&actor(), sale("missing", &med, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InvalidReference {
                kind: RefKind::Patient,
                ..
            })
        ));

        db.catalog().archive_medicine(&med).await.unwrap();
        let err = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InvalidReference {
                kind: RefKind::Medicine,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_sale_dated_before_first_stock_rejected() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();

        // Tiny early batch, then a later batch that alone covers the
        // requested quantity.
        stock(&db, &med, &sup, "INV-A", 1, 500, today - Duration::days(6)).await;
        stock(&db, &med, &sup, "INV-B", 50, 700, today - Duration::days(2)).await;

        // The floor is the EARLIEST purchase date over the full
        // history: a sale dated before it is rejected even though the
        // later batch could cover all 10 units by itself.
        let mut input = sale(&pat, &med, 10);
        input.sale_date = Some(today - Duration::days(7));
        let err = db.sales().record_sale(&actor(), input).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InvalidDate { .. })
        ));
        assert_eq!(db.catalog().get_current_stock(&med).await.unwrap(), 51);

        // Exactly the first stock date is allowed.
        let mut input = sale(&pat, &med, 10);
        input.sale_date = Some(today - Duration::days(6));
        db.sales().record_sale(&actor(), input).await.unwrap();
    }

    #[tokio::test]
    async fn test_future_sale_date_rejected() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 10, 500, today).await;

        let mut input = sale(&pat, &med, 1);
        input.sale_date = Some(today + Duration::days(1));
        let err = db.sales().record_sale(&actor(), input).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InvalidDate { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_sale_round_trips_with_allocations() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 10, 500, today - Duration::days(1)).await;
        stock(&db, &med, &sup, "INV-B", 10, 700, today).await;

        let receipt = db
            .sales()
            .record_sale(&actor(), sale(&pat, &med, 12))
            .await
            .unwrap();

        let loaded = db.sales().get_sale(&receipt.sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.sale.quantity, 12);
        assert_eq!(loaded.allocations.len(), 2);
        assert_eq!(loaded.cost_basis_cents, receipt.cost_basis_cents);
        assert_eq!(
            loaded
                .allocations
                .iter()
                .map(|a| a.quantity_taken)
                .sum::<i64>(),
            12
        );

        assert!(db.sales().get_sale("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sales_filters() {
        let db = test_db().await;
        let (med, sup, pat) = seed_refs(&db).await;
        let today = Utc::now().date_naive();
        stock(&db, &med, &sup, "INV-A", 100, 500, today).await;

        for _ in 0..3 {
            db.sales()
                .record_sale(&actor(), sale(&pat, &med, 5))
                .await
                .unwrap();
        }

        let all = db
            .sales()
            .list_sales(&SaleFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 3);

        let other = db
            .sales()
            .list_sales(
                &SaleFilter {
                    patient_id: Some("missing".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(other.total, 0);
    }
}
