//! # Catalog Repository
//!
//! Read-side access to the reference data the ledger validates
//! against, plus the stock-aggregate projections.
//!
//! Catalog management proper (creating and editing medicines,
//! suppliers, patients) belongs to the surrounding application; the
//! insert helpers here exist for the seed binary and tests. The
//! ledger's contract with the catalog is narrow:
//!
//! - `is_active_medicine` / `is_active_supplier` / `patient_exists`
//! - `get_current_stock` (the cheap cached read)
//! - `list_low_stock` (current_stock ≤ low_stock_threshold)

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use medstock_core::{LowStockEntry, Medicine};

use crate::error::{StoreError, StoreResult};

/// Repository for catalog lookups and aggregate reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

/// Input for creating a medicine catalog entry (seed/test helper).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub unit_price_cents: i64,
    pub low_stock_threshold: i64,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a medicine by ID.
    pub async fn get_medicine(&self, id: &str) -> StoreResult<Option<Medicine>> {
        let medicine = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, name, generic_name, dosage_form, strength,
                   unit_price_cents, low_stock_threshold, current_stock,
                   is_active, created_at, updated_at
            FROM medicines
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(medicine)
    }

    /// Whether a medicine exists and is active.
    pub async fn is_active_medicine(&self, id: &str) -> StoreResult<bool> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM medicines WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(active.unwrap_or(false))
    }

    /// Whether a supplier exists and is active.
    pub async fn is_active_supplier(&self, id: &str) -> StoreResult<bool> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM suppliers WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(active.unwrap_or(false))
    }

    /// Whether a patient record exists.
    pub async fn patient_exists(&self, id: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// The cached stock total for a medicine.
    ///
    /// This is the authoritative fast read: by invariant it equals
    /// the sum of `quantity_remaining` over the medicine's batches,
    /// because every batch mutation updates it in the same
    /// transaction. Calling it twice with no intervening writes
    /// returns the same value.
    pub async fn get_current_stock(&self, medicine_id: &str) -> StoreResult<i64> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM medicines WHERE id = ?1")
                .bind(medicine_id)
                .fetch_optional(&self.pool)
                .await?;

        stock.ok_or_else(|| StoreError::not_found("Medicine", medicine_id))
    }

    /// Medicines whose cached stock sits at or below their threshold.
    pub async fn list_low_stock(&self) -> StoreResult<Vec<LowStockEntry>> {
        let entries = sqlx::query_as::<_, LowStockEntry>(
            r#"
            SELECT id AS medicine_id, name, current_stock, low_stock_threshold
            FROM medicines
            WHERE is_active = 1
              AND current_stock <= low_stock_threshold
            ORDER BY current_stock ASC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    // =========================================================================
    // Seed / test helpers
    // =========================================================================

    /// Inserts a medicine catalog entry. Seed/test helper; catalog
    /// CRUD proper lives outside the ledger.
    pub async fn insert_medicine(&self, input: NewMedicine) -> StoreResult<Medicine> {
        let now = Utc::now();
        let medicine = Medicine {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            generic_name: input.generic_name,
            dosage_form: input.dosage_form,
            strength: input.strength,
            unit_price_cents: input.unit_price_cents,
            low_stock_threshold: input.low_stock_threshold,
            current_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %medicine.id, name = %medicine.name, "Inserting medicine");

        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, name, generic_name, dosage_form, strength,
                unit_price_cents, low_stock_threshold, current_stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(&medicine.dosage_form)
        .bind(&medicine.strength)
        .bind(medicine.unit_price_cents)
        .bind(medicine.low_stock_threshold)
        .bind(medicine.current_stock)
        .bind(medicine.is_active)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(medicine)
    }

    /// Inserts a supplier. Seed/test helper.
    pub async fn insert_supplier(&self, name: &str) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO suppliers (id, name, is_active, created_at) VALUES (?1, ?2, 1, ?3)")
            .bind(&id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    /// Inserts a patient. Seed/test helper.
    pub async fn insert_patient(&self, name: &str) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO patients (id, name, is_active, created_at) VALUES (?1, ?2, 1, ?3)")
            .bind(&id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    /// Archives a medicine (soft delete). Test helper for the
    /// inactive-reference paths.
    pub async fn archive_medicine(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE medicines SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Medicine", id));
        }
        Ok(())
    }

    /// Archives a supplier (soft delete). Test helper.
    pub async fn archive_supplier(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE suppliers SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Supplier", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn paracetamol() -> NewMedicine {
        NewMedicine {
            name: "Paracetamol 500mg".to_string(),
            generic_name: Some("Paracetamol".to_string()),
            dosage_form: Some("tablet".to_string()),
            strength: Some("500 mg".to_string()),
            unit_price_cents: 150,
            low_stock_threshold: 20,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_medicine() {
        let db = test_db().await;
        let catalog = db.catalog();

        let created = catalog.insert_medicine(paracetamol()).await.unwrap();
        let fetched = catalog.get_medicine(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Paracetamol 500mg");
        assert_eq!(fetched.current_stock, 0);
        assert!(fetched.is_active);
        assert!(catalog.is_active_medicine(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_inactive() {
        let db = test_db().await;
        let catalog = db.catalog();

        assert!(!catalog.is_active_medicine("nope").await.unwrap());
        assert!(!catalog.is_active_supplier("nope").await.unwrap());
        assert!(!catalog.patient_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_archive_medicine() {
        let db = test_db().await;
        let catalog = db.catalog();

        let created = catalog.insert_medicine(paracetamol()).await.unwrap();
        catalog.archive_medicine(&created.id).await.unwrap();

        assert!(!catalog.is_active_medicine(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_current_stock_requires_known_medicine() {
        let db = test_db().await;
        let err = db.catalog().get_current_stock("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_low_stock_lists_only_at_or_below_threshold() {
        let db = test_db().await;
        let catalog = db.catalog();

        // Fresh medicine: stock 0, threshold 20 → listed.
        let m = catalog.insert_medicine(paracetamol()).await.unwrap();

        let low = catalog.list_low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].medicine_id, m.id);
        assert_eq!(low[0].current_stock, 0);
        assert_eq!(low[0].low_stock_threshold, 20);
    }
}
