//! # Storage Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │         ▲                                                       │
//! │       │         │ StoreError::Ledger wraps the domain taxonomy         │
//! │       │    LedgerError (medstock-core)                                 │
//! │       ▼                                                                 │
//! │  Caller (back-office layer) translates variants to display text        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Conflict` is special: it marks a transient write-conflict between
//! concurrent transactions. The retry loop in the repositories absorbs
//! it; callers only ever see it if the bounded retries are exhausted.

use medstock_core::LedgerError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A ledger rule failed. The domain taxonomy lives in
    /// medstock-core; everything beneath this variant is what the
    /// caller matches on for business outcomes.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation not covered by the domain taxonomy.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Two transactions raced for the same rows. Transient; resolved
    /// by the bounded retry loop before callers see it.
    #[error("Write conflict, transaction must be retried")]
    Conflict,

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether this error is a transient write conflict worth
    /// retrying with fresh reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound            → StoreError::NotFound
/// SQLITE_BUSY / "database is locked"  → StoreError::Conflict
/// UNIQUE constraint failed            → StoreError::UniqueViolation
/// FOREIGN KEY constraint failed       → StoreError::ForeignKeyViolation
/// sqlx::Error::PoolTimedOut           → StoreError::PoolExhausted
/// Other                               → StoreError::Internal
/// ```
///
/// Under WAL, a transaction whose write snapshot went stale fails with
/// SQLITE_BUSY_SNAPSHOT ("database is locked"). That is SQLite's
/// serialization conflict, hence the Conflict mapping.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                if msg.contains("database is locked") || msg.contains("database table is locked") {
                    StoreError::Conflict
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<col>, <table>.<col>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    StoreError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    StoreError::ForeignKeyViolation { message: msg }
                } else {
                    StoreError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_passthrough() {
        let err: StoreError = LedgerError::NoStockHistory {
            medicine_id: "med-1".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::NoStockHistory { .. })
        ));
        assert_eq!(err.to_string(), "No stock history for medicine med-1");
    }

    #[test]
    fn test_conflict_is_retryable() {
        assert!(StoreError::Conflict.is_retryable());
        assert!(!StoreError::not_found("Medicine", "m-1").is_retryable());
    }
}
