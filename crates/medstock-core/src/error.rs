//! # Error Types
//!
//! Domain-specific error types for medstock-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medstock-core errors (this file)                                      │
//! │  ├── LedgerError      - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medstock-db errors (separate crate)                                   │
//! │  └── StoreError       - Storage failures, wraps LedgerError            │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError → StoreError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (medicine id, quantities, dates)
//! 3. Errors are enum variants, never String
//! 4. The ledger never formats human-facing text; callers translate
//!    each variant into display messages

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Ledger Error
// =============================================================================

/// Which catalog entity a reference failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Medicine,
    Supplier,
    Patient,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Medicine => "medicine",
            RefKind::Supplier => "supplier",
            RefKind::Patient => "patient",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger rule violations.
///
/// Every write path surfaces one of these synchronously; none are
/// retried internally except transient write conflicts, which are
/// resolved in medstock-db before a `LedgerError` is ever produced.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Unknown or inactive medicine, supplier, or patient.
    ///
    /// ## When This Occurs
    /// - The id does not exist in the catalog
    /// - The entry exists but has been archived (is_active = false)
    ///
    /// Not retryable without correcting the input.
    #[error("Unknown or inactive {kind}: {id}")]
    InvalidReference { kind: RefKind, id: String },

    /// A business date violates the chronology rules.
    ///
    /// ## When This Occurs
    /// - Future-dated purchase or sale
    /// - Expiry date earlier than purchase date
    /// - Sale dated before the medicine's earliest batch purchase
    #[error("Invalid date: {reason}")]
    InvalidDate { reason: String },

    /// The same paper invoice was entered twice for a supplier.
    #[error("Duplicate invoice '{invoice_number}' for supplier {supplier_id}")]
    DuplicateInvoice {
        supplier_id: String,
        invoice_number: String,
    },

    /// Not enough stock across all batches to cover the request.
    ///
    /// ## When This Occurs
    /// - Σ quantity_remaining < quantity requested
    /// - A concurrent sale consumed the stock first
    ///
    /// Retryable only after the caller re-checks current stock —
    /// never safe to blindly resubmit the same request.
    #[error("Insufficient stock for medicine {medicine_id}: available {available}, requested {requested}")]
    InsufficientStock {
        medicine_id: String,
        available: i64,
        requested: i64,
    },

    /// The medicine has no batch history at all.
    ///
    /// Distinct from [`LedgerError::InsufficientStock`]: it signals the
    /// medicine was never purchased, so callers can message
    /// "never stocked" vs "out of stock".
    #[error("No stock history for medicine {medicine_id}")]
    NoStockHistory { medicine_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Creates an InvalidReference error.
    pub fn invalid_ref(kind: RefKind, id: impl Into<String>) -> Self {
        LedgerError::InvalidReference {
            kind,
            id: id.into(),
        }
    }

    /// Creates an InvalidDate error for a future-dated operation.
    pub fn future_date(field: &str, date: NaiveDate, today: NaiveDate) -> Self {
        LedgerError::InvalidDate {
            reason: format!("{field} {date} is after today ({today})"),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a request doesn't meet basic requirements,
/// before any ledger rule is evaluated.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad UUID, malformed invoice number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = LedgerError::InsufficientStock {
            medicine_id: "med-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for medicine med-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_invalid_reference_message() {
        let err = LedgerError::invalid_ref(RefKind::Supplier, "sup-9");
        assert_eq!(err.to_string(), "Unknown or inactive supplier: sup-9");
    }

    #[test]
    fn test_validation_converts_to_ledger_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let ledger_err: LedgerError = validation_err.into();
        assert!(matches!(ledger_err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_future_date_helper() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = LedgerError::future_date("sale date", date, today);
        assert!(err.to_string().contains("2030-01-02"));
    }
}
