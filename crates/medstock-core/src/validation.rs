//! # Validation Module
//!
//! Input and chronology validation for ledger writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (back-office forms / API layer, out of scope)         │
//! │  ├── Field presence, formats                                           │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (pure rules)                                     │
//! │  ├── Positive quantities and prices                                    │
//! │  └── Date chronology (no future dates, expiry ≥ purchase,              │
//! │      sale ≥ first stock)                                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (0 ≤ quantity_remaining ≤ quantity_purchased)               │
//! │  ├── UNIQUE (supplier_id, invoice_number)                              │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here takes `today` explicitly instead of reading the
//! clock, which keeps the rules deterministic under test.

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest invoice number the ledger accepts.
pub const MAX_INVOICE_LEN: usize = 64;

// =============================================================================
// Quantity / Price Validators
// =============================================================================

/// Validates a purchase or sale quantity.
///
/// ## Rules
/// - Must be strictly positive (zero-quantity ledger entries would be
///   noise in the batch history)
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: format!("exceeds maximum line quantity {MAX_LINE_QUANTITY}"),
        });
    }
    Ok(())
}

/// Validates a unit price or unit cost.
pub fn validate_unit_price(field: &str, price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an invoice number.
///
/// ## Rules
/// - Must not be empty (it is the duplicate-entry key)
/// - Must be at most [`MAX_INVOICE_LEN`] characters
pub fn validate_invoice_number(invoice_number: &str) -> ValidationResult<()> {
    let invoice_number = invoice_number.trim();

    if invoice_number.is_empty() {
        return Err(ValidationError::Required {
            field: "invoice_number".to_string(),
        });
    }

    if invoice_number.len() > MAX_INVOICE_LEN {
        return Err(ValidationError::TooLong {
            field: "invoice_number".to_string(),
            max: MAX_INVOICE_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Rejects a future-dated business date.
pub fn validate_not_future(field: &str, date: NaiveDate, today: NaiveDate) -> LedgerResult<()> {
    if date > today {
        return Err(LedgerError::future_date(field, date, today));
    }
    Ok(())
}

/// Rejects an expiry date earlier than the purchase date.
pub fn validate_expiry(expiry_date: NaiveDate, purchase_date: NaiveDate) -> LedgerResult<()> {
    if expiry_date < purchase_date {
        return Err(LedgerError::InvalidDate {
            reason: format!(
                "expiry date {expiry_date} is before purchase date {purchase_date}"
            ),
        });
    }
    Ok(())
}

/// Rejects a sale dated before the medicine's first stock existed.
///
/// The floor is the earliest purchase date over the FULL batch
/// history — later batches alone covering the quantity does not
/// excuse a sale dated before stock existed.
pub fn validate_sale_date_floor(
    sale_date: NaiveDate,
    earliest_purchase: NaiveDate,
) -> LedgerResult<()> {
    if sale_date < earliest_purchase {
        return Err(LedgerError::InvalidDate {
            reason: format!(
                "sale date {sale_date} is before the first stock purchase on {earliest_purchase}"
            ),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
