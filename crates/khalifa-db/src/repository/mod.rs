//! # Repository Module
//!
//! Database repository implementations for Khalifa.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Typed Rows at the Boundary                           │
//! │                                                                         │
//! │  UI                                                                    │
//! │       │  db.invoices().create(&new_invoice)                            │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── create(&self, &NewInvoice)   one transaction                      │
//! │  ├── get_by_id(&self, id)                                              │
//! │  └── list(&self, &InvoiceFilter)                                       │
//! │       │                                                                 │
//! │       │  SQL ──► InvoiceRow (sqlx::FromRow)                             │
//! │       ▼                                                                 │
//! │  TryFrom<InvoiceRow> for Invoice  ← negative money, unknown enums and  │
//! │                                     bad totals become CorruptRecord     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers, balances, statements
//! - [`ProductRepository`](product::ProductRepository) - Catalogue and stock
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoices and their items
//! - [`PaymentRepository`](payment::PaymentRepository) - Money received
//! - [`ReturnRepository`](returns::ReturnRepository) - Returns and refunds
//! - [`ReportRepository`](report::ReportRepository) - Aggregates for reports

pub mod customer;
pub mod invoice;
pub mod payment;
pub mod product;
pub mod report;
pub mod returns;

use chrono::NaiveDate;
use khalifa_core::Money;
use serde::Serialize;

use crate::error::{DbError, DbResult};

/// Result of deleting a customer or product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// No document referenced the record; the row is gone.
    Removed,
    /// Documents reference the record; it was marked inactive instead.
    Deactivated,
}

/// Inclusive date range for listings and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> DbResult<Self> {
        if from > to {
            return Err(DbError::Validation(khalifa_core::ValidationError::invalid(
                "period",
                format!("{from} is after {to}"),
            )));
        }
        Ok(Period { from, to })
    }

    /// A single day.
    pub fn day(date: NaiveDate) -> Self {
        Period { from: date, to: date }
    }
}

// =============================================================================
// Row Conversion Helpers
// =============================================================================

/// Money column that must not be negative.
pub(crate) fn stored_money(entity: &str, id: &str, field: &str, minor: i64) -> DbResult<Money> {
    if minor < 0 {
        return Err(DbError::corrupt(
            entity,
            id,
            format!("{field} is negative ({minor})"),
        ));
    }
    Ok(Money::from_minor(minor))
}

/// Integer column that must be strictly positive.
pub(crate) fn stored_positive(entity: &str, id: &str, field: &str, value: i64) -> DbResult<i64> {
    if value <= 0 {
        return Err(DbError::corrupt(
            entity,
            id,
            format!("{field} must be positive, found {value}"),
        ));
    }
    Ok(value)
}

/// Text column that must not be blank.
pub(crate) fn stored_text(entity: &str, id: &str, field: &str, value: String) -> DbResult<String> {
    if value.trim().is_empty() {
        return Err(DbError::corrupt(entity, id, format!("{field} is empty")));
    }
    Ok(value)
}

/// Basis-point column within 0..=100%.
pub(crate) fn stored_rate(entity: &str, id: &str, field: &str, bps: i64) -> DbResult<khalifa_core::Rate> {
    if !(0..=khalifa_core::Rate::FULL_BPS as i64).contains(&bps) {
        return Err(DbError::corrupt(
            entity,
            id,
            format!("{field} out of range ({bps} bps)"),
        ));
    }
    Ok(khalifa_core::Rate::from_bps(bps as u32))
}

/// `LIKE` pattern matching `query` anywhere, with wildcards escaped.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Replaces a generic unique-violation with one naming the offending value.
pub(crate) fn with_duplicate_value(err: DbError, value: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cup"), "%cup%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_stored_checks() {
        assert!(stored_money("product", "p", "price", -1).is_err());
        assert_eq!(stored_money("product", "p", "price", 0).unwrap(), Money::zero());
        assert!(stored_positive("item", "i", "quantity", 0).is_err());
        assert!(stored_text("customer", "c", "name", "  ".to_string()).is_err());
        assert!(stored_rate("invoice", "i", "tax", 10_001).is_err());
    }

    #[test]
    fn test_period_order() {
        let a = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert!(Period::new(a, b).is_ok());
        assert!(matches!(Period::new(b, a), Err(DbError::Validation(_))));
    }
}
