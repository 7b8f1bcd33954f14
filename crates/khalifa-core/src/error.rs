//! # Error Types
//!
//! Domain-specific error types for khalifa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  khalifa-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  khalifa-db errors                                                     │
//! │  └── DbError          - Storage failures (wraps both of the above)     │
//! │                                                                         │
//! │  khalifa-export errors                                                 │
//! │  └── ExportError      - CSV / PDF encoding failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → UI message              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is inactive).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer cannot be found (or is inactive).
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Invoice cannot be found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Sale would take stock below zero while the oversell policy is `Reject`.
    ///
    /// ## User Workflow
    /// ```text
    /// Draft line: SKU-7 × 5
    ///      │
    ///      ▼
    /// Stock check: available=3
    ///      │
    ///      ├── policy Warn   → sale commits, StockWarning returned
    ///      └── policy Reject → InsufficientStock, nothing written
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Invoice draft has no lines.
    #[error("Invoice must contain at least one item")]
    EmptyInvoice,

    /// Invoice draft exceeded the line limit.
    #[error("Invoice cannot have more than {max} lines")]
    InvoiceTooLarge { max: usize },

    /// One invoice line asks for more than a sane quantity.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Draft does not contain the product being edited.
    #[error("Product {0} is not on this draft")]
    NotInDraft(String),

    /// Return asks for more than is left to return on an invoice line.
    #[error("Cannot return {requested} of invoice item {item_id}: only {remaining} left")]
    ReturnExceedsSold {
        item_id: String,
        remaining: i64,
        requested: i64,
    },

    /// Return line references an item of another invoice.
    #[error("Item {item_id} does not belong to invoice {invoice_id}")]
    ForeignInvoiceItem { item_id: String, invoice_id: String },

    /// Payment / refund amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Stored record disagrees with its own derived values.
    #[error("Corrupt {entity} {id}: {reason}")]
    Corrupt {
        entity: String,
        id: String,
        reason: String,
    },

    /// Bad input, raised while building a document.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single rejected input field.
///
/// Raised before anything touches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Blank after trimming.
    #[error("{field} is required")]
    Required { field: String },

    /// Longer than the column allows.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Outside an inclusive range (rates, stock levels).
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Zero or negative where only positive makes sense.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Not one of a fixed set (payment method, policy).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Referenced record does not exist.
    #[error("{field} references unknown record '{id}'")]
    UnknownReference { field: String, id: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Result alias for business operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "TEA-100".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for TEA-100: available 3, requested 5"
        );

        let err = CoreError::ReturnExceedsSold {
            item_id: "item-1".to_string(),
            remaining: 1,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cannot return 2 of invoice item item-1: only 1 left"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("phone").to_string(), "phone is required");
        assert_eq!(
            ValidationError::Negative {
                field: "price".to_string()
            }
            .to_string(),
            "price cannot be negative"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
