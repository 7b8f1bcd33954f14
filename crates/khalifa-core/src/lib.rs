//! # khalifa-core: Pure Business Logic for Khalifa
//!
//! Data model and business rules of a single-store management system:
//! invoicing, inventory, customer accounts, returns and reports. Nothing in
//! this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Khalifa Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI (external)                                │   │
//! │  │   Customers ─ Products ─ Invoice editor ─ Returns ─ Reports    │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │ InvoiceDraft / ReturnDraft  │ records              │
//! │  ┌───────────────▼─────────────────────────────┴───────────────────┐   │
//! │  │               ★ khalifa-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   types   money   draft   ledger   stock   format   report     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • PURE FUNCTIONS                        │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │                             │                        │
//! │  ┌───────────────▼──────────────┐  ┌───────────▼──────────────────┐   │
//! │  │  khalifa-db (SQLite)         │  │  khalifa-export (CSV / PDF)  │   │
//! │  └──────────────────────────────┘  └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Customer, Product, Invoice, Payment, ProductReturn
//! - [`money`] - Integer money and basis-point rates
//! - [`draft`] - Caller-owned invoice / return builders
//! - [`ledger`] - Balances, statements, payment status, debt aging
//! - [`stock`] - Stock classification and oversell policy
//! - [`format`] - Arabic-locale currency, number and date formatting
//! - [`numbering`] - Invoice / return numbers and SKU suggestions
//! - [`report`] - Aggregate report records
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use khalifa_core::format::{format_currency, Locale};
//! use khalifa_core::Money;
//!
//! let price: Money = "19.99".parse().unwrap();
//! let total = price * 3;
//! assert_eq!(format_currency(total, &Locale::default()), "59.97 ج.م");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod draft;
pub mod error;
pub mod format;
pub mod ledger;
pub mod money;
pub mod numbering;
pub mod report;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use draft::{InvoiceDraft, NewInvoice, NewReturn, ReturnDraft};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{LedgerEntry, LedgerKind, PaymentStatus};
pub use money::{Money, Rate};
pub use stock::{OversellPolicy, StockStatus, StockWarning};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on one invoice.
pub const MAX_INVOICE_LINES: usize = 100;

/// Maximum quantity on one invoice line. Catches typing 10000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest amount accepted for a single price, payment or refund
/// (100,000,000.00). With the line and quantity limits this keeps every
/// invoice total far inside `i64`.
pub const MAX_MONEY: Money = Money::from_minor(10_000_000_000);

/// Low-stock threshold given to new products unless specified.
pub const DEFAULT_MIN_STOCK: i64 = 10;
