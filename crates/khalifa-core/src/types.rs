//! # Domain Types
//!
//! Core records of the store: customers, products, invoices, payments and
//! returns.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐      ┌────────────────┐      ┌────────────────┐     │
//! │  │   Customer    │◄─────│    Invoice     │─────►│  InvoiceItem   │     │
//! │  │  phone (uniq) │      │  INV-YYYY-NNNN │ owns │  qty × price   │     │
//! │  └───────┬───────┘      └───────┬────────┘      └───────┬────────┘     │
//! │          │                      │                       │              │
//! │          │              ┌───────┴────────┐      ┌───────┴────────┐     │
//! │          └──────────────│ ProductReturn  │─────►│   ReturnItem   │     │
//! │          │              │  credit/refund │ owns │ ≤ sold qty     │     │
//! │  ┌───────┴───────┐      └────────────────┘      └────────────────┘     │
//! │  │   Payment     │                                                     │
//! │  │ (opt invoice) │      ┌────────────────┐                             │
//! │  └───────────────┘      │    Product     │ ◄── referenced by id only   │
//! │                         │  sku (uniq)    │                             │
//! │                         └────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived, Never Stored
//! Customer balance, stock status, amount paid on an invoice and payment
//! status are recomputed from the records every time they are read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::ledger::PaymentStatus;
use crate::money::{Money, Rate};
use crate::stock::{classify_stock, StockStatus};
use crate::validation::{self, ValidationResult};

// =============================================================================
// Customer
// =============================================================================

/// A customer of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Digits only, 10-15 characters.
    pub phone: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    /// False once soft-deleted.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies to create or edit a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl CustomerInput {
    /// Validates the input and returns it with trimmed text, blank optionals
    /// collapsed to `None` and the phone reduced to digits.
    pub fn validated(self) -> ValidationResult<Self> {
        validation::validate_name("name", &self.name, validation::MAX_NAME_LEN)?;
        let phone = validation::normalize_phone(&self.phone)?;
        let email = non_blank(self.email);
        if let Some(email) = &email {
            validation::validate_email(email)?;
        }

        Ok(CustomerInput {
            name: self.name.trim().to_string(),
            phone,
            email,
            company: non_blank(self.company),
            address: non_blank(self.address),
            notes: non_blank(self.notes),
        })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Selling price per unit.
    pub price: Money,
    /// Purchase cost per unit, used for profit reports.
    pub cost_price: Money,
    /// Units on hand. Negative only after a warned oversell.
    pub quantity: i64,
    /// Threshold under which the product is reported as low stock.
    pub min_stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Current stock classification.
    pub fn stock_status(&self) -> StockStatus {
        classify_stock(self.quantity, self.min_stock)
    }

    /// Value of the units on hand at cost. Negative stock counts as zero.
    pub fn stock_value(&self) -> Money {
        self.cost_price.times(self.quantity.max(0))
    }
}

/// Fields a caller supplies to create or edit a product.
///
/// `opening_stock` is only read on create; stock changes after that go
/// through sales, returns and explicit stock adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub cost_price: Money,
    pub opening_stock: i64,
    pub min_stock: i64,
}

impl Default for ProductInput {
    fn default() -> Self {
        ProductInput {
            sku: String::new(),
            name: String::new(),
            category: None,
            description: None,
            price: Money::zero(),
            cost_price: Money::zero(),
            opening_stock: 0,
            min_stock: crate::DEFAULT_MIN_STOCK,
        }
    }
}

impl ProductInput {
    /// Validates the input and returns it with normalized text fields.
    pub fn validated(self) -> ValidationResult<Self> {
        validation::validate_sku(&self.sku)?;
        validation::validate_name("name", &self.name, validation::MAX_PRODUCT_NAME_LEN)?;
        validation::validate_non_negative_money("price", self.price)?;
        validation::validate_non_negative_money("cost_price", self.cost_price)?;
        validation::validate_stock_level("opening_stock", self.opening_stock)?;
        validation::validate_stock_level("min_stock", self.min_stock)?;

        Ok(ProductInput {
            sku: self.sku.trim().to_string(),
            name: self.name.trim().to_string(),
            category: non_blank(self.category),
            description: non_blank(self.description),
            ..self
        })
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// Stored totals of an invoice.
///
/// ```text
/// subtotal = Σ quantity × unit_price
/// discount = subtotal × discount_rate          (half away from zero)
/// tax      = (subtotal − discount) × tax_rate  (half away from zero)
/// total    = subtotal − discount + tax
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceTotals {
    /// Computes totals from `(quantity, unit_price)` pairs.
    pub fn compute<I>(lines: I, discount_rate: Rate, tax_rate: Rate) -> Self
    where
        I: IntoIterator<Item = (i64, Money)>,
    {
        let subtotal: Money = lines.into_iter().map(|(qty, price)| price.times(qty)).sum();
        Self::from_subtotal(subtotal, discount_rate, tax_rate)
    }

    /// Applies discount then tax to an already summed subtotal.
    pub fn from_subtotal(subtotal: Money, discount_rate: Rate, tax_rate: Rate) -> Self {
        let discount = discount_rate.apply(subtotal);
        let tax = tax_rate.apply(subtotal - discount);
        InvoiceTotals {
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
        }
    }
}

/// A persisted invoice. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// Human-readable number, `INV-YYYY-NNNNNN`.
    pub number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub discount_rate: Rate,
    pub tax_rate: Rate,
    pub totals: InvoiceTotals,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Lines in entry order.
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        self.totals.total
    }

    /// Checks that every line total and the stored invoice totals agree with
    /// the items.
    pub fn verify_totals(&self) -> CoreResult<()> {
        for item in &self.items {
            if item.line_total != item.unit_price.times(item.quantity) {
                return Err(self.corrupt(format!(
                    "line {} total {} does not match {} × {}",
                    item.line_no, item.line_total, item.quantity, item.unit_price
                )));
            }
        }

        let expected = InvoiceTotals::compute(
            self.items.iter().map(|i| (i.quantity, i.unit_price)),
            self.discount_rate,
            self.tax_rate,
        );
        if expected != self.totals {
            return Err(self.corrupt(format!(
                "stored total {} does not match computed {}",
                self.totals.total, expected.total
            )));
        }

        Ok(())
    }

    /// Finds a line by item id.
    pub fn item(&self, item_id: &str) -> Option<&InvoiceItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    fn corrupt(&self, reason: String) -> CoreError {
        CoreError::Corrupt {
            entity: "invoice".to_string(),
            id: self.number.clone(),
            reason,
        }
    }
}

/// One line of an invoice. Product details are frozen at sale time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    /// 1-based position in the invoice.
    pub line_no: i64,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price captured when the line was added.
    pub unit_price: Money,
    pub line_total: Money,
}

/// An invoice with everything needed to display, print or export it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub customer: Customer,
    /// Payments recorded against this invoice minus refunds on its returns.
    pub paid: Money,
    /// Credit issued by returns against this invoice.
    pub returned: Money,
}

impl InvoiceDetails {
    /// What the customer owes for this invoice after returns.
    pub fn amount_due(&self) -> Money {
        self.invoice.total() - self.returned
    }

    /// Unpaid remainder. Negative when the customer overpaid.
    pub fn remaining(&self) -> Money {
        self.amount_due() - self.paid
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_amounts(self.amount_due(), self.paid)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    /// Arabic label shown on documents.
    pub fn label_ar(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "نقدي",
            PaymentMethod::Card => "بطاقة",
            PaymentMethod::BankTransfer => "تحويل بنكي",
        }
    }
}

/// Money received from a customer, optionally applied to one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fields a caller supplies to record a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

impl PaymentInput {
    pub fn validated(self) -> ValidationResult<Self> {
        validation::validate_uuid("customer_id", &self.customer_id)?;
        if let Some(invoice_id) = &self.invoice_id {
            validation::validate_uuid("invoice_id", invoice_id)?;
        }
        validation::validate_payment_amount(self.amount)?;

        Ok(PaymentInput {
            note: non_blank(self.note),
            ..self
        })
    }
}

// =============================================================================
// Returns
// =============================================================================

/// Where a return stands in the shop's review.
///
/// Stock and credit are applied when the return is recorded; the status
/// only tracks the paperwork. `Rejected` and `Completed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ReturnStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, ReturnStatus::Rejected | ReturnStatus::Completed)
    }

    /// Whether a return in this status may move to `next`.
    pub fn can_become(&self, next: ReturnStatus) -> bool {
        match self {
            ReturnStatus::Pending => next != ReturnStatus::Pending,
            ReturnStatus::Approved => next.is_final(),
            ReturnStatus::Rejected | ReturnStatus::Completed => false,
        }
    }

    /// Arabic label shown on documents.
    pub fn label_ar(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "معلق",
            ReturnStatus::Approved => "مقبول",
            ReturnStatus::Rejected => "مرفوض",
            ReturnStatus::Completed => "مكتمل",
        }
    }
}

/// Goods brought back against an invoice.
///
/// `credit` reduces what the customer owes; `refund` is the part of that
/// credit handed back as cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductReturn {
    pub id: String,
    /// Human-readable number, `RET-YYYY-NNNNNN`.
    pub number: String,
    pub invoice_id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub return_date: NaiveDate,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub credit: Money,
    pub refund: Money,
    pub status: ReturnStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReturnItem>,
}

/// One returned line, tied to the invoice line it reverses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub invoice_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Copied from the invoice line.
    pub unit_price: Money,
    pub line_total: Money,
}

// =============================================================================
// Store
// =============================================================================

/// Store identity printed on documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct StoreInfo {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl Default for StoreInfo {
    fn default() -> Self {
        StoreInfo {
            name: "الخليفة".to_string(),
            address: None,
            phone: None,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Trims an optional text field, mapping blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn item(line_no: i64, qty: i64, price: i64) -> InvoiceItem {
        InvoiceItem {
            id: format!("item-{line_no}"),
            invoice_id: "inv".to_string(),
            line_no,
            product_id: format!("p-{line_no}"),
            sku: format!("SKU-{line_no}"),
            name: "Item".to_string(),
            quantity: qty,
            unit_price: Money::from_minor(price),
            line_total: Money::from_minor(price * qty),
        }
    }

    fn invoice(items: Vec<InvoiceItem>, discount: Rate, tax: Rate) -> Invoice {
        let totals = InvoiceTotals::compute(
            items.iter().map(|i| (i.quantity, i.unit_price)),
            discount,
            tax,
        );
        Invoice {
            id: "inv".to_string(),
            number: "INV-2026-000001".to_string(),
            customer_id: "c".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            discount_rate: discount,
            tax_rate: tax,
            totals,
            notes: None,
            created_at: Utc::now(),
            items,
        }
    }

    #[test]
    fn test_totals_with_discount_and_tax() {
        let totals = InvoiceTotals::compute(
            [(2, Money::from_minor(5000))],
            Rate::from_percent(10),
            Rate::from_percent(14),
        );
        assert_eq!(totals.subtotal.minor(), 10_000);
        assert_eq!(totals.discount.minor(), 1_000);
        assert_eq!(totals.tax.minor(), 1_260);
        assert_eq!(totals.total.minor(), 10_260);
    }

    #[test]
    fn test_verify_totals_detects_tampering() {
        let mut inv = invoice(vec![item(1, 3, 1999), item(2, 1, 500)], Rate::zero(), Rate::zero());
        assert!(inv.verify_totals().is_ok());
        assert_eq!(inv.total().minor(), 6497);

        inv.totals.total = Money::from_minor(6500);
        assert!(matches!(inv.verify_totals(), Err(CoreError::Corrupt { .. })));

        let mut inv = invoice(vec![item(1, 3, 1999)], Rate::zero(), Rate::zero());
        inv.items[0].line_total = Money::from_minor(1);
        assert!(inv.verify_totals().is_err());
    }

    #[test]
    fn test_customer_input_normalization() {
        let input = CustomerInput {
            name: "  أحمد علي ".to_string(),
            phone: "(010) 1234-5678".to_string(),
            email: Some("   ".to_string()),
            ..Default::default()
        };
        let input = input.validated().unwrap();
        assert_eq!(input.name, "أحمد علي");
        assert_eq!(input.phone, "01012345678");
        assert_eq!(input.email, None);
    }

    #[test]
    fn test_customer_input_rejects_missing_fields() {
        let err = CustomerInput {
            name: "Ali".to_string(),
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert_eq!(err, ValidationError::required("phone"));
    }

    #[test]
    fn test_product_input_rejects_negative_values() {
        let input = ProductInput {
            sku: "TEA-1".to_string(),
            name: "Tea".to_string(),
            price: Money::from_minor(-1),
            ..Default::default()
        };
        assert!(input.validated().is_err());

        let input = ProductInput {
            sku: "TEA-1".to_string(),
            name: "Tea".to_string(),
            min_stock: -5,
            ..Default::default()
        };
        assert!(input.validated().is_err());
    }

    #[test]
    fn test_invoice_details_amounts() {
        let inv = invoice(vec![item(1, 1, 10_000)], Rate::zero(), Rate::zero());
        let details = InvoiceDetails {
            invoice: inv,
            customer: Customer {
                id: "c".to_string(),
                name: "Ali".to_string(),
                phone: "01012345678".to_string(),
                email: None,
                company: None,
                address: None,
                notes: None,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            paid: Money::from_minor(4_000),
            returned: Money::zero(),
        };
        assert_eq!(details.remaining().minor(), 6_000);
        assert_eq!(details.payment_status(), PaymentStatus::Partial);
    }

    #[test]
    fn test_record_serializes_to_json() {
        let json = serde_json::to_value(PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, serde_json::json!("bank_transfer"));
    }

    #[test]
    fn test_return_status_transitions() {
        use ReturnStatus::*;
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Rejected));
        assert!(Approved.can_become(Completed));
        assert!(!Approved.can_become(Pending));
        assert!(!Completed.can_become(Rejected));
        assert!(!Rejected.can_become(Approved));
        assert!(!Pending.can_become(Pending));
        assert_eq!(ReturnStatus::default(), Pending);
        assert_eq!(serde_json::to_value(Completed).unwrap(), serde_json::json!("completed"));
    }
}
