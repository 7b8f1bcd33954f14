//! # Invoice and Return Drafts
//!
//! Mutable builders owned by the caller while a document is being edited.
//! Storage never sees a draft: it only accepts the validated [`NewInvoice`]
//! / [`NewReturn`] produced by `finalize()`.
//!
//! ## Draft Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InvoiceDraft::for_customer(id, date)                                   │
//! │       │                                                                 │
//! │       ├── add_product(&product, 2)   price captured here               │
//! │       ├── add_product(&product, 1)   same product → quantity 3         │
//! │       ├── set_quantity / remove / set_discount / set_tax               │
//! │       ├── totals()                   live preview for the UI           │
//! │       ▼                                                                 │
//! │  finalize() ──► NewInvoice (validated, immutable)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.invoices().create(new_invoice)   one transaction                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Rate};
use crate::types::{non_blank, Invoice, InvoiceTotals, PaymentMethod, Product};
use crate::validation;
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Invoice Draft
// =============================================================================

/// A line being edited. Product details are frozen when the line is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DraftLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl DraftLine {
    /// Captures the product's current price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        DraftLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Payment taken at the counter together with the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InitialPayment {
    pub amount: Money,
    pub method: PaymentMethod,
}

/// Invoice being edited.
///
/// ## Invariants
/// - Lines are unique by product (adding the same product merges)
/// - Line order is entry order
/// - At most `MAX_INVOICE_LINES` lines, each with `1..=MAX_ITEM_QUANTITY`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDraft {
    pub customer_id: Option<String>,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub lines: Vec<DraftLine>,
    pub discount_rate: Rate,
    pub tax_rate: Rate,
    pub notes: Option<String>,
    pub initial_payment: Option<InitialPayment>,
}

impl InvoiceDraft {
    /// Empty draft with no customer chosen yet.
    pub fn new(invoice_date: NaiveDate) -> Self {
        InvoiceDraft {
            customer_id: None,
            invoice_date,
            lines: Vec::new(),
            discount_rate: Rate::zero(),
            tax_rate: Rate::zero(),
            notes: None,
            initial_payment: None,
        }
    }

    pub fn for_customer(customer_id: impl Into<String>, invoice_date: NaiveDate) -> Self {
        let mut draft = Self::new(invoice_date);
        draft.customer_id = Some(customer_id.into());
        draft
    }

    pub fn set_customer(&mut self, customer_id: impl Into<String>) {
        self.customer_id = Some(customer_id.into());
    }

    pub fn set_date(&mut self, invoice_date: NaiveDate) {
        self.invoice_date = invoice_date;
    }

    /// Adds a product or increases its quantity if already on the draft.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validation::validate_quantity(quantity)?;
        validation::validate_non_negative_money("unit_price", product.price)?;

        if !product.is_active {
            return Err(CoreError::ProductNotFound(product.id.clone()));
        }

        if let Some(line) = self.line_mut(&product.id) {
            let merged = line.quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = merged;
            return Ok(());
        }

        validation::validate_line_capacity(self.lines.len())?;
        self.lines.push(DraftLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        validation::validate_quantity(quantity)?;

        let line = self
            .line_mut(product_id)
            .ok_or_else(|| CoreError::NotInDraft(product_id.to_string()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Overrides the captured unit price of a line.
    pub fn set_unit_price(&mut self, product_id: &str, price: Money) -> CoreResult<()> {
        validation::validate_non_negative_money("unit_price", price)?;

        let line = self
            .line_mut(product_id)
            .ok_or_else(|| CoreError::NotInDraft(product_id.to_string()))?;
        line.unit_price = price;
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(CoreError::NotInDraft(product_id.to_string()));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.initial_payment = None;
    }

    pub fn set_discount(&mut self, rate: Rate) -> CoreResult<()> {
        validation::validate_rate("discount", rate)?;
        self.discount_rate = rate;
        Ok(())
    }

    pub fn set_tax(&mut self, rate: Rate) -> CoreResult<()> {
        validation::validate_rate("tax", rate)?;
        self.tax_rate = rate;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = non_blank(notes);
    }

    /// Records money taken with the invoice. `None` or zero clears it.
    pub fn set_initial_payment(&mut self, amount: Option<Money>, method: PaymentMethod) {
        self.initial_payment = amount
            .filter(|a| !a.is_zero())
            .map(|amount| InitialPayment { amount, method });
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Live totals for display.
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(
            self.lines.iter().map(|l| (l.quantity, l.unit_price)),
            self.discount_rate,
            self.tax_rate,
        )
    }

    /// Validates the draft and produces the record storage accepts.
    ///
    /// The draft is left untouched so the caller can fix it and retry.
    pub fn finalize(&self) -> CoreResult<NewInvoice> {
        let customer_id = self
            .customer_id
            .clone()
            .ok_or_else(|| ValidationError::required("customer"))?;
        validation::validate_uuid("customer", &customer_id)?;

        if self.lines.is_empty() {
            return Err(CoreError::EmptyInvoice);
        }
        if self.lines.len() > crate::MAX_INVOICE_LINES {
            return Err(CoreError::InvoiceTooLarge {
                max: crate::MAX_INVOICE_LINES,
            });
        }
        for line in &self.lines {
            validation::validate_uuid("product", &line.product_id)?;
            validation::validate_quantity(line.quantity)?;
            validation::validate_non_negative_money("unit_price", line.unit_price)?;
        }
        validation::validate_rate("discount", self.discount_rate)?;
        validation::validate_rate("tax", self.tax_rate)?;

        let totals = self.totals();
        if let Some(payment) = &self.initial_payment {
            validation::validate_payment_amount(payment.amount)?;
            if payment.amount > totals.total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!(
                        "payment {} exceeds invoice total {}",
                        payment.amount, totals.total
                    ),
                });
            }
        }

        Ok(NewInvoice {
            customer_id,
            invoice_date: self.invoice_date,
            lines: self.lines.clone(),
            discount_rate: self.discount_rate,
            tax_rate: self.tax_rate,
            notes: self.notes.clone(),
            initial_payment: self.initial_payment,
            totals,
        })
    }

    fn line_mut(&mut self, product_id: &str) -> Option<&mut DraftLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

/// A validated invoice ready to be persisted. Only [`InvoiceDraft::finalize`]
/// can build one.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    customer_id: String,
    invoice_date: NaiveDate,
    lines: Vec<DraftLine>,
    discount_rate: Rate,
    tax_rate: Rate,
    notes: Option<String>,
    initial_payment: Option<InitialPayment>,
    totals: InvoiceTotals,
}

impl NewInvoice {
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn discount_rate(&self) -> Rate {
        self.discount_rate
    }

    pub fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn initial_payment(&self) -> Option<InitialPayment> {
        self.initial_payment
    }

    pub fn totals(&self) -> InvoiceTotals {
        self.totals
    }
}

// =============================================================================
// Return Draft
// =============================================================================

/// Invoice line as seen by a return: what was sold and at what price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnableLine {
    pub invoice_item_id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    /// Units that can still come back: sold, less earlier returns once
    /// storage has applied them.
    pub sold: i64,
    /// Quantity on this return draft.
    pub quantity: i64,
}

/// Return being prepared against one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnDraft {
    pub invoice_id: String,
    pub invoice_number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub return_date: NaiveDate,
    pub lines: Vec<ReturnableLine>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub refund: Money,
}

impl ReturnDraft {
    /// Starts a return listing every line of `invoice` with quantity zero.
    pub fn for_invoice(invoice: &Invoice, return_date: NaiveDate) -> Self {
        ReturnDraft {
            invoice_id: invoice.id.clone(),
            invoice_number: invoice.number.clone(),
            customer_id: invoice.customer_id.clone(),
            return_date,
            lines: invoice
                .items
                .iter()
                .map(|item| ReturnableLine {
                    invoice_item_id: item.id.clone(),
                    product_id: item.product_id.clone(),
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    unit_price: item.unit_price,
                    sold: item.quantity,
                    quantity: 0,
                })
                .collect(),
            reason: None,
            notes: None,
            refund: Money::zero(),
        }
    }

    /// Sets how many units of an invoice line are coming back.
    ///
    /// Bounded by the quantity sold on that line; quantities returned by
    /// earlier returns are checked again when the return is stored.
    pub fn set_quantity(&mut self, invoice_item_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity < 0 {
            return Err(ValidationError::Negative {
                field: "quantity".to_string(),
            }
            .into());
        }

        let invoice_id = self.invoice_id.clone();
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.invoice_item_id == invoice_item_id)
            .ok_or_else(|| CoreError::ForeignInvoiceItem {
                item_id: invoice_item_id.to_string(),
                invoice_id,
            })?;

        if quantity > line.sold {
            return Err(CoreError::ReturnExceedsSold {
                item_id: invoice_item_id.to_string(),
                remaining: line.sold,
                requested: quantity,
            });
        }

        line.quantity = quantity;
        Ok(())
    }

    /// Marks every line as fully returned.
    pub fn return_everything(&mut self) {
        for line in &mut self.lines {
            line.quantity = line.sold;
        }
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        self.reason = non_blank(reason);
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = non_blank(notes);
    }

    /// Cash handed back. Must not exceed the credit computed at storage time.
    pub fn set_refund(&mut self, refund: Money) -> CoreResult<()> {
        validation::validate_non_negative_money("refund", refund)?;
        self.refund = refund;
        Ok(())
    }

    /// Σ quantity × captured price of the returned lines, before the
    /// invoice's discount and tax.
    pub fn gross(&self) -> Money {
        self.lines.iter().map(|l| l.unit_price.times(l.quantity)).sum()
    }

    pub fn finalize(&self) -> CoreResult<NewReturn> {
        let lines: Vec<NewReturnLine> = self
            .lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| NewReturnLine {
                invoice_item_id: l.invoice_item_id.clone(),
                product_id: l.product_id.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        if lines.is_empty() {
            return Err(ValidationError::required("returned items").into());
        }
        validation::validate_non_negative_money("refund", self.refund)?;

        Ok(NewReturn {
            invoice_id: self.invoice_id.clone(),
            customer_id: self.customer_id.clone(),
            return_date: self.return_date,
            reason: self.reason.clone(),
            notes: self.notes.clone(),
            refund: self.refund,
            lines,
        })
    }
}

/// One validated return line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReturnLine {
    pub invoice_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// A validated return ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReturn {
    invoice_id: String,
    customer_id: String,
    return_date: NaiveDate,
    reason: Option<String>,
    notes: Option<String>,
    refund: Money,
    lines: Vec<NewReturnLine>,
}

impl NewReturn {
    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn return_date(&self) -> NaiveDate {
        self.return_date
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn refund(&self) -> Money {
        self.refund
    }

    pub fn lines(&self) -> &[NewReturnLine] {
        &self.lines
    }
}

/// Credit issued for a return.
///
/// The invoice's discount and tax rates are applied to the returned gross.
/// Cumulative credits never exceed the invoice total, and the return that
/// brings back the last outstanding unit receives exactly what is left, so
/// a fully returned invoice always nets to zero.
pub fn return_credit(
    invoice: &Invoice,
    returned_gross: Money,
    previously_credited: Money,
    completes_invoice: bool,
) -> Money {
    let creditable = invoice.total() - previously_credited;
    if completes_invoice {
        return creditable;
    }
    let totals = InvoiceTotals::from_subtotal(returned_gross, invoice.discount_rate, invoice.tax_rate);
    totals.total.min(creditable)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvoiceItem;
    use chrono::Utc;

    const CUSTOMER: &str = "6f1c2d9e-8d2b-4c55-9b8e-2f4f3c1a0b11";
    const P1: &str = "0b7a3c2e-1111-4a1b-9c1d-000000000001";
    const P2: &str = "0b7a3c2e-1111-4a1b-9c1d-000000000002";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()
    }

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", &id[id.len() - 1..]),
            name: "Glass".to_string(),
            category: None,
            description: None,
            price: Money::from_minor(price),
            cost_price: Money::zero(),
            quantity: 10,
            min_stock: 5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        let p = product(P1, 1999);
        draft.add_product(&p, 2).unwrap();
        draft.add_product(&p, 1).unwrap();

        assert_eq!(draft.line_count(), 1);
        assert_eq!(draft.total_quantity(), 3);
        assert_eq!(draft.totals().total, Money::from_minor(5997));
    }

    #[test]
    fn test_price_is_captured_when_added() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        let mut p = product(P1, 1000);
        draft.add_product(&p, 1).unwrap();
        p.price = Money::from_minor(5000);
        draft.add_product(&p, 1).unwrap();
        draft.add_product(&product(P2, 200), 1).unwrap();

        assert_eq!(draft.lines[0].unit_price, Money::from_minor(1000));
        assert_eq!(draft.lines[0].quantity, 2);
        assert_eq!(draft.lines[1].product_id, P2);
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        draft.add_product(&product(P1, 100), 1).unwrap();
        draft.set_quantity(P1, 4).unwrap();
        assert_eq!(draft.total_quantity(), 4);

        draft.set_quantity(P1, 0).unwrap();
        assert!(draft.is_empty());
        assert!(matches!(draft.remove(P1), Err(CoreError::NotInDraft(_))));
    }

    #[test]
    fn test_quantity_limits() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        let p = product(P1, 100);
        assert!(draft.add_product(&p, 0).is_err());
        draft.add_product(&p, MAX_ITEM_QUANTITY).unwrap();
        assert!(matches!(
            draft.add_product(&p, 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn test_price_beyond_limit_rejected() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        let p = product(P1, 9_000_000_000_000_000);
        assert!(matches!(
            draft.add_product(&p, 2),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(draft.is_empty());

        // The largest accepted price at the largest quantity still fits.
        let p = product(P1, crate::MAX_MONEY.minor());
        draft.add_product(&p, MAX_ITEM_QUANTITY).unwrap();
        assert_eq!(
            draft.totals().total,
            Money::from_minor(crate::MAX_MONEY.minor() * MAX_ITEM_QUANTITY)
        );
        assert!(draft.set_unit_price(P1, Money::from_minor(i64::MAX)).is_err());
    }

    #[test]
    fn test_inactive_product_rejected() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        let mut p = product(P1, 100);
        p.is_active = false;
        assert!(matches!(draft.add_product(&p, 1), Err(CoreError::ProductNotFound(_))));
    }

    #[test]
    fn test_finalize_requires_customer_and_lines() {
        let draft = InvoiceDraft::new(date());
        assert!(matches!(draft.finalize(), Err(CoreError::Validation(_))));

        let draft = InvoiceDraft::for_customer(CUSTOMER, date());
        assert!(matches!(draft.finalize(), Err(CoreError::EmptyInvoice)));
    }

    #[test]
    fn test_finalize_carries_totals_and_payment() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        draft.add_product(&product(P1, 10_000), 1).unwrap();
        draft.set_discount(Rate::from_percent(10)).unwrap();
        draft.set_initial_payment(Some(Money::from_minor(4_000)), PaymentMethod::Cash);

        let invoice = draft.finalize().unwrap();
        assert_eq!(invoice.totals().total, Money::from_minor(9_000));
        assert_eq!(invoice.initial_payment().unwrap().amount, Money::from_minor(4_000));
        assert_eq!(invoice.lines().len(), 1);
    }

    #[test]
    fn test_finalize_rejects_overpayment() {
        let mut draft = InvoiceDraft::for_customer(CUSTOMER, date());
        draft.add_product(&product(P1, 1_000), 1).unwrap();
        draft.set_initial_payment(Some(Money::from_minor(1_001)), PaymentMethod::Cash);
        assert!(matches!(
            draft.finalize(),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
    }

    fn stored_invoice() -> Invoice {
        let items = vec![
            InvoiceItem {
                id: "item-1".to_string(),
                invoice_id: "inv-1".to_string(),
                line_no: 1,
                product_id: P1.to_string(),
                sku: "SKU-1".to_string(),
                name: "Glass".to_string(),
                quantity: 3,
                unit_price: Money::from_minor(333),
                line_total: Money::from_minor(999),
            },
            InvoiceItem {
                id: "item-2".to_string(),
                invoice_id: "inv-1".to_string(),
                line_no: 2,
                product_id: P2.to_string(),
                sku: "SKU-2".to_string(),
                name: "Plate".to_string(),
                quantity: 1,
                unit_price: Money::from_minor(1000),
                line_total: Money::from_minor(1000),
            },
        ];
        let discount = Rate::from_bps(1250);
        let tax = Rate::from_percent(14);
        Invoice {
            id: "inv-1".to_string(),
            number: "INV-2026-000001".to_string(),
            customer_id: CUSTOMER.to_string(),
            invoice_date: date(),
            discount_rate: discount,
            tax_rate: tax,
            totals: InvoiceTotals::compute(
                items.iter().map(|i| (i.quantity, i.unit_price)),
                discount,
                tax,
            ),
            notes: None,
            created_at: Utc::now(),
            items,
        }
    }

    #[test]
    fn test_return_draft_bounds() {
        let invoice = stored_invoice();
        let mut draft = ReturnDraft::for_invoice(&invoice, date());

        assert!(matches!(
            draft.set_quantity("item-1", 4),
            Err(CoreError::ReturnExceedsSold { remaining: 3, .. })
        ));
        assert!(matches!(
            draft.set_quantity("elsewhere", 1),
            Err(CoreError::ForeignInvoiceItem { .. })
        ));
        assert!(draft.finalize().is_err());

        draft.set_quantity("item-1", 2).unwrap();
        let ret = draft.finalize().unwrap();
        assert_eq!(ret.lines().len(), 1);
        assert_eq!(ret.lines()[0].unit_price, Money::from_minor(333));
        assert_eq!(draft.gross(), Money::from_minor(666));
    }

    #[test]
    fn test_full_return_credit_equals_invoice_total() {
        let invoice = stored_invoice();
        let mut draft = ReturnDraft::for_invoice(&invoice, date());
        draft.return_everything();

        let credit = return_credit(&invoice, draft.gross(), Money::zero(), true);
        assert_eq!(credit, invoice.total());
    }

    #[test]
    fn test_partial_returns_never_exceed_total() {
        let invoice = stored_invoice();

        // Three separate single-unit returns of item-1, then item-2.
        let mut credited = Money::zero();
        for _ in 0..3 {
            credited += return_credit(&invoice, Money::from_minor(333), credited, false);
        }
        credited += return_credit(&invoice, Money::from_minor(1000), credited, true);

        assert_eq!(credited, invoice.total());
    }
}
