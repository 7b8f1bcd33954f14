//! # Document Layout
//!
//! The fixed visual structure shared by every printed document, independent
//! of the output backend.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ store name / address / phone                 │
//! │                                              │
//! │ TITLE                                        │
//! │ Label: value      (header fields)            │
//! │ ┌────────┬─────────┬──────────┬────────────┐ │
//! │ │ header │ header  │ header   │ header     │ │
//! │ ├────────┼─────────┼──────────┼────────────┤ │
//! │ │ rows…  │         │          │            │ │
//! │ └────────┴─────────┴──────────┴────────────┘ │
//! │                          Subtotal:   8,497.00│
//! │                          Total:      8,718.00│  ← emphasized
//! │ footer                                       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Labels are English: the standard PDF fonts cannot draw Arabic, and the
//! title carries the Arabic name alongside. Values (customer and product
//! names, dates) are kept as entered and formatted with the store's
//! [`Locale`].
//!
//! Money totals are copied from the stored records, never recomputed here.

use chrono::NaiveDate;
use khalifa_core::format::{format_amount, format_date, format_number, Locale};
use khalifa_core::report::{
    Debtor, InventoryLine, InventorySummary, InvoiceSummary, ReturnSummary, SalesSummary,
};
use khalifa_core::{InvoiceDetails, Money, ReturnStatus, StoreInfo};

// =============================================================================
// Model
// =============================================================================

/// `Label: value` line under the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    /// Relative width; the renderer scales all columns to the page.
    pub width: f32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn with_columns(columns: &[(&str, f32, Align)]) -> Self {
        Table {
            columns: columns
                .iter()
                .map(|(header, width, align)| Column {
                    header: header.to_string(),
                    width: *width,
                    align: *align,
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }
}

/// One line of the totals block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalLine {
    pub label: String,
    pub amount: Money,
    /// `amount` formatted for display.
    pub value: String,
    /// Drawn bold with a rule above. At most one per document.
    pub emphasized: bool,
}

impl TotalLine {
    fn new(label: &str, amount: Money, locale: &Locale) -> Self {
        TotalLine {
            label: label.to_string(),
            amount,
            value: format_amount(amount, locale),
            emphasized: false,
        }
    }

    fn emphasized(mut self) -> Self {
        self.emphasized = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub title: String,
    /// Store name first, then address and phone when configured.
    pub store_lines: Vec<String>,
    pub header_fields: Vec<Field>,
    pub table: Table,
    pub totals: Vec<TotalLine>,
    pub footer: Option<String>,
}

impl DocumentLayout {
    fn new(title: &str, store: &StoreInfo) -> Self {
        let mut store_lines = vec![store.name.clone()];
        store_lines.extend(store.address.iter().cloned());
        store_lines.extend(store.phone.iter().map(|p| format!("Tel: {p}")));
        DocumentLayout {
            title: title.to_string(),
            store_lines,
            header_fields: Vec::new(),
            table: Table::default(),
            totals: Vec::new(),
            footer: None,
        }
    }

    /// The emphasized total, i.e. what the document says is owed or sold.
    pub fn grand_total(&self) -> Option<Money> {
        self.totals.iter().find(|t| t.emphasized).map(|t| t.amount)
    }

    pub fn total(&self, label: &str) -> Option<Money> {
        self.totals.iter().find(|t| t.label == label).map(|t| t.amount)
    }

    // =========================================================================
    // Invoice
    // =========================================================================

    pub fn invoice(details: &InvoiceDetails, store: &StoreInfo, locale: &Locale) -> Self {
        let invoice = &details.invoice;
        let customer = &details.customer;
        let mut doc = DocumentLayout::new("INVOICE - فاتورة", store);

        doc.header_fields.push(Field::new("Invoice Number", &invoice.number));
        doc.header_fields
            .push(Field::new("Date", format_date(invoice.invoice_date, locale)));
        doc.header_fields.push(Field::new("Customer", &customer.name));
        doc.header_fields.push(Field::new("Phone", &customer.phone));
        if let Some(company) = &customer.company {
            doc.header_fields.push(Field::new("Company", company));
        }

        doc.table = Table::with_columns(&[
            ("#", 0.5, Align::Right),
            ("SKU", 1.3, Align::Left),
            ("Product", 3.0, Align::Left),
            ("Quantity", 1.0, Align::Right),
            ("Price", 1.4, Align::Right),
            ("Total", 1.5, Align::Right),
        ]);
        for item in &invoice.items {
            doc.table.rows.push(vec![
                format_number(item.line_no, locale),
                item.sku.clone(),
                item.name.clone(),
                format_number(item.quantity, locale),
                format_amount(item.unit_price, locale),
                format_amount(item.line_total, locale),
            ]);
        }

        let totals = &invoice.totals;
        if !invoice.discount_rate.is_zero() || !invoice.tax_rate.is_zero() {
            doc.totals.push(TotalLine::new("Subtotal", totals.subtotal, locale));
        }
        if !invoice.discount_rate.is_zero() {
            let label = format!("Discount ({})", invoice.discount_rate);
            doc.totals.push(TotalLine::new(&label, -totals.discount, locale));
        }
        if !invoice.tax_rate.is_zero() {
            let label = format!("Tax ({})", invoice.tax_rate);
            doc.totals.push(TotalLine::new(&label, totals.tax, locale));
        }
        doc.totals
            .push(TotalLine::new("Total Amount", invoice.total(), locale).emphasized());
        if !details.returned.is_zero() {
            doc.totals
                .push(TotalLine::new("Returned", -details.returned, locale));
        }
        doc.totals.push(TotalLine::new("Paid Amount", details.paid, locale));
        doc.totals
            .push(TotalLine::new("Remaining Amount", details.remaining(), locale));

        doc.footer = invoice.notes.clone();
        doc
    }

    // =========================================================================
    // Reports
    // =========================================================================

    pub fn sales_report(
        summary: &SalesSummary,
        invoices: &[InvoiceSummary],
        store: &StoreInfo,
        locale: &Locale,
    ) -> Self {
        let mut doc = DocumentLayout::new("Sales Report - تقرير المبيعات", store);
        doc.header_fields
            .push(Field::new("Period", period(summary.from, summary.to, locale)));
        doc.header_fields.push(Field::new(
            "Total Invoices",
            format_number(summary.invoice_count, locale),
        ));

        doc.table = Table::with_columns(&[
            ("Invoice #", 1.6, Align::Left),
            ("Customer", 2.4, Align::Left),
            ("Date", 1.4, Align::Left),
            ("Total", 1.2, Align::Right),
            ("Paid", 1.2, Align::Right),
            ("Remaining", 1.2, Align::Right),
        ]);
        for invoice in invoices {
            doc.table.rows.push(vec![
                invoice.number.clone(),
                invoice.customer_name.clone(),
                format_date(invoice.invoice_date, locale),
                format_amount(invoice.total, locale),
                format_amount(invoice.paid, locale),
                format_amount(invoice.remaining(), locale),
            ]);
        }

        doc.totals
            .push(TotalLine::new("Total Sales", summary.total_sales, locale).emphasized());
        doc.totals.push(TotalLine::new("Returns", summary.returns, locale));
        doc.totals.push(TotalLine::new("Total Paid", summary.collected, locale));
        doc.totals.push(TotalLine::new("Pending", summary.outstanding, locale));
        doc
    }

    pub fn inventory_report(
        summary: &InventorySummary,
        lines: &[InventoryLine],
        as_of: NaiveDate,
        store: &StoreInfo,
        locale: &Locale,
    ) -> Self {
        let mut doc = DocumentLayout::new("Inventory Report - تقرير المخزون", store);
        doc.header_fields.push(Field::new("Date", format_date(as_of, locale)));
        doc.header_fields.push(Field::new(
            "Total Products",
            format_number(summary.product_count, locale),
        ));
        doc.header_fields.push(Field::new(
            "Total Units",
            format_number(summary.total_units, locale),
        ));
        doc.header_fields.push(Field::new(
            "Low Stock Items",
            format_number(summary.low_stock_count, locale),
        ));
        doc.header_fields.push(Field::new(
            "Out of Stock Items",
            format_number(summary.out_of_stock_count, locale),
        ));

        doc.table = Table::with_columns(&[
            ("Product", 2.6, Align::Left),
            ("SKU", 1.3, Align::Left),
            ("Category", 1.5, Align::Left),
            ("Price", 1.1, Align::Right),
            ("Quantity", 0.9, Align::Right),
            ("Value", 1.3, Align::Right),
        ]);
        for line in lines {
            doc.table.rows.push(vec![
                line.name.clone(),
                line.sku.clone(),
                line.category.clone().unwrap_or_default(),
                format_amount(line.price, locale),
                format_number(line.quantity, locale),
                format_amount(line.value, locale),
            ]);
        }

        doc.totals.push(
            TotalLine::new("Total Inventory Value", summary.retail_value, locale).emphasized(),
        );
        doc.totals.push(TotalLine::new("Cost Value", summary.cost_value, locale));
        doc
    }

    pub fn returns_report(
        from: NaiveDate,
        to: NaiveDate,
        returns: &[ReturnSummary],
        store: &StoreInfo,
        locale: &Locale,
    ) -> Self {
        let mut doc = DocumentLayout::new("Returns - المرتجعات", store);
        doc.header_fields.push(Field::new("Period", period(from, to, locale)));
        doc.header_fields.push(Field::new(
            "Total Returns",
            format_number(returns.len() as i64, locale),
        ));

        doc.table = Table::with_columns(&[
            ("Return #", 1.6, Align::Left),
            ("Invoice #", 1.6, Align::Left),
            ("Customer", 2.0, Align::Left),
            ("Date", 1.3, Align::Left),
            ("Items", 0.7, Align::Right),
            ("Credit", 1.1, Align::Right),
            ("Refund", 1.1, Align::Right),
            ("Status", 1.0, Align::Left),
        ]);
        for ret in returns {
            doc.table.rows.push(vec![
                ret.number.clone(),
                ret.invoice_number.clone(),
                ret.customer_name.clone(),
                format_date(ret.return_date, locale),
                format_number(ret.item_count, locale),
                format_amount(ret.credit, locale),
                format_amount(ret.refund, locale),
                status_name(ret.status).to_string(),
            ]);
        }

        let credit: Money = returns.iter().map(|r| r.credit).sum();
        let refund: Money = returns.iter().map(|r| r.refund).sum();
        doc.totals
            .push(TotalLine::new("Total Credit", credit, locale).emphasized());
        doc.totals.push(TotalLine::new("Total Refunded", refund, locale));
        doc
    }

    pub fn debtors_report(
        debtors: &[Debtor],
        as_of: NaiveDate,
        store: &StoreInfo,
        locale: &Locale,
    ) -> Self {
        let mut doc = DocumentLayout::new("Debtors - العملاء المدينون", store);
        doc.header_fields.push(Field::new("Date", format_date(as_of, locale)));
        doc.header_fields.push(Field::new(
            "Customers",
            format_number(debtors.len() as i64, locale),
        ));

        doc.table = Table::with_columns(&[
            ("Customer", 3.0, Align::Left),
            ("Phone", 1.8, Align::Left),
            ("Balance", 1.4, Align::Right),
        ]);
        for debtor in debtors {
            doc.table.rows.push(vec![
                debtor.name.clone(),
                debtor.phone.clone(),
                format_amount(debtor.balance, locale),
            ]);
        }

        let outstanding: Money = debtors.iter().map(|d| d.balance).sum();
        doc.totals
            .push(TotalLine::new("Total Outstanding", outstanding, locale).emphasized());
        doc
    }
}

fn period(from: NaiveDate, to: NaiveDate, locale: &Locale) -> String {
    format!("{} - {}", format_date(from, locale), format_date(to, locale))
}

fn status_name(status: ReturnStatus) -> &'static str {
    match status {
        ReturnStatus::Pending => "Pending",
        ReturnStatus::Approved => "Approved",
        ReturnStatus::Rejected => "Rejected",
        ReturnStatus::Completed => "Completed",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{date, invoice_details};
    use khalifa_core::format::DateStyle;

    fn iso_locale() -> Locale {
        Locale {
            date_style: DateStyle::Iso,
            ..Locale::default()
        }
    }

    #[test]
    fn test_invoice_total_matches_stored_total() {
        let details = invoice_details("أحمد علي");
        let doc = DocumentLayout::invoice(&details, &StoreInfo::default(), &iso_locale());

        assert_eq!(doc.grand_total(), Some(details.invoice.total()));
        assert_eq!(doc.grand_total(), Some(Money::from_minor(8718)));
        assert_eq!(doc.table.rows.len(), 2);
        assert_eq!(doc.table.headers(), vec!["#", "SKU", "Product", "Quantity", "Price", "Total"]);
    }

    #[test]
    fn test_invoice_totals_block() {
        let details = invoice_details("Ahmed");
        let doc = DocumentLayout::invoice(&details, &StoreInfo::default(), &iso_locale());

        assert_eq!(doc.total("Subtotal"), Some(Money::from_minor(8497)));
        assert_eq!(doc.total("Discount (10%)"), Some(Money::from_minor(-850)));
        assert_eq!(doc.total("Tax (14%)"), Some(Money::from_minor(1071)));
        assert_eq!(doc.total("Paid Amount"), Some(Money::from_major(50)));
        assert_eq!(doc.total("Remaining Amount"), Some(Money::from_minor(3718)));
        assert_eq!(doc.total("Returned"), None);

        let total = doc.totals.iter().find(|t| t.emphasized).unwrap();
        assert_eq!(total.value, "87.18");
        assert_eq!(doc.totals.iter().filter(|t| t.emphasized).count(), 1);
    }

    #[test]
    fn test_invoice_header_fields() {
        let details = invoice_details("Ahmed");
        let store = StoreInfo {
            phone: Some("0223456789".to_string()),
            ..StoreInfo::default()
        };
        let doc = DocumentLayout::invoice(&details, &store, &iso_locale());

        assert_eq!(doc.store_lines, vec!["الخليفة", "Tel: 0223456789"]);
        assert_eq!(doc.header_fields[0], Field::new("Invoice Number", "INV-2026-000042"));
        assert_eq!(doc.header_fields[1], Field::new("Date", "2026-03-05"));
        assert!(doc.header_fields.contains(&Field::new("Company", "Nile Cafe")));
    }

    #[test]
    fn test_plain_invoice_has_no_subtotal_line() {
        let mut details = invoice_details("Ahmed");
        details.invoice.discount_rate = khalifa_core::Rate::zero();
        details.invoice.tax_rate = khalifa_core::Rate::zero();
        let doc = DocumentLayout::invoice(&details, &StoreInfo::default(), &iso_locale());

        assert_eq!(doc.totals[0].label, "Total Amount");
        assert!(doc.total("Subtotal").is_none());
    }

    #[test]
    fn test_arabic_indic_amounts() {
        let details = invoice_details("Ahmed");
        let doc = DocumentLayout::invoice(&details, &StoreInfo::default(), &Locale::arabic_indic());

        assert_eq!(doc.table.rows[0][5], "٥٩٫٩٧");
    }

    #[test]
    fn test_debtors_total_outstanding() {
        let debtors = vec![
            Debtor {
                customer_id: "a".to_string(),
                name: "منى".to_string(),
                phone: "01000000001".to_string(),
                balance: Money::from_major(120),
            },
            Debtor {
                customer_id: "b".to_string(),
                name: "Omar".to_string(),
                phone: "01000000002".to_string(),
                balance: Money::from_minor(4550),
            },
        ];
        let doc = DocumentLayout::debtors_report(&debtors, date(6, 1), &StoreInfo::default(), &iso_locale());

        assert_eq!(doc.grand_total(), Some(Money::from_minor(16550)));
        assert_eq!(doc.table.rows[1], vec!["Omar", "01000000002", "45.50"]);
    }

    #[test]
    fn test_returns_report_sums_credit_and_refund() {
        let returns = vec![ReturnSummary {
            id: "r".to_string(),
            number: "RET-2026-000001".to_string(),
            return_date: date(3, 9),
            invoice_number: "INV-2026-000042".to_string(),
            customer_name: "Ahmed".to_string(),
            item_count: 2,
            credit: Money::from_major(25),
            refund: Money::from_major(10),
            status: ReturnStatus::Approved,
            reason: None,
        }];
        let doc = DocumentLayout::returns_report(
            date(3, 1),
            date(3, 31),
            &returns,
            &StoreInfo::default(),
            &iso_locale(),
        );

        assert_eq!(doc.header_fields[0].value, "2026-03-01 - 2026-03-31");
        assert_eq!(doc.grand_total(), Some(Money::from_major(25)));
        assert_eq!(doc.total("Total Refunded"), Some(Money::from_major(10)));
        assert_eq!(doc.table.headers().last(), Some(&"Status"));
        assert_eq!(doc.table.rows[0].last().map(String::as_str), Some("Approved"));
    }
}
