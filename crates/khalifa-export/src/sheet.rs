//! # Spreadsheet Export
//!
//! A [`Sheet`] is a title, a header row and data rows, all plain strings.
//! It serializes to CSV with a UTF-8 byte order mark so Excel opens Arabic
//! text without an import wizard.
//!
//! Amounts are written as plain `1234.50` and dates as ISO `2026-03-05` so
//! spreadsheet formulas and sorting work on them. Status columns carry the
//! Arabic labels shown in the UI.

use std::io::Write;

use khalifa_core::report::{Debtor, InventoryLine, InvoiceSummary, ReturnSummary};
use khalifa_core::InvoiceDetails;
use tracing::debug;

use crate::error::ExportResult;

/// UTF-8 byte order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Tabular export: one header row, rows in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new<S: Into<String>>(title: impl Into<String>, headers: impl IntoIterator<Item = S>) -> Self {
        Sheet {
            title: title.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Writes BOM, header and rows to `writer`.
    ///
    /// Fails with [`crate::ExportError::Csv`] if a row's width differs from
    /// the header's.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> ExportResult<()> {
        writer.write_all(UTF8_BOM)?;
        let mut csv = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(writer);
        csv.write_record(&self.headers)?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        debug!(title = %self.title, rows = self.rows.len(), "Wrote CSV sheet");
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> ExportResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    /// File name for downloads: the title with path-hostile characters
    /// replaced, plus `.csv`.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_whitespace() => '_',
                c => c,
            })
            .collect();
        if stem.is_empty() {
            "export.csv".to_string()
        } else {
            format!("{stem}.csv")
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// One row per invoice line, in line order.
pub fn invoice_sheet(details: &InvoiceDetails) -> Sheet {
    let invoice = &details.invoice;
    let mut sheet = Sheet::new(
        format!("فاتورة {}", invoice.number),
        ["#", "الكود", "المنتج", "الكمية", "سعر الوحدة", "الإجمالي"],
    );
    for item in &invoice.items {
        sheet.push_row(vec![
            item.line_no.to_string(),
            item.sku.clone(),
            item.name.clone(),
            item.quantity.to_string(),
            item.unit_price.to_string(),
            item.line_total.to_string(),
        ]);
    }
    sheet
}

pub fn sales_sheet(invoices: &[InvoiceSummary]) -> Sheet {
    let mut sheet = Sheet::new(
        "تقرير المبيعات",
        [
            "رقم الفاتورة",
            "العميل",
            "التاريخ",
            "الإجمالي",
            "المرتجع",
            "المدفوع",
            "المتبقي",
            "الحالة",
        ],
    );
    for invoice in invoices {
        sheet.push_row(vec![
            invoice.number.clone(),
            invoice.customer_name.clone(),
            iso(invoice.invoice_date),
            invoice.total.to_string(),
            invoice.returned.to_string(),
            invoice.paid.to_string(),
            invoice.remaining().to_string(),
            invoice.payment_status().label_ar().to_string(),
        ]);
    }
    sheet
}

pub fn inventory_sheet(lines: &[InventoryLine]) -> Sheet {
    let mut sheet = Sheet::new(
        "تقرير المخزون",
        ["الكود", "المنتج", "الفئة", "السعر", "الكمية", "الحد الأدنى", "القيمة", "الحالة"],
    );
    for line in lines {
        sheet.push_row(vec![
            line.sku.clone(),
            line.name.clone(),
            line.category.clone().unwrap_or_default(),
            line.price.to_string(),
            line.quantity.to_string(),
            line.min_stock.to_string(),
            line.value.to_string(),
            line.status.label_ar().to_string(),
        ]);
    }
    sheet
}

pub fn returns_sheet(returns: &[ReturnSummary]) -> Sheet {
    let mut sheet = Sheet::new(
        "المرتجعات",
        [
            "رقم المرتجع",
            "رقم الفاتورة",
            "العميل",
            "التاريخ",
            "عدد القطع",
            "قيمة المرتجع",
            "المبلغ المسترد",
            "الحالة",
            "السبب",
        ],
    );
    for ret in returns {
        sheet.push_row(vec![
            ret.number.clone(),
            ret.invoice_number.clone(),
            ret.customer_name.clone(),
            iso(ret.return_date),
            ret.item_count.to_string(),
            ret.credit.to_string(),
            ret.refund.to_string(),
            ret.status.label_ar().to_string(),
            ret.reason.clone().unwrap_or_default(),
        ]);
    }
    sheet
}

pub fn debtors_sheet(debtors: &[Debtor]) -> Sheet {
    let mut sheet = Sheet::new("العملاء المدينون", ["العميل", "الهاتف", "الرصيد"]);
    for debtor in debtors {
        sheet.push_row(vec![
            debtor.name.clone(),
            debtor.phone.clone(),
            debtor.balance.to_string(),
        ]);
    }
    sheet
}

fn iso(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
