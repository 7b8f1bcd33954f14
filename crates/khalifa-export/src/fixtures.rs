//! Records shared by the unit tests of this crate.

use chrono::{NaiveDate, TimeZone, Utc};
use khalifa_core::{
    Customer, Invoice, InvoiceDetails, InvoiceItem, InvoiceTotals, Money, Rate,
};

pub fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

pub fn customer(name: &str) -> Customer {
    let created = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    Customer {
        id: "cust-1".to_string(),
        name: name.to_string(),
        phone: "01012345678".to_string(),
        email: None,
        company: Some("Nile Cafe".to_string()),
        address: None,
        notes: None,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

fn item(line_no: i64, sku: &str, name: &str, quantity: i64, price: i64) -> InvoiceItem {
    let unit_price = Money::from_minor(price);
    InvoiceItem {
        id: format!("item-{line_no}"),
        invoice_id: "inv-1".to_string(),
        line_no,
        product_id: format!("prod-{line_no}"),
        sku: sku.to_string(),
        name: name.to_string(),
        quantity,
        unit_price,
        line_total: unit_price.times(quantity),
    }
}

/// Two lines: 3 × 19.99 and 2 × 12.50, 10% discount, 14% tax.
pub fn invoice_details(customer_name: &str) -> InvoiceDetails {
    let items = vec![
        item(1, "CUP-1", "Tea Cup", 3, 1999),
        item(2, "PLT-1", "طبق تقديم", 2, 1250),
    ];
    let discount_rate = Rate::from_percent(10);
    let tax_rate = Rate::from_percent(14);
    let totals = InvoiceTotals::compute(
        items.iter().map(|i| (i.quantity, i.unit_price)),
        discount_rate,
        tax_rate,
    );
    InvoiceDetails {
        invoice: Invoice {
            id: "inv-1".to_string(),
            number: "INV-2026-000042".to_string(),
            customer_id: "cust-1".to_string(),
            invoice_date: date(3, 5),
            discount_rate,
            tax_rate,
            totals,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 5, 11, 30, 0).unwrap(),
            items,
        },
        customer: customer(customer_name),
        paid: Money::from_major(50),
        returned: Money::zero(),
    }
}
