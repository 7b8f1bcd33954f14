//! Exports of invoices and reports loaded from a real database.

use chrono::NaiveDate;

use khalifa_core::format::Locale;
use khalifa_core::{CustomerInput, InvoiceDraft, Money, ProductInput, StoreInfo};
use khalifa_db::{Database, DbConfig, Period};
use khalifa_export::{debtors_sheet, invoice_sheet, sales_sheet, DocumentLayout, PdfRenderer};

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

async fn seeded() -> (Database, String) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let customer = db
        .customers()
        .create(CustomerInput {
            name: "منى عادل".to_string(),
            phone: "01022223333".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut products = Vec::new();
    for (sku, price) in [("CUP-1", "19.99"), ("PLT-1", "7.25")] {
        let product = db
            .products()
            .create(ProductInput {
                sku: sku.to_string(),
                name: format!("Item {sku}"),
                price: price.parse().unwrap(),
                cost_price: Money::zero(),
                opening_stock: 20,
                min_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        products.push(product);
    }

    let mut draft = InvoiceDraft::for_customer(&customer.id, date(3, 10));
    draft.add_product(&products[0], 3).unwrap();
    draft.add_product(&products[1], 2).unwrap();
    let created = db.invoices().create(&draft.finalize().unwrap()).await.unwrap();
    (db, created.invoice.id)
}

#[tokio::test]
async fn test_invoice_export_matches_stored_invoice() {
    let (db, invoice_id) = seeded().await;
    let details = db.invoices().details(&invoice_id).await.unwrap();

    let bytes = invoice_sheet(&details).to_csv_bytes().unwrap();
    let mut reader = csv::ReaderBuilder::new().from_reader(&bytes[3..]);
    assert_eq!(reader.headers().unwrap().len(), 6);
    assert_eq!(reader.records().count(), 2);

    let layout = DocumentLayout::invoice(&details, &StoreInfo::default(), &Locale::default());
    assert_eq!(layout.grand_total(), Some(details.invoice.total()));
    assert_eq!(layout.grand_total(), Some(Money::from_minor(7447)));

    let pdf = PdfRenderer::builtin().render(&layout).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    db.close().await;
}

#[tokio::test]
async fn test_report_exports() {
    let (db, _) = seeded().await;
    let period = Period::new(date(3, 1), date(3, 31)).unwrap();

    let summary = db.reports().sales_summary(period).await.unwrap();
    let invoices = db
        .invoices()
        .list(&khalifa_db::InvoiceFilter {
            period: Some(period),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(sales_sheet(&invoices).rows.len(), 1);

    let layout = DocumentLayout::sales_report(&summary, &invoices, &StoreInfo::default(), &Locale::default());
    assert_eq!(layout.grand_total(), Some(Money::from_minor(7447)));

    let debtors = db.customers().debtors().await.unwrap();
    let sheet = debtors_sheet(&debtors);
    assert_eq!(sheet.rows, vec![vec!["منى عادل", "01022223333", "74.47"]]);

    db.close().await;
}
