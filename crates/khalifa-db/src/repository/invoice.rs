//! # Invoice Repository
//!
//! Database operations for invoices.
//!
//! ## Saving an Invoice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InvoiceDraft ──finalize()──► NewInvoice                                │
//! │                                    │                                    │
//! │                                    ▼   BEGIN                            │
//! │  1. customer exists and is active                                      │
//! │  2. next INV-YYYY-NNNNNN in the invoice year                           │
//! │  3. INSERT invoices                                                    │
//! │  4. per line: product active → oversell policy → INSERT item           │
//! │                → UPDATE products SET quantity = quantity − q           │
//! │  5. optional initial payment                                           │
//! │                                    │   COMMIT                           │
//! │                                    ▼                                    │
//! │  CreatedInvoice { invoice, warnings, payment }                         │
//! │                                                                         │
//! │  Any failure rolls back everything: no number is consumed and no       │
//! │  stock moves.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use khalifa_core::numbering;
use khalifa_core::report::InvoiceSummary;
use khalifa_core::stock::{self, OversellPolicy, StockWarning};
use khalifa_core::{
    Invoice, InvoiceDetails, InvoiceItem, InvoiceTotals, Money, NewInvoice, Payment, PaymentInput,
    ValidationError,
};

use super::customer::CustomerRepository;
use super::payment::insert_payment;
use super::{like_pattern, stored_money, stored_positive, stored_rate, stored_text, Period};
use crate::error::{DbError, DbResult};
use crate::pool::WriteLock;

const INVOICE_COLUMNS: &str = r#"
    id, number, customer_id, invoice_date, discount_bps, tax_bps,
    subtotal, discount, tax, total, notes, created_at
"#;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    number: String,
    customer_id: String,
    invoice_date: NaiveDate,
    discount_bps: i64,
    tax_bps: i64,
    subtotal: i64,
    discount: i64,
    tax: i64,
    total: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceItemRow {
    id: String,
    invoice_id: String,
    line_no: i64,
    product_id: String,
    sku: String,
    name: String,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
}

impl TryFrom<InvoiceItemRow> for InvoiceItem {
    type Error = DbError;

    fn try_from(row: InvoiceItemRow) -> DbResult<Self> {
        let quantity = stored_positive("invoice item", &row.id, "quantity", row.quantity)?;
        let unit_price = stored_money("invoice item", &row.id, "unit_price", row.unit_price)?;
        let line_total = stored_money("invoice item", &row.id, "line_total", row.line_total)?;
        Ok(InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            line_no: row.line_no,
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            quantity,
            unit_price,
            line_total,
        })
    }
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<InvoiceItem>) -> DbResult<Invoice> {
        let id = &self.number;
        let totals = InvoiceTotals {
            subtotal: stored_money("invoice", id, "subtotal", self.subtotal)?,
            discount: stored_money("invoice", id, "discount", self.discount)?,
            tax: stored_money("invoice", id, "tax", self.tax)?,
            total: stored_money("invoice", id, "total", self.total)?,
        };
        let invoice = Invoice {
            discount_rate: stored_rate("invoice", id, "discount_bps", self.discount_bps)?,
            tax_rate: stored_rate("invoice", id, "tax_bps", self.tax_bps)?,
            number: stored_text("invoice", &self.id, "number", self.number)?,
            id: self.id,
            customer_id: self.customer_id,
            invoice_date: self.invoice_date,
            totals,
            notes: self.notes,
            created_at: self.created_at,
            items,
        };

        if invoice.items.is_empty() {
            return Err(DbError::corrupt("invoice", &invoice.number, "invoice has no items"));
        }
        invoice.verify_totals()?;
        Ok(invoice)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: String,
    number: String,
    invoice_date: NaiveDate,
    customer_id: String,
    customer_name: String,
    total: i64,
    returned: i64,
    paid: i64,
}

impl TryFrom<SummaryRow> for InvoiceSummary {
    type Error = DbError;

    fn try_from(row: SummaryRow) -> DbResult<Self> {
        Ok(InvoiceSummary {
            total: stored_money("invoice", &row.number, "total", row.total)?,
            returned: stored_money("invoice", &row.number, "returned", row.returned)?,
            // Net of refunds; negative when more was refunded than paid.
            paid: Money::from_minor(row.paid),
            id: row.id,
            number: row.number,
            invoice_date: row.invoice_date,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
        })
    }
}

/// Invoice summary columns: credits as `returned`, payments net of refunds
/// as `paid`.
const SUMMARY_SELECT: &str = r#"
    SELECT i.id, i.number, i.invoice_date, i.customer_id,
           c.name AS customer_name, i.total,
           (SELECT COALESCE(SUM(r.credit), 0) FROM returns r WHERE r.invoice_id = i.id) AS returned,
           (SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.invoice_id = i.id)
         - (SELECT COALESCE(SUM(r.refund), 0) FROM returns r WHERE r.invoice_id = i.id) AS paid
    FROM invoices i
    JOIN customers c ON c.id = i.customer_id
"#;

// =============================================================================
// Loading
// =============================================================================

/// Loads an invoice with its items on an open connection or transaction.
pub(crate) async fn fetch_invoice(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Invoice>> {
    let row: Option<InvoiceRow> =
        sqlx::query_as(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items: Vec<InvoiceItemRow> = sqlx::query_as(
        r#"
        SELECT id, invoice_id, line_no, product_id, sku, name, quantity, unit_price, line_total
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let items = items
        .into_iter()
        .map(InvoiceItem::try_from)
        .collect::<DbResult<Vec<_>>>()?;

    row.into_invoice(items).map(Some)
}

// =============================================================================
// Filter / Result
// =============================================================================

/// Invoice listing criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub period: Option<Period>,
    pub customer_id: Option<String>,
    /// Substring of the customer's name.
    pub customer_name: Option<String>,
    pub limit: Option<u32>,
}

/// Outcome of saving an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub invoice: Invoice,
    /// Lines that took stock below zero under the `Warn` policy.
    pub warnings: Vec<StockWarning>,
    /// Initial payment, when the draft carried one.
    pub payment: Option<Payment>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
///
/// ## Usage
/// ```rust,ignore
/// let mut draft = InvoiceDraft::for_customer(&customer.id, today);
/// draft.add_product(&cup, 3)?;
///
/// let created = db.invoices().create(&draft.finalize()?).await?;
/// for w in &created.warnings {
///     println!("{} now at {}", w.sku, w.resulting);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
    write_lock: WriteLock,
    oversell: OversellPolicy,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool, write_lock: WriteLock, oversell: OversellPolicy) -> Self {
        InvoiceRepository {
            pool,
            write_lock,
            oversell,
        }
    }

    /// Saves an invoice, moves stock and records the initial payment in one
    /// transaction.
    pub async fn create(&self, new: &NewInvoice) -> DbResult<CreatedInvoice> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM customers WHERE id = ?1")
            .bind(new.customer_id())
            .fetch_optional(&mut *tx)
            .await?;
        if active != Some(true) {
            return Err(ValidationError::UnknownReference {
                field: "customer".to_string(),
                id: new.customer_id().to_string(),
            }
            .into());
        }

        let year = new.invoice_date().year();
        let sequence: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM invoices WHERE seq_year = ?1",
        )
        .bind(year)
        .fetch_one(&mut *tx)
        .await?;

        let id = Uuid::new_v4().to_string();
        let number = numbering::invoice_number(year, sequence);
        let totals = new.totals();
        let now = Utc::now();

        debug!(number = %number, lines = new.lines().len(), total = %totals.total, "Creating invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, number, seq_year, sequence, customer_id, invoice_date,
                discount_bps, tax_bps, subtotal, discount, tax, total, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&id)
        .bind(&number)
        .bind(year)
        .bind(sequence)
        .bind(new.customer_id())
        .bind(new.invoice_date())
        .bind(new.discount_rate().bps())
        .bind(new.tax_rate().bps())
        .bind(totals.subtotal.minor())
        .bind(totals.discount.minor())
        .bind(totals.tax.minor())
        .bind(totals.total.minor())
        .bind(new.notes())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(new.lines().len());
        let mut warnings = Vec::new();

        for (index, line) in new.lines().iter().enumerate() {
            let stock: Option<(i64, bool)> =
                sqlx::query_as("SELECT quantity, is_active FROM products WHERE id = ?1")
                    .bind(&line.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let available = match stock {
                Some((quantity, true)) => quantity,
                _ => {
                    return Err(ValidationError::UnknownReference {
                        field: "product".to_string(),
                        id: line.product_id.clone(),
                    }
                    .into())
                }
            };

            if let Some(warning) =
                stock::check_sale(self.oversell, &line.product_id, &line.sku, available, line.quantity)?
            {
                warnings.push(warning);
            }

            let item = InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: id.clone(),
                line_no: index as i64 + 1,
                product_id: line.product_id.clone(),
                sku: line.sku.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total(),
            };

            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, line_no, product_id, sku, name, quantity, unit_price, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(item.line_no)
            .bind(&item.product_id)
            .bind(&item.sku)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price.minor())
            .bind(item.line_total.minor())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE products SET quantity = quantity - ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&item.product_id)
                .bind(item.quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            items.push(item);
        }

        let payment = match new.initial_payment() {
            Some(initial) => {
                let input = PaymentInput {
                    customer_id: new.customer_id().to_string(),
                    invoice_id: Some(id.clone()),
                    amount: initial.amount,
                    payment_date: new.invoice_date(),
                    method: initial.method,
                    note: None,
                };
                Some(insert_payment(&mut tx, &input).await?)
            }
            None => None,
        };

        tx.commit().await?;

        for w in &warnings {
            warn!(
                number = %number,
                sku = %w.sku,
                available = w.available,
                requested = w.requested,
                "Invoice took stock below zero"
            );
        }
        info!(id = %id, number = %number, total = %totals.total, "Invoice created");

        let invoice = Invoice {
            id,
            number,
            customer_id: new.customer_id().to_string(),
            invoice_date: new.invoice_date(),
            discount_rate: new.discount_rate(),
            tax_rate: new.tax_rate(),
            totals,
            notes: new.notes().map(str::to_string),
            created_at: now,
            items,
        };

        Ok(CreatedInvoice {
            invoice,
            warnings,
            payment,
        })
    }

    /// Gets an invoice with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice(&mut conn, id).await
    }

    /// Gets an invoice or fails with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Invoice> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    /// Gets an invoice by its number, e.g. `INV-2026-000042`.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM invoices WHERE number = ?1")
            .bind(number.trim())
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Invoice with its customer and payment position, for display and print.
    pub async fn details(&self, id: &str) -> DbResult<InvoiceDetails> {
        let invoice = self.get(id).await?;
        let customer = CustomerRepository::new(self.pool.clone(), self.write_lock.clone())
            .get(&invoice.customer_id)
            .await?;

        let (paid, returned): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = ?1)
              - (SELECT COALESCE(SUM(refund), 0) FROM returns WHERE invoice_id = ?1),
                (SELECT COALESCE(SUM(credit), 0) FROM returns WHERE invoice_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(InvoiceDetails {
            invoice,
            customer,
            paid: Money::from_minor(paid),
            returned: Money::from_minor(returned),
        })
    }

    /// Lists invoices, newest first.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<InvoiceSummary>> {
        let name = filter
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(like_pattern);

        debug!(?filter, "Listing invoices");

        let rows: Vec<SummaryRow> = sqlx::query_as(&format!(
            r#"
            {SUMMARY_SELECT}
            WHERE (?1 IS NULL OR i.invoice_date >= ?1)
              AND (?2 IS NULL OR i.invoice_date <= ?2)
              AND (?3 IS NULL OR i.customer_id = ?3)
              AND (?4 IS NULL OR c.name LIKE ?4 ESCAPE '\')
            ORDER BY i.invoice_date DESC, i.seq_year DESC, i.sequence DESC
            LIMIT ?5
            "#
        ))
        .bind(filter.period.map(|p| p.from))
        .bind(filter.period.map(|p| p.to))
        .bind(&filter.customer_id)
        .bind(name)
        .bind(filter.limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvoiceSummary::try_from).collect()
    }

    /// All invoices of one customer, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<InvoiceSummary>> {
        self.list(&InvoiceFilter {
            customer_id: Some(customer_id.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Σ invoice totals within a period.
    pub async fn sales_total(&self, period: Period) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM invoices WHERE invoice_date BETWEEN ?1 AND ?2",
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_minor(total))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use khalifa_core::{CustomerInput, InvoiceDraft, PaymentMethod, Product, ProductInput, Rate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Database, String, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(CustomerInput {
                name: "Omar Said".to_string(),
                phone: "01066666666".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let product = db
            .products()
            .create(ProductInput {
                sku: "CUP-01".to_string(),
                name: "Tea cup".to_string(),
                price: Money::from_minor(1999),
                cost_price: Money::from_minor(1200),
                opening_stock: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        (db, customer.id, product)
    }

    fn draft(customer_id: &str, product: &Product, qty: i64, on: NaiveDate) -> InvoiceDraft {
        let mut draft = InvoiceDraft::for_customer(customer_id, on);
        draft.add_product(product, qty).unwrap();
        draft
    }

    #[tokio::test]
    async fn test_create_invoice_and_reload() {
        let (db, customer_id, product) = setup().await;
        let new = draft(&customer_id, &product, 3, date(2026, 5, 1)).finalize().unwrap();

        let created = db.invoices().create(&new).await.unwrap();
        assert!(created.warnings.is_empty());
        assert!(created.payment.is_none());
        assert_eq!(created.invoice.number, "INV-2026-000001");
        assert_eq!(created.invoice.total(), Money::from_minor(5997));

        let loaded = db.invoices().get(&created.invoice.id).await.unwrap();
        assert_eq!(loaded, created.invoice);
        assert_eq!(loaded.items[0].line_total, Money::from_minor(5997));

        let by_number = db.invoices().get_by_number("INV-2026-000001").await.unwrap();
        assert_eq!(by_number.map(|i| i.id), Some(created.invoice.id));

        assert_eq!(db.products().get(&product.id).await.unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn test_numbers_restart_each_year() {
        let (db, customer_id, product) = setup().await;
        let repo = db.invoices();

        let a = repo.create(&draft(&customer_id, &product, 1, date(2025, 12, 31)).finalize().unwrap()).await.unwrap();
        let b = repo.create(&draft(&customer_id, &product, 1, date(2026, 1, 1)).finalize().unwrap()).await.unwrap();
        let c = repo.create(&draft(&customer_id, &product, 1, date(2026, 1, 2)).finalize().unwrap()).await.unwrap();

        assert_eq!(a.invoice.number, "INV-2025-000001");
        assert_eq!(b.invoice.number, "INV-2026-000001");
        assert_eq!(c.invoice.number, "INV-2026-000002");
    }

    #[tokio::test]
    async fn test_discount_tax_and_initial_payment() {
        let (db, customer_id, product) = setup().await;
        let mut d = draft(&customer_id, &product, 5, date(2026, 5, 1));
        d.set_discount(Rate::from_percent(10)).unwrap();
        d.set_tax(Rate::from_percent(14)).unwrap();
        d.set_initial_payment(Some(Money::from_minor(5000)), PaymentMethod::Card);
        let new = d.finalize().unwrap();

        let created = db.invoices().create(&new).await.unwrap();
        assert_eq!(created.invoice.totals, new.totals());
        let payment = created.payment.unwrap();
        assert_eq!(payment.method, PaymentMethod::Card);
        assert_eq!(payment.invoice_id.as_deref(), Some(created.invoice.id.as_str()));

        let details = db.invoices().details(&created.invoice.id).await.unwrap();
        assert_eq!(details.paid, Money::from_minor(5000));
        assert_eq!(details.remaining(), created.invoice.total() - Money::from_minor(5000));
        assert_eq!(details.customer.id, customer_id);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, customer_id, product) = setup().await;
        let repo = db.invoices();
        repo.create(&draft(&customer_id, &product, 1, date(2026, 4, 10)).finalize().unwrap()).await.unwrap();
        repo.create(&draft(&customer_id, &product, 2, date(2026, 5, 10)).finalize().unwrap()).await.unwrap();

        let all = repo.list(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].invoice_date, date(2026, 5, 10));

        let may = repo
            .list(&InvoiceFilter {
                period: Some(Period::new(date(2026, 5, 1), date(2026, 5, 31)).unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(may.len(), 1);
        assert_eq!(may[0].total, Money::from_minor(3998));

        let by_name = repo
            .list(&InvoiceFilter {
                customer_name: Some("omar".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 2);

        let nobody = repo
            .list(&InvoiceFilter {
                customer_name: Some("Zeinab".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(nobody.is_empty());

        assert_eq!(repo.list_for_customer(&customer_id).await.unwrap().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(
            repo.sales_total(Period::new(date(2026, 1, 1), date(2026, 12, 31)).unwrap()).await.unwrap(),
            Money::from_minor(5997)
        );
    }

    #[tokio::test]
    async fn test_inactive_product_rejected_without_writes() {
        let (db, customer_id, product) = setup().await;
        // Referenced by the first invoice, so delete deactivates.
        db.invoices()
            .create(&draft(&customer_id, &product, 1, date(2026, 5, 1)).finalize().unwrap())
            .await
            .unwrap();
        db.products().delete(&product.id).await.unwrap();

        let err = db
            .invoices()
            .create(&draft(&customer_id, &product, 1, date(2026, 5, 2)).finalize().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::UnknownReference { ref field, .. }) if field == "product"
        ));
        assert_eq!(db.invoices().count().await.unwrap(), 1);
        assert_eq!(db.products().get(&product.id).await.unwrap().quantity, 9);
    }
}
