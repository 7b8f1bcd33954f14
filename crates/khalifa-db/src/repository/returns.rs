//! # Return Repository
//!
//! Goods brought back against an invoice.
//!
//! ## Saving a Return
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │  1. load invoice + items, earlier returns of it                        │
//! │  2. each line: item on this invoice, quantity ≤ sold − returned        │
//! │  3. credit = return_credit(invoice, gross, credited, completes)        │
//! │  4. refund ≤ min(credit, paid on the invoice − earlier refunds)        │
//! │  5. INSERT returns / return_items, stock += quantity                   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use khalifa_core::draft::return_credit;
use khalifa_core::numbering;
use khalifa_core::report::ReturnSummary;
use khalifa_core::{
    CoreError, Money, NewReturn, ProductReturn, ReturnDraft, ReturnItem, ReturnStatus,
    ValidationError,
};

use super::invoice::fetch_invoice;
use super::payment::invoice_net_paid;
use super::{stored_money, stored_positive, Period};
use crate::error::{DbError, DbResult};
use crate::pool::WriteLock;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    id: String,
    number: String,
    invoice_id: String,
    customer_id: String,
    return_date: NaiveDate,
    reason: Option<String>,
    notes: Option<String>,
    credit: i64,
    refund: i64,
    status: ReturnStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnItemRow {
    id: String,
    return_id: String,
    invoice_item_id: String,
    product_id: String,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
}

impl TryFrom<ReturnItemRow> for ReturnItem {
    type Error = DbError;

    fn try_from(row: ReturnItemRow) -> DbResult<Self> {
        let quantity = stored_positive("return item", &row.id, "quantity", row.quantity)?;
        let unit_price = stored_money("return item", &row.id, "unit_price", row.unit_price)?;
        let line_total = stored_money("return item", &row.id, "line_total", row.line_total)?;
        Ok(ReturnItem {
            id: row.id,
            return_id: row.return_id,
            invoice_item_id: row.invoice_item_id,
            product_id: row.product_id,
            quantity,
            unit_price,
            line_total,
        })
    }
}

impl ReturnRow {
    fn into_return(self, items: Vec<ReturnItem>) -> DbResult<ProductReturn> {
        let credit = stored_money("return", &self.number, "credit", self.credit)?;
        let refund = stored_money("return", &self.number, "refund", self.refund)?;
        if refund > credit {
            return Err(DbError::corrupt("return", &self.number, "refund exceeds credit"));
        }
        Ok(ProductReturn {
            id: self.id,
            number: self.number,
            invoice_id: self.invoice_id,
            customer_id: self.customer_id,
            return_date: self.return_date,
            reason: self.reason,
            notes: self.notes,
            credit,
            refund,
            status: self.status,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnSummaryRow {
    id: String,
    number: String,
    return_date: NaiveDate,
    invoice_number: String,
    customer_name: String,
    item_count: i64,
    credit: i64,
    refund: i64,
    status: ReturnStatus,
    reason: Option<String>,
}

impl TryFrom<ReturnSummaryRow> for ReturnSummary {
    type Error = DbError;

    fn try_from(row: ReturnSummaryRow) -> DbResult<Self> {
        Ok(ReturnSummary {
            credit: stored_money("return", &row.number, "credit", row.credit)?,
            refund: stored_money("return", &row.number, "refund", row.refund)?,
            id: row.id,
            number: row.number,
            return_date: row.return_date,
            invoice_number: row.invoice_number,
            customer_name: row.customer_name,
            item_count: row.item_count,
            status: row.status,
            reason: row.reason,
        })
    }
}

/// Return listing columns. `item_count` is units, not lines.
const SUMMARY_SELECT: &str = r#"
    SELECT r.id, r.number, r.return_date,
           i.number AS invoice_number, c.name AS customer_name,
           (SELECT COALESCE(SUM(ri.quantity), 0) FROM return_items ri WHERE ri.return_id = r.id) AS item_count,
           r.credit, r.refund, r.status, r.reason
    FROM returns r
    JOIN invoices i ON i.id = r.invoice_id
    JOIN customers c ON c.id = r.customer_id
"#;

/// Units already returned per invoice item.
async fn returned_by_item(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT ri.invoice_item_id, SUM(ri.quantity)
        FROM return_items ri
        JOIN returns r ON r.id = ri.return_id
        WHERE r.invoice_id = ?1
        GROUP BY ri.invoice_item_id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for return database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
    write_lock: WriteLock,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool, write_lock: WriteLock) -> Self {
        ReturnRepository { pool, write_lock }
    }

    /// Starts a return for an invoice. Each line's `sold` is what is still
    /// returnable after earlier returns.
    pub async fn draft(&self, invoice_id: &str, return_date: NaiveDate) -> DbResult<ReturnDraft> {
        let mut conn = self.pool.acquire().await?;
        let invoice = fetch_invoice(&mut conn, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;
        let returned = returned_by_item(&mut conn, invoice_id).await?;

        let mut draft = ReturnDraft::for_invoice(&invoice, return_date);
        for line in &mut draft.lines {
            line.sold -= returned.get(&line.invoice_item_id).copied().unwrap_or(0);
        }
        Ok(draft)
    }

    /// Stores a return, credits the customer and puts the goods back in
    /// stock, all in one transaction.
    pub async fn create(&self, new: &NewReturn) -> DbResult<ProductReturn> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let invoice = fetch_invoice(&mut tx, new.invoice_id())
            .await?
            .ok_or_else(|| ValidationError::UnknownReference {
                field: "invoice".to_string(),
                id: new.invoice_id().to_string(),
            })?;

        if invoice.customer_id != new.customer_id() {
            return Err(ValidationError::invalid("customer", "does not match the invoice").into());
        }
        if new.return_date() < invoice.invoice_date {
            return Err(ValidationError::invalid(
                "return_date",
                format!("before invoice date {}", invoice.invoice_date),
            )
            .into());
        }

        let mut returned = returned_by_item(&mut tx, &invoice.id).await?;
        let mut items = Vec::with_capacity(new.lines().len());
        let return_id = Uuid::new_v4().to_string();

        for line in new.lines() {
            let sold = invoice
                .item(&line.invoice_item_id)
                .ok_or_else(|| CoreError::ForeignInvoiceItem {
                    item_id: line.invoice_item_id.clone(),
                    invoice_id: invoice.id.clone(),
                })?;

            let already = returned.entry(sold.id.clone()).or_insert(0);
            let remaining = sold.quantity - *already;
            if line.quantity > remaining {
                return Err(CoreError::ReturnExceedsSold {
                    item_id: sold.id.clone(),
                    remaining,
                    requested: line.quantity,
                }
                .into());
            }
            *already += line.quantity;

            // Price and product always come from the invoice line.
            items.push(ReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                invoice_item_id: sold.id.clone(),
                product_id: sold.product_id.clone(),
                quantity: line.quantity,
                unit_price: sold.unit_price,
                line_total: sold.unit_price.times(line.quantity),
            });
        }

        let completes_invoice = invoice
            .items
            .iter()
            .all(|item| returned.get(&item.id).copied().unwrap_or(0) >= item.quantity);

        let previously_credited: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(credit), 0) FROM returns WHERE invoice_id = ?1")
                .bind(&invoice.id)
                .fetch_one(&mut *tx)
                .await?;

        let gross: Money = items.iter().map(|i| i.line_total).sum();
        let credit = return_credit(
            &invoice,
            gross,
            Money::from_minor(previously_credited),
            completes_invoice,
        );

        if new.refund() > credit {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("refund {} exceeds credit {}", new.refund(), credit),
            }
            .into());
        }
        let paid = invoice_net_paid(&mut tx, &invoice.id).await?;
        if new.refund() > paid {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("refund {} exceeds paid {}", new.refund(), paid),
            }
            .into());
        }

        let year = new.return_date().year();
        let sequence: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM returns WHERE seq_year = ?1",
        )
        .bind(year)
        .fetch_one(&mut *tx)
        .await?;
        let number = numbering::return_number(year, sequence);
        let now = Utc::now();

        debug!(number = %number, invoice = %invoice.number, credit = %credit, "Creating return");

        sqlx::query(
            r#"
            INSERT INTO returns (
                id, number, seq_year, sequence, invoice_id, customer_id,
                return_date, reason, notes, credit, refund, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&return_id)
        .bind(&number)
        .bind(year)
        .bind(sequence)
        .bind(&invoice.id)
        .bind(&invoice.customer_id)
        .bind(new.return_date())
        .bind(new.reason())
        .bind(new.notes())
        .bind(credit.minor())
        .bind(new.refund().minor())
        .bind(ReturnStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO return_items (
                    id, return_id, invoice_item_id, product_id, quantity, unit_price, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.invoice_item_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price.minor())
            .bind(item.line_total.minor())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE products SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&item.product_id)
                .bind(item.quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(id = %return_id, number = %number, credit = %credit, refund = %new.refund(), "Return created");

        Ok(ProductReturn {
            id: return_id,
            number,
            invoice_id: invoice.id,
            customer_id: invoice.customer_id,
            return_date: new.return_date(),
            reason: new.reason().map(str::to_string),
            notes: new.notes().map(str::to_string),
            credit,
            refund: new.refund(),
            status: ReturnStatus::Pending,
            created_at: now,
            items,
        })
    }

    /// Gets a return with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductReturn>> {
        let row: Option<ReturnRow> = sqlx::query_as(
            r#"
            SELECT id, number, invoice_id, customer_id, return_date, reason, notes,
                   credit, refund, status, created_at
            FROM returns WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<ReturnItemRow> = sqlx::query_as(
            r#"
            SELECT id, return_id, invoice_item_id, product_id, quantity, unit_price, line_total
            FROM return_items WHERE return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let items = items
            .into_iter()
            .map(ReturnItem::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        row.into_return(items).map(Some)
    }

    /// Returns against one invoice, oldest first.
    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<ReturnSummary>> {
        let rows: Vec<ReturnSummaryRow> = sqlx::query_as(&format!(
            r#"
            {SUMMARY_SELECT}
            WHERE r.invoice_id = ?1
            ORDER BY r.return_date, r.seq_year, r.sequence
            "#
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReturnSummary::try_from).collect()
    }

    /// Returns within a period, newest first.
    pub async fn list(&self, period: Period) -> DbResult<Vec<ReturnSummary>> {
        let rows: Vec<ReturnSummaryRow> = sqlx::query_as(&format!(
            r#"
            {SUMMARY_SELECT}
            WHERE r.return_date BETWEEN ?1 AND ?2
            ORDER BY r.return_date DESC, r.seq_year DESC, r.sequence DESC
            "#
        ))
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReturnSummary::try_from).collect()
    }

    /// Moves a return along its review: pending, then approved or
    /// rejected, then completed. Final statuses do not change.
    pub async fn set_status(&self, id: &str, status: ReturnStatus) -> DbResult<()> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let current: ReturnStatus = sqlx::query_scalar("SELECT status FROM returns WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Return", id))?;

        if !current.can_become(status) {
            return Err(ValidationError::invalid(
                "status",
                format!("cannot change from {current:?} to {status:?}"),
            )
            .into());
        }

        sqlx::query("UPDATE returns SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, from = ?current, to = ?status, "Return status changed");
        Ok(())
    }

    /// Units returned so far per invoice item.
    pub async fn returned_quantities(&self, invoice_id: &str) -> DbResult<HashMap<String, i64>> {
        let mut conn = self.pool.acquire().await?;
        returned_by_item(&mut conn, invoice_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use khalifa_core::{CustomerInput, Invoice, InvoiceDraft, PaymentInput, PaymentMethod, ProductInput};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    async fn setup() -> (Database, Invoice) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(CustomerInput {
                name: "Huda Kamal".to_string(),
                phone: "01077777777".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let plate = db
            .products()
            .create(ProductInput {
                sku: "PLT-01".to_string(),
                name: "Plate".to_string(),
                price: Money::from_minor(1000),
                opening_stock: 20,
                ..Default::default()
            })
            .await
            .unwrap();

        let mut draft = InvoiceDraft::for_customer(&customer.id, date(1));
        draft.add_product(&plate, 4).unwrap();
        let created = db.invoices().create(&draft.finalize().unwrap()).await.unwrap();
        (db, created.invoice)
    }

    async fn pay(db: &Database, invoice: &Invoice, minor: i64) {
        db.payments()
            .record(PaymentInput {
                customer_id: invoice.customer_id.clone(),
                invoice_id: Some(invoice.id.clone()),
                amount: Money::from_minor(minor),
                payment_date: date(2),
                method: PaymentMethod::Cash,
                note: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_partial_return_restocks_and_credits() {
        let (db, invoice) = setup().await;
        let mut draft = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        let item_id = draft.lines[0].invoice_item_id.clone();
        draft.set_quantity(&item_id, 1).unwrap();
        draft.set_reason(Some("Chipped".to_string()));

        let ret = db.returns().create(&draft.finalize().unwrap()).await.unwrap();
        assert_eq!(ret.number, "RET-2026-000001");
        assert_eq!(ret.credit, Money::from_minor(1000));
        assert_eq!(ret.items[0].quantity, 1);

        let product_id = &invoice.items[0].product_id;
        assert_eq!(db.products().get(product_id).await.unwrap().quantity, 17);

        let stored = db.returns().get_by_id(&ret.id).await.unwrap().unwrap();
        assert_eq!(stored, ret);
        assert_eq!(stored.status, ReturnStatus::Pending);

        let next = db.returns().draft(&invoice.id, date(4)).await.unwrap();
        assert_eq!(next.lines[0].sold, 3);
        assert_eq!(db.returns().returned_quantities(&invoice.id).await.unwrap()[&item_id], 1);
    }

    #[tokio::test]
    async fn test_return_exceeding_sold_rejected() {
        let (db, invoice) = setup().await;
        let mut draft = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        let item_id = draft.lines[0].invoice_item_id.clone();
        draft.set_quantity(&item_id, 3).unwrap();
        let first = draft.finalize().unwrap();
        db.returns().create(&first).await.unwrap();

        // The same draft again now exceeds what is left.
        let err = db.returns().create(&first).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::ReturnExceedsSold { remaining: 1, requested: 3, .. })
        ));
        assert_eq!(
            db.products().get(&invoice.items[0].product_id).await.unwrap().quantity,
            19
        );
    }

    #[tokio::test]
    async fn test_refund_above_credit_rejected() {
        let (db, invoice) = setup().await;
        let mut draft = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        let item_id = draft.lines[0].invoice_item_id.clone();
        draft.set_quantity(&item_id, 1).unwrap();
        draft.set_refund(Money::from_minor(1001)).unwrap();

        let err = db.returns().create(&draft.finalize().unwrap()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidPaymentAmount { .. })));
        assert!(db.returns().list_for_invoice(&invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refund_on_unpaid_invoice_rejected() {
        let (db, invoice) = setup().await;
        let mut draft = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        draft.return_everything();
        draft.set_refund(invoice.total()).unwrap();

        let err = db.returns().create(&draft.finalize().unwrap()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidPaymentAmount { .. })));

        // Without a refund the full return clears the debt.
        draft.set_refund(Money::zero()).unwrap();
        db.returns().create(&draft.finalize().unwrap()).await.unwrap();
        assert_eq!(db.customers().balance(&invoice.customer_id).await.unwrap(), Money::zero());
        let details = db.invoices().details(&invoice.id).await.unwrap();
        assert_eq!(details.paid, Money::zero());
        assert_eq!(details.remaining(), Money::zero());
    }

    #[tokio::test]
    async fn test_refunds_never_exceed_what_was_paid() {
        let (db, invoice) = setup().await;
        pay(&db, &invoice, 1500).await;
        let item_id = invoice.items[0].id.clone();

        let mut first = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        first.set_quantity(&item_id, 2).unwrap();
        first.set_refund(Money::from_minor(1000)).unwrap();
        db.returns().create(&first.finalize().unwrap()).await.unwrap();

        // 5.00 of the payment is left to give back.
        let mut second = db.returns().draft(&invoice.id, date(4)).await.unwrap();
        second.set_quantity(&item_id, 2).unwrap();
        second.set_refund(Money::from_minor(501)).unwrap();
        let err = db.returns().create(&second.finalize().unwrap()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidPaymentAmount { .. })));

        second.set_refund(Money::from_minor(500)).unwrap();
        db.returns().create(&second.finalize().unwrap()).await.unwrap();
        assert_eq!(db.customers().balance(&invoice.customer_id).await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn test_status_moves_forward_only() {
        let (db, invoice) = setup().await;
        let mut draft = db.returns().draft(&invoice.id, date(3)).await.unwrap();
        draft.return_everything();
        let ret = db.returns().create(&draft.finalize().unwrap()).await.unwrap();

        db.returns().set_status(&ret.id, ReturnStatus::Approved).await.unwrap();
        db.returns().set_status(&ret.id, ReturnStatus::Completed).await.unwrap();
        let err = db
            .returns()
            .set_status(&ret.id, ReturnStatus::Pending)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let stored = db.returns().get_by_id(&ret.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReturnStatus::Completed);
        let listed = db.returns().list_for_invoice(&invoice.id).await.unwrap();
        assert_eq!(listed[0].status, ReturnStatus::Completed);

        assert!(matches!(
            db.returns().set_status(&Uuid::new_v4().to_string(), ReturnStatus::Approved).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_return_before_invoice_date_rejected() {
        let (db, invoice) = setup().await;
        let mut draft = ReturnDraft::for_invoice(&invoice, NaiveDate::from_ymd_opt(2026, 5, 31).unwrap());
        draft.return_everything();
        let err = db.returns().create(&draft.finalize().unwrap()).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_list_returns_in_period() {
        let (db, invoice) = setup().await;
        pay(&db, &invoice, 2000).await;
        let mut draft = db.returns().draft(&invoice.id, date(10)).await.unwrap();
        draft.return_everything();
        draft.set_refund(Money::from_minor(1500)).unwrap();
        db.returns().create(&draft.finalize().unwrap()).await.unwrap();

        let listed = db.returns().list(Period::new(date(1), date(30)).unwrap()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].invoice_number, invoice.number);
        assert_eq!(listed[0].customer_name, "Huda Kamal");
        assert_eq!(listed[0].item_count, 4);
        assert_eq!(listed[0].credit, invoice.total());
        assert_eq!(listed[0].refund, Money::from_minor(1500));

        assert!(db.returns().list(Period::day(date(11))).await.unwrap().is_empty());
    }
}
