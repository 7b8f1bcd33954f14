//! # Payment Repository
//!
//! Money received from customers, either on account or against a
//! specific invoice.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use khalifa_core::{CoreError, Money, Payment, PaymentInput, PaymentMethod, ValidationError};

use super::{stored_positive, Period};
use crate::error::{DbError, DbResult};
use crate::pool::WriteLock;

const PAYMENT_COLUMNS: &str = r#"
    id, customer_id, invoice_id, amount, payment_date, method, note, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    customer_id: String,
    invoice_id: Option<String>,
    amount: i64,
    payment_date: NaiveDate,
    method: PaymentMethod,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> DbResult<Self> {
        let amount = stored_positive("payment", &row.id, "amount", row.amount)?;
        Ok(Payment {
            id: row.id,
            customer_id: row.customer_id,
            invoice_id: row.invoice_id,
            amount: Money::from_minor(amount),
            payment_date: row.payment_date,
            method: row.method,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

/// Inserts a validated payment on an open connection or transaction.
pub(crate) async fn insert_payment(
    conn: &mut SqliteConnection,
    input: &PaymentInput,
) -> DbResult<Payment> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, customer_id, invoice_id, amount, payment_date, method, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(&input.customer_id)
    .bind(&input.invoice_id)
    .bind(input.amount.minor())
    .bind(input.payment_date)
    .bind(input.method)
    .bind(&input.note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Payment {
        id,
        customer_id: input.customer_id.clone(),
        invoice_id: input.invoice_id.clone(),
        amount: input.amount,
        payment_date: input.payment_date,
        method: input.method,
        note: input.note.clone(),
        created_at: now,
    })
}

/// Unpaid remainder of an invoice: total − credits − (payments − refunds).
pub(crate) async fn invoice_remaining(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Money> {
    let remaining: i64 = sqlx::query_scalar(
        r#"
        SELECT i.total
             - (SELECT COALESCE(SUM(r.credit), 0) FROM returns r WHERE r.invoice_id = i.id)
             - (SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.invoice_id = i.id)
             + (SELECT COALESCE(SUM(r.refund), 0) FROM returns r WHERE r.invoice_id = i.id)
        FROM invoices i WHERE i.id = ?1
        "#,
    )
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::from_minor(remaining))
}

/// Cash the customer still has in an invoice: payments against it minus
/// refunds already given on its returns.
pub(crate) async fn invoice_net_paid(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Money> {
    let paid: i64 = sqlx::query_scalar(
        r#"
        SELECT (SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.invoice_id = ?1)
             - (SELECT COALESCE(SUM(r.refund), 0) FROM returns r WHERE r.invoice_id = ?1)
        "#,
    )
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::from_minor(paid))
}

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
    write_lock: WriteLock,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool, write_lock: WriteLock) -> Self {
        PaymentRepository { pool, write_lock }
    }

    /// Records a payment.
    ///
    /// A payment against an invoice must belong to the invoice's customer
    /// and may not exceed what is still unpaid on it. Payments on account
    /// are unbounded.
    pub async fn record(&self, input: PaymentInput) -> DbResult<Payment> {
        let input = input.validated()?;
        debug!(customer_id = %input.customer_id, amount = %input.amount, "Recording payment");

        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let customer: Option<String> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
            .bind(&input.customer_id)
            .fetch_optional(&mut *tx)
            .await?;
        if customer.is_none() {
            return Err(ValidationError::UnknownReference {
                field: "customer".to_string(),
                id: input.customer_id.clone(),
            }
            .into());
        }

        if let Some(invoice_id) = &input.invoice_id {
            let owner: Option<String> =
                sqlx::query_scalar("SELECT customer_id FROM invoices WHERE id = ?1")
                    .bind(invoice_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match owner {
                None => {
                    return Err(ValidationError::UnknownReference {
                        field: "invoice".to_string(),
                        id: invoice_id.clone(),
                    }
                    .into())
                }
                Some(owner) if owner != input.customer_id => {
                    return Err(ValidationError::invalid(
                        "invoice",
                        "invoice belongs to another customer",
                    )
                    .into())
                }
                Some(_) => {}
            }

            let remaining = invoice_remaining(&mut tx, invoice_id).await?;
            if input.amount > remaining {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("payment {} exceeds remaining {}", input.amount, remaining),
                }
                .into());
            }
        }

        let payment = insert_payment(&mut tx, &input).await?;
        tx.commit().await?;

        info!(id = %payment.id, amount = %payment.amount, "Payment recorded");
        Ok(payment)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    /// All payments from a customer, oldest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = ?1 ORDER BY payment_date, created_at"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Payments applied to one invoice.
    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY payment_date, created_at"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Payments received within a period, newest first.
    pub async fn list(&self, period: Period) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE payment_date BETWEEN ?1 AND ?2
            ORDER BY payment_date DESC, created_at DESC
            "#
        ))
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Σ payments received within a period.
    pub async fn total(&self, period: Period) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE payment_date BETWEEN ?1 AND ?2",
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_minor(total))
    }

    /// Removes a payment entered by mistake.
    ///
    /// Refused when refunds on the invoice's returns already gave that
    /// cash back.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let invoice_id: Option<Option<String>> =
            sqlx::query_scalar("SELECT invoice_id FROM payments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(invoice_id) = invoice_id else {
            return Err(DbError::not_found("Payment", id));
        };

        sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(invoice_id) = invoice_id {
            let paid = invoice_net_paid(&mut tx, &invoice_id).await?;
            if paid < Money::zero() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("payment already refunded on invoice {invoice_id}"),
                }
                .into());
            }
        }

        tx.commit().await?;
        info!(id = %id, "Payment deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use khalifa_core::CustomerInput;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(CustomerInput {
                name: "Mona Adel".to_string(),
                phone: "01055555555".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (db, customer.id)
    }

    fn on_account(customer_id: &str, minor: i64, day: u32) -> PaymentInput {
        PaymentInput {
            customer_id: customer_id.to_string(),
            invoice_id: None,
            amount: Money::from_minor(minor),
            payment_date: date(day),
            method: PaymentMethod::Cash,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_payment_on_account_lowers_balance() {
        let (db, customer_id) = setup().await;
        let payment = db.payments().record(on_account(&customer_id, 2500, 3)).await.unwrap();

        assert_eq!(payment.method, PaymentMethod::Cash);
        assert_eq!(db.customers().balance(&customer_id).await.unwrap(), Money::from_minor(-2500));

        let listed = db.payments().list_for_customer(&customer_id).await.unwrap();
        assert_eq!(listed, vec![payment]);
    }

    #[tokio::test]
    async fn test_payment_for_unknown_customer_rejected() {
        let (db, _) = setup().await;
        let err = db
            .payments()
            .record(on_account(&Uuid::new_v4().to_string(), 100, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::UnknownReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_payment_rejected() {
        let (db, customer_id) = setup().await;
        let err = db.payments().record(on_account(&customer_id, 0, 1)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_period_total_and_delete() {
        let (db, customer_id) = setup().await;
        let repo = db.payments();
        repo.record(on_account(&customer_id, 1000, 1)).await.unwrap();
        let second = repo.record(on_account(&customer_id, 500, 20)).await.unwrap();

        let march = Period::new(date(1), date(31)).unwrap();
        assert_eq!(repo.total(march).await.unwrap(), Money::from_minor(1500));
        assert_eq!(repo.total(Period::day(date(1))).await.unwrap(), Money::from_minor(1000));
        assert_eq!(repo.list(march).await.unwrap()[0].id, second.id);

        repo.delete(&second.id).await.unwrap();
        assert!(repo.get_by_id(&second.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(&second.id).await, Err(DbError::NotFound { .. })));
    }
}
