//! # Customer Repository
//!
//! Database operations for customers and their accounts.
//!
//! ## Account Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  invoices ──┐                                                           │
//! │  payments ──┼──► ledger(customer_id) ──► customer_balance()            │
//! │  returns  ──┘         (date order)   └──► statement() running balance  │
//! │                                                                         │
//! │  Nothing is cached: every read recomputes from the documents.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use khalifa_core::ledger::{self, LedgerEntry, LedgerKind, StatementLine};
use khalifa_core::report::Debtor;
use khalifa_core::validation;
use khalifa_core::{Customer, CustomerInput, Money};

use super::{like_pattern, stored_money, stored_text, with_duplicate_value, DeleteOutcome};
use crate::error::{DbError, DbResult};
use crate::pool::WriteLock;

/// SQL for the balance of customer `c`: invoices − payments − credits + refunds.
pub(crate) const BALANCE_SQL: &str = r#"
    (SELECT COALESCE(SUM(i.total), 0) FROM invoices i WHERE i.customer_id = c.id)
  - (SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.customer_id = c.id)
  - (SELECT COALESCE(SUM(r.credit), 0) FROM returns r WHERE r.customer_id = c.id)
  + (SELECT COALESCE(SUM(r.refund), 0) FROM returns r WHERE r.customer_id = c.id)
"#;

const CUSTOMER_COLUMNS: &str = r#"
    c.id, c.name, c.phone, c.email, c.company, c.address, c.notes,
    c.is_active, c.created_at, c.updated_at
"#;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    phone: String,
    email: Option<String>,
    company: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DbError;

    fn try_from(row: CustomerRow) -> DbResult<Self> {
        let name = stored_text("customer", &row.id, "name", row.name)?;
        let phone = stored_text("customer", &row.id, "phone", row.phone)?;
        Ok(Customer {
            id: row.id,
            name,
            phone,
            email: row.email,
            company: row.company,
            address: row.address,
            notes: row.notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    date: NaiveDate,
    kind: String,
    reference: String,
    amount: i64,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> DbResult<Self> {
        let kind = match row.kind.as_str() {
            "invoice" => LedgerKind::Invoice,
            "payment" => LedgerKind::Payment,
            "return_credit" => LedgerKind::ReturnCredit,
            "refund" => LedgerKind::Refund,
            other => {
                return Err(DbError::corrupt(
                    "ledger entry",
                    &row.reference,
                    format!("unknown kind '{other}'"),
                ))
            }
        };
        let amount = stored_money("ledger entry", &row.reference, "amount", row.amount)?;
        Ok(LedgerEntry::new(row.date, kind, row.reference, amount))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DebtorRow {
    id: String,
    name: String,
    phone: String,
    balance: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    write_lock: WriteLock,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool, write_lock: WriteLock) -> Self {
        CustomerRepository { pool, write_lock }
    }

    /// Registers a customer. The phone number must be unique.
    pub async fn create(&self, input: CustomerInput) -> DbResult<Customer> {
        let input = input.validated()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, phone = %input.phone, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, email, company, address, notes,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| with_duplicate_value(e.into(), &input.phone))?;

        Ok(Customer {
            id,
            name: input.name,
            phone: input.phone,
            email: input.email,
            company: input.company,
            address: input.address,
            notes: input.notes,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a customer by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Gets a customer by ID or fails with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Looks a customer up by phone, in any input format.
    pub async fn find_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let phone = validation::normalize_phone(phone)?;
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.phone = ?1"
        ))
        .bind(&phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Replaces a customer's details.
    pub async fn update(&self, id: &str, input: CustomerInput) -> DbResult<Customer> {
        let input = input.validated()?;
        debug!(id = %id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, company = ?5,
                address = ?6, notes = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| with_duplicate_value(e.into(), &input.phone))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get(id).await
    }

    /// Deletes a customer, or deactivates one that has documents.
    pub async fn delete(&self, id: &str) -> DbResult<DeleteOutcome> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM invoices WHERE customer_id = ?1)
                 + (SELECT COUNT(*) FROM payments WHERE customer_id = ?1)
                 + (SELECT COUNT(*) FROM returns WHERE customer_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let (result, outcome) = if references > 0 {
            let result = sqlx::query("UPDATE customers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            (result, DeleteOutcome::Deactivated)
        } else {
            let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (result, DeleteOutcome::Removed)
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        tx.commit().await?;
        info!(id = %id, ?outcome, "Customer deleted");
        Ok(outcome)
    }

    /// Makes a deactivated customer selectable on invoices again.
    pub async fn reactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET is_active = 1, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Lists customers by name.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS} FROM customers c
            WHERE ?1 OR c.is_active = 1
            ORDER BY c.name COLLATE NOCASE
            "#
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Active customers whose name, phone or company contains `query`.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let query = validation::validate_search_query(query)?;
        debug!(query = %query, limit = %limit, "Searching customers");

        if query.is_empty() {
            let mut all = self.list(false).await?;
            all.truncate(limit as usize);
            return Ok(all);
        }

        let pattern = like_pattern(&query);
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS} FROM customers c
            WHERE c.is_active = 1
              AND (c.name LIKE ?1 ESCAPE '\'
                   OR c.phone LIKE ?1 ESCAPE '\'
                   OR c.company LIKE ?1 ESCAPE '\')
            ORDER BY c.name COLLATE NOCASE
            LIMIT ?2
            "#
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Search returned customers");
        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Counts active customers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Every movement on the customer's account, oldest first.
    ///
    /// Same-day entries keep creation order; a return's credit precedes its
    /// refund.
    pub async fn ledger(&self, customer_id: &str) -> DbResult<Vec<LedgerEntry>> {
        self.get(customer_id).await?;

        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT invoice_date AS date, 'invoice' AS kind, number AS reference,
                   total AS amount, created_at, 0 AS ord
            FROM invoices WHERE customer_id = ?1
            UNION ALL
            SELECT p.payment_date, 'payment', COALESCE(i.number, p.id),
                   p.amount, p.created_at, 1
            FROM payments p LEFT JOIN invoices i ON i.id = p.invoice_id
            WHERE p.customer_id = ?1
            UNION ALL
            SELECT return_date, 'return_credit', number, credit, created_at, 2
            FROM returns WHERE customer_id = ?1
            UNION ALL
            SELECT return_date, 'refund', number, refund, created_at, 3
            FROM returns WHERE customer_id = ?1 AND refund > 0
            ORDER BY date, created_at, ord
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Outstanding balance. Positive means the customer owes the store.
    pub async fn balance(&self, customer_id: &str) -> DbResult<Money> {
        let entries = self.ledger(customer_id).await?;
        Ok(ledger::customer_balance(&entries))
    }

    /// Account statement with the running balance after each movement.
    pub async fn statement(&self, customer_id: &str) -> DbResult<Vec<StatementLine>> {
        Ok(ledger::statement(self.ledger(customer_id).await?))
    }

    /// Customers who owe money, largest balance first.
    pub async fn debtors(&self) -> DbResult<Vec<Debtor>> {
        let rows: Vec<DebtorRow> = sqlx::query_as(&format!(
            r#"
            SELECT id, name, phone, balance FROM (
                SELECT c.id, c.name, c.phone, {BALANCE_SQL} AS balance
                FROM customers c
            )
            WHERE balance > 0
            ORDER BY balance DESC, name
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Debtor {
                customer_id: row.id,
                name: row.name,
                phone: row.phone,
                balance: Money::from_minor(row.balance),
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
