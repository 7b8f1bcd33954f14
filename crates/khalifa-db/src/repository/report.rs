//! # Report Repository
//!
//! Read-only aggregate queries behind the reports screen. Each method
//! returns plain records from `khalifa_core::report`, ready for display or
//! export.
//!
//! ## Where the Numbers Come From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales        invoices.total, by invoice_date                          │
//! │  collected    payments on those invoices − refunds on their returns    │
//! │  returns      return credits against those invoices                    │
//! │  cost         (sold − returned units) × current cost_price             │
//! │  cash in      payments by payment_date                                 │
//! │  cash out     refunds by return_date                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use khalifa_core::ledger::debt_age_bucket;
use khalifa_core::report::{
    AgedInvoice, AgingReport, Cashflow, CategoryPerformance, DailySales, InventoryLine,
    InventorySummary, MonthlySales, ProductSales, ProfitLoss, SalesSummary, TopCustomer,
    TopProduct,
};
use khalifa_core::stock::classify_stock;
use khalifa_core::Money;

use super::{stored_money, Period};
use crate::error::{DbError, DbResult};

/// Payments on invoice `i` net of refunds on its returns.
const INVOICE_PAID_SQL: &str = r#"
    (SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.invoice_id = i.id)
  - (SELECT COALESCE(SUM(r.refund), 0) FROM returns r WHERE r.invoice_id = i.id)
"#;

/// Credits of returns against invoice `i`.
const INVOICE_RETURNED_SQL: &str = r#"
    (SELECT COALESCE(SUM(r.credit), 0) FROM returns r WHERE r.invoice_id = i.id)
"#;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    id: String,
    sku: String,
    name: String,
    category: Option<String>,
    price: i64,
    cost_price: i64,
    quantity: i64,
    min_stock: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_id: String,
    sku: String,
    name: String,
    quantity_sold: i64,
    revenue: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    category: Option<String>,
    product_count: i64,
    quantity_sold: i64,
    revenue: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OutstandingRow {
    id: String,
    number: String,
    customer_name: String,
    invoice_date: NaiveDate,
    outstanding: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for report queries.
///
/// ## Usage
/// ```rust,ignore
/// let march = Period::new(first_of_march, end_of_march)?;
/// let summary = db.reports().sales_summary(march).await?;
/// let aging = db.reports().debt_aging(today).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Count, totals, collection and returns of invoices dated in `period`.
    pub async fn sales_summary(&self, period: Period) -> DbResult<SalesSummary> {
        debug!(from = %period.from, to = %period.to, "Sales summary");

        let (count, sales, collected, returns): (i64, i64, i64, i64) = sqlx::query_as(&format!(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(i.total), 0),
                   COALESCE(SUM({INVOICE_PAID_SQL}), 0),
                   COALESCE(SUM({INVOICE_RETURNED_SQL}), 0)
            FROM invoices i
            WHERE i.invoice_date BETWEEN ?1 AND ?2
            "#
        ))
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesSummary::new(
            period.from,
            period.to,
            count,
            Money::from_minor(sales),
            Money::from_minor(collected),
            Money::from_minor(returns),
        ))
    }

    /// Twelve months of `year`, months without sales included as zero.
    pub async fn monthly_sales(&self, year: i32) -> DbResult<Vec<MonthlySales>> {
        let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(&format!(
            r#"
            SELECT CAST(strftime('%m', i.invoice_date) AS INTEGER) AS month,
                   COUNT(*),
                   COALESCE(SUM(i.total), 0),
                   COALESCE(SUM({INVOICE_PAID_SQL}), 0)
            FROM invoices i
            WHERE i.seq_year = ?1
            GROUP BY month
            "#
        ))
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        let mut months: Vec<MonthlySales> = (1..=12)
            .map(|month| MonthlySales {
                year,
                month,
                invoice_count: 0,
                total_sales: Money::zero(),
                collected: Money::zero(),
            })
            .collect();

        for (month, count, sales, collected) in rows {
            let slot = usize::try_from(month - 1)
                .ok()
                .and_then(|index| months.get_mut(index))
                .ok_or_else(|| DbError::corrupt("invoice", year.to_string(), format!("month {month}")))?;
            slot.invoice_count = count;
            slot.total_sales = Money::from_minor(sales);
            slot.collected = Money::from_minor(collected);
        }

        Ok(months)
    }

    /// Sales per day with at least one invoice.
    pub async fn daily_sales(&self, period: Period) -> DbResult<Vec<DailySales>> {
        let rows: Vec<(NaiveDate, i64, i64)> = sqlx::query_as(
            r#"
            SELECT invoice_date, COUNT(*), COALESCE(SUM(total), 0)
            FROM invoices
            WHERE invoice_date BETWEEN ?1 AND ?2
            GROUP BY invoice_date
            ORDER BY invoice_date
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, invoice_count, total)| DailySales {
                date,
                invoice_count,
                total_sales: Money::from_minor(total),
            })
            .collect())
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Stock position of all active products.
    pub async fn inventory_summary(&self) -> DbResult<InventorySummary> {
        let (count, units, cost, retail, low, out): (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(MAX(quantity, 0)), 0),
                   COALESCE(SUM(cost_price * MAX(quantity, 0)), 0),
                   COALESCE(SUM(price * MAX(quantity, 0)), 0),
                   COALESCE(SUM(quantity > 0 AND quantity < min_stock), 0),
                   COALESCE(SUM(quantity <= 0), 0)
            FROM products
            WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(InventorySummary {
            product_count: count,
            total_units: units,
            cost_value: Money::from_minor(cost),
            retail_value: Money::from_minor(retail),
            low_stock_count: low,
            out_of_stock_count: out,
        })
    }

    /// One line per active product, by category then name.
    pub async fn inventory_lines(&self) -> DbResult<Vec<InventoryLine>> {
        let rows: Vec<InventoryRow> = sqlx::query_as(
            r#"
            SELECT id, sku, name, category, price, cost_price, quantity, min_stock
            FROM products
            WHERE is_active = 1
            ORDER BY category, name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let price = stored_money("product", &row.id, "price", row.price)?;
                let cost = stored_money("product", &row.id, "cost_price", row.cost_price)?;
                Ok(InventoryLine {
                    status: classify_stock(row.quantity, row.min_stock),
                    value: cost.times(row.quantity.max(0)),
                    product_id: row.id,
                    sku: row.sku,
                    name: row.name,
                    category: row.category,
                    quantity: row.quantity,
                    min_stock: row.min_stock,
                    price,
                })
            })
            .collect()
    }

    /// Best sellers by units sold in `period`.
    pub async fn top_products(&self, period: Period, limit: u32) -> DbResult<Vec<TopProduct>> {
        let rows: Vec<ProductSalesRow> = sqlx::query_as(
            r#"
            SELECT ii.product_id, p.sku, p.name,
                   SUM(ii.quantity) AS quantity_sold,
                   SUM(ii.line_total) AS revenue
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            JOIN products p ON p.id = ii.product_id
            WHERE i.invoice_date BETWEEN ?1 AND ?2
            GROUP BY ii.product_id
            ORDER BY quantity_sold DESC, revenue DESC
            LIMIT ?3
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TopProduct {
                product_id: row.product_id,
                sku: row.sku,
                name: row.name,
                quantity_sold: row.quantity_sold,
                revenue: Money::from_minor(row.revenue),
            })
            .collect())
    }

    /// Sales per category in `period`, highest revenue first.
    pub async fn category_performance(&self, period: Period) -> DbResult<Vec<CategoryPerformance>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r#"
            SELECT p.category,
                   COUNT(DISTINCT p.id) AS product_count,
                   SUM(ii.quantity) AS quantity_sold,
                   SUM(ii.line_total) AS revenue
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            JOIN products p ON p.id = ii.product_id
            WHERE i.invoice_date BETWEEN ?1 AND ?2
            GROUP BY p.category
            ORDER BY revenue DESC
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryPerformance {
                category: row.category,
                product_count: row.product_count,
                quantity_sold: row.quantity_sold,
                revenue: Money::from_minor(row.revenue),
            })
            .collect())
    }

    /// Units, revenue and invoice count of one product in `period`.
    pub async fn product_sales(&self, product_id: &str, period: Period) -> DbResult<ProductSales> {
        let (quantity, revenue, invoices): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(ii.quantity), 0),
                   COALESCE(SUM(ii.line_total), 0),
                   COUNT(DISTINCT ii.invoice_id)
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            WHERE ii.product_id = ?1 AND i.invoice_date BETWEEN ?2 AND ?3
            "#,
        )
        .bind(product_id)
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductSales {
            product_id: product_id.to_string(),
            quantity_sold: quantity,
            revenue: Money::from_minor(revenue),
            invoice_count: invoices,
        })
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Customers by total purchases, all time.
    pub async fn top_customers(&self, limit: u32) -> DbResult<Vec<TopCustomer>> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, COUNT(i.id), COALESCE(SUM(i.total), 0) AS purchases
            FROM customers c
            JOIN invoices i ON i.customer_id = c.id
            GROUP BY c.id
            ORDER BY purchases DESC, c.name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(customer_id, name, invoice_count, total)| TopCustomer {
                customer_id,
                name,
                invoice_count,
                total_purchases: Money::from_minor(total),
            })
            .collect())
    }

    /// Unpaid invoices bucketed by age on `today`.
    pub async fn debt_aging(&self, today: NaiveDate) -> DbResult<AgingReport> {
        let rows: Vec<OutstandingRow> = sqlx::query_as(&format!(
            r#"
            SELECT id, number, customer_name, invoice_date, outstanding FROM (
                SELECT i.id, i.number, c.name AS customer_name, i.invoice_date,
                       i.sequence, i.seq_year,
                       i.total - {INVOICE_RETURNED_SQL} - ({INVOICE_PAID_SQL}) AS outstanding
                FROM invoices i
                JOIN customers c ON c.id = i.customer_id
            )
            WHERE outstanding > 0
            ORDER BY invoice_date, seq_year, sequence
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut report = AgingReport::default();
        for row in rows {
            report.push(AgedInvoice {
                age_days: (today - row.invoice_date).num_days().max(0),
                bucket: debt_age_bucket(row.invoice_date, today),
                outstanding: Money::from_minor(row.outstanding),
                invoice_id: row.id,
                number: row.number,
                customer_name: row.customer_name,
                invoice_date: row.invoice_date,
            });
        }
        Ok(report)
    }

    /// Aging as of the current UTC date.
    pub async fn debt_aging_today(&self) -> DbResult<AgingReport> {
        self.debt_aging(Utc::now().date_naive()).await
    }

    // =========================================================================
    // Financial
    // =========================================================================

    /// Profit and loss of invoices dated in `period`.
    ///
    /// Cost of goods uses each product's current cost price and leaves out
    /// units that came back, so a fully returned sale contributes nothing.
    pub async fn profit_loss(&self, period: Period) -> DbResult<ProfitLoss> {
        let (sales, collected, returns): (i64, i64, i64) = sqlx::query_as(&format!(
            r#"
            SELECT COALESCE(SUM(i.total), 0),
                   COALESCE(SUM({INVOICE_PAID_SQL}), 0),
                   COALESCE(SUM({INVOICE_RETURNED_SQL}), 0)
            FROM invoices i
            WHERE i.invoice_date BETWEEN ?1 AND ?2
            "#
        ))
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;

        let cost: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                (ii.quantity - (SELECT COALESCE(SUM(ri.quantity), 0)
                                FROM return_items ri WHERE ri.invoice_item_id = ii.id))
                * p.cost_price), 0)
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            JOIN products p ON p.id = ii.product_id
            WHERE i.invoice_date BETWEEN ?1 AND ?2
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProfitLoss::new(
            period.from,
            period.to,
            Money::from_minor(sales),
            Money::from_minor(collected),
            Money::from_minor(cost),
            Money::from_minor(returns),
        ))
    }

    /// Payments received and refunds paid out in `period`.
    pub async fn cashflow(&self, period: Period) -> DbResult<Cashflow> {
        let (inflow, outflow): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM payments WHERE payment_date BETWEEN ?1 AND ?2),
                (SELECT COALESCE(SUM(refund), 0) FROM returns WHERE return_date BETWEEN ?1 AND ?2)
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(Cashflow::new(
            period.from,
            period.to,
            Money::from_minor(inflow),
            Money::from_minor(outflow),
        ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use khalifa_core::ledger::AgingBucket;
    use khalifa_core::{CustomerInput, InvoiceDraft, PaymentInput, PaymentMethod, Product, ProductInput};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn year() -> Period {
        Period::new(date(1, 1), date(12, 31)).unwrap()
    }

    struct Fixture {
        db: Database,
        customer_id: String,
        cup: Product,
        plate: Product,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(CustomerInput {
                name: "Karim Nabil".to_string(),
                phone: "01088888888".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let cup = db
            .products()
            .create(ProductInput {
                sku: "CUP-01".to_string(),
                name: "Cup".to_string(),
                category: Some("Kitchen".to_string()),
                price: Money::from_minor(1000),
                cost_price: Money::from_minor(600),
                opening_stock: 10,
                min_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        let plate = db
            .products()
            .create(ProductInput {
                sku: "PLT-01".to_string(),
                name: "Plate".to_string(),
                category: Some("Tableware".to_string()),
                price: Money::from_minor(2500),
                cost_price: Money::from_minor(1500),
                opening_stock: 3,
                min_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        Fixture {
            db,
            customer_id: customer.id,
            cup,
            plate,
        }
    }

    async fn sell(f: &Fixture, on: NaiveDate, cups: i64, plates: i64) -> khalifa_core::Invoice {
        let mut draft = InvoiceDraft::for_customer(&f.customer_id, on);
        if cups > 0 {
            draft.add_product(&f.cup, cups).unwrap();
        }
        if plates > 0 {
            draft.add_product(&f.plate, plates).unwrap();
        }
        f.db.invoices().create(&draft.finalize().unwrap()).await.unwrap().invoice
    }

    async fn pay(f: &Fixture, invoice_id: &str, minor: i64, on: NaiveDate) {
        f.db.payments()
            .record(PaymentInput {
                customer_id: f.customer_id.clone(),
                invoice_id: Some(invoice_id.to_string()),
                amount: Money::from_minor(minor),
                payment_date: on,
                method: PaymentMethod::Cash,
                note: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sales_summary_and_months() {
        let f = fixture().await;
        let a = sell(&f, date(3, 5), 2, 0).await; // 20.00
        sell(&f, date(4, 1), 0, 1).await; // 25.00
        pay(&f, &a.id, 2000, date(3, 5)).await;

        let summary = f.db.reports().sales_summary(year()).await.unwrap();
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.total_sales, Money::from_minor(4500));
        assert_eq!(summary.collected, Money::from_minor(2000));
        assert_eq!(summary.outstanding, Money::from_minor(2500));
        assert_eq!(summary.average_invoice, Money::from_minor(2250));

        let months = f.db.reports().monthly_sales(2026).await.unwrap();
        assert_eq!(months.len(), 12);
        assert_eq!(months[2].invoice_count, 1);
        assert_eq!(months[2].collected, Money::from_minor(2000));
        assert_eq!(months[3].total_sales, Money::from_minor(2500));
        assert_eq!(months[0].invoice_count, 0);

        let days = f.db.reports().daily_sales(Period::new(date(3, 1), date(3, 31)).unwrap()).await.unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, date(3, 5));
    }

    #[tokio::test]
    async fn test_inventory_summary() {
        let f = fixture().await;
        sell(&f, date(3, 5), 0, 3).await; // plates to zero

        let summary = f.db.reports().inventory_summary().await.unwrap();
        assert_eq!(summary.product_count, 2);
        assert_eq!(summary.total_units, 10);
        assert_eq!(summary.cost_value, Money::from_minor(6000));
        assert_eq!(summary.retail_value, Money::from_minor(10000));
        assert_eq!(summary.low_stock_count, 0);
        assert_eq!(summary.out_of_stock_count, 1);

        let lines = f.db.reports().inventory_lines().await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].sku, "CUP-01");
        assert_eq!(lines[1].status, khalifa_core::StockStatus::Out);
    }

    #[tokio::test]
    async fn test_top_products_and_categories() {
        let f = fixture().await;
        sell(&f, date(3, 5), 4, 1).await;
        sell(&f, date(3, 6), 1, 2).await;

        let top = f.db.reports().top_products(year(), 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].sku, "CUP-01");
        assert_eq!(top[0].quantity_sold, 5);
        assert_eq!(top[0].revenue, Money::from_minor(5000));

        let categories = f.db.reports().category_performance(year()).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].category.as_deref(), Some("Tableware"));
        assert_eq!(categories[0].revenue, Money::from_minor(7500));

        let plate = f.db.reports().product_sales(&f.plate.id, year()).await.unwrap();
        assert_eq!(plate.quantity_sold, 3);
        assert_eq!(plate.invoice_count, 2);

        let customers = f.db.reports().top_customers(5).await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].total_purchases, Money::from_minor(12500));
    }

    #[tokio::test]
    async fn test_debt_aging_buckets() {
        let f = fixture().await;
        let old = sell(&f, date(1, 1), 1, 0).await;
        let recent = sell(&f, date(3, 20), 2, 0).await;
        let settled = sell(&f, date(3, 21), 1, 0).await;
        pay(&f, &old.id, 400, date(2, 1)).await;
        pay(&f, &settled.id, 1000, date(3, 21)).await;

        let report = f.db.reports().debt_aging(date(4, 1)).await.unwrap();
        assert_eq!(report.invoices.len(), 2);
        assert_eq!(report.invoices[0].invoice_id, old.id);
        assert_eq!(report.invoices[0].bucket, AgingBucket::Days90Plus);
        assert_eq!(report.invoices[0].outstanding, Money::from_minor(600));
        assert_eq!(report.invoices[1].invoice_id, recent.id);
        assert_eq!(report.invoices[1].bucket, AgingBucket::Current);
        assert_eq!(report.totals.total(), Money::from_minor(2600));
    }

    #[tokio::test]
    async fn test_profit_loss_and_cashflow() {
        let f = fixture().await;
        let invoice = sell(&f, date(5, 1), 2, 1).await; // 45.00, cost 27.00
        pay(&f, &invoice.id, 4500, date(5, 1)).await;

        // Bring one cup back with 10.00 refunded.
        let mut draft = f.db.returns().draft(&invoice.id, date(5, 3)).await.unwrap();
        let cup_line = draft
            .lines
            .iter()
            .find(|l| l.product_id == f.cup.id)
            .unwrap()
            .invoice_item_id
            .clone();
        draft.set_quantity(&cup_line, 1).unwrap();
        draft.set_refund(Money::from_minor(1000)).unwrap();
        f.db.returns().create(&draft.finalize().unwrap()).await.unwrap();

        let may = Period::new(date(5, 1), date(5, 31)).unwrap();
        let pl = f.db.reports().profit_loss(may).await.unwrap();
        assert_eq!(pl.sales, Money::from_minor(4500));
        assert_eq!(pl.collected, Money::from_minor(3500));
        assert_eq!(pl.cost_of_goods, Money::from_minor(2100));
        assert_eq!(pl.returns, Money::from_minor(1000));
        assert_eq!(pl.gross_profit, Money::from_minor(2400));
        assert_eq!(pl.net_profit, Money::from_minor(1400));

        let cash = f.db.reports().cashflow(may).await.unwrap();
        assert_eq!(cash.inflow, Money::from_minor(4500));
        assert_eq!(cash.outflow, Money::from_minor(1000));
        assert_eq!(cash.net, Money::from_minor(3500));
    }
}
