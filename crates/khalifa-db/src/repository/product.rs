//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD with soft delete for products that appear on documents
//! - Search with category and stock-status filters
//! - Stock-take (absolute count) and manual adjustments
//!
//! Stock moves through invoices and returns inside their own transactions;
//! see [`InvoiceRepository`](super::invoice::InvoiceRepository) and
//! [`ReturnRepository`](super::returns::ReturnRepository).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use khalifa_core::validation;
use khalifa_core::{Money, Product, ProductInput, StockStatus};

use super::{like_pattern, stored_money, stored_text, with_duplicate_value, DeleteOutcome};
use crate::error::{DbError, DbResult};
use crate::pool::WriteLock;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, category, description, price, cost_price,
    quantity, min_stock, is_active, created_at, updated_at
"#;

/// SQL condition for each stock status, matching `classify_stock`.
fn status_condition(status: StockStatus) -> &'static str {
    match status {
        StockStatus::Out => "quantity <= 0",
        StockStatus::Low => "quantity > 0 AND quantity < min_stock",
        StockStatus::Ok => "quantity > 0 AND quantity >= min_stock",
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    category: Option<String>,
    description: Option<String>,
    price: i64,
    cost_price: i64,
    quantity: i64,
    min_stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let price = stored_money("product", &row.id, "price", row.price)?;
        let cost_price = stored_money("product", &row.id, "cost_price", row.cost_price)?;
        if row.min_stock < 0 {
            return Err(DbError::corrupt("product", &row.id, "min_stock is negative"));
        }
        let sku = stored_text("product", &row.id, "sku", row.sku)?;
        let name = stored_text("product", &row.id, "name", row.name)?;

        Ok(Product {
            id: row.id,
            sku,
            name,
            category: row.category,
            description: row.description,
            price,
            cost_price,
            // Negative after a warned oversell.
            quantity: row.quantity,
            min_stock: row.min_stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Product search criteria. Empty criteria list every active product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Matched against name, SKU and description.
    pub query: Option<String>,
    pub category: Option<String>,
    pub status: Option<StockStatus>,
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

impl ProductFilter {
    pub fn text(query: impl Into<String>) -> Self {
        ProductFilter {
            query: Some(query.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let results = repo.search(&ProductFilter::text("cup")).await?;
/// let low = repo.low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    write_lock: WriteLock,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, write_lock: WriteLock) -> Self {
        ProductRepository { pool, write_lock }
    }

    /// Adds a product with its opening stock. The SKU must be unique.
    pub async fn create(&self, input: ProductInput) -> DbResult<Product> {
        let input = input.validated()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, sku = %input.sku, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category, description, price, cost_price,
                quantity, min_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)
            "#,
        )
        .bind(&id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.description)
        .bind(input.price.minor())
        .bind(input.cost_price.minor())
        .bind(input.opening_stock)
        .bind(input.min_stock)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| with_duplicate_value(e.into(), &input.sku))?;

        Ok(Product {
            id,
            sku: input.sku,
            name: input.name,
            category: input.category,
            description: input.description,
            price: input.price,
            cost_price: input.cost_price,
            quantity: input.opening_stock,
            min_stock: input.min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets a product by ID or fails with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"))
                .bind(sku.trim())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::try_from).transpose()
    }

    /// Updates catalogue details and prices.
    ///
    /// `opening_stock` is ignored here: stock changes only through
    /// documents, [`set_stock`](Self::set_stock) or
    /// [`adjust_stock`](Self::adjust_stock). Existing invoices keep the
    /// prices they captured.
    pub async fn update(&self, id: &str, input: ProductInput) -> DbResult<Product> {
        let input = input.validated()?;
        debug!(id = %id, sku = %input.sku, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2, name = ?3, category = ?4, description = ?5,
                price = ?6, cost_price = ?7, min_stock = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.description)
        .bind(input.price.minor())
        .bind(input.cost_price.minor())
        .bind(input.min_stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| with_duplicate_value(e.into(), &input.sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(id).await
    }

    /// Deletes a product, or deactivates one that appears on documents.
    pub async fn delete(&self, id: &str) -> DbResult<DeleteOutcome> {
        let _guard = self.write_lock.acquire().await;
        let mut tx = self.pool.begin().await?;

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM invoice_items WHERE product_id = ?1)
                 + (SELECT COUNT(*) FROM return_items WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let (result, outcome) = if references > 0 {
            let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            (result, DeleteOutcome::Deactivated)
        } else {
            let result = sqlx::query("DELETE FROM products WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (result, DeleteOutcome::Removed)
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;
        info!(id = %id, ?outcome, "Product deleted");
        Ok(outcome)
    }

    /// Makes a deactivated product sellable again.
    pub async fn reactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 1, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Lists products by name.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Product>> {
        self.search(&ProductFilter {
            include_inactive,
            ..Default::default()
        })
        .await
    }

    /// Searches products by text, category and stock status.
    pub async fn search(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let query = match &filter.query {
            Some(q) => validation::validate_search_query(q)?,
            None => String::new(),
        };
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        debug!(query = %query, ?category, status = ?filter.status, "Searching products");

        let mut sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE (?1 OR is_active = 1)
              AND (?2 = '' OR name LIKE ?3 ESCAPE '\'
                           OR sku LIKE ?3 ESCAPE '\'
                           OR description LIKE ?3 ESCAPE '\')
              AND (?4 IS NULL OR category = ?4)
            "#
        );
        if let Some(status) = filter.status {
            sql.push_str(" AND ");
            sql.push_str(status_condition(status));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE LIMIT ?5");

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(filter.include_inactive)
            .bind(&query)
            .bind(like_pattern(&query))
            .bind(category)
            .bind(filter.limit.map(i64::from).unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Search returned products");
        rows.into_iter().map(Product::try_from).collect()
    }

    /// Active products with 0 < quantity < min_stock, lowest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        self.by_status(StockStatus::Low).await
    }

    /// Active products with quantity ≤ 0.
    pub async fn out_of_stock(&self) -> DbResult<Vec<Product>> {
        self.by_status(StockStatus::Out).await
    }

    async fn by_status(&self, status: StockStatus) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND {} ORDER BY quantity, name",
            status_condition(status)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Distinct categories of active products.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT category FROM products
            WHERE is_active = 1 AND category IS NOT NULL
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Sets stock to a counted quantity (stock-take).
    pub async fn set_stock(&self, id: &str, quantity: i64) -> DbResult<Product> {
        validation::validate_stock_level("quantity", quantity)?;
        debug!(id = %id, quantity, "Setting stock");

        let result = sqlx::query("UPDATE products SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        self.get(id).await
    }

    /// Adds `delta` to stock (negative for breakage or loss). The result may
    /// not go below zero.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE products SET quantity = quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND quantity + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either missing or the adjustment would go negative.
            let product = self.get(id).await?;
            return Err(DbError::Validation(khalifa_core::ValidationError::Negative {
                field: format!("stock of {}", product.sku),
            }));
        }
        self.get(id).await
    }

    /// Σ cost price × quantity on hand over active products.
    pub async fn inventory_value(&self) -> DbResult<Money> {
        let value: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(cost_price * MAX(quantity, 0)), 0) FROM products WHERE is_active = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_minor(value))
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
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

    fn input(sku: &str, name: &str, price: i64, stock: i64) -> ProductInput {
        ProductInput {
            sku: sku.to_string(),
            name: name.to_string(),
            category: Some("Kitchen".to_string()),
            description: None,
            price: Money::from_minor(price),
            cost_price: Money::from_minor(price / 2),
            opening_stock: stock,
            min_stock: 5,
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = db().await;
        let p = db.products().create(input("CUP-01", "Tea cup", 1999, 12)).await.unwrap();

        let fetched = db.products().get(&p.id).await.unwrap();
        assert_eq!(fetched.price, Money::from_minor(1999));
        assert_eq!(fetched.quantity, 12);
        assert_eq!(fetched.stock_status(), StockStatus::Ok);

        let by_sku = db.products().get_by_sku("CUP-01").await.unwrap().unwrap();
        assert_eq!(by_sku.id, p.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_leaves_state_unchanged() {
        let db = db().await;
        db.products().create(input("CUP-01", "Tea cup", 1999, 12)).await.unwrap();

        let err = db
            .products()
            .create(input("CUP-01", "Coffee cup", 2500, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));

        let all = db.products().list(true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Tea cup");
    }

    #[tokio::test]
    async fn test_stock_classification_queries() {
        let db = db().await;
        let repo = db.products();
        repo.create(input("A-1", "Low one", 100, 2)).await.unwrap();
        repo.create(input("A-2", "Empty one", 100, 0)).await.unwrap();
        repo.create(input("A-3", "Full one", 100, 5)).await.unwrap();

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "A-1");
        assert_eq!(low[0].stock_status(), StockStatus::Low);

        let out = repo.out_of_stock().await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stock_status(), StockStatus::Out);

        let ok = repo
            .search(&ProductFilter {
                status: Some(StockStatus::Ok),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].sku, "A-3");
    }

    #[tokio::test]
    async fn test_search_by_text_and_category() {
        let db = db().await;
        let repo = db.products();
        repo.create(input("CUP-01", "Tea cup", 100, 10)).await.unwrap();
        let mut plate = input("PLT-01", "Dinner plate", 300, 10);
        plate.category = Some("Tableware".to_string());
        repo.create(plate).await.unwrap();

        assert_eq!(repo.search(&ProductFilter::text("cup")).await.unwrap().len(), 1);
        assert_eq!(repo.search(&ProductFilter::text("PLT")).await.unwrap().len(), 1);

        let tableware = repo
            .search(&ProductFilter {
                category: Some("Tableware".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tableware.len(), 1);
        assert_eq!(repo.categories().await.unwrap(), vec!["Kitchen", "Tableware"]);
    }

    #[tokio::test]
    async fn test_set_and_adjust_stock() {
        let db = db().await;
        let repo = db.products();
        let p = repo.create(input("CUP-01", "Tea cup", 1000, 10)).await.unwrap();

        assert_eq!(repo.set_stock(&p.id, 3).await.unwrap().quantity, 3);
        assert_eq!(repo.adjust_stock(&p.id, 4).await.unwrap().quantity, 7);

        let err = repo.adjust_stock(&p.id, -8).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(repo.get(&p.id).await.unwrap().quantity, 7);

        assert!(repo.set_stock(&p.id, -1).await.unwrap_err().is_validation());
        assert!(matches!(
            repo.adjust_stock("missing", 1).await,
            Err(DbError::NotFound { .. })
        ));

        // 7 units at cost 5.00
        assert_eq!(repo.inventory_value().await.unwrap(), Money::from_minor(3500));
    }

    #[tokio::test]
    async fn test_unreferenced_product_is_removed() {
        let db = db().await;
        let p = db.products().create(input("CUP-01", "Tea cup", 1000, 10)).await.unwrap();
        assert_eq!(db.products().delete(&p.id).await.unwrap(), DeleteOutcome::Removed);
        assert!(db.products().get_by_id(&p.id).await.unwrap().is_none());
        assert!(matches!(
            db.products().delete(&p.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
