//! # Product Repository
//!
//! Host products as the modules see them: stock for manufacturing,
//! unit cost for BOM rollups, and the container link target.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use titan_ext_core::validation::{validate_cents, validate_name, validate_sku};
use titan_ext_core::{new_id, Product};

const PRODUCT_COLUMNS: &str = "id, sku, name, price_cents, cost_cents, current_stock, \
                               is_active, created_at, updated_at";

/// Fields for a new host product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub current_stock: i64,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    ///
    /// ## Errors
    /// * `UniqueViolation` - SKU already taken
    pub async fn insert(&self, input: &NewProduct) -> DbResult<Product> {
        validate_sku(&input.sku)?;
        validate_name("name", &input.name)?;
        validate_cents("price_cents", input.price_cents)?;
        validate_cents("cost_cents", input.cost_cents)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            current_stock: input.current_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, cost_cents, current_stock,
                is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.current_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("sku", &product.sku))?;

        Ok(product)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Shared helpers (run on a caller's transaction)
// =============================================================================

/// Loads a product or fails with `NotFound`.
pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Product", id))
}

/// Adds `delta` (signed) to a product's stock.
pub(crate) async fn adjust_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
) -> DbResult<()> {
    debug!(product_id = %product_id, delta = delta, "Adjusting product stock");

    let result = sqlx::query(
        "UPDATE products SET current_stock = current_stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(product_id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }
    Ok(())
}

/// Overwrites a product's unit cost.
pub(crate) async fn set_cost(
    conn: &mut SqliteConnection,
    product_id: &str,
    cost_cents: i64,
) -> DbResult<()> {
    let result =
        sqlx::query("UPDATE products SET cost_cents = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(product_id)
            .bind(cost_cents)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = fixtures::db().await;
        let product = fixtures::product(&db, "FLOUR-1KG", 150, 20).await;

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "FLOUR-1KG");
        assert_eq!(loaded.current_stock, 20);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = fixtures::db().await;
        fixtures::product(&db, "SALT", 10, 0).await;

        let err = db
            .products()
            .insert(&NewProduct {
                sku: "SALT".to_string(),
                name: "Salt again".to_string(),
                price_cents: 20,
                cost_cents: 10,
                current_stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_missing_product() {
        let db = fixtures::db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = adjust_stock(&mut *conn, "missing", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
