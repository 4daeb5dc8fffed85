//! # Order Repository
//!
//! Host sales orders. The loyalty module reads them to compute yearly
//! purchases; only `paid` orders count.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use titan_ext_core::loyalty::year_bounds;
use titan_ext_core::validation::{checked_amount, validate_cents, validate_quantity};
use titan_ext_core::{new_id, Money, Order, OrderItem, PaymentStatus};

/// A line of a new host order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A new host order. `created_at` is explicit so imports and tests can
/// place orders in past years.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub lines: Vec<NewOrderLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order with its lines; the total is the sum of the lines.
    pub async fn insert(&self, input: &NewOrder) -> DbResult<Order> {
        let mut total = Money::zero();
        for line in &input.lines {
            validate_quantity("quantity", line.quantity)?;
            validate_cents("unit_price_cents", line.unit_price_cents)?;
            let line_total = checked_amount(
                "total_cents",
                Money::from_cents(line.unit_price_cents).checked_multiply_quantity(line.quantity),
            )?;
            total = checked_amount("total_cents", total.checked_add(line_total))?;
        }

        let id = new_id();
        let order = Order {
            code: format!("ORD-{}", &id[..8].to_uppercase()),
            id,
            customer_id: input.customer_id.clone(),
            total_cents: total.cents(),
            payment_status: input.payment_status,
            created_at: input.created_at,
        };

        debug!(id = %order.id, total = %total, "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, code, customer_id, total_cents, payment_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.id)
        .bind(&order.code)
        .bind(&order.customer_id)
        .bind(order.total_cents)
        .bind(order.payment_status)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(new_id())
            .bind(&order.id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, code, customer_id, total_cents, payment_status, created_at
            FROM orders WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
    }

    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents
            FROM order_items WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sum of a customer's paid orders in a UTC calendar year.
    pub async fn yearly_purchases(&self, customer_id: &str, year: i32) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        yearly_purchases(&mut *conn, customer_id, year).await
    }
}

/// Sum of `total_cents` over paid orders created in `year` (UTC).
pub(crate) async fn yearly_purchases(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
) -> DbResult<Money> {
    let (start, end) = year_bounds(year)?;

    let cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(total_cents), 0)
        FROM orders
        WHERE customer_id = ?1
          AND payment_status = ?2
          AND created_at >= ?3
          AND created_at < ?4
        "#,
    )
    .bind(customer_id)
    .bind(PaymentStatus::Paid)
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Money::from_cents(cents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_insert_with_lines() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", true).await;
        let product = fixtures::product(&db, "BEER-24", 1000, 50).await;

        let order = db
            .orders()
            .insert(&NewOrder {
                customer_id: Some(customer.id.clone()),
                payment_status: PaymentStatus::Paid,
                lines: vec![NewOrderLine {
                    product_id: product.id.clone(),
                    quantity: 3,
                    unit_price_cents: 2000,
                }],
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(order.total_cents, 6000);
        assert!(order.code.starts_with("ORD-"));
        assert_eq!(db.orders().items(&order.id).await.unwrap().len(), 1);
        assert_eq!(db.orders().get_by_id(&order.id).await.unwrap().total_cents, 6000);
    }

    #[tokio::test]
    async fn test_yearly_purchases_counts_paid_orders_in_year() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", true).await;
        let product = fixtures::product(&db, "BEER-24", 1000, 50).await;

        let place = |status: PaymentStatus, at: DateTime<Utc>, qty: i64| NewOrder {
            customer_id: Some(customer.id.clone()),
            payment_status: status,
            lines: vec![NewOrderLine {
                product_id: product.id.clone(),
                quantity: qty,
                unit_price_cents: 1000,
            }],
            created_at: at,
        };

        let in_year = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let first_instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let next_year = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        for order in [
            place(PaymentStatus::Paid, in_year, 2),
            place(PaymentStatus::Paid, first_instant, 1),
            place(PaymentStatus::Unpaid, in_year, 5),
            place(PaymentStatus::Refunded, in_year, 5),
            place(PaymentStatus::Paid, next_year, 7),
        ] {
            db.orders().insert(&order).await.unwrap();
        }

        let purchases = db.orders().yearly_purchases(&customer.id, 2025).await.unwrap();
        assert_eq!(purchases.cents(), 3000);

        let purchases = db.orders().yearly_purchases(&customer.id, 2026).await.unwrap();
        assert_eq!(purchases.cents(), 7000);
    }
}
