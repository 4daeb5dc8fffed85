//! # Manufacturing Order Repository
//!
//! Production runs of a BOM and the stock they move.
//!
//! ## Stock Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start (one transaction)                                               │
//! │   ├── requirements = item.qty × order.qty per component                │
//! │   ├── any shortage ──► InsufficientStock, nothing written              │
//! │   ├── components: current_stock −= required                           │
//! │   ├── consume movements (negative qty, component unit cost)            │
//! │   └── status in_progress, started_at                                   │
//! │                                                                         │
//! │  complete (one transaction)                                            │
//! │   ├── output: current_stock += order.qty                               │
//! │   ├── produce movement (unit cost = BOM rollup)                        │
//! │   └── status completed, completed_at                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::bom::{bom_item_details, fetch_bom};
use crate::repository::product::adjust_stock;
use titan_ext_core::manufacturing::{
    ensure_components_available, order_code, order_code_prefix, requirements, BomCost,
    ComponentRequirement, ManufacturingOrder, ManufacturingStockMovement, NewManufacturingOrder,
    OrderStatus, StockMovementKind,
};
use titan_ext_core::{new_id, CoreError};

const ORDER_COLUMNS: &str = "id, code, bom_id, product_id, quantity, status, notes, \
                             created_at, updated_at, started_at, completed_at, cancelled_at";

#[derive(Debug, Clone)]
pub struct ManufacturingOrderRepository {
    pool: SqlitePool,
}

impl ManufacturingOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ManufacturingOrderRepository { pool }
    }

    /// Creates a draft order producing the BOM's output product.
    ///
    /// ## Errors
    /// * `Domain(Inactive)` - the BOM is switched off
    pub async fn create_order(&self, input: &NewManufacturingOrder) -> DbResult<ManufacturingOrder> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let bom = fetch_bom(&mut *tx, &input.bom_id).await?;
        if !bom.is_active {
            return Err(CoreError::Inactive {
                entity: "BOM".to_string(),
                id: bom.id,
            }
            .into());
        }

        let now = Utc::now();
        let today = now.date_naive();
        // Deleted orders leave gaps, so continue from the highest issued number.
        let issued: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(CAST(substr(code, -4) AS INTEGER)), 0) \
             FROM manufacturing_orders WHERE code LIKE ?1 || '%'",
        )
        .bind(order_code_prefix(today))
        .fetch_one(&mut *tx)
        .await?;

        let order = ManufacturingOrder {
            id: new_id(),
            code: order_code(today, issued as u32 + 1),
            bom_id: bom.id,
            product_id: bom.product_id,
            quantity: input.quantity,
            status: OrderStatus::Draft,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO manufacturing_orders (
                id, code, bom_id, product_id, quantity, status, notes, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(&order.code)
        .bind(&order.bom_id)
        .bind(&order.product_id)
        .bind(order.quantity)
        .bind(order.status)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("code", &order.code))?;

        tx.commit().await?;

        info!(
            id = %order.id,
            code = %order.code,
            bom_id = %order.bom_id,
            quantity = order.quantity,
            "Manufacturing order created"
        );

        Ok(order)
    }

    /// Orders newest first, optionally in one status.
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> DbResult<Vec<ManufacturingOrder>> {
        let orders = sqlx::query_as::<_, ManufacturingOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM manufacturing_orders \
             WHERE ?1 IS NULL OR status = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn get_order(&self, id: &str) -> DbResult<ManufacturingOrder> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut *conn, id).await
    }

    /// draft → planned
    pub async fn plan(&self, id: &str) -> DbResult<ManufacturingOrder> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut *tx, id).await?;
        let order = set_status(&mut *tx, order, OrderStatus::Planned).await?;
        tx.commit().await?;

        info!(id = %id, code = %order.code, "Manufacturing order planned");
        Ok(order)
    }

    /// draft/planned → in_progress, consuming components.
    ///
    /// ## Errors
    /// * `Domain(InsufficientStock)` - a component falls short
    pub async fn start(&self, id: &str) -> DbResult<ManufacturingOrder> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut *tx, id).await?;
        order.status.transition(&order.id, OrderStatus::InProgress)?;

        let items = bom_item_details(&mut *tx, &order.bom_id).await?;
        let needs = requirements(&items, order.quantity);
        ensure_components_available(&needs)?;

        let now = Utc::now();
        for (need, item) in needs.iter().zip(&items) {
            adjust_stock(&mut *tx, &need.component_product_id, -need.required).await?;
            insert_movement(
                &mut *tx,
                &ManufacturingStockMovement {
                    id: new_id(),
                    order_id: order.id.clone(),
                    product_id: need.component_product_id.clone(),
                    kind: StockMovementKind::Consume,
                    quantity: -need.required,
                    unit_cost_cents: item.unit_cost_cents,
                    created_at: now,
                },
            )
            .await?;
        }

        let order = set_status(&mut *tx, order, OrderStatus::InProgress).await?;
        tx.commit().await?;

        info!(
            id = %id,
            code = %order.code,
            components = needs.len(),
            "Manufacturing order started"
        );

        Ok(order)
    }

    /// in_progress → completed, producing the output.
    pub async fn complete(&self, id: &str) -> DbResult<ManufacturingOrder> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut *tx, id).await?;
        order.status.transition(&order.id, OrderStatus::Completed)?;

        let items = bom_item_details(&mut *tx, &order.bom_id).await?;
        let unit_cost = BomCost::rollup(&order.bom_id, &items)?;

        adjust_stock(&mut *tx, &order.product_id, order.quantity).await?;
        insert_movement(
            &mut *tx,
            &ManufacturingStockMovement {
                id: new_id(),
                order_id: order.id.clone(),
                product_id: order.product_id.clone(),
                kind: StockMovementKind::Produce,
                quantity: order.quantity,
                unit_cost_cents: unit_cost.total_cents,
                created_at: Utc::now(),
            },
        )
        .await?;

        let order = set_status(&mut *tx, order, OrderStatus::Completed).await?;
        tx.commit().await?;

        info!(
            id = %id,
            code = %order.code,
            produced = order.quantity,
            unit_cost = %unit_cost.total(),
            "Manufacturing order completed"
        );

        Ok(order)
    }

    /// draft/planned → cancelled. Nothing was consumed, nothing to undo.
    pub async fn cancel(&self, id: &str) -> DbResult<ManufacturingOrder> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut *tx, id).await?;
        let order = set_status(&mut *tx, order, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        info!(id = %id, code = %order.code, "Manufacturing order cancelled");
        Ok(order)
    }

    /// Deletes a draft or cancelled order.
    pub async fn delete_order(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut *tx, id).await?;

        if order.status == OrderStatus::Completed {
            return Err(CoreError::OrderAlreadyCompleted(order.id).into());
        }
        if !order.status.is_deletable() {
            return Err(CoreError::in_use(
                "Manufacturing order",
                &order.id,
                format!("status is {}", order.status),
            )
            .into());
        }

        sqlx::query("DELETE FROM manufacturing_orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, code = %order.code, "Manufacturing order deleted");
        Ok(())
    }

    /// Component needs of the order against current stock.
    pub async fn requirements(&self, id: &str) -> DbResult<Vec<ComponentRequirement>> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order(&mut *conn, id).await?;
        let items = bom_item_details(&mut *conn, &order.bom_id).await?;
        Ok(requirements(&items, order.quantity))
    }

    pub async fn movements(&self, order_id: &str) -> DbResult<Vec<ManufacturingStockMovement>> {
        let movements = sqlx::query_as::<_, ManufacturingStockMovement>(
            r#"
            SELECT id, order_id, product_id, kind, quantity, unit_cost_cents, created_at
            FROM manufacturing_stock_movements
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<ManufacturingOrder> {
    sqlx::query_as::<_, ManufacturingOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM manufacturing_orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Manufacturing order", id))
}

/// Checks the transition and stamps the matching timestamp column.
async fn set_status(
    conn: &mut SqliteConnection,
    mut order: ManufacturingOrder,
    to: OrderStatus,
) -> DbResult<ManufacturingOrder> {
    let from = order.status;
    order.status = from.transition(&order.id, to)?;

    let now = Utc::now();
    order.updated_at = now;
    match to {
        OrderStatus::InProgress => order.started_at = Some(now),
        OrderStatus::Completed => order.completed_at = Some(now),
        OrderStatus::Cancelled => order.cancelled_at = Some(now),
        OrderStatus::Draft | OrderStatus::Planned => {}
    }

    sqlx::query(
        r#"
        UPDATE manufacturing_orders
        SET status = ?2, updated_at = ?3, started_at = ?4, completed_at = ?5, cancelled_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.status)
    .bind(order.updated_at)
    .bind(order.started_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .execute(&mut *conn)
    .await?;

    debug!(id = %order.id, from = %from, to = %to, "Manufacturing order status changed");
    Ok(order)
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &ManufacturingStockMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO manufacturing_stock_movements (
            id, order_id, product_id, kind, quantity, unit_cost_cents, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.order_id)
    .bind(&movement.product_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.unit_cost_cents)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use titan_ext_core::manufacturing::{BomPatch, NewBom, NewBomItem};
    use titan_ext_core::Product;

    struct Bakery {
        bread: Product,
        flour: Product,
        salt: Product,
        bom_id: String,
    }

    /// bread = 2 × flour ($1.50) + 1 × salt ($0.05)
    async fn bakery(db: &Database, flour_stock: i64) -> Bakery {
        let bread = fixtures::product(db, "BREAD", 0, 0).await;
        let flour = fixtures::product(db, "FLOUR", 150, flour_stock).await;
        let salt = fixtures::product(db, "SALT", 5, 100).await;

        let bom = db
            .boms()
            .create_bom(&NewBom {
                product_id: bread.id.clone(),
                name: "Bread".to_string(),
                description: None,
                items: vec![
                    NewBomItem {
                        component_product_id: flour.id.clone(),
                        quantity: 2,
                    },
                    NewBomItem {
                        component_product_id: salt.id.clone(),
                        quantity: 1,
                    },
                ],
            })
            .await
            .unwrap();

        Bakery {
            bread,
            flour,
            salt,
            bom_id: bom.bom.id,
        }
    }

    async fn draft(db: &Database, bom_id: &str, quantity: i64) -> ManufacturingOrder {
        db.manufacturing()
            .create_order(&NewManufacturingOrder {
                bom_id: bom_id.to_string(),
                quantity,
                notes: None,
            })
            .await
            .unwrap()
    }

    async fn stock(db: &Database, product: &Product) -> i64 {
        db.products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap()
            .current_stock
    }

    #[tokio::test]
    async fn test_order_codes_are_sequential() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;

        let first = draft(&db, &bakery.bom_id, 1).await;
        let second = draft(&db, &bakery.bom_id, 1).await;

        let prefix = order_code_prefix(Utc::now().date_naive());
        assert_eq!(first.code, format!("{prefix}0001"));
        assert_eq!(second.code, format!("{prefix}0002"));
        assert_eq!(first.status, OrderStatus::Draft);
        assert_eq!(first.product_id, bakery.bread.id);
    }

    #[tokio::test]
    async fn test_order_code_skips_deleted_numbers() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;

        let first = draft(&db, &bakery.bom_id, 1).await;
        let second = draft(&db, &bakery.bom_id, 1).await;
        db.manufacturing().delete_order(&first.id).await.unwrap();

        let third = draft(&db, &bakery.bom_id, 1).await;
        let prefix = order_code_prefix(Utc::now().date_naive());
        assert_eq!(second.code, format!("{prefix}0002"));
        assert_eq!(third.code, format!("{prefix}0003"));
    }

    #[tokio::test]
    async fn test_full_lifecycle_moves_stock() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;
        let repo = db.manufacturing();

        let order = draft(&db, &bakery.bom_id, 10).await;
        repo.plan(&order.id).await.unwrap();

        let started = repo.start(&order.id).await.unwrap();
        assert_eq!(started.status, OrderStatus::InProgress);
        assert!(started.started_at.is_some());
        assert_eq!(stock(&db, &bakery.flour).await, 80);
        assert_eq!(stock(&db, &bakery.salt).await, 90);

        let completed = repo.complete(&order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(stock(&db, &bakery.bread).await, 10);

        let movements = repo.movements(&order.id).await.unwrap();
        assert_eq!(movements.len(), 3);
        let produce = movements
            .iter()
            .find(|m| m.kind == StockMovementKind::Produce)
            .unwrap();
        assert_eq!(produce.quantity, 10);
        assert_eq!(produce.unit_cost_cents, 305);
        let consumed: i64 = movements
            .iter()
            .filter(|m| m.kind == StockMovementKind::Consume)
            .map(|m| m.quantity)
            .sum();
        assert_eq!(consumed, -30);
    }

    #[tokio::test]
    async fn test_start_with_shortage_changes_nothing() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 5).await;
        let order = draft(&db, &bakery.bom_id, 10).await;

        let needs = db.manufacturing().requirements(&order.id).await.unwrap();
        let flour_need = needs
            .iter()
            .find(|n| n.component_product_id == bakery.flour.id)
            .unwrap();
        assert_eq!(flour_need.required, 20);
        assert_eq!(flour_need.shortage, 15);

        let err = db.manufacturing().start(&order.id).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock {
                sku,
                available,
                requested,
            }) => {
                assert_eq!(sku, "FLOUR");
                assert_eq!(available, 5);
                assert_eq!(requested, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(stock(&db, &bakery.flour).await, 5);
        assert_eq!(stock(&db, &bakery.salt).await, 100);
        let reloaded = db.manufacturing().get_order(&order.id).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Draft);
        assert!(db.manufacturing().movements(&order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;
        let repo = db.manufacturing();

        let order = draft(&db, &bakery.bom_id, 1).await;
        assert!(matches!(
            repo.complete(&order.id).await,
            Err(DbError::Domain(CoreError::InvalidOrderTransition { .. }))
        ));

        repo.start(&order.id).await.unwrap();
        assert!(matches!(
            repo.cancel(&order.id).await,
            Err(DbError::Domain(CoreError::InvalidOrderTransition { .. }))
        ));

        repo.complete(&order.id).await.unwrap();
        assert!(matches!(
            repo.complete(&order.id).await,
            Err(DbError::Domain(CoreError::OrderAlreadyCompleted(_)))
        ));
        assert!(matches!(
            repo.delete_order(&order.id).await,
            Err(DbError::Domain(CoreError::OrderAlreadyCompleted(_)))
        ));
    }

    #[tokio::test]
    async fn test_cancel_and_delete() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;
        let repo = db.manufacturing();

        let order = draft(&db, &bakery.bom_id, 1).await;
        repo.plan(&order.id).await.unwrap();
        let cancelled = repo.cancel(&order.id).await.unwrap();
        assert!(cancelled.cancelled_at.is_some());

        let cancelled_only = repo.list_orders(Some(OrderStatus::Cancelled)).await.unwrap();
        assert_eq!(cancelled_only.len(), 1);

        repo.delete_order(&order.id).await.unwrap();
        assert!(repo.list_orders(None).await.unwrap().is_empty());
        assert_eq!(stock(&db, &bakery.flour).await, 100);
    }

    #[tokio::test]
    async fn test_referenced_bom_cannot_be_deleted() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;
        draft(&db, &bakery.bom_id, 1).await;

        let err = db.boms().delete_bom(&bakery.bom_id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InUse { .. })));
    }

    #[tokio::test]
    async fn test_inactive_bom_rejects_new_orders() {
        let db = fixtures::db().await;
        let bakery = bakery(&db, 100).await;
        db.boms()
            .update_bom(
                &bakery.bom_id,
                &BomPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = db
            .manufacturing()
            .create_order(&NewManufacturingOrder {
                bom_id: bakery.bom_id.clone(),
                quantity: 1,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Inactive { .. })));
    }
}
