//! # BOM Repository
//!
//! Bills of materials: headers, component lines, cost rollup and the
//! circular-dependency guard.
//!
//! Every write that adds an edge `output → component` loads the full
//! dependency graph (active and inactive BOMs) inside its transaction and
//! rejects the edge if the component already depends on the output.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::{fetch_product, set_cost};
use titan_ext_core::manufacturing::{
    Bom, BomCost, BomDetail, BomGraph, BomItemDetail, BomPatch, NewBom, NewBomItem,
};
use titan_ext_core::validation::validate_quantity;
use titan_ext_core::{new_id, CoreError, Product};

const BOM_COLUMNS: &str = "id, product_id, name, description, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct BomRepository {
    pool: SqlitePool,
}

impl BomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BomRepository { pool }
    }

    /// Creates a BOM with its initial component lines.
    ///
    /// ## Errors
    /// * `NotFound` - the output or a component product does not exist
    /// * `Domain(CircularDependency)` - a component is the output or needs it
    /// * `UniqueViolation` - the same component listed twice
    pub async fn create_bom(&self, input: &NewBom) -> DbResult<BomDetail> {
        input.validate()?;

        let now = Utc::now();
        let bom = Bom {
            id: new_id(),
            product_id: input.product_id.clone(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        fetch_product(&mut *tx, &bom.product_id).await?;

        sqlx::query(
            r#"
            INSERT INTO boms (id, product_id, name, description, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&bom.id)
        .bind(&bom.product_id)
        .bind(&bom.name)
        .bind(&bom.description)
        .bind(bom.is_active)
        .bind(bom.created_at)
        .bind(bom.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut graph = load_graph(&mut *tx).await?;
        for item in &input.items {
            fetch_product(&mut *tx, &item.component_product_id).await?;
            graph.ensure_acyclic(&bom.product_id, &item.component_product_id)?;
            insert_item(&mut *tx, &bom.id, item).await?;
            graph.add_edge(bom.product_id.as_str(), item.component_product_id.as_str());
        }

        let detail = load_detail(&mut *tx, bom).await?;
        tx.commit().await?;

        info!(
            id = %detail.bom.id,
            product_id = %detail.bom.product_id,
            items = detail.items.len(),
            cost = %detail.cost.total(),
            "BOM created"
        );

        Ok(detail)
    }

    /// Lists BOMs, optionally for one output product.
    pub async fn list_boms(&self, product_id: Option<&str>) -> DbResult<Vec<Bom>> {
        let boms = sqlx::query_as::<_, Bom>(&format!(
            "SELECT {BOM_COLUMNS} FROM boms \
             WHERE ?1 IS NULL OR product_id = ?1 \
             ORDER BY name"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(boms)
    }

    /// A BOM with its lines and rolled-up cost.
    pub async fn get_bom(&self, id: &str) -> DbResult<BomDetail> {
        let mut conn = self.pool.acquire().await?;
        let bom = fetch_bom(&mut *conn, id).await?;
        load_detail(&mut *conn, bom).await
    }

    pub async fn update_bom(&self, id: &str, patch: &BomPatch) -> DbResult<Bom> {
        patch.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut bom = fetch_bom(&mut *tx, id).await?;

        if let Some(name) = &patch.name {
            bom.name = name.trim().to_string();
        }
        if let Some(description) = patch.description_change() {
            bom.description = description;
        }
        if let Some(active) = patch.is_active {
            bom.is_active = active;
        }
        bom.updated_at = Utc::now();

        sqlx::query(
            "UPDATE boms SET name = ?2, description = ?3, is_active = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(&bom.id)
        .bind(&bom.name)
        .bind(&bom.description)
        .bind(bom.is_active)
        .bind(bom.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %id, is_active = bom.is_active, "BOM updated");
        Ok(bom)
    }

    /// Deletes a BOM and its lines.
    ///
    /// ## Errors
    /// * `Domain(InUse)` - a manufacturing order references the BOM
    pub async fn delete_bom(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        fetch_bom(&mut *tx, id).await?;

        let orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM manufacturing_orders WHERE bom_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if orders > 0 {
            return Err(CoreError::in_use(
                "BOM",
                id,
                format!("{orders} manufacturing orders reference it"),
            )
            .into());
        }

        sqlx::query("DELETE FROM boms WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, "BOM deleted");
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Adds a component line.
    ///
    /// ## Errors
    /// * `Domain(CircularDependency)` - component is the output or needs it
    /// * `UniqueViolation` - component already on this BOM
    pub async fn add_item(&self, bom_id: &str, item: &NewBomItem) -> DbResult<BomItemDetail> {
        item.validate()?;

        let mut tx = self.pool.begin().await?;
        let bom = fetch_bom(&mut *tx, bom_id).await?;
        fetch_product(&mut *tx, &item.component_product_id).await?;

        let graph = load_graph(&mut *tx).await?;
        graph.ensure_acyclic(&bom.product_id, &item.component_product_id)?;

        let item_id = insert_item(&mut *tx, bom_id, item).await?;
        let detail = fetch_item_detail(&mut *tx, bom_id, &item_id).await?;
        touch(&mut *tx, bom_id).await?;

        tx.commit().await?;

        info!(
            bom_id = %bom_id,
            component = %detail.component_sku,
            quantity = detail.quantity,
            "BOM item added"
        );

        Ok(detail)
    }

    pub async fn update_item_quantity(
        &self,
        bom_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<BomItemDetail> {
        validate_quantity("quantity", quantity)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE bom_items SET quantity = ?3 WHERE id = ?1 AND bom_id = ?2")
            .bind(item_id)
            .bind(bom_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BOM item", item_id));
        }

        let detail = fetch_item_detail(&mut *tx, bom_id, item_id).await?;
        touch(&mut *tx, bom_id).await?;
        tx.commit().await?;

        debug!(bom_id = %bom_id, item_id = %item_id, quantity = quantity, "BOM item updated");
        Ok(detail)
    }

    pub async fn remove_item(&self, bom_id: &str, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM bom_items WHERE id = ?1 AND bom_id = ?2")
            .bind(item_id)
            .bind(bom_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BOM item", item_id));
        }

        touch(&mut *tx, bom_id).await?;
        tx.commit().await?;

        debug!(bom_id = %bom_id, item_id = %item_id, "BOM item removed");
        Ok(())
    }

    // =========================================================================
    // Cost & Dependencies
    // =========================================================================

    /// Single-level cost of one unit of output at current component costs.
    pub async fn bom_cost(&self, bom_id: &str) -> DbResult<BomCost> {
        let mut conn = self.pool.acquire().await?;
        fetch_bom(&mut *conn, bom_id).await?;
        let items = bom_item_details(&mut *conn, bom_id).await?;
        Ok(BomCost::rollup(bom_id, &items)?)
    }

    /// Writes the rolled-up cost into the output product's `cost_cents`.
    pub async fn sync_product_cost(&self, bom_id: &str) -> DbResult<Product> {
        let mut tx = self.pool.begin().await?;

        let bom = fetch_bom(&mut *tx, bom_id).await?;
        let items = bom_item_details(&mut *tx, bom_id).await?;
        let cost = BomCost::rollup(bom_id, &items)?;

        set_cost(&mut *tx, &bom.product_id, cost.total_cents).await?;
        let product = fetch_product(&mut *tx, &bom.product_id).await?;

        tx.commit().await?;

        info!(
            bom_id = %bom_id,
            product_id = %product.id,
            cost = %cost.total(),
            "Product cost synced from BOM"
        );

        Ok(product)
    }

    /// Whether `component_product_id` may be added to a BOM producing
    /// `product_id`. False when the edge would close a cycle.
    pub async fn check_circular_dependency(
        &self,
        product_id: &str,
        component_product_id: &str,
    ) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let graph = load_graph(&mut *conn).await?;
        Ok(graph.check_circular_dependency(product_id, component_product_id))
    }

    pub async fn would_create_cycle(
        &self,
        product_id: &str,
        component_product_id: &str,
    ) -> DbResult<bool> {
        Ok(!self
            .check_circular_dependency(product_id, component_product_id)
            .await?)
    }
}

// =============================================================================
// Shared helpers (run on a caller's transaction)
// =============================================================================

pub(crate) async fn fetch_bom(conn: &mut SqliteConnection, id: &str) -> DbResult<Bom> {
    sqlx::query_as::<_, Bom>(&format!("SELECT {BOM_COLUMNS} FROM boms WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("BOM", id))
}

/// BOM lines joined with their component products, in insertion order.
pub(crate) async fn bom_item_details(
    conn: &mut SqliteConnection,
    bom_id: &str,
) -> DbResult<Vec<BomItemDetail>> {
    let items = sqlx::query_as::<_, BomItemDetail>(
        r#"
        SELECT i.id,
               i.component_product_id,
               p.sku AS component_sku,
               p.name AS component_name,
               i.quantity,
               p.cost_cents AS unit_cost_cents,
               p.current_stock
        FROM bom_items i
        JOIN products p ON p.id = i.component_product_id
        WHERE i.bom_id = ?1
        ORDER BY i.created_at, i.rowid
        "#,
    )
    .bind(bom_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn fetch_item_detail(
    conn: &mut SqliteConnection,
    bom_id: &str,
    item_id: &str,
) -> DbResult<BomItemDetail> {
    bom_item_details(&mut *conn, bom_id)
        .await?
        .into_iter()
        .find(|i| i.id == item_id)
        .ok_or_else(|| DbError::not_found("BOM item", item_id))
}

/// Every `output → component` edge across all BOMs.
async fn load_graph(conn: &mut SqliteConnection) -> DbResult<BomGraph> {
    let edges: Vec<(String, String)> = sqlx::query_as(
        "SELECT b.product_id, i.component_product_id \
         FROM bom_items i JOIN boms b ON b.id = i.bom_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(BomGraph::from_edges(edges))
}

async fn insert_item(conn: &mut SqliteConnection, bom_id: &str, item: &NewBomItem) -> DbResult<String> {
    let id = new_id();

    sqlx::query(
        r#"
        INSERT INTO bom_items (id, bom_id, component_product_id, quantity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&id)
    .bind(bom_id)
    .bind(&item.component_product_id)
    .bind(item.quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_duplicate_value("component_product_id", &item.component_product_id))?;

    Ok(id)
}

async fn load_detail(conn: &mut SqliteConnection, bom: Bom) -> DbResult<BomDetail> {
    let items = bom_item_details(&mut *conn, &bom.id).await?;
    let cost = BomCost::rollup(&bom.id, &items)?;
    Ok(BomDetail { bom, items, cost })
}

async fn touch(conn: &mut SqliteConnection, bom_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE boms SET updated_at = ?2 WHERE id = ?1")
        .bind(bom_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
