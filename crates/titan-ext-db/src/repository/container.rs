//! # Container Repository
//!
//! Container types, store inventory, product links and the per-customer
//! deposit ledger.
//!
//! ## Movement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  give / receive / charge                                                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── customer, container type, settings                               │
//! │   ├── balance row (or zero totals)  ──► LedgerTotals::apply            │
//! │   ├── inventory row                  ──► next_inventory                │
//! │   ├── INSERT container_movements                                        │
//! │   ├── UPSERT container_balances                                         │
//! │   ├── UPDATE container_inventory                                        │
//! │   └── charge only: customer account debit (reference = movement id)    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error drops the transaction: nothing is written.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::customer::{apply_account_change, fetch_customer};
use crate::repository::product::fetch_product;
use crate::repository::settings::load_settings;
use titan_ext_core::containers::{
    charge_amount, next_inventory, ContainerBalance, ContainerInventory, ContainerMovement,
    ContainerType, ContainerTypePatch, CustomerMovementInput, LedgerTotals, MovementDirection,
    MovementFilter, NewContainerType, OutstandingBalance, ProductContainer,
};
use titan_ext_core::hooks::OrderLine;
use titan_ext_core::validation::{validate_note, validate_quantity};
use titan_ext_core::{new_id, AccountOperation, CoreError, Money};

const TYPE_COLUMNS: &str =
    "id, name, capacity_ml, deposit_fee_cents, is_active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, container_type_id, customer_id, direction, quantity, \
                                unit_fee_cents, amount_cents, order_id, note, created_at";

const BALANCE_COLUMNS: &str =
    "customer_id, container_type_id, balance, total_out, total_in, total_charged, updated_at";

/// Repository for the container deposit ledger.
#[derive(Debug, Clone)]
pub struct ContainerRepository {
    pool: SqlitePool,
}

impl ContainerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ContainerRepository { pool }
    }

    // =========================================================================
    // Container Types
    // =========================================================================

    /// Creates a container type together with its zero inventory row.
    pub async fn create_type(&self, input: &NewContainerType) -> DbResult<ContainerType> {
        input.validate()?;

        let now = Utc::now();
        let container_type = ContainerType {
            id: new_id(),
            name: input.name.trim().to_string(),
            capacity_ml: input.capacity_ml,
            deposit_fee_cents: input.deposit_fee_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO container_types (
                id, name, capacity_ml, deposit_fee_cents, is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&container_type.id)
        .bind(&container_type.name)
        .bind(container_type.capacity_ml)
        .bind(container_type.deposit_fee_cents)
        .bind(container_type.is_active)
        .bind(container_type.created_at)
        .bind(container_type.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("name", &container_type.name))?;

        sqlx::query(
            "INSERT INTO container_inventory (container_type_id, quantity_on_hand, updated_at) \
             VALUES (?1, 0, ?2)",
        )
        .bind(&container_type.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            id = %container_type.id,
            name = %container_type.name,
            deposit_fee = %container_type.deposit_fee(),
            "Container type created"
        );

        Ok(container_type)
    }

    /// Lists container types by name.
    pub async fn list_types(&self, include_inactive: bool) -> DbResult<Vec<ContainerType>> {
        let types = sqlx::query_as::<_, ContainerType>(&format!(
            "SELECT {TYPE_COLUMNS} FROM container_types \
             WHERE is_active = 1 OR ?1 \
             ORDER BY name"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    pub async fn get_type(&self, id: &str) -> DbResult<ContainerType> {
        let mut conn = self.pool.acquire().await?;
        fetch_type(&mut *conn, id).await
    }

    /// Applies a partial update.
    pub async fn update_type(&self, id: &str, patch: &ContainerTypePatch) -> DbResult<ContainerType> {
        patch.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut container_type = fetch_type(&mut *tx, id).await?;
        patch.apply_to(&mut container_type);
        container_type.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE container_types
            SET name = ?2, capacity_ml = ?3, deposit_fee_cents = ?4, is_active = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&container_type.id)
        .bind(&container_type.name)
        .bind(container_type.capacity_ml)
        .bind(container_type.deposit_fee_cents)
        .bind(container_type.is_active)
        .bind(container_type.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("name", &container_type.name))?;

        tx.commit().await?;

        debug!(id = %id, "Container type updated");
        Ok(container_type)
    }

    /// Deletes a container type that no movement references.
    ///
    /// ## Errors
    /// * `Domain(InUse)` - movements exist; deactivate the type instead
    pub async fn delete_type(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        fetch_type(&mut *tx, id).await?;

        let movements: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM container_movements WHERE container_type_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if movements > 0 {
            return Err(CoreError::in_use(
                "Container type",
                id,
                format!("{movements} movements reference it"),
            )
            .into());
        }

        sqlx::query("DELETE FROM container_types WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, "Container type deleted");
        Ok(())
    }

    pub async fn inventory(&self, container_type_id: &str) -> DbResult<ContainerInventory> {
        let mut conn = self.pool.acquire().await?;
        fetch_inventory(&mut *conn, container_type_id).await
    }

    // =========================================================================
    // Product Links
    // =========================================================================

    /// Links a product to the container it ships in, replacing any link.
    pub async fn link_product(
        &self,
        product_id: &str,
        container_type_id: &str,
        quantity_per_unit: i64,
    ) -> DbResult<ProductContainer> {
        let mut tx = self.pool.begin().await?;
        let link =
            upsert_link(&mut *tx, product_id, container_type_id, quantity_per_unit).await?;
        tx.commit().await?;
        Ok(link)
    }

    /// Removes a product's container link. Returns whether one existed.
    pub async fn unlink_product(&self, product_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM product_containers WHERE product_id = ?1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        debug!(product_id = %product_id, removed = removed, "Product container link removed");
        Ok(removed)
    }

    pub async fn product_link(&self, product_id: &str) -> DbResult<Option<ProductContainer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_link(&mut *conn, product_id).await
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Store-side inventory correction by a signed `delta`.
    pub async fn adjust_inventory(
        &self,
        container_type_id: &str,
        delta: i64,
        note: Option<&str>,
    ) -> DbResult<ContainerMovement> {
        validate_note(note)?;

        let mut tx = self.pool.begin().await?;
        let container_type = fetch_type(&mut *tx, container_type_id).await?;
        let inventory = fetch_inventory(&mut *tx, container_type_id).await?;

        let on_hand = next_inventory(
            container_type_id,
            inventory.quantity_on_hand,
            MovementDirection::Adjustment,
            delta,
            false,
        )?;

        let movement = ContainerMovement {
            id: new_id(),
            container_type_id: container_type_id.to_string(),
            customer_id: None,
            direction: MovementDirection::Adjustment,
            quantity: delta,
            unit_fee_cents: container_type.deposit_fee_cents,
            amount_cents: 0,
            order_id: None,
            note: note.map(str::to_string),
            created_at: Utc::now(),
        };

        insert_movement(&mut *tx, &movement).await?;
        write_inventory(&mut *tx, container_type_id, on_hand, movement.created_at).await?;

        tx.commit().await?;

        info!(
            container_type_id = %container_type_id,
            delta = delta,
            on_hand = on_hand,
            "Container inventory adjusted"
        );

        Ok(movement)
    }

    /// Containers leave the store with a customer.
    pub async fn give(&self, input: &CustomerMovementInput) -> DbResult<ContainerMovement> {
        self.record(input, MovementDirection::Out).await
    }

    /// A customer returns containers.
    ///
    /// ## Errors
    /// * `Domain(ExcessReturn)` - more than the customer holds
    pub async fn receive(&self, input: &CustomerMovementInput) -> DbResult<ContainerMovement> {
        self.record(input, MovementDirection::In).await
    }

    /// A customer keeps containers and pays the deposit fee from their account.
    ///
    /// ## Errors
    /// * `Domain(ExcessReturn)` - more than the customer holds
    pub async fn charge(&self, input: &CustomerMovementInput) -> DbResult<ContainerMovement> {
        self.record(input, MovementDirection::Charge).await
    }

    async fn record(
        &self,
        input: &CustomerMovementInput,
        direction: MovementDirection,
    ) -> DbResult<ContainerMovement> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let movement = record_customer_movement(
            &mut *tx,
            &input.customer_id,
            &input.container_type_id,
            direction,
            input.quantity,
            input.order_id.as_deref(),
            input.note.as_deref(),
        )
        .await?;
        tx.commit().await?;

        Ok(movement)
    }

    /// Gives containers for every linked line of a host order, in one
    /// transaction. Orders without a customer record nothing.
    pub async fn give_for_order(
        &self,
        order_id: &str,
        customer_id: Option<&str>,
        lines: &[OrderLine],
    ) -> DbResult<Vec<ContainerMovement>> {
        let Some(customer_id) = customer_id else {
            debug!(order_id = %order_id, "Order has no customer, no containers recorded");
            return Ok(Vec::new());
        };

        let mut tx = self.pool.begin().await?;
        let mut movements = Vec::new();

        for line in lines {
            let Some(link) = fetch_link(&mut *tx, &line.product_id).await? else {
                continue;
            };
            validate_quantity("quantity", line.quantity)?;

            let movement = record_customer_movement(
                &mut *tx,
                customer_id,
                &link.container_type_id,
                MovementDirection::Out,
                link.containers_for(line.quantity),
                Some(order_id),
                None,
            )
            .await?;
            movements.push(movement);
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            customer_id = %customer_id,
            movements = movements.len(),
            "Containers given for order"
        );

        Ok(movements)
    }

    /// Movement history, newest first.
    pub async fn movements(&self, filter: &MovementFilter) -> DbResult<Vec<ContainerMovement>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {MOVEMENT_COLUMNS} FROM container_movements WHERE 1 = 1"
        ));

        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(type_id) = &filter.container_type_id {
            query.push(" AND container_type_id = ").push_bind(type_id.clone());
        }
        if let Some(direction) = filter.direction {
            query.push(" AND direction = ").push_bind(direction);
        }
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let movements = query
            .build_query_as::<ContainerMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Balance of one customer/type pair, if the customer ever held any.
    pub async fn balance(
        &self,
        customer_id: &str,
        container_type_id: &str,
    ) -> DbResult<Option<ContainerBalance>> {
        let mut conn = self.pool.acquire().await?;
        fetch_balance(&mut *conn, customer_id, container_type_id).await
    }

    /// All balance rows of a customer.
    pub async fn customer_balances(&self, customer_id: &str) -> DbResult<Vec<ContainerBalance>> {
        let balances = sqlx::query_as::<_, ContainerBalance>(&format!(
            "SELECT {BALANCE_COLUMNS} FROM container_balances \
             WHERE customer_id = ?1 ORDER BY container_type_id"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(balances)
    }

    /// Every customer still holding containers, largest balance first.
    pub async fn outstanding_balances(&self) -> DbResult<Vec<OutstandingBalance>> {
        let rows = sqlx::query_as::<_, OutstandingBalance>(
            r#"
            SELECT b.customer_id,
                   c.name AS customer_name,
                   b.container_type_id,
                   t.name AS container_type_name,
                   b.balance,
                   t.deposit_fee_cents
            FROM container_balances b
            JOIN customers c ON c.id = b.customer_id
            JOIN container_types t ON t.id = b.container_type_id
            WHERE b.balance > 0
            ORDER BY b.balance DESC, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Rebuilds a balance row from the movement log.
    pub async fn recalculate_balance(
        &self,
        customer_id: &str,
        container_type_id: &str,
    ) -> DbResult<ContainerBalance> {
        let mut tx = self.pool.begin().await?;
        fetch_customer(&mut *tx, customer_id).await?;
        fetch_type(&mut *tx, container_type_id).await?;

        let history = sqlx::query_as::<_, ContainerMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM container_movements \
             WHERE customer_id = ?1 AND container_type_id = ?2 \
             ORDER BY created_at, rowid"
        ))
        .bind(customer_id)
        .bind(container_type_id)
        .fetch_all(&mut *tx)
        .await?;

        let stored = fetch_balance(&mut *tx, customer_id, container_type_id).await?;
        let totals = LedgerTotals::replay(&history);

        if let Some(stored) = &stored {
            if stored.totals() != totals {
                warn!(
                    customer_id = %customer_id,
                    container_type_id = %container_type_id,
                    stored = stored.balance,
                    recomputed = totals.balance,
                    "Container balance drifted from movement log"
                );
            }
        }

        let balance =
            write_balance(&mut *tx, customer_id, container_type_id, totals, Utc::now()).await?;
        tx.commit().await?;

        Ok(balance)
    }
}

// =============================================================================
// Shared helpers (run on a caller's transaction)
// =============================================================================

pub(crate) async fn fetch_type(conn: &mut SqliteConnection, id: &str) -> DbResult<ContainerType> {
    sqlx::query_as::<_, ContainerType>(&format!(
        "SELECT {TYPE_COLUMNS} FROM container_types WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Container type", id))
}

async fn fetch_inventory(
    conn: &mut SqliteConnection,
    container_type_id: &str,
) -> DbResult<ContainerInventory> {
    sqlx::query_as::<_, ContainerInventory>(
        "SELECT container_type_id, quantity_on_hand, updated_at \
         FROM container_inventory WHERE container_type_id = ?1",
    )
    .bind(container_type_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Container inventory", container_type_id))
}

async fn write_inventory(
    conn: &mut SqliteConnection,
    container_type_id: &str,
    on_hand: i64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE container_inventory SET quantity_on_hand = ?2, updated_at = ?3 \
         WHERE container_type_id = ?1",
    )
    .bind(container_type_id)
    .bind(on_hand)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_link(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<ProductContainer>> {
    let link = sqlx::query_as::<_, ProductContainer>(
        "SELECT product_id, container_type_id, quantity_per_unit \
         FROM product_containers WHERE product_id = ?1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(link)
}

pub(crate) async fn upsert_link(
    conn: &mut SqliteConnection,
    product_id: &str,
    container_type_id: &str,
    quantity_per_unit: i64,
) -> DbResult<ProductContainer> {
    validate_quantity("quantity_per_unit", quantity_per_unit)?;
    fetch_product(&mut *conn, product_id).await?;
    fetch_type(&mut *conn, container_type_id).await?;

    sqlx::query(
        r#"
        INSERT INTO product_containers (product_id, container_type_id, quantity_per_unit)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (product_id) DO UPDATE
        SET container_type_id = excluded.container_type_id,
            quantity_per_unit = excluded.quantity_per_unit
        "#,
    )
    .bind(product_id)
    .bind(container_type_id)
    .bind(quantity_per_unit)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        container_type_id = %container_type_id,
        quantity_per_unit = quantity_per_unit,
        "Product container link set"
    );

    Ok(ProductContainer {
        product_id: product_id.to_string(),
        container_type_id: container_type_id.to_string(),
        quantity_per_unit,
    })
}

async fn fetch_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    container_type_id: &str,
) -> DbResult<Option<ContainerBalance>> {
    let balance = sqlx::query_as::<_, ContainerBalance>(&format!(
        "SELECT {BALANCE_COLUMNS} FROM container_balances \
         WHERE customer_id = ?1 AND container_type_id = ?2"
    ))
    .bind(customer_id)
    .bind(container_type_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(balance)
}

async fn write_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    container_type_id: &str,
    totals: LedgerTotals,
    at: DateTime<Utc>,
) -> DbResult<ContainerBalance> {
    sqlx::query(
        r#"
        INSERT INTO container_balances (
            customer_id, container_type_id, balance, total_out, total_in, total_charged, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (customer_id, container_type_id) DO UPDATE
        SET balance = excluded.balance,
            total_out = excluded.total_out,
            total_in = excluded.total_in,
            total_charged = excluded.total_charged,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(customer_id)
    .bind(container_type_id)
    .bind(totals.balance)
    .bind(totals.total_out)
    .bind(totals.total_in)
    .bind(totals.total_charged)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(ContainerBalance {
        customer_id: customer_id.to_string(),
        container_type_id: container_type_id.to_string(),
        balance: totals.balance,
        total_out: totals.total_out,
        total_in: totals.total_in,
        total_charged: totals.total_charged,
        updated_at: at,
    })
}

async fn insert_movement(conn: &mut SqliteConnection, movement: &ContainerMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO container_movements (
            id, container_type_id, customer_id, direction, quantity,
            unit_fee_cents, amount_cents, order_id, note, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.container_type_id)
    .bind(&movement.customer_id)
    .bind(movement.direction)
    .bind(movement.quantity)
    .bind(movement.unit_fee_cents)
    .bind(movement.amount_cents)
    .bind(&movement.order_id)
    .bind(&movement.note)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// One customer movement: log row, balance, inventory and (for charges)
/// the account debit.
async fn record_customer_movement(
    conn: &mut SqliteConnection,
    customer_id: &str,
    container_type_id: &str,
    direction: MovementDirection,
    quantity: i64,
    order_id: Option<&str>,
    note: Option<&str>,
) -> DbResult<ContainerMovement> {
    fetch_customer(&mut *conn, customer_id).await?;
    let container_type = fetch_type(&mut *conn, container_type_id).await?;
    let settings = load_settings(&mut *conn).await?;

    let current = fetch_balance(&mut *conn, customer_id, container_type_id)
        .await?
        .map(|b| b.totals())
        .unwrap_or_default();
    let totals = current.apply(customer_id, container_type_id, direction, quantity)?;

    let inventory = fetch_inventory(&mut *conn, container_type_id).await?;
    let on_hand = next_inventory(
        container_type_id,
        inventory.quantity_on_hand,
        direction,
        quantity,
        settings.containers.allow_negative_inventory,
    )?;

    let amount = match direction {
        MovementDirection::Charge => charge_amount(container_type.deposit_fee(), quantity)?,
        _ => Money::zero(),
    };

    let movement = ContainerMovement {
        id: new_id(),
        container_type_id: container_type_id.to_string(),
        customer_id: Some(customer_id.to_string()),
        direction,
        quantity,
        unit_fee_cents: container_type.deposit_fee_cents,
        amount_cents: amount.cents(),
        order_id: order_id.map(str::to_string),
        note: note.map(str::to_string),
        created_at: Utc::now(),
    };

    insert_movement(&mut *conn, &movement).await?;
    write_balance(
        &mut *conn,
        customer_id,
        container_type_id,
        totals,
        movement.created_at,
    )
    .await?;
    write_inventory(&mut *conn, container_type_id, on_hand, movement.created_at).await?;

    if amount.is_positive() {
        let description = format!("Container charge: {} × {}", quantity, container_type.name);
        apply_account_change(
            &mut *conn,
            customer_id,
            AccountOperation::Debit,
            amount,
            Some(&movement.id),
            Some(&description),
        )
        .await?;
    }

    info!(
        movement_id = %movement.id,
        customer_id = %customer_id,
        container_type_id = %container_type_id,
        direction = %direction,
        quantity = quantity,
        balance = totals.balance,
        "Container movement recorded"
    );

    Ok(movement)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use titan_ext_core::settings::ALLOW_NEGATIVE_INVENTORY;
    use titan_ext_core::Customer;

    async fn crate_type(db: &Database) -> ContainerType {
        db.containers()
            .create_type(&NewContainerType {
                name: "Beer crate".to_string(),
                capacity_ml: Some(12_000),
                deposit_fee_cents: 150,
            })
            .await
            .unwrap()
    }

    fn input(customer: &Customer, container_type: &ContainerType, qty: i64) -> CustomerMovementInput {
        CustomerMovementInput {
            customer_id: customer.id.clone(),
            container_type_id: container_type.id.clone(),
            quantity: qty,
            order_id: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_create_type_creates_inventory() {
        let db = fixtures::db().await;
        let container_type = crate_type(&db).await;

        let inventory = db.containers().inventory(&container_type.id).await.unwrap();
        assert_eq!(inventory.quantity_on_hand, 0);

        let types = db.containers().list_types(false).await.unwrap();
        assert_eq!(types.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_type_name() {
        let db = fixtures::db().await;
        crate_type(&db).await;

        let err = db
            .containers()
            .create_type(&NewContainerType {
                name: "Beer crate".to_string(),
                capacity_ml: None,
                deposit_fee_cents: 100,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate name: 'Beer crate' already exists");
    }

    #[tokio::test]
    async fn test_update_and_list_inactive() {
        let db = fixtures::db().await;
        let container_type = crate_type(&db).await;

        let updated = db
            .containers()
            .update_type(
                &container_type.id,
                &ContainerTypePatch {
                    is_active: Some(false),
                    deposit_fee_cents: Some(200),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.deposit_fee_cents, 200);

        assert!(db.containers().list_types(false).await.unwrap().is_empty());
        assert_eq!(db.containers().list_types(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_give_receive_charge() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;
        let repo = db.containers();

        repo.adjust_inventory(&container_type.id, 20, Some("delivery"))
            .await
            .unwrap();

        repo.give(&input(&customer, &container_type, 10)).await.unwrap();
        repo.receive(&input(&customer, &container_type, 4)).await.unwrap();
        let charge = repo.charge(&input(&customer, &container_type, 2)).await.unwrap();
        assert_eq!(charge.amount_cents, 300);

        let balance = repo
            .balance(&customer.id, &container_type.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.balance, 4);
        assert_eq!(
            balance.total_out - balance.total_in - balance.total_charged,
            balance.balance
        );

        // 20 delivered − 10 given + 4 returned; charges leave inventory alone
        let inventory = repo.inventory(&container_type.id).await.unwrap();
        assert_eq!(inventory.quantity_on_hand, 14);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.account_balance_cents, -300);

        let history = db.customers().account_history(&customer.id, 10).await.unwrap();
        assert_eq!(history[0].reference.as_deref(), Some(charge.id.as_str()));
    }

    #[tokio::test]
    async fn test_excess_return_writes_nothing() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;
        let repo = db.containers();

        repo.give(&input(&customer, &container_type, 2)).await.unwrap();
        let err = repo
            .receive(&input(&customer, &container_type, 3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ExcessReturn { .. })
        ));

        let err = repo
            .charge(&input(&customer, &container_type, 3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ExcessReturn { .. })
        ));

        let movements = repo.movements(&MovementFilter::default()).await.unwrap();
        assert_eq!(movements.len(), 1);
        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.account_balance_cents, 0);
    }

    #[tokio::test]
    async fn test_give_beyond_inventory_respects_setting() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;

        // Default allows giving from an empty shelf
        db.containers()
            .give(&input(&customer, &container_type, 1))
            .await
            .unwrap();
        let inventory = db.containers().inventory(&container_type.id).await.unwrap();
        assert_eq!(inventory.quantity_on_hand, -1);

        db.settings()
            .set(ALLOW_NEGATIVE_INVENTORY, "false")
            .await
            .unwrap();
        let err = db
            .containers()
            .give(&input(&customer, &container_type, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientContainers { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjustment_cannot_go_negative() {
        let db = fixtures::db().await;
        let container_type = crate_type(&db).await;

        db.containers()
            .adjust_inventory(&container_type.id, 5, None)
            .await
            .unwrap();
        let err = db
            .containers()
            .adjust_inventory(&container_type.id, -6, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientContainers { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_type_in_use() {
        let db = fixtures::db().await;
        let container_type = crate_type(&db).await;
        let unused = db
            .containers()
            .create_type(&NewContainerType {
                name: "Keg".to_string(),
                capacity_ml: Some(30_000),
                deposit_fee_cents: 3000,
            })
            .await
            .unwrap();

        db.containers()
            .adjust_inventory(&container_type.id, 3, None)
            .await
            .unwrap();

        let err = db.containers().delete_type(&container_type.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InUse { .. })));

        db.containers().delete_type(&unused.id).await.unwrap();
        assert!(matches!(
            db.containers().get_type(&unused.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_give_for_order_uses_links() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;
        let beer = fixtures::product(&db, "BEER-24", 1000, 10).await;
        let chips = fixtures::product(&db, "CHIPS", 100, 10).await;

        db.containers()
            .link_product(&beer.id, &container_type.id, 2)
            .await
            .unwrap();

        let lines = vec![
            OrderLine {
                product_id: beer.id.clone(),
                quantity: 3,
            },
            OrderLine {
                product_id: chips.id.clone(),
                quantity: 5,
            },
        ];

        let movements = db
            .containers()
            .give_for_order("order-1", Some(&customer.id), &lines)
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, 6);
        assert_eq!(movements[0].order_id.as_deref(), Some("order-1"));

        let none = db
            .containers()
            .give_for_order("order-2", None, &lines)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_link_and_unlink() {
        let db = fixtures::db().await;
        let container_type = crate_type(&db).await;
        let beer = fixtures::product(&db, "BEER-24", 1000, 10).await;

        db.containers()
            .link_product(&beer.id, &container_type.id, 1)
            .await
            .unwrap();
        db.containers()
            .link_product(&beer.id, &container_type.id, 4)
            .await
            .unwrap();

        let link = db.containers().product_link(&beer.id).await.unwrap().unwrap();
        assert_eq!(link.quantity_per_unit, 4);

        assert!(db.containers().unlink_product(&beer.id).await.unwrap());
        assert!(!db.containers().unlink_product(&beer.id).await.unwrap());

        let err = db
            .containers()
            .link_product("missing", &container_type.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_recalculate_repairs_drift() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;
        let repo = db.containers();

        repo.give(&input(&customer, &container_type, 5)).await.unwrap();
        repo.receive(&input(&customer, &container_type, 2)).await.unwrap();

        sqlx::query("UPDATE container_balances SET balance = 9, total_out = 9")
            .execute(db.pool())
            .await
            .unwrap();

        let repaired = repo
            .recalculate_balance(&customer.id, &container_type.id)
            .await
            .unwrap();
        assert_eq!(repaired.balance, 3);
        assert_eq!(repaired.total_out, 5);
        assert_eq!(repaired.total_in, 2);
        assert!(repaired.totals().is_consistent());
    }

    #[tokio::test]
    async fn test_recalculate_with_excess_return_stays_consistent() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;
        let container_type = crate_type(&db).await;
        let repo = db.containers();

        repo.give(&input(&customer, &container_type, 1)).await.unwrap();
        repo.give(&input(&customer, &container_type, 4)).await.unwrap();
        repo.receive(&input(&customer, &container_type, 5)).await.unwrap();

        // Lose the second issue so the log returns more than it gave out
        sqlx::query("DELETE FROM container_movements WHERE direction = 'out' AND quantity = 4")
            .execute(db.pool())
            .await
            .unwrap();

        let repaired = repo
            .recalculate_balance(&customer.id, &container_type.id)
            .await
            .unwrap();
        assert_eq!(repaired.balance, 0);
        assert_eq!(repaired.total_out, 1);
        assert_eq!(repaired.total_in, 1);
        assert!(repaired.totals().is_consistent());
    }

    #[tokio::test]
    async fn test_outstanding_and_filtered_movements() {
        let db = fixtures::db().await;
        let ada = fixtures::customer(&db, "Ada", false).await;
        let bob = fixtures::customer(&db, "Bob", false).await;
        let container_type = crate_type(&db).await;
        let repo = db.containers();

        repo.give(&input(&ada, &container_type, 3)).await.unwrap();
        repo.give(&input(&bob, &container_type, 1)).await.unwrap();
        repo.receive(&input(&bob, &container_type, 1)).await.unwrap();

        let outstanding = repo.outstanding_balances().await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].customer_name, "Ada");
        assert_eq!(outstanding[0].deposit_value().cents(), 450);

        let bob_returns = repo
            .movements(&MovementFilter {
                customer_id: Some(bob.id.clone()),
                direction: Some(MovementDirection::In),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bob_returns.len(), 1);

        let balances = repo.customer_balances(&bob.id).await.unwrap();
        assert_eq!(balances[0].balance, 0);
        assert_eq!(balances[0].total_in, 1);
    }
}
