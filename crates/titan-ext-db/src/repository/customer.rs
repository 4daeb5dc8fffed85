//! # Customer Repository
//!
//! Host customers and their account. Every balance change made by a module
//! goes through [`apply_account_change`], which writes the history row in
//! the same transaction.
//!
//! ## Account Flow
//! ```text
//! cashback processed ──► credit ──┐
//!                                 ├──► customers.account_balance_cents
//! container charged  ──► debit  ──┘          │
//!                                            ▼
//!                              customer_account_history (balance_after)
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use titan_ext_core::validation::validate_name;
use titan_ext_core::{
    new_id, AccountOperation, Customer, CustomerAccountEntry, Money, ValidationError,
};

const CUSTOMER_COLUMNS: &str =
    "id, name, email, is_special, account_balance_cents, created_at, updated_at";

/// Fields for a new host customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub is_special: bool,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, input: &NewCustomer) -> DbResult<Customer> {
        validate_name("name", &input.name)?;

        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            name: input.name.trim().to_string(),
            email: input.email.clone(),
            is_special: input.is_special,
            account_balance_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, email, is_special, account_balance_cents, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.is_special)
        .bind(customer.account_balance_cents)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Account history, newest first.
    pub async fn account_history(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> DbResult<Vec<CustomerAccountEntry>> {
        let entries = sqlx::query_as::<_, CustomerAccountEntry>(
            r#"
            SELECT id, customer_id, operation, amount_cents, balance_after_cents,
                   reference, description, created_at
            FROM customer_account_history
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Shared helpers (run on a caller's transaction)
// =============================================================================

/// Loads a customer or fails with `NotFound`.
pub(crate) async fn fetch_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Customer", id))
}

/// Credits or debits a customer's account and records the history row.
///
/// `reference` is the ID of the module record that caused the change
/// (container movement, cashback entry).
pub(crate) async fn apply_account_change(
    conn: &mut SqliteConnection,
    customer_id: &str,
    operation: AccountOperation,
    amount: Money,
    reference: Option<&str>,
    description: Option<&str>,
) -> DbResult<CustomerAccountEntry> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount_cents".to_string(),
        }
        .into());
    }

    let customer = fetch_customer(&mut *conn, customer_id).await?;
    let balance_after = customer.account_balance() + operation.signed(amount);
    let now = Utc::now();

    sqlx::query("UPDATE customers SET account_balance_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(customer_id)
        .bind(balance_after.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

    let entry = CustomerAccountEntry {
        id: new_id(),
        customer_id: customer_id.to_string(),
        operation,
        amount_cents: amount.cents(),
        balance_after_cents: balance_after.cents(),
        reference: reference.map(str::to_string),
        description: description.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO customer_account_history (
            id, customer_id, operation, amount_cents, balance_after_cents,
            reference, description, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.customer_id)
    .bind(entry.operation)
    .bind(entry.amount_cents)
    .bind(entry.balance_after_cents)
    .bind(&entry.reference)
    .bind(&entry.description)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    info!(
        customer_id = %customer_id,
        operation = ?operation,
        amount = %amount,
        balance_after = %balance_after,
        "Customer account updated"
    );

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_account_credit_and_debit() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", true).await;

        let mut tx = db.pool().begin().await.unwrap();
        apply_account_change(
            &mut *tx,
            &customer.id,
            AccountOperation::Credit,
            Money::from_cents(500),
            Some("cb-1"),
            Some("Cashback 2026"),
        )
        .await
        .unwrap();
        let entry = apply_account_change(
            &mut *tx,
            &customer.id,
            AccountOperation::Debit,
            Money::from_cents(150),
            None,
            None,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(entry.balance_after_cents, 350);

        let reloaded = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.account_balance_cents, 350);

        let history = db.customers().account_history(&customer.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation, AccountOperation::Debit);
    }

    #[tokio::test]
    async fn test_account_change_rolls_back_with_transaction() {
        let db = fixtures::db().await;
        let customer = fixtures::customer(&db, "Ada", false).await;

        {
            let mut tx = db.pool().begin().await.unwrap();
            apply_account_change(
                &mut *tx,
                &customer.id,
                AccountOperation::Credit,
                Money::from_cents(500),
                None,
                None,
            )
            .await
            .unwrap();
            // dropped without commit
        }

        let reloaded = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.account_balance_cents, 0);
    }
}
