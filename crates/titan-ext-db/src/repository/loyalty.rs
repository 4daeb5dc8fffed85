//! # Loyalty Repository
//!
//! Special customers, their discount and the yearly cashback ledger.
//!
//! Cashback amounts move money on the customer account: processing
//! credits it, reversing debits it. Both happen in the same transaction
//! as the status change, with the cashback ID as the history reference.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::customer::{apply_account_change, fetch_customer};
use crate::repository::order::yearly_purchases;
use crate::repository::settings::load_settings;
use titan_ext_core::loyalty::{
    ensure_no_open_entry, preview_cashback, special_discount, CashbackEntry, CashbackFilter,
    CashbackPreview, CashbackStatus, CashbackStatusTotal, CashbackSummary,
};
use titan_ext_core::validation::{validate_note, validate_year};
use titan_ext_core::{new_id, AccountOperation, Customer, Money, ValidationError};

const CASHBACK_COLUMNS: &str = "id, customer_id, year, purchases_cents, rate_bps, amount_cents, \
                                status, processed_at, reversed_at, reversal_reason, \
                                created_at, updated_at";

const CUSTOMER_COLUMNS: &str =
    "id, name, email, is_special, account_balance_cents, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    // =========================================================================
    // Special Customers
    // =========================================================================

    pub async fn list_special_customers(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE is_special = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Flags or unflags a customer as special.
    pub async fn set_special(&self, customer_id: &str, is_special: bool) -> DbResult<Customer> {
        let mut tx = self.pool.begin().await?;
        let mut customer = fetch_customer(&mut *tx, customer_id).await?;

        customer.is_special = is_special;
        customer.updated_at = Utc::now();

        sqlx::query("UPDATE customers SET is_special = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(customer_id)
            .bind(is_special)
            .bind(customer.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(customer_id = %customer_id, is_special = is_special, "Special customer flag set");
        Ok(customer)
    }

    /// Discount for `subtotal_cents`; zero unless the customer is special.
    pub async fn special_discount(&self, customer_id: &str, subtotal_cents: i64) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        let customer = fetch_customer(&mut *conn, customer_id).await?;
        let settings = load_settings(&mut *conn).await?;

        Ok(special_discount(
            &customer,
            Money::from_cents(subtotal_cents),
            settings.loyalty.discount_rate(),
        ))
    }

    // =========================================================================
    // Cashback
    // =========================================================================

    pub async fn yearly_purchases(&self, customer_id: &str, year: i32) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut *conn, customer_id).await?;
        yearly_purchases(&mut *conn, customer_id, year).await
    }

    /// Cashback the customer would get for `year`. Writes nothing.
    pub async fn calculate_cashback(&self, customer_id: &str, year: i32) -> DbResult<CashbackPreview> {
        let mut conn = self.pool.acquire().await?;
        preview_on(&mut *conn, customer_id, year).await
    }

    /// Records a pending cashback row for the period.
    ///
    /// ## Errors
    /// * `Domain(NotEligible)` - customer does not qualify
    /// * `Domain(CashbackAlreadyExists)` - a pending or processed row exists
    pub async fn create_pending(&self, customer_id: &str, year: i32) -> DbResult<CashbackEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = create_pending_on(&mut *tx, customer_id, year).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Pending rows for every eligible special customer without an open one.
    pub async fn generate_pending_for_year(&self, year: i32) -> DbResult<Vec<CashbackEntry>> {
        validate_year(year)?;

        let mut tx = self.pool.begin().await?;

        let customer_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM customers
            WHERE is_special = 1
              AND id NOT IN (
                  SELECT customer_id FROM cashback_history
                  WHERE year = ?1 AND status IN ('pending', 'processed')
              )
            ORDER BY name
            "#,
        )
        .bind(year)
        .fetch_all(&mut *tx)
        .await?;

        let mut created = Vec::new();
        for customer_id in &customer_ids {
            let preview = preview_on(&mut *tx, customer_id, year).await?;
            if !preview.eligible {
                debug!(
                    customer_id = %customer_id,
                    year = year,
                    reason = ?preview.reason,
                    "Skipping cashback"
                );
                continue;
            }
            created.push(insert_pending(&mut *tx, &preview).await?);
        }

        tx.commit().await?;

        info!(
            year = year,
            candidates = customer_ids.len(),
            created = created.len(),
            "Pending cashback generated"
        );

        Ok(created)
    }

    /// pending → processed, crediting the customer account.
    pub async fn process(&self, cashback_id: &str) -> DbResult<CashbackEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = fetch_entry(&mut *tx, cashback_id).await?;
        let entry = process_on(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Creates and processes the period's cashback in one transaction.
    pub async fn process_for_customer(&self, customer_id: &str, year: i32) -> DbResult<CashbackEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = create_pending_on(&mut *tx, customer_id, year).await?;
        let entry = process_on(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// processed → reversed, debiting the customer account.
    pub async fn reverse(&self, cashback_id: &str, reason: &str) -> DbResult<CashbackEntry> {
        if reason.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "reason".to_string(),
            }
            .into());
        }
        validate_note(Some(reason))?;

        let mut tx = self.pool.begin().await?;
        let mut entry = fetch_entry(&mut *tx, cashback_id).await?;

        entry.status = entry.status.transition(&entry.id, CashbackStatus::Reversed)?;
        let now = Utc::now();
        entry.reversed_at = Some(now);
        entry.reversal_reason = Some(reason.trim().to_string());
        entry.updated_at = now;

        sqlx::query(
            r#"
            UPDATE cashback_history
            SET status = ?2, reversed_at = ?3, reversal_reason = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&entry.id)
        .bind(entry.status)
        .bind(entry.reversed_at)
        .bind(&entry.reversal_reason)
        .bind(entry.updated_at)
        .execute(&mut *tx)
        .await?;

        let description = format!("Cashback {} reversed: {}", entry.year, reason.trim());
        apply_account_change(
            &mut *tx,
            &entry.customer_id,
            AccountOperation::Debit,
            entry.amount(),
            Some(&entry.id),
            Some(&description),
        )
        .await?;

        tx.commit().await?;

        info!(
            id = %entry.id,
            customer_id = %entry.customer_id,
            year = entry.year,
            amount = %entry.amount(),
            "Cashback reversed"
        );

        Ok(entry)
    }

    /// Cashback rows, newest first.
    pub async fn history(&self, filter: &CashbackFilter) -> DbResult<Vec<CashbackEntry>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {CASHBACK_COLUMNS} FROM cashback_history WHERE 1 = 1"
        ));

        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(year) = filter.year {
            query.push(" AND year = ").push_bind(year);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let entries = query
            .build_query_as::<CashbackEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Counts and amounts per status for a year.
    pub async fn summary(&self, year: i32) -> DbResult<CashbackSummary> {
        validate_year(year)?;

        let totals = sqlx::query_as::<_, CashbackStatusTotal>(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0) AS amount_cents
            FROM cashback_history
            WHERE year = ?1
            GROUP BY status
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(CashbackSummary::from_totals(year, totals))
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_entry(conn: &mut SqliteConnection, id: &str) -> DbResult<CashbackEntry> {
    sqlx::query_as::<_, CashbackEntry>(&format!(
        "SELECT {CASHBACK_COLUMNS} FROM cashback_history WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Cashback", id))
}

async fn preview_on(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
) -> DbResult<CashbackPreview> {
    validate_year(year)?;

    let customer = fetch_customer(&mut *conn, customer_id).await?;
    let settings = load_settings(&mut *conn).await?;
    let purchases = yearly_purchases(&mut *conn, customer_id, year).await?;

    Ok(preview_cashback(
        &customer,
        year,
        purchases,
        settings.loyalty.cashback_rate(),
        settings.loyalty.min_annual_purchases(),
    ))
}

async fn create_pending_on(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
) -> DbResult<CashbackEntry> {
    let preview = preview_on(&mut *conn, customer_id, year).await?;
    preview.ensure_eligible()?;

    let existing = sqlx::query_as::<_, CashbackEntry>(&format!(
        "SELECT {CASHBACK_COLUMNS} FROM cashback_history WHERE customer_id = ?1 AND year = ?2"
    ))
    .bind(customer_id)
    .bind(year)
    .fetch_all(&mut *conn)
    .await?;
    ensure_no_open_entry(customer_id, year, &existing)?;

    insert_pending(&mut *conn, &preview).await
}

async fn insert_pending(
    conn: &mut SqliteConnection,
    preview: &CashbackPreview,
) -> DbResult<CashbackEntry> {
    let now = Utc::now();
    let entry = CashbackEntry {
        id: new_id(),
        customer_id: preview.customer_id.clone(),
        year: preview.year,
        purchases_cents: preview.purchases_cents,
        rate_bps: preview.rate_bps,
        amount_cents: preview.amount_cents,
        status: CashbackStatus::Pending,
        processed_at: None,
        reversed_at: None,
        reversal_reason: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO cashback_history (
            id, customer_id, year, purchases_cents, rate_bps, amount_cents,
            status, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.customer_id)
    .bind(entry.year)
    .bind(entry.purchases_cents)
    .bind(entry.rate_bps)
    .bind(entry.amount_cents)
    .bind(entry.status)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        DbError::from(e).with_duplicate_value(
            "cashback period",
            &format!("{}/{}", entry.customer_id, entry.year),
        )
    })?;

    info!(
        id = %entry.id,
        customer_id = %entry.customer_id,
        year = entry.year,
        amount = %entry.amount(),
        "Pending cashback created"
    );

    Ok(entry)
}

async fn process_on(conn: &mut SqliteConnection, mut entry: CashbackEntry) -> DbResult<CashbackEntry> {
    entry.status = entry.status.transition(&entry.id, CashbackStatus::Processed)?;
    let now = Utc::now();
    entry.processed_at = Some(now);
    entry.updated_at = now;

    sqlx::query(
        "UPDATE cashback_history SET status = ?2, processed_at = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(&entry.id)
    .bind(entry.status)
    .bind(entry.processed_at)
    .bind(entry.updated_at)
    .execute(&mut *conn)
    .await?;

    let description = format!("Cashback {}", entry.year);
    apply_account_change(
        &mut *conn,
        &entry.customer_id,
        AccountOperation::Credit,
        entry.amount(),
        Some(&entry.id),
        Some(&description),
    )
    .await?;

    info!(
        id = %entry.id,
        customer_id = %entry.customer_id,
        year = entry.year,
        amount = %entry.amount(),
        "Cashback processed"
    );

    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================
