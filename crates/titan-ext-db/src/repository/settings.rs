//! # Settings Repository
//!
//! Stored overrides for module options. Reads always return the full
//! [`ModuleSettings`] with defaults filled in.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::DbResult;
use titan_ext_core::settings::ModuleSettings;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Effective settings: defaults overridden by stored values.
    pub async fn load(&self) -> DbResult<ModuleSettings> {
        let mut conn = self.pool.acquire().await?;
        load_settings(&mut *conn).await
    }

    /// Validates and stores one setting, returning the new effective settings.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<ModuleSettings> {
        let mut tx = self.pool.begin().await?;

        let mut settings = load_settings(&mut *tx).await?;
        settings.set(key, value)?;

        sqlx::query(
            r#"
            INSERT INTO module_settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.trim())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(key = %key, value = %value, "Module setting updated");
        Ok(settings)
    }
}

/// Loads effective settings on a caller's connection or transaction.
pub(crate) async fn load_settings(conn: &mut SqliteConnection) -> DbResult<ModuleSettings> {
    let pairs: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM module_settings")
        .fetch_all(&mut *conn)
        .await?;

    Ok(ModuleSettings::from_pairs(pairs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures;
    use titan_ext_core::settings::{ALLOW_NEGATIVE_INVENTORY, CASHBACK_BPS};

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let db = fixtures::db().await;
        let settings = db.settings().load().await.unwrap();
        assert_eq!(settings, ModuleSettings::default());
    }

    #[tokio::test]
    async fn test_set_and_reload() {
        let db = fixtures::db().await;

        db.settings().set(CASHBACK_BPS, "350").await.unwrap();
        db.settings().set(ALLOW_NEGATIVE_INVENTORY, "false").await.unwrap();
        db.settings().set(CASHBACK_BPS, "400").await.unwrap();

        let settings = db.settings().load().await.unwrap();
        assert_eq!(settings.loyalty.cashback_bps, 400);
        assert!(!settings.containers.allow_negative_inventory);
    }

    #[tokio::test]
    async fn test_invalid_value_not_stored() {
        let db = fixtures::db().await;

        let err = db.settings().set(CASHBACK_BPS, "20000").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        let settings = db.settings().load().await.unwrap();
        assert_eq!(settings.loyalty.cashback_bps, 200);
    }
}
