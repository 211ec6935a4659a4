//! SQLite-backed blob store.

use crate::{STATE_TABLE, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use waystack_core::{NavError, NavResult};
use waystack_runtime::BlobStore;

/// Stores envelopes in a `waystack_state` table. `created_at` is kept as
/// Unix milliseconds so purges compare integers.
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Connect and create the table if it is missing.
    pub async fn connect(url: &str) -> NavResult<Self> {
        Self::connect_with(url, SqlitePoolOptions::new()).await
    }

    pub async fn connect_with(url: &str, options: SqlitePoolOptions) -> NavResult<Self> {
        let pool = options.connect(url).await.map_err(store_error)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Call [`SqliteBlobStore::migrate`] before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> NavResult<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {STATE_TABLE} (
                id TEXT PRIMARY KEY NOT NULL,
                blob BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {STATE_TABLE}_created_at ON {STATE_TABLE} (created_at)"
        ))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    pub(crate) async fn put_at(
        &self,
        id: &str,
        bytes: &[u8],
        created_at: DateTime<Utc>,
    ) -> NavResult<()> {
        sqlx::query(&format!(
            "INSERT INTO {STATE_TABLE} (id, blob, created_at) VALUES (?, ?, ?)"
        ))
        .bind(id)
        .bind(bytes)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    pub async fn count(&self) -> NavResult<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {STATE_TABLE}"))
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        row.try_get("n").map_err(store_error)
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> NavResult<()> {
        self.put_at(id, bytes, Utc::now()).await
    }

    async fn get(&self, id: &str) -> NavResult<Vec<u8>> {
        let row = sqlx::query(&format!("SELECT blob FROM {STATE_TABLE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or_else(|| NavError::NotFound(id.to_string()))?;
        row.try_get("blob").map_err(store_error)
    }

    async fn delete(&self, id: &str) -> NavResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {STATE_TABLE} WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> NavResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {STATE_TABLE} WHERE created_at < ?"))
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        tracing::debug!(removed = result.rows_affected(), %cutoff, "purged state blobs");
        Ok(result.rows_affected())
    }
}
