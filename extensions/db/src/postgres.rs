//! PostgreSQL-backed blob store.

use crate::{STATE_TABLE, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use waystack_core::{NavError, NavResult};
use waystack_runtime::BlobStore;

#[derive(Clone)]
pub struct PostgresBlobStore {
    pool: PgPool,
}

impl PostgresBlobStore {
    /// Connect and create the table if it is missing.
    pub async fn connect(url: &str) -> NavResult<Self> {
        Self::connect_with(url, PgPoolOptions::new()).await
    }

    pub async fn connect_with(url: &str, options: PgPoolOptions) -> NavResult<Self> {
        let pool = options.connect(url).await.map_err(store_error)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Call [`PostgresBlobStore::migrate`] before use.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> NavResult<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {STATE_TABLE} (
                id TEXT PRIMARY KEY,
                blob BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
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
}

#[async_trait]
impl BlobStore for PostgresBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> NavResult<()> {
        sqlx::query(&format!(
            "INSERT INTO {STATE_TABLE} (id, blob, created_at) VALUES ($1, $2, $3)"
        ))
        .bind(id)
        .bind(bytes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> NavResult<Vec<u8>> {
        let row = sqlx::query(&format!("SELECT blob FROM {STATE_TABLE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or_else(|| NavError::NotFound(id.to_string()))?;
        row.try_get("blob").map_err(store_error)
    }

    async fn delete(&self, id: &str) -> NavResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {STATE_TABLE} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> NavResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {STATE_TABLE} WHERE created_at < $1"))
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        tracing::debug!(removed = result.rows_affected(), %cutoff, "purged state blobs");
        Ok(result.rows_affected())
    }
}
