//! Stored-state maintenance

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use std::sync::Arc;
use waystack_db::{PostgresBlobStore, SqliteBlobStore};
use waystack_runtime::BlobStore;

/// Open the blob store named by a connection string.
pub async fn open_store(url: &str) -> Result<Arc<dyn BlobStore>> {
    if url.starts_with("sqlite:") {
        let store = SqliteBlobStore::connect(url)
            .await
            .context("connecting to SQLite")?;
        Ok(Arc::new(store))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let store = PostgresBlobStore::connect(url)
            .await
            .context("connecting to PostgreSQL")?;
        Ok(Arc::new(store))
    } else {
        bail!("unsupported database url `{url}` (expected sqlite: or postgres://)");
    }
}

pub async fn run_purge_command(url: &str, older_than_secs: i64) -> Result<()> {
    if older_than_secs < 0 {
        bail!("--older-than-secs must not be negative");
    }
    let store = open_store(url).await?;
    let cutoff = Utc::now() - Duration::seconds(older_than_secs);
    let removed = store.purge_older_than(cutoff).await?;

    println!("Removed {removed} state blob(s) created before {cutoff}");
    Ok(())
}
