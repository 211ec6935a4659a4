//! # Waystack Database Integration
//!
//! SQL-backed [`BlobStore`](waystack_runtime::BlobStore) implementations for
//! the Database transport backend.

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresBlobStore;
pub use sqlite::SqliteBlobStore;

use waystack_core::NavError;

/// Table holding state envelopes.
pub const STATE_TABLE: &str = "waystack_state";

pub(crate) fn store_error(err: sqlx::Error) -> NavError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            NavError::Store(format!("identifier collision: {db}"))
        }
        _ => NavError::Store(err.to_string()),
    }
}

pub mod prelude {
    pub use crate::postgres::PostgresBlobStore;
    pub use crate::sqlite::SqliteBlobStore;
}
