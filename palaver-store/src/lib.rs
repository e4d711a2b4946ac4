//! SQLite persistence for palaver
//!
//! Two stores share one pool: [`CredentialStore`] owns user records,
//! [`ConversationStore`] owns conversation summaries and the append-only
//! message log. Every operation is scoped by the owning username; any
//! sqlx failure surfaces as [`palaver_core::Error::StorageUnavailable`]
//! and is never retried here.

pub mod conversations;
pub mod credentials;

pub use conversations::ConversationStore;
pub use credentials::CredentialStore;

use palaver_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (creating if missing) the database at `database_path`, apply
/// pragmas and run embedded migrations.
pub async fn connect(database_path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5_000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(storage_error)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

    info!(database_path, "database ready");
    Ok(pool)
}

/// The store treats every sqlx failure as "momentarily unreachable",
/// not corrupted; callers may retry the operation.
pub(crate) fn storage_error(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}
