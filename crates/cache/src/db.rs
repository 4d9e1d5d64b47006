//! Database connection and pool management.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// One writer per file being prepared, and uploads rarely come in the hundreds.
const MAX_CONNECTIONS: u32 = 5;

/// Connection pool for the digest cache file. Wrap it in a
/// [`SqliteDigestCache`](crate::SqliteDigestCache) to read and write digests.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (or create) the cache file at `path`, creating missing parent
    /// directories, and bring its schema up to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .or_raise(|| ErrorKind::CreateDirectory(parent.to_path_buf()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            // Lookups shouldn't wait on a file's digest being written.
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Files in a batch finish hashing together and write at once.
            .busy_timeout(Duration::from_millis(1500));
        Self::new(options, MAX_CONNECTIONS).await
    }

    /// Throwaway database, gone once the pool closes. Not test-gated so
    /// other crates can use it.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to ":memory:" is its own database.
        Self::new(SqliteConnectOptions::new().filename(":memory:"), 1).await
    }

    #[instrument("migrating digest cache", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections to come back, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
