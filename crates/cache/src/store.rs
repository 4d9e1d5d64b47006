//! SQLite-backed digest cache.

use crate::models::{CacheEntry, EntryRow};
use crate::{Database, DigestCache};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use twin_hash::Digest;

/// Durable [`DigestCache`] that survives process restarts.
///
/// Entries are written after every successful hash and are never expired.
/// A key that the host reuses for different content will keep returning the
/// old digest until [`clear()`](Self::clear) is called.
#[derive(Debug, Clone)]
pub struct SqliteDigestCache {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for SqliteDigestCache {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl SqliteDigestCache {
    /// Create a new cache with the given connection pool.
    ///
    /// In a dry run, reads go to the database but writes are dropped.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    /// Fetch the full entry (including when it was written) for a key.
    ///
    /// Returns [`InvalidData`](ErrorKind::InvalidData) if the stored row can
    /// no longer be parsed.
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_entry.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CacheEntry::try_from).transpose()
    }

    /// Number of remembered digests.
    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("row count"))
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Forget every digest. Returns how many entries were removed.
    pub async fn clear(&self) -> Result<u64> {
        if self.dry_run {
            return Ok(0);
        }
        let result =
            sqlx::query(include_str!("../queries/clear.sql")).execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(removed = result.rows_affected(), "cleared digest cache");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DigestCache for SqliteDigestCache {
    async fn get(&self, key: &str) -> Result<Option<Digest>> {
        match self.entry(key).await {
            Ok(entry) => Ok(entry.map(|e| e.digest)),
            // A corrupt row is as good as no row: the file just gets hashed again.
            Err(err) if matches!(&*err, ErrorKind::InvalidData(_)) => {
                tracing::warn!(file_key = key, error = ?err, "ignoring unreadable digest cache entry");
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }

    async fn set(&self, key: &str, digest: &Digest) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let row = EntryRow::from(&CacheEntry {
            key: key.to_string(),
            digest: digest.clone(),
            written_at: UtcDateTime::now(),
        });
        sqlx::query(include_str!("../queries/upsert_digest.sql"))
            .bind(row.file_key)
            .bind(row.digest)
            .bind(row.written_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(file_key = key, %digest, "cached digest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> SqliteDigestCache {
        let db = Database::connect_in_memory().await.unwrap();
        SqliteDigestCache::from(&db)
    }

    fn digest(s: &str) -> Digest {
        Digest::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = cache().await;
        assert_eq!(cache.get("nope").await.unwrap(), None);
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache().await;
        cache.set("file-1", &digest("abc123")).await.unwrap();
        assert_eq!(cache.get("file-1").await.unwrap(), Some(digest("abc123")));
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = cache().await;
        cache.set("file-1", &digest("aaaa")).await.unwrap();
        cache.set("file-1", &digest("bbbb")).await.unwrap();
        assert_eq!(cache.get("file-1").await.unwrap(), Some(digest("bbbb")));
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entry_records_write_time() {
        let cache = cache().await;
        let before = UtcDateTime::now().replace_nanosecond(0).unwrap();
        cache.set("file-1", &digest("abc123")).await.unwrap();
        let entry = cache.entry("file-1").await.unwrap().unwrap();
        assert_eq!(entry.key, "file-1");
        assert!(entry.written_at >= before);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_a_miss() {
        let cache = cache().await;
        sqlx::query("INSERT INTO digests (file_key, digest, written_at) VALUES ('bad', 'zz-top', 0)")
            .execute(&cache.pool)
            .await
            .unwrap();
        assert_eq!(cache.get("bad").await.unwrap(), None);
        assert!(cache.entry("bad").await.is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache().await;
        cache.set("a", &digest("aa")).await.unwrap();
        cache.set("b", &digest("bb")).await.unwrap();
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dry_run_drops_writes() {
        let db = Database::connect_in_memory().await.unwrap();
        let cache = SqliteDigestCache::new(db.pool().clone(), true);
        cache.set("a", &digest("aa")).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digests.sqlite3");
        {
            let db = Database::connect(&path).await.unwrap();
            SqliteDigestCache::from(&db).set("file-1", &digest("abc123")).await.unwrap();
            db.close().await;
        }
        let db = Database::connect(&path).await.unwrap();
        let cache = SqliteDigestCache::from(&db);
        assert_eq!(cache.get("file-1").await.unwrap(), Some(digest("abc123")));
        db.close().await;
    }
}
