//! SQLite store backend implementation

use crate::backend::ScanVisitor;
use crate::{Error, Result, StoreBackend};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Table holding every entry
const TABLE: &str = "conduit_entries";

/// Durable store backend over a single SQLite database file
///
/// Every write is one SQLite transaction committed with `synchronous = FULL`
/// in WAL mode, so a write that returns `Ok` is on disk and a write that
/// returns `Err` leaves nothing behind. The pool holds one connection, which
/// serialises writers inside the process.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteBackend {
    /// Default time a write waits for a lock held by another connection
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (creating if missing) the database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Self::DEFAULT_BUSY_TIMEOUT).await
    }

    /// Open the database at `path`, waiting at most `busy_timeout` for locks
    pub async fn open_with(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let backend = Self { pool, path };
        backend.init_schema().await?;

        debug!(path = %backend.path.display(), "SQLite backend opened");

        Ok(backend)
    }

    /// Database file backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<()> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL)"
        );
        sqlx::query(&query).execute(&self.pool).await?;

        debug!(table = TABLE, "Schema initialized");
        Ok(())
    }
}

fn parse_counter(key: &str, raw: &[u8]) -> Result<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::Conflict {
            key: key.to_string(),
            reason: "value is not a counter".to_string(),
        })
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(key, "SQLite GET");

        let query = format!("SELECT value FROM {TABLE} WHERE key = ?1");
        let value = sqlx::query_scalar::<_, Vec<u8>>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        trace!(key, bytes = value.len(), "SQLite SET");

        let query = format!(
            "INSERT INTO {TABLE} (key, value) VALUES (?1, ?2) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value"
        );
        sqlx::query(&query)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        trace!(key, "SQLite SET IF ABSENT");

        let query =
            format!("INSERT INTO {TABLE} (key, value) VALUES (?1, ?2) ON CONFLICT (key) DO NOTHING");
        let result = sqlx::query(&query)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(key, "SQLite DELETE");

        let query = format!("DELETE FROM {TABLE} WHERE key = ?1");
        sqlx::query(&query).bind(key).execute(&self.pool).await?;

        Ok(())
    }

    async fn increment(&self, key: &str, delta: u64) -> Result<u64> {
        trace!(key, delta, "SQLite INCREMENT");

        // Read and write in one transaction; dropping it on error rolls back
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT value FROM {TABLE} WHERE key = ?1");
        let current = match sqlx::query_scalar::<_, Vec<u8>>(&query)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
        {
            Some(raw) => parse_counter(key, &raw)?,
            None => 0,
        };

        let next = current.checked_add(delta).ok_or_else(|| Error::Conflict {
            key: key.to_string(),
            reason: "counter overflow".to_string(),
        })?;

        let query = format!(
            "INSERT INTO {TABLE} (key, value) VALUES (?1, ?2) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value"
        );
        sqlx::query(&query)
            .bind(key)
            .bind(next.to_string().into_bytes())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(next)
    }

    async fn scan_prefix(&self, prefix: &str, visitor: &mut ScanVisitor<'_>) -> Result<()> {
        trace!(prefix, "SQLite SCAN");

        let query = format!(
            "SELECT key, value FROM {TABLE} \
             WHERE key >= ?1 AND substr(key, 1, length(?1)) = ?1 ORDER BY key"
        );
        let rows = sqlx::query(&query)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let key: String = row.try_get("key")?;
            let value: Vec<u8> = row.try_get("value")?;
            visitor(&key, &value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, SqliteConnection};

    async fn setup(dir: &tempfile::TempDir) -> SqliteBackend {
        SqliteBackend::open(dir.path().join("conduit.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_set() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;

        backend.set("key1", b"value1".to_vec()).await.unwrap();
        backend.set("key1", b"value2".to_vec()).await.unwrap();

        assert_eq!(backend.get("key1").await.unwrap(), Some(b"value2".to_vec()));
        assert!(backend.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_if_absent_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;

        assert!(backend.set_if_absent("fav:1", b"a".to_vec()).await.unwrap());
        assert!(!backend.set_if_absent("fav:1", b"b".to_vec()).await.unwrap());
        assert_eq!(backend.get("fav:1").await.unwrap(), Some(b"a".to_vec()));

        backend.delete("fav:1").await.unwrap();
        backend.delete("fav:1").await.unwrap();
        assert!(backend.get("fav:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_prefix_is_ordered_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;

        backend.set("user:2", b"bob".to_vec()).await.unwrap();
        backend.set("user:1", b"alice".to_vec()).await.unwrap();
        backend.set("users:1", b"other".to_vec()).await.unwrap();
        backend.set("article:1", b"x".to_vec()).await.unwrap();

        let mut seen = Vec::new();
        backend
            .scan_prefix("user:", &mut |key: &str, _: &[u8]| {
                seen.push(key.to_string());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["user:1", "user:2"]);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_counter_without_change() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;
        backend.set("key1", b"not a number".to_vec()).await.unwrap();

        let err = backend.increment("key1", 1).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(backend.get("key1").await.unwrap(), Some(b"not a number".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_increment_consumes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;

        assert_eq!(backend.increment("counter", u64::MAX - 1).await.unwrap(), u64::MAX - 1);
        assert!(backend.increment("counter", 5).await.is_err());
        assert_eq!(backend.increment("counter", 1).await.unwrap(), u64::MAX);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("conduit.db");

        {
            let backend = SqliteBackend::open(&path).await.unwrap();
            backend.set("user:1", b"alice".to_vec()).await.unwrap();
            assert_eq!(backend.increment("_seq:article:a", 1).await.unwrap(), 1);
            assert_eq!(backend.increment("_seq:article:a", 1).await.unwrap(), 2);
            backend.pool.close().await;
        }

        let reopened = SqliteBackend::open(&path).await.unwrap();
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.get("user:1").await.unwrap(), Some(b"alice".to_vec()));
        assert_eq!(reopened.increment("_seq:article:a", 1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_write_blocked_by_another_writer_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.db");
        let backend = SqliteBackend::open_with(&path, Duration::from_millis(50))
            .await
            .unwrap();

        let mut other = SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut other).await.unwrap();

        assert!(backend.set("item:a", b"a".to_vec()).await.is_err());
        assert!(backend.get("item:a").await.unwrap().is_none());
        assert!(backend.increment("_seq:item:x", 1).await.is_err());

        sqlx::query("ROLLBACK").execute(&mut other).await.unwrap();
        other.close().await.unwrap();

        assert_eq!(backend.increment("_seq:item:x", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let backend = setup(&dir).await;
        assert!(backend.health_check().await.is_ok());
        assert!(backend.get("_health:check").await.unwrap().is_none());
    }
}
