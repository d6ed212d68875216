//! Configuration for store backends

use crate::backend::ScanVisitor;
use crate::{Error, InMemoryBackend, Result, SqliteBackend, StoreBackend};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type
    #[serde(default)]
    pub backend: BackendConfig,

    /// How long a durable write waits for a lock before failing
    #[serde(default = "default_busy_timeout", with = "humantime_serde")]
    pub busy_timeout: Duration,
}

/// Backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local store, lost on exit (default)
    #[default]
    Memory,

    /// Durable store in a SQLite database file
    File {
        /// Database file path
        path: PathBuf,
    },
}

fn default_busy_timeout() -> Duration {
    SqliteBackend::DEFAULT_BUSY_TIMEOUT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl StoreConfig {
    /// Open the configured backend
    pub async fn open(&self) -> Result<Store> {
        match &self.backend {
            BackendConfig::Memory => Ok(Store::Memory(InMemoryBackend::new())),
            BackendConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::InvalidConfig(
                        "store file path must not be empty".to_string(),
                    ));
                }
                let backend = SqliteBackend::open_with(path, self.busy_timeout).await?;
                Ok(Store::Sqlite(backend))
            }
        }
    }
}

/// Backend chosen at runtime from [`StoreConfig`]
#[derive(Debug, Clone)]
pub enum Store {
    /// In-memory backend
    Memory(InMemoryBackend),
    /// SQLite file backend
    Sqlite(SqliteBackend),
}

#[async_trait]
impl StoreBackend for Store {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Store::Memory(backend) => backend.get(key).await,
            Store::Sqlite(backend) => backend.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        match self {
            Store::Memory(backend) => backend.set(key, value).await,
            Store::Sqlite(backend) => backend.set(key, value).await,
        }
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        match self {
            Store::Memory(backend) => backend.set_if_absent(key, value).await,
            Store::Sqlite(backend) => backend.set_if_absent(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Store::Memory(backend) => backend.delete(key).await,
            Store::Sqlite(backend) => backend.delete(key).await,
        }
    }

    async fn increment(&self, key: &str, delta: u64) -> Result<u64> {
        match self {
            Store::Memory(backend) => backend.increment(key, delta).await,
            Store::Sqlite(backend) => backend.increment(key, delta).await,
        }
    }

    async fn scan_prefix(&self, prefix: &str, visitor: &mut ScanVisitor<'_>) -> Result<()> {
        match self {
            Store::Memory(backend) => backend.scan_prefix(prefix, visitor).await,
            Store::Sqlite(backend) => backend.scan_prefix(prefix, visitor).await,
        }
    }

    async fn health_check(&self) -> Result<()> {
        match self {
            Store::Memory(backend) => backend.health_check().await,
            Store::Sqlite(backend) => backend.health_check().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_is_memory() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendConfig::Memory);
        assert!(matches!(config.open().await.unwrap(), Store::Memory(_)));
    }

    #[test]
    fn test_deserialize_file_backend() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"backend":{"type":"file","path":"/tmp/conduit.db"},"busy_timeout":"250ms"}"#,
        )
        .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::File {
                path: PathBuf::from("/tmp/conduit.db")
            }
        );
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_file_backend_opens_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: BackendConfig::File {
                path: dir.path().join("conduit.db"),
            },
            ..StoreConfig::default()
        };

        let store = config.open().await.unwrap();
        assert!(matches!(store, Store::Sqlite(_)));
        store.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let config = StoreConfig {
            backend: BackendConfig::File {
                path: PathBuf::new(),
            },
            ..StoreConfig::default()
        };
        assert!(matches!(config.open().await, Err(Error::InvalidConfig(_))));
    }
}
