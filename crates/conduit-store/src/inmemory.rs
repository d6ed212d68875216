//! In-memory store backend implementation
//!
//! Entries live in an ordered map behind a reader/writer lock: scans take the
//! read lock and see a consistent snapshot, writes take the write lock and are
//! serialised. A write either applies completely or returns an error before
//! touching the map.

use crate::backend::ScanVisitor;
use crate::{Error, Result, StoreBackend};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

type Entries = BTreeMap<String, Vec<u8>>;

/// In-memory store backend
///
/// Single-process only, lost on exit. Cloning shares the same store.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryBackend {
    /// Create a new, empty backend
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Get the number of entries in the store
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Apply a mutation under the write lock
    ///
    /// `op` must return any error before it mutates the map.
    fn write<R>(&self, op: impl FnOnce(&mut Entries) -> Result<R>) -> Result<R> {
        op(&mut self.entries.write())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
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
impl StoreBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(key, "InMemory GET");
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        trace!(key, bytes = value.len(), "InMemory SET");
        self.write(|entries| {
            entries.insert(key.to_string(), value);
            Ok(())
        })
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        trace!(key, "InMemory SET IF ABSENT");

        // Fast path: no write lock for a present key
        if self.entries.read().contains_key(key) {
            return Ok(false);
        }

        self.write(|entries| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(key.to_string(), value);
            Ok(true)
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(key, "InMemory DELETE");

        if !self.entries.read().contains_key(key) {
            return Ok(());
        }

        self.write(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    async fn increment(&self, key: &str, delta: u64) -> Result<u64> {
        trace!(key, delta, "InMemory INCREMENT");

        self.write(|entries| {
            let current = match entries.get(key) {
                Some(raw) => parse_counter(key, raw)?,
                None => 0,
            };
            let next = current.checked_add(delta).ok_or_else(|| Error::Conflict {
                key: key.to_string(),
                reason: "counter overflow".to_string(),
            })?;
            entries.insert(key.to_string(), next.to_string().into_bytes());
            Ok(next)
        })
    }

    async fn scan_prefix(&self, prefix: &str, visitor: &mut ScanVisitor<'_>) -> Result<()> {
        trace!(prefix, "InMemory SCAN");

        let entries = self.entries.read();
        for (key, value) in entries.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            visitor(key.as_str(), value.as_slice())?;
        }
        Ok(())
    }
}
