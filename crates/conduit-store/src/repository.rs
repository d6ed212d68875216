//! Typed repository facade
//!
//! A [`KvRepository`] owns no record state. It maps one [`Storable`] type onto
//! the shared backend:
//!
//! - records live under `"{KIND}:{key}"`
//! - sequence counters live under `"_seq:{KIND}:{owner}"`
//!
//! Record kinds must be non-empty, must not start with `_` (reserved for
//! internal namespaces) and must not contain the `:` separator, so that no
//! kind's prefix scan reaches into another kind.

use crate::storable::{accepts_all, Filter, Storable};
use crate::{Error, Result, StoreBackend};
use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use tracing::{trace, warn};
use uuid::Uuid;

const KEY_SEPARATOR: char = ':';
const SEQUENCE_NAMESPACE: &str = "_seq";

fn kind_is_valid(kind: &str) -> bool {
    !kind.is_empty() && !kind.starts_with('_') && !kind.contains(KEY_SEPARATOR)
}

/// Storage operations for one record type
#[async_trait]
pub trait Repository<T: Storable>: Send + Sync {
    /// Persist a record, assigning a generated key when its key is empty
    ///
    /// Overwrites any record stored under the same key. Returns the record as
    /// stored.
    async fn save(&self, record: T) -> Result<T>;

    /// Point lookup; [`Error::NotFound`] when absent
    async fn get(&self, key: &str) -> Result<T>;

    /// All records of this type passing every filter, in storage order
    async fn get_filtered(&self, filters: &[Filter<T>]) -> Result<Vec<T>>;

    /// Number of records passing every filter
    async fn count_filtered(&self, filters: &[Filter<T>]) -> Result<u64>;

    /// Remove a record; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Next value of the per-owner sequence, starting at 1
    async fn sequence(&self, owner: &str) -> Result<u64>;

    /// Store a record only if no record with its key exists
    ///
    /// Returns false, leaving the stored record untouched, when the key is
    /// taken. An empty key is assigned first, so such inserts always succeed.
    async fn insert_if_absent(&self, record: T) -> Result<bool>;
}

/// [`Repository`] over a [`StoreBackend`]
pub struct KvRepository<T, B> {
    backend: B,
    _record: PhantomData<fn() -> T>,
}

impl<T: Storable, B: StoreBackend> KvRepository<T, B> {
    /// Create a repository sharing `backend`
    pub fn new(backend: B) -> Self {
        debug_assert!(
            kind_is_valid(T::KIND),
            "invalid record kind {:?}: must be non-empty, not start with '_' and not contain ':'",
            T::KIND
        );
        Self {
            backend,
            _record: PhantomData,
        }
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn record_key(key: &str) -> String {
        format!("{}{KEY_SEPARATOR}{key}", T::KIND)
    }

    fn namespace_prefix() -> String {
        format!("{}{KEY_SEPARATOR}", T::KIND)
    }

    fn sequence_key(owner: &str) -> String {
        format!(
            "{SEQUENCE_NAMESPACE}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{owner}",
            T::KIND
        )
    }

    fn assign_key(record: &mut T) {
        if record.key().is_empty() {
            record.set_key(Uuid::new_v4().to_string());
        }
    }

    /// Visit every decodable record of this type
    ///
    /// Entries that fail to decode are skipped with a warning.
    async fn scan(&self, mut visit: impl FnMut(T) + Send) -> Result<()> {
        let prefix = Self::namespace_prefix();
        self.backend
            .scan_prefix(&prefix, &mut |key: &str, raw: &[u8]| {
                match serde_json::from_slice::<T>(raw) {
                    Ok(record) => visit(record),
                    Err(e) => warn!(key, kind = T::KIND, error = %e, "Skipping undecodable record"),
                }
                Ok(())
            })
            .await
    }
}

impl<T, B: Clone> Clone for KvRepository<T, B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Storable, B: fmt::Debug> fmt::Debug for KvRepository<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvRepository")
            .field("kind", &T::KIND)
            .field("backend", &self.backend)
            .finish()
    }
}

#[async_trait]
impl<T: Storable, B: StoreBackend> Repository<T> for KvRepository<T, B> {
    async fn save(&self, mut record: T) -> Result<T> {
        Self::assign_key(&mut record);
        let raw = serde_json::to_vec(&record)?;

        trace!(kind = T::KIND, key = record.key(), "Repository SAVE");
        self.backend.set(&Self::record_key(record.key()), raw).await?;
        Ok(record)
    }

    async fn get(&self, key: &str) -> Result<T> {
        let id = Self::record_key(key);
        let raw = self
            .backend
            .get(&id)
            .await?
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn get_filtered(&self, filters: &[Filter<T>]) -> Result<Vec<T>> {
        let mut records = Vec::new();
        self.scan(|record| {
            if accepts_all(filters, &record) {
                records.push(record);
            }
        })
        .await?;

        trace!(kind = T::KIND, matched = records.len(), "Repository GET FILTERED");
        Ok(records)
    }

    async fn count_filtered(&self, filters: &[Filter<T>]) -> Result<u64> {
        let mut count = 0u64;
        self.scan(|record| {
            if accepts_all(filters, &record) {
                count += 1;
            }
        })
        .await?;

        trace!(kind = T::KIND, count, "Repository COUNT FILTERED");
        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(kind = T::KIND, key, "Repository DELETE");
        self.backend.delete(&Self::record_key(key)).await
    }

    async fn sequence(&self, owner: &str) -> Result<u64> {
        self.backend.increment(&Self::sequence_key(owner), 1).await
    }

    async fn insert_if_absent(&self, mut record: T) -> Result<bool> {
        Self::assign_key(&mut record);
        let raw = serde_json::to_vec(&record)?;

        let inserted = self
            .backend
            .set_if_absent(&Self::record_key(record.key()), raw)
            .await?;
        trace!(kind = T::KIND, key = record.key(), inserted, "Repository INSERT IF ABSENT");
        Ok(inserted)
    }
}
