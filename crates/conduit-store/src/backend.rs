//! Store backend trait definition

use crate::{Error, Result};
use async_trait::async_trait;

/// Visitor invoked for every entry of a prefix scan
///
/// Returning an error stops the scan and surfaces the error.
pub type ScanVisitor<'a> = dyn FnMut(&str, &[u8]) -> Result<()> + Send + 'a;

/// Store backend trait
///
/// A byte-oriented key/value store with prefix-ordered iteration. Reads see a
/// consistent snapshot; writes are serialised by the backend.
#[async_trait]
pub trait StoreBackend: Send + Sync + Clone + 'static {
    /// Get a value by key
    ///
    /// Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Set a value only if the key is absent
    ///
    /// Check and write happen in one write transaction. Returns true if the
    /// value was written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Delete a key
    ///
    /// Returns Ok(()) whether the key existed or not.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomic increment operation
    ///
    /// Increments the counter at key by delta. A missing key counts as zero.
    /// Returns the new value after increment.
    async fn increment(&self, key: &str, delta: u64) -> Result<u64>;

    /// Visit every entry whose key starts with `prefix`, in key order
    async fn scan_prefix(&self, prefix: &str, visitor: &mut ScanVisitor<'_>) -> Result<()>;

    /// Health check - verify the backend reads back what it writes
    async fn health_check(&self) -> Result<()> {
        let test_key = "_health:check";
        let test_value = b"ok".to_vec();

        self.set(test_key, test_value.clone()).await?;
        let result = self.get(test_key).await?;
        self.delete(test_key).await?;

        if result == Some(test_value) {
            Ok(())
        } else {
            Err(Error::Backend("Health check failed".to_string()))
        }
    }
}
