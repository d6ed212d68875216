//! # Conduit Store
//!
//! Generic filtered key-value repository:
//! - [`Storable`] records stored under per-type namespaces
//! - Predicate-based scans and counts through [`Filter`]
//! - Per-owner monotonically increasing sequences
//! - Conditional inserts for uniqueness records
//!
//! ## Backends
//!
//! - **InMemory**: ordered map, lost on exit
//! - **Sqlite**: durable single-file database, one transaction per write
//!
//! ## Example
//!
//! ```rust
//! use conduit_store::{InMemoryBackend, KvRepository, Repository, Storable};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Tag {
//!     name: String,
//! }
//!
//! impl Storable for Tag {
//!     const KIND: &'static str = "tag";
//!
//!     fn key(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn set_key(&mut self, key: String) {
//!         self.name = key;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> conduit_store::Result<()> {
//!     let tags = KvRepository::<Tag, _>::new(InMemoryBackend::new());
//!
//!     tags.save(Tag { name: "rust".to_string() }).await?;
//!     assert_eq!(tags.count_filtered(&[]).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod backend;
mod config;
mod error;
mod inmemory;
mod repository;
mod sqlite;
mod storable;

pub use backend::{ScanVisitor, StoreBackend};
pub use config::{BackendConfig, Store, StoreConfig};
pub use error::{Error, Result};
pub use inmemory::InMemoryBackend;
pub use repository::{KvRepository, Repository};
pub use sqlite::SqliteBackend;
pub use storable::{accepts_all, Filter, Storable};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::StoreBackend;
    pub use crate::error::{Error, Result};
    pub use crate::config::Store;
    pub use crate::inmemory::InMemoryBackend;
    pub use crate::repository::{KvRepository, Repository};
    pub use crate::sqlite::SqliteBackend;
    pub use crate::storable::{Filter, Storable};
}
