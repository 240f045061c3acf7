//! Storage abstractions for the service layer.
//!
//! One contract ([`KvStore`]) with two drivers: a JSON file holding the whole
//! map, and a single sqlite table (behind the `sqlite` feature). The
//! [`StorageFacade`] picks one at startup and owns it until shutdown.

pub mod backend;
pub mod error;
pub mod facade;
pub mod json_file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

pub use backend::Backend;
pub use error::StorageError;
pub use facade::{Lifecycle, StorageFacade};
pub use json_file::JsonFileStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// A stored `(key, value)` pair as returned by [`KvStore::list`].
pub type Entry = (String, Value);

/// Key-value contract shared by every backend driver.
///
/// Keys are opaque strings; the only structure a driver ever looks at is a
/// prefix during [`list`](KvStore::list). Every operation other than
/// `initialize` and `close` fails with [`StorageError::NotInitialized`]
/// outside the initialized window.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Prepare physical storage. Safe to call again on an open store.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Point lookup. `Ok(None)` means absent; a stored JSON `null` comes back
    /// as `Some(Value::Null)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Upsert. Durable once this returns `Ok`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// All entries whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, StorageError>;

    /// Release held resources. Idempotent.
    async fn close(&self) -> Result<(), StorageError>;
}
