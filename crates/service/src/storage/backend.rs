use std::{fmt, path::Path};

use async_trait::async_trait;
use configs::{StorageBackend, StorageConfig};
use serde_json::Value;

use super::{Entry, JsonFileStore, KvStore, StorageError};
#[cfg(feature = "sqlite")]
use super::SqliteStore;

/// The driver chosen at startup. Selection happens once in
/// [`Backend::from_config`]; afterwards every call dispatches to that variant.
pub enum Backend {
    Json(JsonFileStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
}

impl Backend {
    /// Construct (but do not initialize) the driver named by `cfg`.
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let requested = cfg.resolved_path();
        let path = common::env::absolute_path(&requested).map_err(|e| StorageError::init(&requested, e))?;
        match cfg.backend {
            StorageBackend::Json => Ok(Self::Json(JsonFileStore::new(path))),
            #[cfg(feature = "sqlite")]
            StorageBackend::Sqlite => {
                Ok(Self::Sqlite(SqliteStore::new(path).with_sqlx_logging(cfg.sqlx_logging)))
            }
            #[cfg(not(feature = "sqlite"))]
            StorageBackend::Sqlite => Err(StorageError::BackendUnavailable {
                backend: "sqlite",
                reason: format!(
                    "this build does not include sqlite support (requested {}); rebuild with `--features sqlite`",
                    path.display()
                ),
            }),
        }
    }

    pub fn kind(&self) -> StorageBackend {
        match self {
            Self::Json(_) => StorageBackend::Json,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => StorageBackend::Sqlite,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Json(store) => store.path(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(store) => store.path(),
        }
    }

    fn driver(&self) -> &dyn KvStore {
        match self {
            Self::Json(store) => store,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(store) => store,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .finish()
    }
}

#[async_trait]
impl KvStore for Backend {
    async fn initialize(&self) -> Result<(), StorageError> {
        self.driver().initialize().await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.driver().get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.driver().set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.driver().delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        self.driver().list(prefix).await
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.driver().count().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.driver().close().await
    }
}
