use std::{
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use models::channel_config;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tracing::{debug, info};

use super::{Entry, KvStore, StorageError};

/// Single-table sqlite store.
///
/// Values are stored as serialized JSON in `channel_configs.value`; upserts
/// use `ON CONFLICT(key) DO UPDATE`. Write ordering is left to the engine's
/// per-statement atomicity, so there is no queue here.
pub struct SqliteStore {
    file_path: PathBuf,
    sqlx_logging: bool,
    db: RwLock<Option<DatabaseConnection>>,
}

impl SqliteStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into(), sqlx_logging: false, db: RwLock::new(None) }
    }

    pub fn with_sqlx_logging(mut self, enabled: bool) -> Self {
        self.sqlx_logging = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn conn(&self) -> Result<DatabaseConnection, StorageError> {
        let guard = self.db.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone().ok_or(StorageError::NotInitialized)
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        if let Ok(db) = self.conn() {
            channel_config::ensure_table(&db)
                .await
                .map_err(|e| StorageError::init(&self.file_path, e))?;
            return Ok(());
        }

        common::env::ensure_parent_dir(&self.file_path)
            .await
            .map_err(|e| StorageError::init(&self.file_path, e))?;
        let db = models::db::connect_sqlite(&self.file_path, self.sqlx_logging)
            .await
            .map_err(|e| StorageError::init(&self.file_path, e))?;
        channel_config::ensure_table(&db)
            .await
            .map_err(|e| StorageError::init(&self.file_path, e))?;
        let entries = channel_config::count(&db)
            .await
            .map_err(|e| StorageError::init(&self.file_path, e))?;
        info!(path = %self.file_path.display(), entries, "sqlite store initialized");

        let mut guard = self.db.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(db);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let db = self.conn()?;
        match channel_config::find_value(&db, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let db = self.conn()?;
        let raw = serde_json::to_string(&value)?;
        channel_config::upsert(&db, key, raw).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let db = self.conn()?;
        Ok(channel_config::delete(&db, key).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        let db = self.conn()?;
        channel_config::list_prefix(&db, prefix)
            .await?
            .into_iter()
            .map(|row| -> Result<Entry, StorageError> { Ok((row.key, serde_json::from_str(&row.value)?)) })
            .collect()
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let db = self.conn()?;
        let n = channel_config::count(&db).await?;
        Ok(usize::try_from(n).unwrap_or(usize::MAX))
    }

    async fn close(&self) -> Result<(), StorageError> {
        let taken = {
            let mut guard = self.db.write().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        if let Some(db) = taken {
            db.close().await.map_err(|e| StorageError::Database(e.to_string()))?;
            debug!(path = %self.file_path.display(), "sqlite store closed");
        }
        Ok(())
    }
}
