use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to initialize storage at {}: {reason}", path.display())]
    Initialization { path: PathBuf, reason: String },
    #[error("{backend} storage backend is unavailable: {reason}")]
    BackendUnavailable { backend: &'static str, reason: String },
    #[error("storage not initialized; call create_storage() first")]
    NotInitialized,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub(crate) fn init(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Initialization { path: path.into(), reason: reason.to_string() }
    }

    /// Startup-fatal errors: the process should not continue serving.
    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization { .. } | Self::BackendUnavailable { .. })
    }
}

#[cfg(feature = "sqlite")]
impl From<models::errors::ModelError> for StorageError {
    fn from(e: models::errors::ModelError) -> Self {
        Self::Database(e.to_string())
    }
}
