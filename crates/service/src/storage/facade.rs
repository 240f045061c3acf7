use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use arc_swap::ArcSwapOption;
use configs::StorageConfig;
use tracing::{error, info, warn};

use super::{Backend, KvStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Closed,
}

/// Owns the one active backend for the life of the process.
///
/// Built by the entry point and shared as `Arc<StorageFacade>`; everything
/// that needs storage goes through [`get_storage`](Self::get_storage).
#[derive(Default)]
pub struct StorageFacade {
    active: ArcSwapOption<Backend>,
    closed: AtomicBool,
}

impl StorageFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select, construct and initialize the backend named by `cfg`.
    ///
    /// Calling this again swaps in a new backend. The previous one is not
    /// closed here; it is released when its last handle is dropped.
    pub async fn create_storage(&self, cfg: &StorageConfig) -> Result<Arc<Backend>, StorageError> {
        info!(backend = %cfg.backend, "creating storage instance");
        let backend = Backend::from_config(cfg)?;
        if let Err(e) = backend.initialize().await {
            error!(backend = %cfg.backend, error = %e, "failed to initialize storage");
            return Err(e);
        }

        let backend = Arc::new(backend);
        if let Some(previous) = self.active.swap(Some(Arc::clone(&backend))) {
            warn!(previous = %previous.kind(), "replaced active storage without closing it");
        }
        self.closed.store(false, Ordering::SeqCst);
        Ok(backend)
    }

    /// The active backend, or `NotInitialized` before `create_storage` or
    /// after `close_storage`.
    pub fn get_storage(&self) -> Result<Arc<Backend>, StorageError> {
        self.active.load_full().ok_or(StorageError::NotInitialized)
    }

    /// Close and drop the active backend. No-op when nothing is active.
    pub async fn close_storage(&self) -> Result<(), StorageError> {
        if let Some(backend) = self.active.swap(None) {
            self.closed.store(true, Ordering::SeqCst);
            backend.close().await?;
            info!(backend = %backend.kind(), "storage closed");
        }
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.active.load().is_some() {
            Lifecycle::Initialized
        } else if self.closed.load(Ordering::SeqCst) {
            Lifecycle::Closed
        } else {
            Lifecycle::Uninitialized
        }
    }
}
