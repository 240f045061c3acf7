use std::{
    collections::BTreeMap,
    ops::Bound,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, error, info};

use super::{Entry, KvStore, StorageError};

/// In-memory working copy plus a counter bumped by every mutation.
struct MapState {
    entries: BTreeMap<String, Value>,
    generation: u64,
}

/// JSON file-backed key-value store.
///
/// The whole map lives in memory and is rewritten to disk, pretty-printed,
/// after every mutation. Mutations touch the map synchronously and then
/// queue on `write_queue`, a fair mutex, so file writes happen one at a time
/// in issue order. Each write goes to a temp file that is synced and renamed
/// over the target, so readers of the file only ever see whole snapshots.
pub struct JsonFileStore {
    file_path: PathBuf,
    state: RwLock<Option<MapState>>,
    /// Generation of the newest snapshot known to be on disk.
    write_queue: Mutex<u64>,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into(), state: RwLock::new(None), write_queue: Mutex::new(0) }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_state<T>(&self, f: impl FnOnce(&MapState) -> T) -> Result<T, StorageError> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(f).ok_or(StorageError::NotInitialized)
    }

    fn write_state<T>(&self, f: impl FnOnce(&mut MapState) -> T) -> Result<T, StorageError> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f).ok_or(StorageError::NotInitialized)
    }

    /// Make the mutation stamped `generation` durable.
    ///
    /// Skips the write when an earlier queued persist already flushed a
    /// snapshot that includes it.
    async fn persist(&self, generation: u64) -> Result<(), StorageError> {
        let mut persisted = self.write_queue.lock().await;
        if generation <= *persisted {
            return Ok(());
        }
        let (current, bytes) = self.read_state(|s| (s.generation, serde_json::to_vec_pretty(&s.entries)))?;
        write_atomic(&self.file_path, &bytes?).await.map_err(|e| {
            error!(path = %self.file_path.display(), error = %e, "failed to persist json store");
            e
        })?;
        *persisted = current;
        Ok(())
    }
}

/// Write `bytes` to a uniquely named sibling temp file, sync it, rename it
/// over `path`, then sync the directory so the rename itself is durable.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let tmp = path.with_file_name(name);

    if let Err(e) = write_and_rename(&tmp, path, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    sync_parent_dir(path).await
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => fs::File::open(dir).await?.sync_all().await,
        None => Ok(()),
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        common::env::ensure_parent_dir(&self.file_path)
            .await
            .map_err(|e| StorageError::init(&self.file_path, e))?;

        // Hold the queue so a reload never races an in-flight write.
        let persisted = self.write_queue.lock().await;
        let entries: BTreeMap<String, Value> = match fs::read(&self.file_path).await {
            Ok(bytes) => {
                let entries: BTreeMap<String, Value> = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::init(&self.file_path, format!("corrupt store file: {e}")))?;
                info!(path = %self.file_path.display(), entries = entries.len(), "json store initialized");
                entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = BTreeMap::new();
                let bytes = serde_json::to_vec_pretty(&empty)?;
                write_atomic(&self.file_path, &bytes)
                    .await
                    .map_err(|e| StorageError::init(&self.file_path, e))?;
                info!(path = %self.file_path.display(), "json store created new file");
                empty
            }
            Err(e) => return Err(StorageError::init(&self.file_path, e)),
        };

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(MapState { entries, generation: *persisted });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.read_state(|s| s.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let generation = self.write_state(|s| {
            s.entries.insert(key.to_owned(), value);
            s.generation += 1;
            s.generation
        })?;
        self.persist(generation).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let removed = self.write_state(|s| {
            s.entries.remove(key).map(|_| {
                s.generation += 1;
                s.generation
            })
        })?;
        match removed {
            Some(generation) => {
                self.persist(generation).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        self.read_state(|s| {
            s.entries
                .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.read_state(|s| s.entries.len())
    }

    async fn close(&self) -> Result<(), StorageError> {
        // Queued writes finish before the map is dropped.
        let _persisted = self.write_queue.lock().await;
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(path = %self.file_path.display(), "json store closed");
        }
        Ok(())
    }
}
