use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

type Factory<S> = dyn Fn(&str, &str) -> S + Send + Sync;

/// Lazily built service handles keyed by `(workspace_slug, project_id)`.
///
/// Entries live until [`invalidate`](Self::invalidate) or
/// [`clear_all`](Self::clear_all); there is no TTL and no size bound. The
/// factory runs under the shard lock, so it must be cheap and must not call
/// back into the cache.
pub struct ServiceCache<S> {
    entries: DashMap<(String, String), Arc<S>>,
    factory: Box<Factory<S>>,
}

impl<S> ServiceCache<S> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str, &str) -> S + Send + Sync + 'static,
    {
        Self { entries: DashMap::new(), factory: Box::new(factory) }
    }

    fn key(workspace_slug: &str, project_id: &str) -> (String, String) {
        (workspace_slug.to_owned(), project_id.to_owned())
    }

    /// Cached handle for the pair, building it on first use.
    pub fn get_or_create(&self, workspace_slug: &str, project_id: &str) -> Arc<S> {
        let key = Self::key(workspace_slug, project_id);
        if let Some(handle) = self.entries.get(&key) {
            return Arc::clone(handle.value());
        }
        let entry = self.entries.entry(key).or_insert_with(|| {
            debug!(workspace_slug, project_id, "creating service handle");
            Arc::new((self.factory)(workspace_slug, project_id))
        });
        Arc::clone(entry.value())
    }

    /// Drop the handle for one pair; returns whether it was cached.
    pub fn invalidate(&self, workspace_slug: &str, project_id: &str) -> bool {
        let removed = self.entries.remove(&Self::key(workspace_slug, project_id)).is_some();
        if removed {
            debug!(workspace_slug, project_id, "cleared service handle");
        }
        removed
    }

    /// Drop every handle; returns how many were cached.
    pub fn clear_all(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        info!(count, "cleared all service handles");
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
