use std::sync::Arc;

use tracing::debug;

use crate::config_repo::{Actor, ConfigRepository, ScopeConfig};
use crate::errors::ServiceError;
use crate::service_cache::ServiceCache;

/// What a request handler needs for a configured scope.
#[derive(Debug)]
pub struct ScopeContext<S> {
    pub config: ScopeConfig,
    pub client: Arc<S>,
}

/// Resolves scopes to their stored configuration plus a cached handle, and
/// keeps the cache in step when a scope is reconfigured or removed.
pub struct ScopeContextResolver<S> {
    repo: ConfigRepository,
    cache: Arc<ServiceCache<S>>,
}

impl<S> ScopeContextResolver<S> {
    pub fn new(repo: ConfigRepository, cache: Arc<ServiceCache<S>>) -> Self {
        Self { repo, cache }
    }

    pub fn repository(&self) -> &ConfigRepository {
        &self.repo
    }

    /// `None` when the scope has no configuration.
    pub async fn resolve(&self, tenant_id: &str, scope_id: &str) -> Result<Option<ScopeContext<S>>, ServiceError> {
        let Some(config) = self.repo.get_config(tenant_id, scope_id).await? else {
            return Ok(None);
        };
        let client = self.cache.get_or_create(&config.workspace_slug, &config.project_id);
        Ok(Some(ScopeContext { config, client }))
    }

    /// Store a new binding for the scope. The handle of a previously bound,
    /// different workspace/project pair is invalidated.
    pub async fn configure(
        &self,
        tenant_id: &str,
        scope_id: &str,
        workspace_slug: &str,
        project_id: &str,
        actor: &Actor,
    ) -> Result<ScopeContext<S>, ServiceError> {
        let previous = self.repo.get_config(tenant_id, scope_id).await?;
        let config = self
            .repo
            .set_config(tenant_id, scope_id, workspace_slug, project_id, actor)
            .await?;
        if let Some(prev) = previous {
            if prev.workspace_slug != config.workspace_slug || prev.project_id != config.project_id {
                debug!(tenant_id, scope_id, "binding changed; dropping previous handle");
                self.cache.invalidate(&prev.workspace_slug, &prev.project_id);
            }
        }
        let client = self.cache.get_or_create(&config.workspace_slug, &config.project_id);
        Ok(ScopeContext { config, client })
    }

    /// Remove the scope's binding and its cached handle.
    pub async fn remove(&self, tenant_id: &str, scope_id: &str) -> Result<bool, ServiceError> {
        let previous = self.repo.get_config(tenant_id, scope_id).await?;
        let removed = self.repo.remove_config(tenant_id, scope_id).await?;
        if let Some(prev) = previous {
            self.cache.invalidate(&prev.workspace_slug, &prev.project_id);
        }
        Ok(removed)
    }
}
