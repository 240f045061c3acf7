//! Per-scope configuration records.
//!
//! Records live under compound keys `"<tenant>:<scope>"`. Tenant ids may not
//! contain the separator, so the first `:` always ends the tenant part and a
//! scope id is recovered by stripping the tenant prefix. Scope ids may
//! contain `:` freely.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::storage::{KvStore, StorageFacade};

pub const KEY_SEPARATOR: char = ':';

/// Workspace/project binding stored for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeConfig {
    pub workspace_slug: String,
    pub project_id: String,
    pub configured_by: String,
    pub configured_by_tag: String,
    pub configured_at: DateTime<Utc>,
}

/// Who changed a configuration: stable id plus display tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub tag: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { id: id.into(), tag: tag.into() }
    }
}

fn tenant_prefix(tenant_id: &str) -> Result<String, ServiceError> {
    if tenant_id.is_empty() {
        return Err(ServiceError::validation("tenant id must not be empty"));
    }
    if tenant_id.contains(KEY_SEPARATOR) {
        return Err(ServiceError::validation(format!(
            "tenant id `{tenant_id}` must not contain `{KEY_SEPARATOR}`"
        )));
    }
    Ok(format!("{tenant_id}{KEY_SEPARATOR}"))
}

/// Build the store key for `(tenant_id, scope_id)`.
pub fn compound_key(tenant_id: &str, scope_id: &str) -> Result<String, ServiceError> {
    if scope_id.is_empty() {
        return Err(ServiceError::validation("scope id must not be empty"));
    }
    Ok(format!("{}{scope_id}", tenant_prefix(tenant_id)?))
}

fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{field} required")));
    }
    Ok(())
}

/// Typed access to scope configurations through the active storage backend.
#[derive(Clone)]
pub struct ConfigRepository {
    storage: Arc<StorageFacade>,
}

impl ConfigRepository {
    pub fn new(storage: Arc<StorageFacade>) -> Self {
        Self { storage }
    }

    pub async fn get_config(&self, tenant_id: &str, scope_id: &str) -> Result<Option<ScopeConfig>, ServiceError> {
        let key = compound_key(tenant_id, scope_id)?;
        let raw = self.storage.get_storage()?.get(&key).await?;
        debug!(tenant_id, scope_id, found = raw.is_some(), "retrieved scope config");
        raw.map(|value| decode(&key, value)).transpose()
    }

    /// Store a fresh record for the scope, replacing any previous one.
    pub async fn set_config(
        &self,
        tenant_id: &str,
        scope_id: &str,
        workspace_slug: &str,
        project_id: &str,
        actor: &Actor,
    ) -> Result<ScopeConfig, ServiceError> {
        let key = compound_key(tenant_id, scope_id)?;
        require("workspace slug", workspace_slug)?;
        require("project id", project_id)?;

        let config = ScopeConfig {
            workspace_slug: workspace_slug.to_owned(),
            project_id: project_id.to_owned(),
            configured_by: actor.id.clone(),
            configured_by_tag: actor.tag.clone(),
            // Millisecond precision, matching existing ISO-8601 records.
            configured_at: Utc::now().trunc_subsecs(3),
        };
        let value = serde_json::to_value(&config)
            .map_err(|source| ServiceError::Serialization { key: key.clone(), source })?;
        self.storage.get_storage()?.set(&key, value).await?;

        info!(
            tenant_id,
            scope_id,
            workspace_slug,
            project_id,
            configured_by = %actor.tag,
            "scope config set"
        );
        Ok(config)
    }

    /// Returns whether a configuration existed.
    pub async fn remove_config(&self, tenant_id: &str, scope_id: &str) -> Result<bool, ServiceError> {
        let key = compound_key(tenant_id, scope_id)?;
        let removed = self.storage.get_storage()?.delete(&key).await?;
        info!(tenant_id, scope_id, was_configured = removed, "scope config removed");
        Ok(removed)
    }

    /// Every configured scope of a tenant as `(scope_id, config)`, by scope id.
    pub async fn list_scope_configs(&self, tenant_id: &str) -> Result<Vec<(String, ScopeConfig)>, ServiceError> {
        let prefix = tenant_prefix(tenant_id)?;
        let entries = self.storage.get_storage()?.list(&prefix).await?;

        let mut configs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(scope_id) = key.strip_prefix(&prefix) else {
                continue;
            };
            configs.push((scope_id.to_owned(), decode(&key, value)?));
        }
        debug!(tenant_id, count = configs.len(), "listed scope configs");
        Ok(configs)
    }
}

fn decode(key: &str, value: serde_json::Value) -> Result<ScopeConfig, ServiceError> {
    serde_json::from_value(value).map_err(|source| ServiceError::Serialization { key: key.to_owned(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_key_joins_with_separator() -> Result<(), ServiceError> {
        assert_eq!(compound_key("g1", "c1")?, "g1:c1");
        assert_eq!(compound_key("g1", "thread:42")?, "g1:thread:42");
        Ok(())
    }

    #[test]
    fn ambiguous_or_empty_ids_are_rejected() {
        assert!(matches!(compound_key("g:1", "c1"), Err(ServiceError::Validation(_))));
        assert!(matches!(compound_key("", "c1"), Err(ServiceError::Validation(_))));
        assert!(matches!(compound_key("g1", ""), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn record_uses_camel_case_fields() -> Result<(), anyhow::Error> {
        let raw = serde_json::json!({
            "workspaceSlug": "acme",
            "projectId": "PRJ-1",
            "configuredBy": "u1",
            "configuredByTag": "u1#0001",
            "configuredAt": "2024-05-01T12:30:00.123Z"
        });
        let config: ScopeConfig = serde_json::from_value(raw.clone())?;
        assert_eq!(config.workspace_slug, "acme");
        assert_eq!(config.configured_at.timestamp_subsec_millis(), 123);

        let back = serde_json::to_value(&config)?;
        assert_eq!(back["configuredByTag"], "u1#0001");
        assert_eq!(back.as_object().map(|o| o.len()), Some(5));
        Ok(())
    }
}
