use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use configs::{ApiConfig, StorageBackend, StorageConfig};
use service::{
    project_client::project_client_cache, Actor, ConfigRepository, KvStore, ScopeContextResolver, ServiceError,
    StorageError, StorageFacade,
};

async fn setup(kind: StorageBackend) -> anyhow::Result<(Arc<StorageFacade>, ConfigRepository, PathBuf)> {
    let dir = std::env::temp_dir().join(format!("config_repo_{}", uuid::Uuid::new_v4()));
    let file = if kind == StorageBackend::Json { "channels.json" } else { "channels.db" };
    let facade = Arc::new(StorageFacade::new());
    facade.create_storage(&StorageConfig::new(kind, Some(dir.join(file)))).await?;
    let repo = ConfigRepository::new(Arc::clone(&facade));
    Ok((facade, repo, dir))
}

async fn teardown(facade: &StorageFacade, dir: PathBuf) -> anyhow::Result<()> {
    facade.close_storage().await?;
    let _ = tokio::fs::remove_dir_all(dir).await;
    Ok(())
}

async fn check_scenarios(kind: StorageBackend) -> anyhow::Result<()> {
    let (facade, repo, dir) = setup(kind).await?;
    let actor = Actor::new("u1", "u1#0001");

    // round trip
    let before = Utc::now();
    let stored = repo.set_config("g1", "c1", "acme", "PRJ-1", &actor).await?;
    let fetched = repo.get_config("g1", "c1").await?.expect("config present");
    assert_eq!(fetched, stored);
    assert_eq!(fetched.workspace_slug, "acme");
    assert_eq!(fetched.project_id, "PRJ-1");
    assert_eq!(fetched.configured_by, "u1");
    assert_eq!(fetched.configured_by_tag, "u1#0001");
    assert!(fetched.configured_at >= before - chrono::Duration::milliseconds(1));

    // configuredAt persisted as a parseable ISO-8601 string
    let raw = facade.get_storage()?.get("g1:c1").await?.expect("raw record");
    let stamp = raw["configuredAt"].as_str().expect("string timestamp");
    assert_eq!(stamp.parse::<DateTime<Utc>>()?, fetched.configured_at);

    // listing is scoped to the tenant
    repo.set_config("g1", "c2", "acme", "PRJ-2", &actor).await?;
    repo.set_config("g2", "c3", "other", "PRJ-3", &actor).await?;
    let listed = repo.list_scope_configs("g1").await?;
    let scopes: Vec<&str> = listed.iter().map(|(scope, _)| scope.as_str()).collect();
    assert_eq!(scopes, vec!["c1", "c2"]);
    assert_eq!(listed[1].1.project_id, "PRJ-2");
    assert!(repo.list_scope_configs("g3").await?.is_empty());

    // remove is true once, then false
    assert!(repo.remove_config("g1", "c1").await?);
    assert!(!repo.remove_config("g1", "c1").await?);
    assert!(repo.get_config("g1", "c1").await?.is_none());
    assert_eq!(repo.list_scope_configs("g1").await?.len(), 1);

    teardown(&facade, dir).await
}

#[tokio::test]
async fn json_repository_scenarios() -> anyhow::Result<()> {
    check_scenarios(StorageBackend::Json).await
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_repository_scenarios() -> anyhow::Result<()> {
    check_scenarios(StorageBackend::Sqlite).await
}

#[tokio::test]
async fn set_replaces_whole_record_with_fresh_timestamp() -> anyhow::Result<()> {
    let (facade, repo, dir) = setup(StorageBackend::Json).await?;
    let first = repo.set_config("g1", "c1", "acme", "PRJ-1", &Actor::new("u1", "u1#0001")).await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = repo.set_config("g1", "c1", "beta", "PRJ-7", &Actor::new("u2", "u2#0002")).await?;

    assert!(second.configured_at > first.configured_at);
    let fetched = repo.get_config("g1", "c1").await?.expect("config present");
    assert_eq!(fetched, second);
    assert_eq!(repo.list_scope_configs("g1").await?.len(), 1);

    teardown(&facade, dir).await
}

#[tokio::test]
async fn scope_ids_containing_separator_round_trip() -> anyhow::Result<()> {
    let (facade, repo, dir) = setup(StorageBackend::Json).await?;
    let actor = Actor::new("u1", "u1#0001");
    repo.set_config("g1", "thread:42", "acme", "PRJ-1", &actor).await?;
    repo.set_config("g1", "c1", "acme", "PRJ-2", &actor).await?;

    let listed = repo.list_scope_configs("g1").await?;
    let scopes: Vec<&str> = listed.iter().map(|(scope, _)| scope.as_str()).collect();
    assert_eq!(scopes, vec!["c1", "thread:42"]);
    assert!(repo.get_config("g1", "thread:42").await?.is_some());

    let err = repo.set_config("g:1", "c1", "acme", "PRJ-1", &actor).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    let err = repo.list_scope_configs("g:1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    teardown(&facade, dir).await
}

#[tokio::test]
async fn malformed_record_is_reported() -> anyhow::Result<()> {
    let (facade, repo, dir) = setup(StorageBackend::Json).await?;
    facade.get_storage()?.set("g1:broken", serde_json::json!({"projectId": 7})).await?;

    let err = repo.get_config("g1", "broken").await.unwrap_err();
    assert!(matches!(err, ServiceError::Serialization { ref key, .. } if key == "g1:broken"));

    teardown(&facade, dir).await
}

#[tokio::test]
async fn repository_requires_initialized_storage() -> anyhow::Result<()> {
    let facade = Arc::new(StorageFacade::new());
    let repo = ConfigRepository::new(Arc::clone(&facade));
    let err = repo.get_config("g1", "c1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StorageError::NotInitialized)));

    let (facade, repo, dir) = setup(StorageBackend::Json).await?;
    teardown(&facade, dir).await?;
    let err = repo.remove_config("g1", "c1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StorageError::NotInitialized)));
    Ok(())
}

#[tokio::test]
async fn scope_context_follows_configuration() -> anyhow::Result<()> {
    let (facade, repo, dir) = setup(StorageBackend::Json).await?;
    let cache = Arc::new(project_client_cache(ApiConfig::default()));
    let resolver = ScopeContextResolver::new(repo, Arc::clone(&cache));
    let actor = Actor::new("u1", "u1#0001");

    assert!(resolver.resolve("g1", "c1").await?.is_none());
    assert!(cache.is_empty());

    let configured = resolver.configure("g1", "c1", "acme", "PRJ-1", &actor).await?;
    let resolved = resolver.resolve("g1", "c1").await?.expect("context");
    assert!(Arc::ptr_eq(&configured.client, &resolved.client));
    assert_eq!(resolved.client.project_id(), "PRJ-1");

    // rebinding drops the old pair's handle
    resolver.configure("g1", "c1", "acme", "PRJ-2", &actor).await?;
    assert_eq!(cache.len(), 1);
    let rebound = resolver.resolve("g1", "c1").await?.expect("context");
    assert_eq!(rebound.client.project_id(), "PRJ-2");

    assert!(resolver.remove("g1", "c1").await?);
    assert!(cache.is_empty());
    assert!(resolver.resolve("g1", "c1").await?.is_none());
    assert!(!resolver.remove("g1", "c1").await?);

    teardown(&facade, dir).await
}
