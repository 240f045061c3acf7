use std::sync::Arc;

use configs::ApiConfig;

use crate::service_cache::ServiceCache;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Client handle bound to one workspace/project pair.
///
/// Construction is pure: it only captures identifiers and shared settings.
/// Callers perform requests against the endpoints it builds.
#[derive(Debug, Clone)]
pub struct ProjectClient {
    workspace_slug: String,
    project_id: String,
    api: Arc<ApiConfig>,
}

impl ProjectClient {
    pub fn new(api: Arc<ApiConfig>, workspace_slug: &str, project_id: &str) -> Self {
        Self { workspace_slug: workspace_slug.to_owned(), project_id: project_id.to_owned(), api }
    }

    pub fn workspace_slug(&self) -> &str {
        &self.workspace_slug
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn has_credentials(&self) -> bool {
        !self.api.api_key.is_empty()
    }

    /// Header name/value pair authenticating requests.
    pub fn auth_header(&self) -> (&'static str, &str) {
        (API_KEY_HEADER, &self.api.api_key)
    }

    pub fn project_url(&self) -> String {
        format!(
            "{}/api/v1/workspaces/{}/projects/{}/",
            self.api.base_url, self.workspace_slug, self.project_id
        )
    }

    pub fn issues_url(&self) -> String {
        format!("{}issues/", self.project_url())
    }

    pub fn issue_url(&self, issue_id: &str) -> String {
        format!("{}{issue_id}/", self.issues_url())
    }
}

/// Cache of [`ProjectClient`]s sharing one set of API settings.
pub fn project_client_cache(api: ApiConfig) -> ServiceCache<ProjectClient> {
    let api = Arc::new(api);
    ServiceCache::new(move |workspace_slug: &str, project_id: &str| {
        ProjectClient::new(Arc::clone(&api), workspace_slug, project_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> ApiConfig {
        ApiConfig { base_url: "https://plane.example.com".into(), api_key: "k-123".into() }
    }

    #[test]
    fn endpoints_embed_workspace_and_project() {
        let client = ProjectClient::new(Arc::new(api()), "acme", "PRJ-1");
        assert_eq!(client.project_url(), "https://plane.example.com/api/v1/workspaces/acme/projects/PRJ-1/");
        assert_eq!(
            client.issue_url("42"),
            "https://plane.example.com/api/v1/workspaces/acme/projects/PRJ-1/issues/42/"
        );
        assert_eq!(client.auth_header(), ("X-API-Key", "k-123"));
        assert!(client.has_credentials());
    }

    #[test]
    fn cached_clients_share_settings() {
        let cache = project_client_cache(api());
        let a = cache.get_or_create("acme", "PRJ-1");
        let b = cache.get_or_create("acme", "PRJ-2");
        assert_eq!(a.workspace_slug(), "acme");
        assert_eq!(b.project_id(), "PRJ-2");
        assert!(Arc::ptr_eq(&a.api, &b.api));
    }
}
