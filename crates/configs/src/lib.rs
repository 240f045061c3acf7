use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Which backend driver persists the channel configuration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

impl StorageBackend {
    /// Parse the `STORAGE_TYPE` value the way operators expect it:
    /// case-insensitive, unknown values fall back to the JSON driver.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.parse() {
            Ok(backend) => backend,
            Err(_) => {
                warn!(value = raw, "unknown storage backend; falling back to json");
                Self::Json
            }
        }
    }

    pub fn default_path(self) -> &'static str {
        match self {
            Self::Json => "./data/channels.json",
            Self::Sqlite => "./data/channels.db",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(anyhow!("unsupported storage backend: {other}")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Overrides the backend's default location when set.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl StorageConfig {
    pub fn new(backend: StorageBackend, path: Option<PathBuf>) -> Self {
        Self { backend, path, sqlx_logging: false }
    }

    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.backend.default_path()))
    }

    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("storage.path must not be empty when provided"));
            }
        }
        Ok(())
    }
}

/// Settings shared by every project client handed out by the service cache.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_api_base_url(), api_key: String::new() }
    }
}

fn default_api_base_url() -> String {
    "https://api.plane.so".to_string()
}

impl ApiConfig {
    fn normalize(&mut self) -> Result<()> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            self.base_url = default_api_base_url();
            return Ok(());
        }
        let lower = trimmed.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("api.base_url must start with http:// or https://"));
        }
        self.base_url = trimmed.to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `.env`, then the optional TOML file, then apply environment
    /// overrides, then validate. A missing TOML file is not an error;
    /// env-only setups are the common case.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = Self::load_unvalidated()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Same layering as [`load_and_validate`](Self::load_and_validate) but
    /// leaves validation to the caller, for entry points that add their own
    /// overrides first.
    pub fn load_unvalidated() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = config_path();
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Apply `STORAGE_TYPE`, `STORAGE_PATH`, `PLANE_*` and `LOG_*` overrides
    /// from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("STORAGE_TYPE") {
            self.storage.backend = StorageBackend::parse_lenient(&raw);
        }
        if let Some(path) = get("STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(key) = get("PLANE_API_KEY") {
            self.api.api_key = key;
        }
        if let Some(url) = get("PLANE_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.log.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.validate()?;
        self.api.normalize()?;
        if self.log.level.trim().is_empty() {
            self.log.level = default_log_level();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_select_json_backend() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.backend, StorageBackend::Json);
        assert_eq!(cfg.storage.resolved_path(), PathBuf::from("./data/channels.json"));
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn env_overrides_select_sqlite_and_path() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(lookup_from(&[("STORAGE_TYPE", "SQLite"), ("STORAGE_PATH", "/tmp/x.db")]));
        assert_eq!(cfg.storage.backend, StorageBackend::Sqlite);
        assert_eq!(cfg.storage.resolved_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn sqlite_default_path_differs_from_json() {
        let cfg = StorageConfig::new(StorageBackend::Sqlite, None);
        assert_eq!(cfg.resolved_path(), PathBuf::from("./data/channels.db"));
    }

    #[test]
    fn unknown_backend_falls_back_to_json() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(lookup_from(&[("STORAGE_TYPE", "redis")]));
        assert_eq!(cfg.storage.backend, StorageBackend::Json);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(lookup_from(&[("STORAGE_PATH", "  "), ("LOG_LEVEL", "")]));
        assert!(cfg.storage.path.is_none());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn toml_sections_parse() -> Result<()> {
        let tmp = std::env::temp_dir().join(format!("configs_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &tmp,
            r#"
[storage]
backend = "sqlite"
path = "state/configs.db"

[api]
base_url = "https://plane.example.com/"
api_key = "secret"

[log]
format = "json"
"#,
        )?;
        let mut cfg = load_from_file(tmp.to_str().unwrap())?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.storage.backend, StorageBackend::Sqlite);
        assert_eq!(cfg.storage.resolved_path(), PathBuf::from("state/configs.db"));
        assert_eq!(cfg.api.base_url, "https://plane.example.com");
        assert_eq!(cfg.log.format, LogFormat::Json);
        let _ = std::fs::remove_file(&tmp);
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.api.base_url = "ftp://plane".into();
        assert!(cfg.normalize_and_validate().is_err());
    }
}
