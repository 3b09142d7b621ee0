//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STASH_*)
//! 2. TOML config file (if STASH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::PartitionNames;
use crate::route::RouteRules;

mod validation;

pub use validation::ConfigError;

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STASH_*)
/// 2. TOML config file (if STASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite partition store.
    ///
    /// Set via STASH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the upstream origin. Root-relative paths resolve against it.
    ///
    /// Set via STASH_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every partition this worker owns.
    ///
    /// Set via STASH_NAMESPACE environment variable.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Version tag appended to partition names. Bumping it invalidates all
    /// partitions on the next activation.
    ///
    /// Set via STASH_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Root-relative paths pre-cached into the static partition at install.
    #[serde(default = "default_static_manifest")]
    pub static_manifest: Vec<String>,

    /// Path prefix routed to the API partition.
    ///
    /// Set via STASH_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path prefix routed to the cache-first static partition.
    ///
    /// Set via STASH_ASSETS_PREFIX environment variable.
    #[serde(default = "default_assets_prefix")]
    pub assets_prefix: String,

    /// Placeholder page served to offline navigations that miss the cache.
    /// When unset, navigations fall back to the cached root page only.
    ///
    /// Set via STASH_OFFLINE_PAGE environment variable.
    #[serde(default)]
    pub offline_page: Option<String>,

    /// User-Agent string for upstream requests.
    ///
    /// Set via STASH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via STASH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether the keep-alive pinger runs.
    ///
    /// Set via STASH_KEEPALIVE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub keepalive_enabled: bool,

    /// Health-check path probed by the keep-alive pinger.
    ///
    /// Set via STASH_KEEPALIVE_PATH environment variable.
    #[serde(default = "default_keepalive_path")]
    pub keepalive_path: String,

    /// Seconds between keep-alive probes.
    ///
    /// Set via STASH_KEEPALIVE_INTERVAL_SECS environment variable.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Seconds between update checks.
    ///
    /// Set via STASH_UPDATE_CHECK_INTERVAL_SECS environment variable.
    #[serde(default = "default_update_check_interval_secs")]
    pub update_check_interval_secs: u64,

    /// Seconds before an unanswered update prompt removes itself.
    ///
    /// Set via STASH_UPDATE_PROMPT_DISMISS_SECS environment variable.
    #[serde(default = "default_update_prompt_dismiss_secs")]
    pub update_prompt_dismiss_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stash-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_namespace() -> String {
    "stash".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_static_manifest() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/favicon.ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_assets_prefix() -> String {
    "/assets/".into()
}

fn default_user_agent() -> String {
    "stash/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_keepalive_path() -> String {
    "/api/health".into()
}

fn default_keepalive_interval_secs() -> u64 {
    600 // 10 minutes
}

fn default_update_check_interval_secs() -> u64 {
    60
}

fn default_update_prompt_dismiss_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            namespace: default_namespace(),
            cache_version: default_cache_version(),
            static_manifest: default_static_manifest(),
            api_prefix: default_api_prefix(),
            assets_prefix: default_assets_prefix(),
            offline_page: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            keepalive_enabled: true,
            keepalive_path: default_keepalive_path(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            update_check_interval_secs: default_update_check_interval_secs(),
            update_prompt_dismiss_secs: default_update_prompt_dismiss_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.update_check_interval_secs)
    }

    pub fn update_prompt_dismiss(&self) -> Duration {
        Duration::from_secs(self.update_prompt_dismiss_secs)
    }

    /// Partition names for the configured namespace and version.
    pub fn partition_names(&self) -> PartitionNames {
        PartitionNames::new(&self.namespace, &self.cache_version)
    }

    /// Routing prefixes used by request classification.
    pub fn route_rules(&self) -> RouteRules {
        RouteRules { api_prefix: self.api_prefix.clone(), assets_prefix: self.assets_prefix.clone() }
    }

    /// Paths tried, in order, when an offline navigation misses its exact key.
    pub fn navigation_fallbacks(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.offline_page.iter().cloned().collect();
        if !paths.iter().any(|p| p == "/") {
            paths.push("/".to_string());
        }
        paths
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {other}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STASH_`
    /// 2. TOML file from `STASH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./stash-cache.sqlite"));
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.namespace, "stash");
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.assets_prefix, "/assets/");
        assert_eq!(config.keepalive_interval(), Duration::from_secs(600));
        assert_eq!(config.update_check_interval(), Duration::from_secs(60));
        assert_eq!(config.update_prompt_dismiss(), Duration::from_secs(10));
        assert!(config.keepalive_enabled);
        assert!(config.offline_page.is_none());
    }

    #[test]
    fn test_partition_names_follow_version() {
        let config = AppConfig { cache_version: "v7".into(), ..Default::default() };
        let names = config.partition_names();
        assert_eq!(names.static_name(), "stash-static-v7");
        assert_eq!(names.api_name(), "stash-api-v7");
    }

    #[test]
    fn test_navigation_fallbacks_default_is_root() {
        let config = AppConfig::default();
        assert_eq!(config.navigation_fallbacks(), vec!["/".to_string()]);
    }

    #[test]
    fn test_navigation_fallbacks_offline_page_first() {
        let config = AppConfig { offline_page: Some("/offline.html".into()), ..Default::default() };
        assert_eq!(config.navigation_fallbacks(), vec!["/offline.html".to_string(), "/".to_string()]);
    }

    #[test]
    fn test_origin_url_rejects_non_http() {
        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "stash.toml",
                r#"
                cache_version = "v2"
                api_prefix = "/backend/"
                "#,
            )?;
            jail.set_env("STASH_CONFIG_FILE", "stash.toml");
            jail.set_env("STASH_CACHE_VERSION", "v3");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.cache_version, "v3");
            assert_eq!(config.api_prefix, "/backend/");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STASH_TIMEOUT_MS", "5");
            assert!(matches!(AppConfig::load(), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
