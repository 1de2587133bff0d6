//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TSYNC_*)
//! 2. TOML config file (if TSYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TSYNC_*)
/// 2. TOML config file (if TSYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin that relative request paths resolve against.
    ///
    /// Set via TSYNC_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to the SQLite database holding the named response caches.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Path to the SQLite offline store (content, summaries, pending writes).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Version suffix embedded in every cache name.
    ///
    /// Changing it on deploy deletes the previous caches at next activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Name prefix of the application shell cache.
    #[serde(default = "default_shell_cache_prefix")]
    pub shell_cache_prefix: String,

    /// Name prefix of the API response cache.
    #[serde(default = "default_api_cache_prefix")]
    pub api_cache_prefix: String,

    /// Critical assets fetched into the shell cache at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Application shell, served when an asset is unreachable.
    #[serde(default = "default_shell_path")]
    pub shell_path: String,

    /// Offline fallback document for navigations.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Path prefix of the quiz content route (`GET {prefix}{id}`).
    #[serde(default = "default_content_prefix")]
    pub content_prefix: String,

    /// Result submission endpoint.
    #[serde(default = "default_result_endpoint")]
    pub result_endpoint: String,

    /// Background sync tag that drains the pending queue.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Transport timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Queue result writes whose online attempt throws, instead of
    /// answering them with a network error.
    #[serde(default)]
    pub queue_failed_online_writes: bool,
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./tsync-cache.sqlite")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./tsync-offline.sqlite")
}

fn default_cache_version() -> String {
    "v5".into()
}

fn default_shell_cache_prefix() -> String {
    "auth-cache".into()
}

fn default_api_cache_prefix() -> String {
    "api-cache".into()
}

fn default_precache() -> Vec<String> {
    [
        "/static/",
        "/static/index.html",
        "/manifest.json",
        "/logo.png",
        "/static/js/main.js",
        "/static/css/main.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_shell_path() -> String {
    "/static/".into()
}

fn default_offline_document() -> String {
    "/static/index.html".into()
}

fn default_content_prefix() -> String {
    "/api/tests/".into()
}

fn default_result_endpoint() -> String {
    "/api/test_result/".into()
}

fn default_sync_tag() -> String {
    "sync-pending-results".into()
}

fn default_user_agent() -> String {
    "tsync/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_path: default_cache_path(),
            store_path: default_store_path(),
            cache_version: default_cache_version(),
            shell_cache_prefix: default_shell_cache_prefix(),
            api_cache_prefix: default_api_cache_prefix(),
            precache: default_precache(),
            shell_path: default_shell_path(),
            offline_document: default_offline_document(),
            content_prefix: default_content_prefix(),
            result_endpoint: default_result_endpoint(),
            sync_tag: default_sync_tag(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            queue_failed_online_writes: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Versioned name of the application shell cache.
    pub fn shell_cache_name(&self) -> String {
        format!("{}-{}", self.shell_cache_prefix, self.cache_version)
    }

    /// Versioned name of the API response cache.
    pub fn api_cache_name(&self) -> String {
        format!("{}-{}", self.api_cache_prefix, self.cache_version)
    }

    /// Cache names that survive activation; everything else is stale.
    pub fn current_cache_names(&self) -> [String; 2] {
        [self.shell_cache_name(), self.api_cache_name()]
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TSYNC_`
    /// 2. TOML file from `TSYNC_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("TSYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TSYNC_")
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
        assert_eq!(config.origin, "http://localhost:8000");
        assert_eq!(config.cache_path, PathBuf::from("./tsync-cache.sqlite"));
        assert_eq!(config.store_path, PathBuf::from("./tsync-offline.sqlite"));
        assert_eq!(config.content_prefix, "/api/tests/");
        assert_eq!(config.result_endpoint, "/api/test_result/");
        assert_eq!(config.sync_tag, "sync-pending-results");
        assert_eq!(config.precache.len(), 6);
        assert!(!config.queue_failed_online_writes);
    }

    #[test]
    fn test_cache_names_embed_version() {
        let config = AppConfig { cache_version: "v6".into(), ..Default::default() };
        assert_eq!(config.shell_cache_name(), "auth-cache-v6");
        assert_eq!(config.api_cache_name(), "api-cache-v6");
        assert_eq!(config.current_cache_names(), ["auth-cache-v6".to_string(), "api-cache-v6".to_string()]);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_load_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TSYNC_CACHE_VERSION", "v9");
            jail.set_env("TSYNC_QUEUE_FAILED_ONLINE_WRITES", "true");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.api_cache_name(), "api-cache-v9");
            assert!(config.queue_failed_online_writes);
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tsync.toml", "origin = \"https://quiz.example\"\ntimeout_ms = 5000\n")?;
            jail.set_env("TSYNC_CONFIG_FILE", "tsync.toml");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.origin, "https://quiz.example");
            assert_eq!(config.timeout_ms, 5000);
            Ok(())
        });
    }
}
