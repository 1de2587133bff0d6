//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - a route or asset path does not start with `/`
    /// - the shell and API caches would share a name
    ///
    /// Returns `ConfigError::Missing` if `cache_version` or `sync_tag` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(_) => return Err(invalid("origin", "scheme must be http or https")),
            Err(e) => return Err(invalid("origin", &e.to_string())),
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set TSYNC_CACHE_VERSION, e.g. v5".into(),
            });
        }
        if self.sync_tag.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "sync_tag".into(),
                hint: "Set TSYNC_SYNC_TAG, e.g. sync-pending-results".into(),
            });
        }

        if self.shell_cache_prefix == self.api_cache_prefix {
            return Err(invalid("api_cache_prefix", "must differ from shell_cache_prefix"));
        }

        let paths = [
            ("shell_path", &self.shell_path),
            ("offline_document", &self.offline_document),
            ("content_prefix", &self.content_prefix),
            ("result_endpoint", &self.result_endpoint),
        ];
        for (field, path) in paths {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }
        if let Some(asset) = self.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache".into(),
                reason: format!("asset path must start with '/': {asset}"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.queue_failed_online_writes {
            tracing::warn!("queue_failed_online_writes is enabled; online write failures will be replayed later");
        }

        Ok(())
    }
}
