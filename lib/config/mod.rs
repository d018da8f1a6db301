use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Provider and search-service coordinates.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub search_url: String,
}

/// Endpoint paths relative to `base_url` (provider) or `search_url` (search service).
///
/// Provider paths carry their own query string (`player_api.php?action=...`);
/// credentials and identifiers are appended to it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Reserved for EPG export; the VOD pipeline never calls it.
    pub xmltv: String,
    pub vod_categories: String,
    pub vod_streams: String,
    pub vod_info: String,
    pub add_vod: String,
    pub query_vods: String,
    pub embed: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            xmltv: "xmltv.php".to_string(),
            vod_categories: "player_api.php?action=get_vod_categories".to_string(),
            vod_streams: "player_api.php?action=get_vod_streams".to_string(),
            vod_info: "player_api.php?action=get_vod_info".to_string(),
            add_vod: "add".to_string(),
            query_vods: "query".to_string(),
            embed: "embed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Applied to every HTTP request, provider and search service alike.
    pub timeout_seconds: u64,
    pub max_concurrent_categories: usize,
    /// Total stream-listing attempts per category, including the first.
    pub stream_retry_attempts: u32,
    pub stream_retry_delay_seconds: u64,
    /// Shared request budget across all provider calls. Unlimited when unset.
    pub global_rps: Option<u32>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_concurrent_categories: 16,
            stream_retry_attempts: 3,
            stream_retry_delay_seconds: 3,
            global_rps: None,
        }
    }
}

impl PerformanceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn stream_retry_delay(&self) -> Duration {
        Duration::from_secs(self.stream_retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

impl Config {
    /// Reads `path`, applies `VOD_SYNC_*` environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Lets deployments keep credentials out of the config file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("VOD_SYNC_BASE_URL") {
            self.service.base_url = value;
        }
        if let Some(value) = lookup("VOD_SYNC_USERNAME") {
            self.service.username = value;
        }
        if let Some(value) = lookup("VOD_SYNC_PASSWORD") {
            self.service.password = value;
        }
        if let Some(value) = lookup("VOD_SYNC_SEARCH_URL") {
            self.service.search_url = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.base_url.trim().is_empty() {
            return Err(invalid("service.base_url", "must not be empty"));
        }
        if self.service.search_url.trim().is_empty() {
            return Err(invalid("service.search_url", "must not be empty"));
        }
        let perf = &self.performance;
        if perf.timeout_seconds == 0 {
            return Err(invalid("performance.timeout_seconds", "must be > 0"));
        }
        if perf.max_concurrent_categories == 0 {
            return Err(invalid(
                "performance.max_concurrent_categories",
                "must be > 0",
            ));
        }
        if perf.stream_retry_attempts == 0 {
            return Err(invalid("performance.stream_retry_attempts", "must be > 0"));
        }
        if perf.global_rps == Some(0) {
            return Err(invalid("performance.global_rps", "must be > 0 when set"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
