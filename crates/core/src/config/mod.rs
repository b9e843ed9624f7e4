//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manager::BucketNames;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding the cache buckets.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the web app being fronted, e.g. `http://localhost:5173`.
    ///
    /// Requests from this origin are intercepted; the proxy forwards misses here.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Socket address the HTTP proxy listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Whether to start the HTTP proxy alongside the MCP server.
    #[serde(default = "default_true")]
    pub proxy_enabled: bool,

    /// Prefix shared by every bucket name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag suffixed to every bucket name.
    ///
    /// Changing it retires every bucket of the previous generation on activation.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Path prefix identifying remote-data API requests.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Hostnames of the hosted backend. Subdomains match too.
    ///
    /// Set via SHELLCACHE_DATA_HOSTS environment variable.
    #[serde(default = "default_data_hosts")]
    pub data_hosts: Vec<String>,

    /// Route served when a navigation fails and nothing is cached for it.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// App shell paths that must all load before a version can activate.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// User-Agent string for upstream requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per upstream response.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Title used for push messages that do not carry one.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Icon and badge used for push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_cache_prefix() -> String {
    "skillswap".into()
}

fn default_version_tag() -> String {
    "v3".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_data_hosts() -> Vec<String> {
    vec!["supabase.co".into()]
}

fn default_offline_page() -> String {
    "/offline".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/offline",
        "/skills",
        "/bookings",
        "/profile",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_notification_title() -> String {
    "SkillSwap".into()
}

fn default_notification_icon() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            proxy_enabled: true,
            cache_prefix: default_cache_prefix(),
            version_tag: default_version_tag(),
            api_prefix: default_api_prefix(),
            data_hosts: default_data_hosts(),
            offline_page: default_offline_page(),
            precache: default_precache(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            notification_title: default_notification_title(),
            notification_icon: default_notification_icon(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Bucket names for the configured generation.
    pub fn bucket_names(&self) -> BucketNames {
        BucketNames::new(&self.cache_prefix, &self.version_tag)
    }

    /// Parsed app origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
