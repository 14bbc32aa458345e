//! Configuration loading.
//!
//! Settings merge in three layers, each overriding the previous one:
//! built-in defaults, an optional `todo-store.toml` file, and
//! environment variables prefixed with `TODO_STORE_` (with `__`
//! separating nested keys, e.g. `TODO_STORE_STORE__MAX_PAGE_SIZE`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default configuration file name, looked up in the working
/// directory.
pub const DEFAULT_CONFIG_FILE: &str = "todo-store.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Service identity and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Paging and analytics settings for the store layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Page size used when a query does not name one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Hard upper bound on requested page sizes.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Trailing window, in days, for trend queries without an explicit
    /// window.
    #[serde(default = "default_trend_days")]
    pub trend_days: u32,
}

impl Config {
    /// Loads configuration from the default file location plus the
    /// environment.
    pub fn load() -> StoreResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration from an explicit TOML path plus the
    /// environment.
    pub fn load_from(path: impl AsRef<Path>) -> StoreResult<Self> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TODO_STORE_").split("__"))
            .extract()
            .map_err(|err| StoreError::configuration(err.to_string()))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            trend_days: default_trend_days(),
        }
    }
}

fn default_service_name() -> String {
    "todo-store".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_page_size() -> u64 {
    10
}

fn default_max_page_size() -> u64 {
    100
}

fn default_trend_days() -> u32 {
    7
}
