//! Configuration loading.
//!
//! Settings come from a TOML file (`plaza.toml` by default) whose sections
//! are all optional, then command-line overrides, then validation.
//!
//! ```toml
//! [api]
//! base_url = "https://plaza.example/api/v1"
//! token = "..."
//! timeout_ms = 10000
//!
//! [cache]
//! stale_time_ms = 0
//! cache_time_ms = 300000
//! gc_interval_ms = 60000
//!
//! [ui]
//! frame_rate = 30
//! truncate_at = 200
//! page_size = 10
//!
//! [log]
//! level = "info"
//! file = "plaza.log"
//!
//! [session]
//! account_id = "a-1"
//! username = "kim"
//! role = "USER"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::api::{DEFAULT_PAGE_SIZE, Role};
use crate::session::Session;
use crate::subscription::http::QueryConfig;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "plaza.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            token: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub stale_time_ms: u64,
    pub cache_time_ms: u64,
    /// How often idle entries are swept.
    pub gc_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 0,
            cache_time_ms: 5 * 60 * 1000,
            gc_interval_ms: 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub frame_rate: u32,
    /// Post bodies longer than this many characters start collapsed.
    pub truncate_at: usize,
    pub page_size: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            truncate_at: 200,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from("plaza.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub account_id: String,
    pub username: String,
    pub role: Role,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account_id: "demo".to_string(),
            username: "demo".to_string(),
            role: Role::User,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl Config {
    /// Loads `path`, or `plaza.toml` if it exists, or the defaults.
    ///
    /// An explicitly given file must exist. The result is not validated yet
    /// so that command-line overrides can be applied first.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_path(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(error) = url::Url::parse(&self.api.base_url) {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url",
                reason: error.to_string(),
            });
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.gc_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.gc_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if !(1..=120).contains(&self.ui.frame_rate) {
            return Err(ConfigError::InvalidValue {
                field: "ui.frame_rate",
                reason: "must be between 1 and 120".to_string(),
            });
        }
        if self.ui.truncate_at == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ui.truncate_at",
                reason: "must be > 0".to_string(),
            });
        }
        if self.ui.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ui.page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if let Err(error) = LevelFilter::from_str(&self.log.level) {
            return Err(ConfigError::InvalidValue {
                field: "log.level",
                reason: error.to_string(),
            });
        }
        if self.log.file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.file",
                reason: "must not be empty".to_string(),
            });
        }
        if self.session.account_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "session.account_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub const fn query_config(&self) -> QueryConfig {
        QueryConfig::new(
            Duration::from_millis(self.cache.stale_time_ms),
            Duration::from_millis(self.cache.cache_time_ms),
        )
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn session(&self) -> Session {
        Session::new(
            self.session.account_id.clone(),
            self.session.username.clone(),
            self.session.role,
        )
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(contents)?)
    }
}
