//! Configuration loading and typed config structures for the virtual clock.
//!
//! The configuration lives in `thesis-clock.yaml`. Every section and field
//! has a default, so an empty file (or no file at all) yields a working
//! clock that ticks once per second, stores its state under
//! `.thesis-clock/storage.json` and talks to no remote authority.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable overriding `authority.base_url`.
pub const ENV_AUTHORITY_URL: &str = "THESIS_CLOCK_AUTHORITY_URL";

/// Environment variable overriding `storage.path`.
pub const ENV_STORAGE_PATH: &str = "THESIS_CLOCK_STORAGE_PATH";

/// Environment variable overriding `authority.session_cookie`.
pub const ENV_SESSION_COOKIE: &str = "THESIS_CLOCK_SESSION_COOKIE";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but makes no sense.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level clock configuration, mirroring `thesis-clock.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Tick timing.
    #[serde(default)]
    pub clock: TickConfig,

    /// Local durable storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote time authority.
    #[serde(default)]
    pub authority: AuthorityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClockConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `THESIS_CLOCK_AUTHORITY_URL` overrides `authority.base_url`
    /// - `THESIS_CLOCK_STORAGE_PATH` overrides `storage.path`
    /// - `THESIS_CLOCK_SESSION_COOKIE` overrides `authority.session_cookie`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_raw(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_raw(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml reports an empty document as null.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(ENV_AUTHORITY_URL) {
            self.authority.base_url = Some(val);
        }
        if let Ok(val) = std::env::var(ENV_STORAGE_PATH) {
            self.storage.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var(ENV_SESSION_COOKIE) {
            self.authority.session_cookie = Some(val);
        }
    }

    /// Reject values the clock cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "clock.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.storage.key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "storage.key must not be empty".to_owned(),
            });
        }
        if self
            .authority
            .base_url
            .as_deref()
            .is_some_and(|url| !url.starts_with("http://") && !url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                reason: "authority.base_url must be an http(s) URL".to_owned(),
            });
        }
        Ok(())
    }
}

/// Tick timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Real-time milliseconds between ticks. Each tick advances virtual
    /// time by exactly one second.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Local durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the key/value entries.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Key under which the virtual time is stored.
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            key: default_storage_key(),
        }
    }
}

/// Remote time authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorityConfig {
    /// Base URL of the backend API, e.g. `http://localhost:3001/api`.
    /// When unset the clock runs detached and remote pushes are recorded
    /// in memory only.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_authority_timeout_ms")]
    pub timeout_ms: u64,

    /// Session cookie forwarded verbatim in the `Cookie` header.
    #[serde(default)]
    pub session_cookie: Option<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_authority_timeout_ms(),
            session_cookie: None,
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when
    /// set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".thesis-clock/storage.json")
}

fn default_storage_key() -> String {
    "virtualClock".to_owned()
}

const fn default_authority_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
