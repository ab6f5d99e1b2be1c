//! Configuration module for AgroDrone.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides for secrets, and a
//! builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Environment variable overriding `remote.api_key`
pub const ENV_API_KEY: &str = "AGRODRONE_API_KEY";
/// Environment variable overriding `remote.access_token`
pub const ENV_ACCESS_TOKEN: &str = "AGRODRONE_ACCESS_TOKEN";
/// Environment variable overriding `remote.user_id`
pub const ENV_USER_ID: &str = "AGRODRONE_USER_ID";

/// Top-level configuration for AgroDrone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Hosted backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the backend, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header.
    pub api_key: Option<String>,
    /// Bearer token of the signed-in session.
    pub access_token: Option<String>,
    /// Id of the signed-in user. `None` means nobody is signed in.
    pub user_id: Option<String>,
    /// Upper bound on every HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base delay of the exponential backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic full syncs in the daemon.
    pub poll_interval_secs: u64,
    /// Seconds between reachability probes.
    pub probe_interval_secs: u64,
    /// Milliseconds to wait after reconnecting before syncing.
    pub reconnect_delay_ms: u64,
    /// Record offline deletes in the sync queue and replay them on upload.
    pub queue_offline_deletes: bool,
}

/// Local Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/agrodrone/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("agrodrone")
            .join("config.yaml")
    }

    /// Overrides secrets from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overrides secrets using `lookup` as the variable source.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.remote.api_key = Some(key);
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.remote.access_token = Some(token);
        }
        if let Some(user) = get(ENV_USER_ID) {
            self.remote.user_id = Some(user);
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: None,
            access_token: None,
            user_id: None,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            probe_interval_secs: 10,
            reconnect_delay_ms: 1000,
            queue_offline_deletes: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("agrodrone")
                .join("agrodrone.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Backoff exponents above this overflow any sensible delay.
const MAX_RETRIES_LIMIT: u32 = 10;

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        let url = self.remote.url.trim();
        if url.is_empty() {
            errors.push(ValidationError {
                field: "remote.url".into(),
                message: "must not be empty".into(),
            });
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "remote.url".into(),
                message: format!("must be an http(s) URL, got '{url}'"),
            });
        }
        positive(
            &mut errors,
            "remote.request_timeout_secs",
            self.remote.request_timeout_secs,
        );
        if self.remote.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ValidationError {
                field: "remote.max_retries".into(),
                message: format!("must be at most {MAX_RETRIES_LIMIT}"),
            });
        }
        if let Some(user) = &self.remote.user_id {
            if user.trim().is_empty() {
                errors.push(ValidationError {
                    field: "remote.user_id".into(),
                    message: "must not be blank when set".into(),
                });
            }
        }

        // --- sync ---
        positive(&mut errors, "sync.poll_interval_secs", self.sync.poll_interval_secs);
        positive(
            &mut errors,
            "sync.probe_interval_secs",
            self.sync.probe_interval_secs,
        );

        // --- storage ---
        if self.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use agrodrone_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_url("https://example.supabase.co")
///     .remote_user_id("u1")
///     .sync_queue_offline_deletes(true)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn remote_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.remote.api_key = Some(key.into());
        self
    }

    pub fn remote_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.access_token = Some(token.into());
        self
    }

    pub fn remote_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.remote.user_id = Some(user_id.into());
        self
    }

    pub fn remote_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.request_timeout_secs = seconds;
        self
    }

    pub fn remote_max_retries(mut self, n: u32) -> Self {
        self.config.remote.max_retries = n;
        self
    }

    pub fn remote_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.remote.retry_base_delay_ms = ms;
        self
    }

    // --- sync ---

    pub fn sync_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval_secs = seconds;
        self
    }

    pub fn sync_probe_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.probe_interval_secs = seconds;
        self
    }

    pub fn sync_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.reconnect_delay_ms = ms;
        self
    }

    pub fn sync_queue_offline_deletes(mut self, enabled: bool) -> Self {
        self.config.sync.queue_offline_deletes = enabled;
        self
    }

    // --- storage ---

    pub fn storage_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.database_path = path.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
