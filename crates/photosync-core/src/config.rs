//! Configuration module for photosync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for photosync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub discovery: DiscoveryConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of files processed concurrently.
    pub workers: usize,
    /// Retries after the first attempt for retryable remote failures.
    pub max_retries: u32,
    /// Backoff delay before the first retry (milliseconds).
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single backoff delay (milliseconds).
    pub retry_max_delay_ms: u64,
    /// Items requested per listing page (the service caps this at 500).
    pub page_size: u32,
    /// Tag marking the photo used as cover when creating albums.
    pub cover_photo_tag: String,
    /// Description attached to created albums and uploaded photos.
    pub description: String,
}

/// Local media discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Files at or above this size are skipped.
    pub max_file_size_bytes: u64,
    /// Accepted file extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Whether hidden files and directories are considered.
    pub include_hidden: bool,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Path to the JSON credentials file. A leading `~` is expanded.
    pub credentials: PathBuf,
    /// Endpoint for REST method calls.
    pub rest_url: String,
    /// Endpoint for media uploads.
    pub upload_url: String,
    /// Client-side request budget.
    pub requests_per_hour: u32,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
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
    /// Typically `$XDG_CONFIG_HOME/photosync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("photosync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

impl DiscoveryConfig {
    /// Whether `path` has one of the accepted extensions.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

impl RemoteConfig {
    /// Credentials path with a leading `~` replaced by the home directory.
    pub fn credentials_path(&self) -> PathBuf {
        expand_tilde(&self.credentials)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Replaces a leading `~` component with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Default concurrency bound for `sync`.
pub const DEFAULT_WORKERS: usize = 10;

/// Largest page size the remote listing methods accept.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Media extensions picked up by discovery unless configured otherwise.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "gif", "png", "jpg", "jpeg", "tif", "tiff", "avi", "mp4", "mov", "flv",
];

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            page_size: MAX_PAGE_SIZE,
            cover_photo_tag: "api".to_string(),
            description: "flickr-sync".to_string(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1_000_000_000,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            include_hidden: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            credentials: PathBuf::from("~/.flickr"),
            rest_url: "https://api.flickr.com/services/rest/".to_string(),
            upload_url: "https://up.flickr.com/services/upload/".to_string(),
            requests_per_hour: 3600,
            timeout_secs: 120,
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
    /// Dotted path to the offending field, e.g. `"sync.workers"`.
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

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.workers == 0 {
            errors.push(ValidationError {
                field: "sync.workers".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "sync.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }
        if self.sync.retry_base_delay_ms > self.sync.retry_max_delay_ms {
            errors.push(ValidationError {
                field: "sync.retry_base_delay_ms".into(),
                message: format!(
                    "retry_base_delay_ms ({}) must not exceed retry_max_delay_ms ({})",
                    self.sync.retry_base_delay_ms, self.sync.retry_max_delay_ms
                ),
            });
        }

        // --- discovery ---
        if self.discovery.extensions.is_empty() {
            errors.push(ValidationError {
                field: "discovery.extensions".into(),
                message: "must list at least one extension".into(),
            });
        }

        // --- remote ---
        if self.remote.requests_per_hour == 0 {
            errors.push(ValidationError {
                field: "remote.requests_per_hour".into(),
                message: "must be greater than 0".into(),
            });
        }
        for (field, value) in [
            ("remote.rest_url", &self.remote.rest_url),
            ("remote.upload_url", &self.remote.upload_url),
        ] {
            if url::Url::parse(value).is_err() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not a valid URL: '{value}'"),
                });
            }
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
/// use photosync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_workers(4)
///     .sync_max_retries(5)
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

    // --- sync ---

    pub fn sync_workers(mut self, workers: usize) -> Self {
        self.config.sync.workers = workers;
        self
    }

    pub fn sync_max_retries(mut self, n: u32) -> Self {
        self.config.sync.max_retries = n;
        self
    }

    pub fn sync_retry_delays_ms(mut self, base: u64, max: u64) -> Self {
        self.config.sync.retry_base_delay_ms = base;
        self.config.sync.retry_max_delay_ms = max;
        self
    }

    pub fn sync_page_size(mut self, n: u32) -> Self {
        self.config.sync.page_size = n;
        self
    }

    pub fn sync_cover_photo_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.sync.cover_photo_tag = tag.into();
        self
    }

    pub fn sync_description(mut self, description: impl Into<String>) -> Self {
        self.config.sync.description = description.into();
        self
    }

    // --- discovery ---

    pub fn discovery_max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.discovery.max_file_size_bytes = bytes;
        self
    }

    pub fn discovery_extensions<S: Into<String>>(
        mut self,
        extensions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.config.discovery.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn discovery_include_hidden(mut self, include: bool) -> Self {
        self.config.discovery.include_hidden = include;
        self
    }

    // --- remote ---

    pub fn remote_credentials(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.remote.credentials = path.into();
        self
    }

    pub fn remote_rest_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.rest_url = url.into();
        self
    }

    pub fn remote_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_url = url.into();
        self
    }

    pub fn remote_requests_per_hour(mut self, n: u32) -> Self {
        self.config.remote.requests_per_hour = n;
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.timeout_secs = secs;
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

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
