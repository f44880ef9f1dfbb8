//! Configuration module for themesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine limits
// ---------------------------------------------------------------------------

/// Maximum number of files sent in one bulk upload call.
pub const MAX_BATCH_FILE_COUNT: usize = 20;

/// Maximum cumulative size of one bulk upload call (1 MiB).
pub const MAX_BATCH_BYTESIZE: u64 = 1024 * 1024;

/// Additional attempts made for files that failed in a bulk upload.
pub const MAX_UPLOAD_RETRY_COUNT: u32 = 2;

/// The delete pass aborts once its failure count exceeds this value.
pub const DELETE_FAILURE_THRESHOLD: usize = 3;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for themesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root directory of the local theme.
    pub root: PathBuf,
    /// Never delete remote files that are missing locally.
    #[serde(default)]
    pub no_delete: bool,
    /// Glob patterns of keys excluded from synchronization.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// When non-empty, only keys matching one of these globs are synchronized.
    #[serde(default)]
    pub only: Vec<String>,
    /// Name of an optional ignore file inside `root`, one glob per line.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
}

/// Bulk upload batch bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum number of files per batch.
    pub max_file_count: usize,
    /// Maximum cumulative size of a batch in bytes.
    pub max_bytesize: u64,
}

/// Per-file retry and failure tolerance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts for files that failed to upload.
    pub max_upload_retries: u32,
    /// Number of failed deletes tolerated before the delete pass aborts.
    pub delete_failure_threshold: usize,
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
    /// Typically `$XDG_CONFIG_HOME/themesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("themesync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

fn default_ignore_file() -> String {
    ".themeignore".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            no_delete: false,
            ignore: Vec::new(),
            only: Vec::new(),
            ignore_file: default_ignore_file(),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_file_count: MAX_BATCH_FILE_COUNT,
            max_bytesize: MAX_BATCH_BYTESIZE,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_upload_retries: MAX_UPLOAD_RETRY_COUNT,
            delete_failure_threshold: DELETE_FAILURE_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"batching.max_file_count"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        // Check the root only when it does not start with `~` (tilde is expanded at runtime).
        let root_str = self.sync.root.to_string_lossy();
        if !root_str.starts_with('~') && !self.sync.root.is_dir() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", self.sync.root.display()),
            });
        }
        for (field, patterns) in [("sync.ignore", &self.sync.ignore), ("sync.only", &self.sync.only)] {
            for pattern in patterns {
                if let Err(e) = glob::Pattern::new(pattern) {
                    errors.push(ValidationError {
                        field: field.into(),
                        message: format!("invalid glob pattern '{pattern}': {e}"),
                    });
                }
            }
        }
        if self.sync.ignore_file.contains('/') {
            errors.push(ValidationError {
                field: "sync.ignore_file".into(),
                message: "must be a file name inside the theme root".into(),
            });
        }

        // --- batching ---
        if self.batching.max_file_count == 0 {
            errors.push(ValidationError {
                field: "batching.max_file_count".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.batching.max_bytesize == 0 {
            errors.push(ValidationError {
                field: "batching.max_bytesize".into(),
                message: "must be greater than 0".into(),
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
/// use themesync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/dawn"))
///     .sync_ignore("assets/*.map")
///     .batching_max_file_count(10)
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

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_no_delete(mut self, no_delete: bool) -> Self {
        self.config.sync.no_delete = no_delete;
        self
    }

    pub fn sync_ignore(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.ignore.push(pattern.into());
        self
    }

    pub fn sync_only(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.only.push(pattern.into());
        self
    }

    pub fn sync_ignore_file(mut self, name: impl Into<String>) -> Self {
        self.config.sync.ignore_file = name.into();
        self
    }

    // --- batching ---

    pub fn batching_max_file_count(mut self, n: usize) -> Self {
        self.config.batching.max_file_count = n;
        self
    }

    pub fn batching_max_bytesize(mut self, bytes: u64) -> Self {
        self.config.batching.max_bytesize = bytes;
        self
    }

    // --- retry ---

    pub fn retry_max_upload_retries(mut self, n: u32) -> Self {
        self.config.retry.max_upload_retries = n;
        self
    }

    pub fn retry_delete_failure_threshold(mut self, n: usize) -> Self {
        self.config.retry.delete_failure_threshold = n;
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
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
