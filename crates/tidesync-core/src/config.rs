//! Configuration module for TideSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for TideSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub compression: CompressionConfig,
    pub conflicts: ConflictsConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Worker loop and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master switch for the periodic timer loop.
    pub enabled: bool,
    /// Seconds between scheduled sync cycles.
    pub interval: u64,
    /// Failed attempts allowed before an item is quarantined.
    pub max_retries: u32,
    /// Base backoff unit in milliseconds.
    pub retry_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Maximum items dispatched per cycle.
    pub batch_size: usize,
    /// Priority for mutations enqueued without one: `low`, `normal`, or `high`.
    pub priority: String,
}

/// Payload compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Payloads smaller than this are stored as-is.
    pub threshold_bytes: usize,
    /// Ceiling for a single compress or decompress call.
    pub timeout_ms: u64,
    /// zlib level, 0 (store) to 9 (best).
    pub level: u32,
    /// Largest payload a single decompress call may produce.
    pub max_decompressed_bytes: usize,
}

/// A single entity-pattern conflict rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern matched against entity keys (e.g. `"drafts/*"`).
    pub pattern: String,
    /// `manual`, `prefer_local`, or `prefer_remote`.
    pub strategy: String,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `manual`, `prefer_local`, or `prefer_remote`.
    pub default_strategy: String,
    /// Ordered rules; the first matching pattern wins.
    pub rules: Vec<ConflictRule>,
}

/// Durable storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database holding the queue.
    pub database: PathBuf,
}

/// HTTP remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the remote store API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Seconds between connectivity probes.
    pub probe_interval: u64,
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
    /// Typically `$XDG_CONFIG_HOME/tidesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tidesync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    /// Parsed default priority; unknown values fall back to `Normal`.
    pub fn default_priority(&self) -> Priority {
        self.priority.parse().unwrap_or_default()
    }
}

impl CompressionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 300_000,
            batch_size: 10,
            priority: "normal".to_string(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: 1024,
            timeout_ms: 10_000,
            level: 6,
            max_decompressed_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("tidesync");
        Self {
            database: data_dir.join("queue.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
            probe_interval: 15,
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
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_strategy` and rule strategies.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "prefer_local", "prefer_remote"];

/// Valid values for `sync.priority`.
const VALID_PRIORITIES: &[&str] = &["low", "normal", "high"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.interval == 0 {
            errors.push(ValidationError::new("sync.interval", "must be greater than 0"));
        }
        if self.sync.retry_delay_ms == 0 {
            errors.push(ValidationError::new(
                "sync.retry_delay_ms",
                "must be greater than 0",
            ));
        }
        if self.sync.max_retry_delay_ms < self.sync.retry_delay_ms {
            errors.push(ValidationError::new(
                "sync.max_retry_delay_ms",
                format!(
                    "must be at least sync.retry_delay_ms ({})",
                    self.sync.retry_delay_ms
                ),
            ));
        }
        if self.sync.batch_size == 0 {
            errors.push(ValidationError::new("sync.batch_size", "must be greater than 0"));
        }
        if !VALID_PRIORITIES.contains(&self.sync.priority.as_str()) {
            errors.push(ValidationError::new(
                "sync.priority",
                format!(
                    "invalid priority '{}'; valid: {}",
                    self.sync.priority,
                    VALID_PRIORITIES.join(", ")
                ),
            ));
        }

        // --- compression ---
        if self.compression.timeout_ms == 0 {
            errors.push(ValidationError::new(
                "compression.timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.compression.level > 9 {
            errors.push(ValidationError::new(
                "compression.level",
                format!("must be between 0 and 9, got {}", self.compression.level),
            ));
        }
        if self.compression.max_decompressed_bytes == 0 {
            errors.push(ValidationError::new(
                "compression.max_decompressed_bytes",
                "must be greater than 0",
            ));
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            errors.push(ValidationError::new(
                "conflicts.default_strategy",
                format!(
                    "invalid strategy '{}'; valid: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
            ));
        }
        for (i, rule) in self.conflicts.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("conflicts.rules[{i}].pattern"),
                    "must not be empty",
                ));
            }
            if !VALID_CONFLICT_STRATEGIES.contains(&rule.strategy.as_str()) {
                errors.push(ValidationError::new(
                    format!("conflicts.rules[{i}].strategy"),
                    format!("invalid strategy '{}'", rule.strategy),
                ));
            }
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError::new("storage.database", "must not be empty"));
        }

        // --- remote ---
        if !(self.remote.base_url.starts_with("http://")
            || self.remote.base_url.starts_with("https://"))
        {
            errors.push(ValidationError::new(
                "remote.base_url",
                format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            ));
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "remote.timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.remote.probe_interval == 0 {
            errors.push(ValidationError::new(
                "remote.probe_interval",
                "must be greater than 0",
            ));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
///
/// # Example
///
/// ```
/// use tidesync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_max_retries(5)
///     .compression_enabled(false)
///     .build();
/// assert_eq!(config.sync.max_retries, 5);
/// assert!(!config.compression.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_enabled(mut self, enabled: bool) -> Self {
        self.config.sync.enabled = enabled;
        self
    }

    pub fn sync_interval(mut self, seconds: u64) -> Self {
        self.config.sync.interval = seconds;
        self
    }

    pub fn sync_max_retries(mut self, n: u32) -> Self {
        self.config.sync.max_retries = n;
        self
    }

    pub fn sync_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.retry_delay_ms = ms;
        self
    }

    pub fn sync_max_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.max_retry_delay_ms = ms;
        self
    }

    pub fn sync_batch_size(mut self, n: usize) -> Self {
        self.config.sync.batch_size = n;
        self
    }

    pub fn sync_priority(mut self, priority: impl Into<String>) -> Self {
        self.config.sync.priority = priority.into();
        self
    }

    // --- compression ---

    pub fn compression_enabled(mut self, enabled: bool) -> Self {
        self.config.compression.enabled = enabled;
        self
    }

    pub fn compression_threshold_bytes(mut self, bytes: usize) -> Self {
        self.config.compression.threshold_bytes = bytes;
        self
    }

    pub fn compression_timeout_ms(mut self, ms: u64) -> Self {
        self.config.compression.timeout_ms = ms;
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression.level = level;
        self
    }

    pub fn compression_max_decompressed_bytes(mut self, bytes: usize) -> Self {
        self.config.compression.max_decompressed_bytes = bytes;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    pub fn conflicts_rule(mut self, pattern: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.config.conflicts.rules.push(ConflictRule {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- storage / remote / logging ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.timeout_secs = seconds;
        self
    }

    pub fn remote_probe_interval(mut self, seconds: u64) -> Self {
        self.config.remote.probe_interval = seconds;
        self
    }

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

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.interval, 30);
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.sync.retry_delay_ms, 1000);
        assert_eq!(cfg.sync.max_retry_delay_ms, 300_000);
        assert_eq!(cfg.sync.batch_size, 10);
        assert_eq!(cfg.sync.default_priority(), Priority::Normal);
        assert!(cfg.compression.enabled);
        assert_eq!(cfg.compression.threshold_bytes, 1024);
        assert_eq!(cfg.compression.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.compression.level, 6);
        assert_eq!(cfg.compression.max_decompressed_bytes, 64 * 1024 * 1024);
        assert_eq!(cfg.conflicts.default_strategy, "manual");
        assert!(cfg.conflicts.rules.is_empty());
        assert!(cfg.storage.database.ends_with("tidesync/queue.db"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  enabled: false
  interval: 60
  max_retries: 5
  retry_delay_ms: 250
  max_retry_delay_ms: 10000
  batch_size: 25
  priority: high
compression:
  enabled: true
  threshold_bytes: 4096
  timeout_ms: 2000
  level: 9
conflicts:
  default_strategy: prefer_remote
  rules:
    - pattern: "drafts/*"
      strategy: prefer_local
storage:
  database: /tmp/tidesync-test.db
remote:
  base_url: https://sync.example.com/api
  timeout_secs: 5
  probe_interval: 3
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert!(!cfg.sync.enabled);
        assert_eq!(cfg.sync.interval(), Duration::from_secs(60));
        assert_eq!(cfg.sync.max_retries, 5);
        assert_eq!(cfg.sync.retry_delay(), Duration::from_millis(250));
        assert_eq!(cfg.sync.max_retry_delay(), Duration::from_secs(10));
        assert_eq!(cfg.sync.batch_size, 25);
        assert_eq!(cfg.sync.default_priority(), Priority::High);
        assert_eq!(cfg.compression.threshold_bytes, 4096);
        assert_eq!(cfg.compression.level, 9);
        assert_eq!(cfg.conflicts.default_strategy, "prefer_remote");
        assert_eq!(
            cfg.conflicts.rules,
            vec![ConflictRule {
                pattern: "drafts/*".to_string(),
                strategy: "prefer_local".to_string(),
            }]
        );
        assert_eq!(cfg.storage.database, PathBuf::from("/tmp/tidesync-test.db"));
        assert_eq!(cfg.remote.base_url, "https://sync.example.com/api");
        assert_eq!(cfg.remote.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.remote.probe_interval(), Duration::from_secs(3));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync:\n  batch_size: 3\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.batch_size, 3);
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.compression.threshold_bytes, 1024);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.interval, 30);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_values() {
        let mut cfg = Config::default();
        cfg.sync.interval = 0;
        cfg.sync.batch_size = 0;
        cfg.compression.timeout_ms = 0;
        cfg.compression.max_decompressed_bytes = 0;
        cfg.remote.probe_interval = 0;
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"sync.interval".to_string()));
        assert!(fields.contains(&"sync.batch_size".to_string()));
        assert!(fields.contains(&"compression.timeout_ms".to_string()));
        assert!(fields.contains(&"compression.max_decompressed_bytes".to_string()));
        assert!(fields.contains(&"remote.probe_interval".to_string()));
    }

    #[test]
    fn validate_catches_backoff_cap_below_base() {
        let mut cfg = Config::default();
        cfg.sync.retry_delay_ms = 5000;
        cfg.sync.max_retry_delay_ms = 1000;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.max_retry_delay_ms"));
    }

    #[test]
    fn validate_catches_invalid_priority() {
        let mut cfg = Config::default();
        cfg.sync.priority = "urgent".into();
        assert!(cfg.validate().iter().any(|e| e.field == "sync.priority"));
    }

    #[test]
    fn validate_catches_out_of_range_compression_level() {
        let mut cfg = Config::default();
        cfg.compression.level = 12;
        assert!(cfg.validate().iter().any(|e| e.field == "compression.level"));
    }

    #[test]
    fn validate_catches_invalid_conflict_strategy_and_rules() {
        let cfg = ConfigBuilder::new()
            .conflicts_default_strategy("keep_both")
            .conflicts_rule("", "prefer_local")
            .conflicts_rule("notes/*", "merge")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"conflicts.default_strategy".to_string()));
        assert!(fields.contains(&"conflicts.rules[0].pattern".to_string()));
        assert!(fields.contains(&"conflicts.rules[1].strategy".to_string()));
    }

    #[test]
    fn validate_catches_invalid_base_url_and_log_level() {
        let cfg = ConfigBuilder::new()
            .remote_base_url("ftp://example.com")
            .logging_level("verbose")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"remote.base_url".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn validate_accepts_all_valid_conflict_strategies() {
        for strategy in VALID_CONFLICT_STRATEGIES {
            let mut cfg = Config::default();
            cfg.conflicts.default_strategy = strategy.to_string();
            assert!(cfg.validate().is_empty(), "strategy {strategy} rejected");
        }
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .sync_enabled(false)
            .sync_interval(5)
            .sync_retry_delay_ms(10)
            .sync_max_retry_delay_ms(100)
            .sync_batch_size(2)
            .sync_priority("low")
            .compression_threshold_bytes(16)
            .compression_timeout_ms(50)
            .compression_level(1)
            .compression_max_decompressed_bytes(4096)
            .storage_database(PathBuf::from("/tmp/q.db"))
            .remote_timeout_secs(2)
            .remote_probe_interval(1)
            .build();

        assert!(!cfg.sync.enabled);
        assert_eq!(cfg.sync.interval, 5);
        assert_eq!(cfg.sync.retry_delay_ms, 10);
        assert_eq!(cfg.sync.max_retry_delay_ms, 100);
        assert_eq!(cfg.sync.batch_size, 2);
        assert_eq!(cfg.sync.default_priority(), Priority::Low);
        assert_eq!(cfg.compression.threshold_bytes, 16);
        assert_eq!(cfg.compression.timeout_ms, 50);
        assert_eq!(cfg.compression.level, 1);
        assert_eq!(cfg.compression.max_decompressed_bytes, 4096);
        assert_eq!(cfg.storage.database, PathBuf::from("/tmp/q.db"));
        assert_eq!(cfg.remote.timeout_secs, 2);
        assert_eq!(cfg.remote.probe_interval, 1);
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new().sync_batch_size(0).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync.batch_size");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("tidesync/config.yaml"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("sync.interval", "must be greater than 0");
        assert_eq!(err.to_string(), "sync.interval: must be greater than 0");
    }
}
