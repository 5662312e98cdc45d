//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{CellScoutError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub nudge: NudgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How each cycle obtains its location fix
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AcquireMode {
    /// Wait for a fresh high-accuracy fix (bounded by `acquire_timeout_ms`)
    Current,
    /// Take whatever fix the provider has cached
    LastKnown,
}

/// Sampling loop configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SamplingConfig {
    #[serde(default = "default_mode")]
    pub mode: AcquireMode,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_summary_interval_cycles")]
    pub summary_interval_cycles: u64,
}

/// Displacement thresholds, in meters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_gsm_min_distance_m")]
    pub gsm_min_distance_m: f64,

    #[serde(default = "default_lte_min_distance_m")]
    pub lte_min_distance_m: f64,

    /// Falls back to the GSM threshold when unset
    #[serde(default)]
    pub wcdma_min_distance_m: Option<f64>,

    /// Falls back to the GSM threshold when unset
    #[serde(default)]
    pub cdma_min_distance_m: Option<f64>,
}

/// Measurement store configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

/// Network nudge configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NudgeConfig {
    #[serde(default = "default_nudge_enabled")]
    pub enabled: bool,

    #[serde(default = "default_nudge_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Default value functions
fn default_mode() -> AcquireMode { AcquireMode::Current }
fn default_interval_ms() -> u64 { 1000 }
fn default_acquire_timeout_ms() -> u64 { 5000 }
fn default_summary_interval_cycles() -> u64 { 60 }

fn default_gsm_min_distance_m() -> f64 { 200.0 }
fn default_lte_min_distance_m() -> f64 { 50.0 }

fn default_database_path() -> String { "cell_info.db".to_string() }

fn default_nudge_enabled() -> bool { true }
fn default_nudge_url() -> String { "https://example.com/ping".to_string() }
fn default_connect_timeout_ms() -> u64 { 500 }
fn default_request_timeout_ms() -> u64 { 2000 }

fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> String { "./logs".to_string() }

/// Interval of the lower-cadence, UI-driven variant
const UI_POLL_INTERVAL_MS: u64 = 3000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            filter: FilterConfig::default(),
            storage: StorageConfig::default(),
            nudge: NudgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            interval_ms: default_interval_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            summary_interval_cycles: default_summary_interval_cycles(),
        }
    }
}

impl SamplingConfig {
    /// Settings of the UI-driven variant: cached fixes every 3 seconds.
    pub fn ui_poll() -> Self {
        Self {
            mode: AcquireMode::LastKnown,
            interval_ms: UI_POLL_INTERVAL_MS,
            ..Self::default()
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gsm_min_distance_m: default_gsm_min_distance_m(),
            lte_min_distance_m: default_lte_min_distance_m(),
            wcdma_min_distance_m: None,
            cdma_min_distance_m: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: default_database_path() }
    }
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_nudge_enabled(),
            url: default_nudge_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            log_dir: default_log_dir(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> CellScoutError {
    CellScoutError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cell_scout::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Sampling cadence
        if self.sampling.interval_ms == 0 || self.sampling.interval_ms > 60000 {
            return Err(invalid("interval_ms must be between 1 and 60000"));
        }

        if self.sampling.acquire_timeout_ms == 0 || self.sampling.acquire_timeout_ms > 60000 {
            return Err(invalid("acquire_timeout_ms must be between 1 and 60000"));
        }

        if self.sampling.summary_interval_cycles == 0 {
            return Err(invalid("summary_interval_cycles must be greater than 0"));
        }

        // Displacement thresholds
        for (name, value) in [
            ("gsm_min_distance_m", Some(self.filter.gsm_min_distance_m)),
            ("lte_min_distance_m", Some(self.filter.lte_min_distance_m)),
            ("wcdma_min_distance_m", self.filter.wcdma_min_distance_m),
            ("cdma_min_distance_m", self.filter.cdma_min_distance_m),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid(format!("{} must be a finite, non-negative distance", name)));
                }
            }
        }

        if self.storage.database_path.is_empty() {
            return Err(invalid("database_path cannot be empty"));
        }

        // Nudge endpoint
        if self.nudge.enabled
            && !(self.nudge.url.starts_with("http://") || self.nudge.url.starts_with("https://"))
        {
            return Err(invalid("nudge url must start with http:// or https://"));
        }

        if self.nudge.connect_timeout_ms == 0 || self.nudge.connect_timeout_ms > 10000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 10000"));
        }

        if self.nudge.request_timeout_ms < self.nudge.connect_timeout_ms {
            return Err(invalid("request_timeout_ms must not be shorter than connect_timeout_ms"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        if self.logging.file_enabled && self.logging.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty when file logging is enabled"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling.mode, AcquireMode::Current);
        assert_eq!(config.sampling.interval_ms, 1000);
        assert_eq!(config.sampling.acquire_timeout_ms, 5000);
        assert_eq!(config.nudge.connect_timeout_ms, 500);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[sampling]
mode = "last_known"
interval_ms = 3000

[filter]
lte_min_distance_m = 75.0
cdma_min_distance_m = 300.0

[storage]
database_path = "/tmp/cells.db"

[nudge]
enabled = false

[logging]
level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.sampling.mode, AcquireMode::LastKnown);
        assert_eq!(config.sampling.interval_ms, 3000);
        assert_eq!(config.sampling.acquire_timeout_ms, 5000);
        assert_eq!(config.filter.gsm_min_distance_m, 200.0);
        assert_eq!(config.filter.lte_min_distance_m, 75.0);
        assert_eq!(config.filter.wcdma_min_distance_m, None);
        assert_eq!(config.filter.cdma_min_distance_m, Some(300.0));
        assert_eq!(config.storage.database_path, "/tmp/cells.db");
        assert!(!config.nudge.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/cell-scout.toml");
        assert!(matches!(result, Err(CellScoutError::Io(_))));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Config::from_toml("[sampling]\nmode = \"sometimes\"\n");
        assert!(matches!(result, Err(CellScoutError::Config(_))));
    }

    #[test]
    fn test_ui_poll_preset() {
        let sampling = SamplingConfig::ui_poll();
        assert_eq!(sampling.mode, AcquireMode::LastKnown);
        assert_eq!(sampling.interval_ms, 3000);
        assert_eq!(sampling.acquire_timeout_ms, default_acquire_timeout_ms());
    }

    #[test]
    fn test_interval_zero() {
        let mut config = Config::default();
        config.sampling.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_high() {
        let mut config = Config::default();
        config.sampling.interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_acquire_timeout_zero() {
        let mut config = Config::default();
        config.sampling.acquire_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_interval_zero() {
        let mut config = Config::default();
        config.sampling.summary_interval_cycles = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_threshold() {
        let mut config = Config::default();
        config.filter.gsm_min_distance_m = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_optional_threshold() {
        let mut config = Config::default();
        config.filter.wcdma_min_distance_m = Some(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_is_valid() {
        let mut config = Config::default();
        config.filter.lte_min_distance_m = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_database_path() {
        let mut config = Config::default();
        config.storage.database_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nudge_url_scheme() {
        let mut config = Config::default();
        config.nudge.url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        // Not checked while the nudge is off
        config.nudge.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connect_timeout_bounds() {
        let mut config = Config::default();
        config.nudge.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.nudge.connect_timeout_ms = 10001;
        config.nudge.request_timeout_ms = 20000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_shorter_than_connect() {
        let mut config = Config::default();
        config.nudge.request_timeout_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_file_logging_enabled() {
        let mut config = Config::default();
        config.logging.file_enabled = true;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_file_logging_disabled() {
        let mut config = Config::default();
        config.logging.file_enabled = false;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_mode(), AcquireMode::Current);
        assert_eq!(default_interval_ms(), 1000);
        assert_eq!(default_acquire_timeout_ms(), 5000);
        assert_eq!(default_summary_interval_cycles(), 60);
        assert_eq!(default_gsm_min_distance_m(), 200.0);
        assert_eq!(default_lte_min_distance_m(), 50.0);
        assert_eq!(default_database_path(), "cell_info.db");
        assert_eq!(default_nudge_enabled(), true);
        assert_eq!(default_nudge_url(), "https://example.com/ping");
        assert_eq!(default_connect_timeout_ms(), 500);
        assert_eq!(default_request_timeout_ms(), 2000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_dir(), "./logs");
    }
}
