//! Configuration module for WordGuard
//!
//! Handles loading, parsing, and validation of configuration files.
//! Default configuration path: `~/.wordguard/config.toml`

use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Decision engine settings
    pub filter: FilterConfig,
    /// Enforcement settings
    pub enforcement: EnforcementConfig,
    /// Bundled list overrides
    pub lists: ListsConfig,
    /// Persistent state settings
    pub storage: StorageConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Outbound notification settings
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from default path (~/.wordguard/config.toml)
    pub fn load() -> Result<Self, CoreError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(content).map_err(ConfigError::ParseToml)?)
    }

    /// Get the base configuration directory path (~/.wordguard)
    fn config_base_dir() -> Result<PathBuf, CoreError> {
        dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)
            .map(|home| home.join(".wordguard"))
            .map_err(CoreError::Config)
    }

    /// Get default configuration file path
    pub fn default_path() -> Result<PathBuf, CoreError> {
        Self::config_base_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get default log directory path
    pub fn default_log_dir() -> Result<PathBuf, CoreError> {
        Self::config_base_dir().map(|dir| dir.join("logs"))
    }

    /// Get default state database path
    pub fn default_db_path() -> Result<PathBuf, CoreError> {
        Self::config_base_dir().map(|dir| dir.join("state.db"))
    }

    /// Get default notification outbox path
    pub fn default_outbox_path() -> Result<PathBuf, CoreError> {
        Self::config_base_dir().map(|dir| dir.join("outbox.jsonl"))
    }

    /// Ensure configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf, CoreError> {
        let config_dir = Self::config_base_dir()?;
        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::CreateDir {
                path: config_dir.clone(),
                source: e,
            })?;
        }
        Ok(config_dir)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> Result<(), CoreError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeToml)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose output
    pub verbose: bool,
    /// Default output format (pretty, json, compact)
    pub default_format: String,
    /// Package name of the filter itself; its events are never classified
    pub own_package: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            default_format: "pretty".to_string(),
            own_package: "com.example.explicitwordsfilter".to_string(),
        }
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Quiet period before a text-changed check runs
    pub text_debounce_ms: u64,
    /// Quiet period before a full-tree check runs
    pub content_debounce_ms: u64,
    /// Occurrences of a single word in one snapshot that trigger an app block
    pub frequency_threshold: usize,
    /// How long an app stays blocked after a frequency trigger
    pub block_duration_secs: u64,
    /// Maximum descent depth when walking a UI tree
    pub max_tree_depth: usize,
    /// Maximum number of nodes visited per walk
    pub max_tree_nodes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            text_debounce_ms: 500,
            content_debounce_ms: 1000,
            frequency_threshold: 5,
            block_duration_secs: 300,
            max_tree_depth: 10,
            max_tree_nodes: 5000,
        }
    }
}

impl FilterConfig {
    /// Get text-changed debounce duration
    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }

    /// Get content-changed debounce duration
    pub fn content_debounce(&self) -> Duration {
        Duration::from_millis(self.content_debounce_ms)
    }

    /// Get the app block duration in milliseconds
    pub fn block_duration_ms(&self) -> i64 {
        (self.block_duration_secs as i64).saturating_mul(1000)
    }
}

/// Enforcement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Clear the focused input before navigating away
    pub clear_input: bool,
    /// Try to close open browser tabs
    pub close_tabs: bool,
    /// Maximum "navigate back" presses before going home
    pub back_attempts: u32,
    /// Pause between back presses in milliseconds
    pub back_pacing_ms: u64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            clear_input: true,
            close_tabs: true,
            back_attempts: 5,
            back_pacing_ms: 150,
        }
    }
}

impl EnforcementConfig {
    /// Get the pause between back presses
    pub fn back_pacing(&self) -> Duration {
        Duration::from_millis(self.back_pacing_ms)
    }
}

/// Overrides for the bundled default lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListsConfig {
    /// Newline-delimited explicit words file (bundled list if unset)
    pub default_words_path: Option<PathBuf>,
    /// Newline-delimited blocked sites file (bundled list if unset)
    pub default_sites_path: Option<PathBuf>,
}

/// Persistent state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (default: ~/.wordguard/state.db)
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Get effective database path (custom or default)
    pub fn effective_db_path(&self) -> Result<PathBuf, CoreError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Config::default_db_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable session log files
    pub enabled: bool,
    /// Log directory path (default: ~/.wordguard/logs)
    pub log_dir: Option<PathBuf>,
    /// Log retention in days (0 = no limit)
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: None,
            retention_days: 30,
        }
    }
}

impl LoggingConfig {
    /// Get effective log directory (custom or default)
    pub fn effective_log_dir(&self) -> Result<PathBuf, CoreError> {
        match &self.log_dir {
            Some(path) => Ok(path.clone()),
            None => Config::default_log_dir(),
        }
    }
}

/// Outbound notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Queue notifications for recipients
    pub enabled: bool,
    /// JSON Lines outbox picked up by the webhook forwarder
    pub outbox_path: Option<PathBuf>,
    /// Shared secret included in every payload
    pub secret: String,
    /// Heartbeat gap after which the service is assumed force-stopped
    pub force_stop_threshold_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outbox_path: None,
            secret: String::new(),
            force_stop_threshold_secs: 300,
        }
    }
}

impl NotifyConfig {
    /// Get effective outbox path (custom or default)
    pub fn effective_outbox_path(&self) -> Result<PathBuf, CoreError> {
        match &self.outbox_path {
            Some(path) => Ok(path.clone()),
            None => Config::default_outbox_path(),
        }
    }

    /// Get force-stop threshold in milliseconds
    pub fn force_stop_threshold_ms(&self) -> i64 {
        (self.force_stop_threshold_secs as i64).saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.general.verbose);
        assert_eq!(config.general.default_format, "pretty");
        assert_eq!(config.filter.text_debounce_ms, 500);
        assert_eq!(config.filter.content_debounce_ms, 1000);
        assert_eq!(config.filter.frequency_threshold, 5);
        assert_eq!(config.filter.block_duration_secs, 300);
        assert_eq!(config.enforcement.back_attempts, 5);
        assert!(config.logging.enabled);
        assert_eq!(config.logging.retention_days, 30);
    }

    #[test]
    fn test_config_parse_toml() {
        let toml_content = r#"
[general]
verbose = true
default_format = "json"
own_package = "org.example.guard"

[filter]
text_debounce_ms = 250
content_debounce_ms = 800
frequency_threshold = 3
block_duration_secs = 60
max_tree_depth = 12

[enforcement]
close_tabs = false
back_attempts = 2

[lists]
default_words_path = "/etc/wordguard/words.txt"

[logging]
retention_days = 7

[notify]
enabled = false
secret = "s3cret"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.own_package, "org.example.guard");
        assert_eq!(config.filter.text_debounce(), Duration::from_millis(250));
        assert_eq!(config.filter.content_debounce(), Duration::from_millis(800));
        assert_eq!(config.filter.frequency_threshold, 3);
        assert_eq!(config.filter.block_duration_ms(), 60_000);
        assert_eq!(config.filter.max_tree_depth, 12);
        assert_eq!(config.filter.max_tree_nodes, 5000);
        assert!(!config.enforcement.close_tabs);
        assert!(config.enforcement.clear_input);
        assert_eq!(config.enforcement.back_attempts, 2);
        assert_eq!(
            config.lists.default_words_path,
            Some(PathBuf::from("/etc/wordguard/words.txt"))
        );
        assert!(config.lists.default_sites_path.is_none());
        assert_eq!(config.logging.retention_days, 7);
        assert!(!config.notify.enabled);
        assert_eq!(config.notify.secret, "s3cret");
    }

    #[test]
    fn test_config_partial_toml() {
        let toml_content = r#"
[general]
verbose = true
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert!(config.general.verbose);
        assert!(config.logging.enabled);
        assert_eq!(config.filter.frequency_threshold, 5);
    }

    #[test]
    fn test_config_empty_toml() {
        let config = Config::from_toml("").unwrap();
        assert!(!config.general.verbose);
        assert_eq!(config.general.default_format, "pretty");
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.general.verbose = true;
        config.filter.frequency_threshold = 9;
        config.storage.db_path = Some(temp_dir.path().join("state.db"));

        config.save(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = Config::load_from_path(&config_path).unwrap();
        assert!(loaded.general.verbose);
        assert_eq!(loaded.filter.frequency_threshold, 9);
        assert_eq!(
            loaded.storage.effective_db_path().unwrap(),
            temp_dir.path().join("state.db")
        );
    }

    #[test]
    fn test_enforcement_pacing() {
        let config = EnforcementConfig {
            back_pacing_ms: 40,
            ..Default::default()
        };
        assert_eq!(config.back_pacing(), Duration::from_millis(40));
    }

    #[test]
    fn test_logging_effective_log_dir_custom() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/custom/logs")),
            ..Default::default()
        };
        assert_eq!(
            config.effective_log_dir().unwrap(),
            PathBuf::from("/custom/logs")
        );
    }

    #[test]
    fn test_logging_effective_log_dir_default() {
        let config = LoggingConfig::default();
        let log_dir = config.effective_log_dir().unwrap();
        assert!(log_dir.to_string_lossy().contains(".wordguard"));
        assert!(log_dir.to_string_lossy().contains("logs"));
    }

    #[test]
    fn test_notify_threshold_ms() {
        let config = NotifyConfig::default();
        assert_eq!(config.force_stop_threshold_ms(), 300_000);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("invalid { toml content");
        assert!(result.is_err());
    }
}
