// Configuration File Support
//
// Configuration for the safe commenter. TOML file, then environment variable
// overrides, then validation. Values are read once at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bot::console::DEFAULT_REPLY_TEMPLATE;
use crate::bot::pipeline::DEFAULT_FALLBACK_COMMENT;
use crate::rate_limit::AdmissionConfig;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "safe-commenter.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Admission controller limits
    pub rate_limit: AdmissionConfig,

    /// Commenter behaviour
    pub bot: BotConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Commenter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Channel ids to comment on
    pub channels: Vec<String>,

    /// Reply used when comment generation fails
    pub fallback_comment: String,

    /// Dry-run reply template; `{preview}` is replaced by the post start
    pub reply_template: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            fallback_comment: DEFAULT_FALLBACK_COMMENT.to_string(),
            reply_template: DEFAULT_REPLY_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default file when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// resulting configuration is invalid. A missing file yields defaults
    /// (with environment overrides applied).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path
    pub fn config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SAFE_COMMENTER_MAX_PER_HOUR / SAFE_COMMENTER_MAX_PER_DAY
    /// - SAFE_COMMENTER_SHORT_WINDOW_SECS / SAFE_COMMENTER_LONG_WINDOW_SECS
    /// - SAFE_COMMENTER_MAX_WAIT_SECS
    /// - SAFE_COMMENTER_VERBOSE
    /// - SAFE_COMMENTER_LOG_LEVEL / SAFE_COMMENTER_LOG_FORMAT
    /// - TARGET_CHANNEL (comma separated channel ids)
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("SAFE_COMMENTER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SAFE_COMMENTER_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Rate limit overrides; unparsable or zero values keep the current setting
        if let Some(cap) = env_positive::<u32>("SAFE_COMMENTER_MAX_PER_HOUR") {
            self.rate_limit.short_window_capacity = cap;
        }
        if let Some(cap) = env_positive::<u32>("SAFE_COMMENTER_MAX_PER_DAY") {
            self.rate_limit.long_window_capacity = cap;
        }
        if let Some(secs) = env_positive::<u64>("SAFE_COMMENTER_SHORT_WINDOW_SECS") {
            self.rate_limit.short_window_secs = secs;
        }
        if let Some(secs) = env_positive::<u64>("SAFE_COMMENTER_LONG_WINDOW_SECS") {
            self.rate_limit.long_window_secs = secs;
        }
        if let Some(secs) = env_positive::<u64>("SAFE_COMMENTER_MAX_WAIT_SECS") {
            self.rate_limit.max_wait_secs = Some(secs);
        }
        if let Ok(verbose) = std::env::var("SAFE_COMMENTER_VERBOSE") {
            self.rate_limit.verbose = verbose.parse().unwrap_or(self.rate_limit.verbose);
        }

        // Channel list
        if let Ok(channels) = std::env::var("TARGET_CHANNEL") {
            let channels: Vec<String> = channels
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !channels.is_empty() {
                self.bot.channels = channels;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate admission limits
        self.rate_limit.validate()?;

        if self.bot.fallback_comment.trim().is_empty() {
            anyhow::bail!("Fallback comment must not be empty");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

fn env_positive<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = std::env::var(name).ok()?.trim().parse::<T>().ok()?;
    (value > T::default()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests touching process environment must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "SAFE_COMMENTER_LOG_LEVEL",
        "SAFE_COMMENTER_LOG_FORMAT",
        "SAFE_COMMENTER_MAX_PER_HOUR",
        "SAFE_COMMENTER_MAX_PER_DAY",
        "SAFE_COMMENTER_SHORT_WINDOW_SECS",
        "SAFE_COMMENTER_LONG_WINDOW_SECS",
        "SAFE_COMMENTER_MAX_WAIT_SECS",
        "SAFE_COMMENTER_VERBOSE",
        "TARGET_CHANNEL",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.rate_limit.short_window_capacity, 8);
        assert_eq!(config.rate_limit.long_window_capacity, 50);
        assert!(config.bot.channels.is_empty());
        assert_eq!(config.bot.fallback_comment, DEFAULT_FALLBACK_COMMENT);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let mut config = Config::default();
        config.rate_limit.long_window_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("long_window_capacity"));
    }

    #[test]
    fn test_config_validation_empty_fallback() {
        let mut config = Config::default();
        config.bot.fallback_comment = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[rate_limit]
short_window_capacity = 4
short_window_secs = 1800
long_window_capacity = 20
long_window_secs = 43200
verbose = true
max_wait_secs = 600

[bot]
channels = ["news", "tech"]
fallback_comment = "Great post!"
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.rate_limit.short_window_capacity, 4);
        assert_eq!(config.rate_limit.short_window_secs, 1800);
        assert_eq!(config.rate_limit.long_window_capacity, 20);
        assert_eq!(config.rate_limit.long_window_secs, 43200);
        assert!(config.rate_limit.verbose);
        assert_eq!(config.rate_limit.max_wait_secs, Some(600));
        assert_eq!(config.bot.channels, vec!["news", "tech"]);
        assert_eq!(config.bot.fallback_comment, "Great post!");
        // Unset fields keep defaults
        assert_eq!(config.bot.reply_template, DEFAULT_REPLY_TEMPLATE);
        assert_eq!(config.rate_limit.min_wait_ms, 10);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_zero_duration() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[rate_limit]\nshort_window_secs = 0\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SAFE_COMMENTER_LOG_LEVEL", "debug");
        std::env::set_var("SAFE_COMMENTER_MAX_PER_HOUR", "3");
        std::env::set_var("SAFE_COMMENTER_MAX_PER_DAY", "12");
        std::env::set_var("SAFE_COMMENTER_SHORT_WINDOW_SECS", "600");
        std::env::set_var("SAFE_COMMENTER_MAX_WAIT_SECS", "120");
        std::env::set_var("SAFE_COMMENTER_VERBOSE", "true");
        std::env::set_var("TARGET_CHANNEL", "news, tech ,,");

        let config = Config::default().apply_env_overrides();
        clear_env();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rate_limit.short_window_capacity, 3);
        assert_eq!(config.rate_limit.long_window_capacity, 12);
        assert_eq!(config.rate_limit.short_window_secs, 600);
        assert_eq!(config.rate_limit.long_window_secs, 86400);
        assert_eq!(config.rate_limit.max_wait_secs, Some(120));
        assert!(config.rate_limit.verbose);
        assert_eq!(config.bot.channels, vec!["news", "tech"]);
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SAFE_COMMENTER_MAX_PER_HOUR", "0");
        std::env::set_var("SAFE_COMMENTER_MAX_PER_DAY", "lots");
        std::env::set_var("SAFE_COMMENTER_VERBOSE", "maybe");

        let config = Config::default().apply_env_overrides();
        clear_env();

        // Should keep defaults for invalid values
        assert_eq!(config.rate_limit.short_window_capacity, 8);
        assert_eq!(config.rate_limit.long_window_capacity, 50);
        assert!(!config.rate_limit.verbose);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            "[rate_limit]\nshort_window_capacity = 4\n\n[bot]\nchannels = [\"news\"]\n",
        )
        .unwrap();
        std::env::set_var("SAFE_COMMENTER_MAX_PER_HOUR", "2");

        let config = Config::load_from_path(temp_file.path());
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.rate_limit.short_window_capacity, 2);
        assert_eq!(config.bot.channels, vec!["news"]);
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().ends_with(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
