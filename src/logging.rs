//! Structured logging setup
//!
//! Logs go to stderr so stdout stays free for dry-run replies. `RUST_LOG`
//! refines the configured level.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the level filter; `--verbose` forces DEBUG
pub fn env_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config
            .level
            .to_lowercase()
            .parse::<Level>()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };

    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = env_filter(config, verbose)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};
    use tracing_subscriber::fmt;

    #[test]
    fn test_env_filter_from_config() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "compact".to_string(),
        };
        assert!(env_filter(&config, false).is_ok());
        assert!(env_filter(&config, true).is_ok());
    }

    #[test]
    fn test_env_filter_invalid_level() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            format: "compact".to_string(),
        };
        assert!(env_filter(&config, false).is_err());
        // Verbose does not consult the configured level
        assert!(env_filter(&config, true).is_ok());
    }

    #[test]
    fn test_json_subscriber_with_fields() {
        let subscriber = fmt().json().with_test_writer().finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(short_count = 1, short_capacity = 8, "Admission granted");
            debug!(wait_ms = 1500u64, "Rate limit reached, waiting for a free slot");
        });
    }

    #[test]
    fn test_init_twice_reports_error() {
        let config = LoggingConfig::default();
        let _ = init(&config, false);
        assert!(init(&config, false).is_err());
    }
}
