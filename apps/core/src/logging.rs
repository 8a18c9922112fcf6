//! Structured logging setup.
//!
//! Builds a `tracing-subscriber` registry with an `EnvFilter` and either a
//! pretty console layer or a Bunyan JSON layer. `RUST_LOG` takes precedence
//! over the configured level. Initialization happens at most once per process.

use std::sync::Once;
use tracing::Level;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::EngineConfig;

static INIT: Once = Once::new();

/// Application name reported in Bunyan records.
const BUNYAN_APP_NAME: &str = "techcontext";

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level for this crate
    pub level: Level,
    /// Emit Bunyan JSON records instead of pretty console output
    pub use_json: bool,
    /// Include the module target in console output
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output at INFO, for log aggregation.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
        }
    }
}

impl From<&EngineConfig> for LoggingConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            level: parse_level(&config.log_level),
            use_json: config.json_logs,
            include_target: true,
        }
    }
}

/// Parses a log level, falling back to INFO for unknown values.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "techcontext_core={}",
            level.as_str().to_lowercase()
        ))
    })
}

/// Installs the global subscriber. Later calls are no-ops, as is a call made
/// after another subscriber was installed by the host application.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        let result = if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new(
                    BUNYAN_APP_NAME.to_string(),
                    std::io::stdout,
                ))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(config.include_target))
                .try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized by host: {}", e);
        }
    });
}

/// Initializes logging from an engine configuration.
pub fn init_from_config(config: &EngineConfig) {
    init_logging(LoggingConfig::from(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" warn "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_from_engine_config() {
        let engine = EngineConfig {
            log_level: "debug".to_string(),
            json_logs: true,
            ..EngineConfig::default()
        };
        let config = LoggingConfig::from(&engine);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
    }

    #[test]
    fn test_init_twice_is_noop() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::production());
    }
}
