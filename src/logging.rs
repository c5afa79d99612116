/// Logging setup for the binary.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{QueueError, Result};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Include file and line information.
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            file_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Install a fmt subscriber. `RUST_LOG` directives take precedence over the
/// configured level.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| QueueError::Logging(e.to_string()))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| QueueError::InvalidConfig(format!("Invalid log level: {}", level)))
}
