//! CLI error type.

use thiserror::Error;

use regionload::config::ConfigError;
use regionload::logging::LoggingError;
use regionload::session::SessionError;
use regionload::source::SourceError;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("HTTP client error: {0}")]
    Http(#[from] SourceError),

    #[error("Load failed: {0}")]
    Load(#[from] SessionError),

    #[error("Failed to write output: {0}")]
    Output(String),

    #[error("Failed to clear cache: {0}")]
    CacheClear(String),

    #[error("Failed to read cache statistics: {0}")]
    CacheStats(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
