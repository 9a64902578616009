//! CLI error type.

use std::fmt;

use buildfetch::{ConfigError, DownloaderError, LoggingError};

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is unusable.
    Config(String),
    /// Arguments are inconsistent.
    Usage(String),
    /// The HTTP client could not be created.
    Transport(String),
    /// Manifest resolution or downloader setup failed.
    Downloader(DownloaderError),
    /// Interactive prompt failed.
    Prompt(String),
    /// Some files failed to download.
    Incomplete { failed: usize, total: usize },
    /// The user cancelled.
    Cancelled,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Transport(msg) => write!(f, "HTTP client error: {}", msg),
            CliError::Downloader(e) => write!(f, "{}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
            CliError::Incomplete { failed, total } => {
                write!(f, "{} of {} files failed to download", failed, total)
            }
            CliError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<DownloaderError> for CliError {
    fn from(e: DownloaderError) -> Self {
        CliError::Downloader(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Config(e.to_string())
    }
}
