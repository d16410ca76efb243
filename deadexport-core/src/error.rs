//! Typed error handling for deadexport.
//!
//! Configuration and calling-sequence faults abort a session; cache and
//! provider faults are recovered where they happen.

use std::path::PathBuf;
use thiserror::Error;

/// Calling-sequence faults of the call collector.
///
/// These indicate an integration bug in the host pipeline and are never
/// recovered.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorError {
    /// `start` was called while a collector was already running.
    #[error("call collector is already running")]
    AlreadyRunning,

    /// `record`, `snapshot` or `stop` was called on a stopped collector.
    #[error("call collector is not running")]
    NotRunning,
}

/// Main error type for deadexport operations.
#[derive(Error, Debug)]
pub enum DeadexportError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid configuration (ignore rule, severity, config file syntax)
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Manifest cache errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Collector misuse
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Symbol data for a unit could not be obtained
    #[error("Provider error for unit {unit}: {message}")]
    Provider { unit: String, message: String },

    /// Invalid argument provided (ignore rule, severity level)
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Session lifecycle misuse
    #[error("Session error: {message}")]
    Session { message: String },
}

impl DeadexportError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a provider error for one unit.
    pub fn provider(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Check if this error is recovered locally instead of aborting the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cache { .. } | Self::Provider { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for deadexport results.
pub type DeadexportResult<T> = Result<T, DeadexportError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> DeadexportResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> DeadexportResult<T> {
        self.map_err(|e| DeadexportError::io(path, e))
    }
}
