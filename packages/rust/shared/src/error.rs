//! Error types for chordsync.
//!
//! Library crates use [`ChordsyncError`] via `thiserror`.
//! The daemon binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all chordsync operations.
#[derive(Debug, thiserror::Error)]
pub enum ChordsyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during acquisition or asset fetch.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or record extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Object-store error (existence check or upload).
    #[error("store error: {0}")]
    Store(String),

    /// Sink transport error (connect, emit, or acknowledgement).
    #[error("sink error: {0}")]
    Sink(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChordsyncError>;

impl ChordsyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
