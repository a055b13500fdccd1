//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! The variants are deliberately disjoint: a corrupt file is never reported as
//! a usage mistake and vice versa, and nothing is downgraded to a default.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PBF operations
#[derive(Error, Debug)]
pub enum PbfError {
    /// I/O errors (storage unavailable, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Format errors (corrupt header, run-list length mismatch, bad checkpoint table)
    #[error("Format error: {message}")]
    Format { message: String },

    /// Usage errors (seek beyond row count, column out of range, write after close)
    #[error("Usage error: {message}")]
    Usage { message: String },

    /// Configuration errors (invalid group size, shift, CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Type alias for Results using PbfError
pub type Result<T> = std::result::Result<T, PbfError>;

impl PbfError {
    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors caused by corrupt or inconsistent stored data
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// True for errors caused by calling the API incorrectly
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }
}
