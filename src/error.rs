//! Error types for the Tululu crawler.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong. Network outcomes are not errors
//! here: see [`crate::fetcher::FetchOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Expected markup was missing from a fetched page.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The required element isn't found in HTML
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A link does not point at a book detail page
    #[error("Not a book detail URL: {0}")]
    InvalidBookUrl(String),
}

/// Error type for writing downloaded assets and record files.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the target directory
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write file contents
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a previously written file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode or decode the record file
    #[error("Invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
