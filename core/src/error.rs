//! Error types for WordGuard Core
//!
//! Every fallible core operation returns [`CoreError`]; the FFI layer
//! flattens it into `FfiError`. Host action failures ([`ActionError`]) are
//! logged by the enforcer and never escalate into a `CoreError`.

use std::path::PathBuf;
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Storage/logging errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Blocklist asset errors
    #[error("List error: {0}")]
    List(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeToml(#[from] toml::ser::Error),

    /// Failed to write config file
    #[error("Failed to write config file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Failed to create directory
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create a storage directory
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create/open a file
    #[error("Failed to open file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize a record
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to write to a file
    #[error("Failed to write to file: {0}")]
    Write(std::io::Error),

    /// Failed to flush buffer
    #[error("Failed to flush buffer: {0}")]
    Flush(std::io::Error),

    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A lock guarding shared state was poisoned
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Failures reported by the host accessibility layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The host refused or failed to perform the action
    #[error("Action {action} rejected by host")]
    Rejected { action: String },
}

/// Convenience type alias
pub type Result<T> = std::result::Result<T, CoreError>;
