//! Error types for manifest and configuration loading.

use thiserror::Error;

/// Errors that can occur while reading or writing cached metadata.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A manifest parsed but describes malformed commands.
    #[error("invalid manifest for {plugin}: {reason}")]
    InvalidManifest { plugin: String, reason: String },

    /// Recorded checksum does not match the command list.
    #[error("invalid checksum for {plugin}: expected {expected}, found {actual}")]
    InvalidChecksum {
        plugin: String,
        expected: String,
        actual: String,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// All configured loader sources failed.
    #[error("no manifest sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;
