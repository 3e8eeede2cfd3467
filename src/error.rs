//! Error types for lintmux
//!
//! Centralized error handling using thiserror. Only configuration and
//! discovery failures are fatal; checker problems are reported through
//! `engine::Outcome` instead.

use thiserror::Error;

/// All fatal error types that can occur in lintmux
#[derive(Debug, Error)]
pub enum LintmuxError {
    /// Configuration file missing, unreadable or malformed
    #[error("Config error: {0}")]
    Config(String),

    /// The target listing tool could not be run or its output was unusable
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for lintmux operations
pub type Result<T> = std::result::Result<T, LintmuxError>;
