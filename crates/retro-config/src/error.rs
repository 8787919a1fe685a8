//! Error types for configuration loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading a runtime config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or deserialize YAML
    #[error("failed to parse YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `!env_var` named a variable that is unset and has no default
    #[error("environment variable '{var}' not set (in {path})")]
    MissingEnvVar { var: String, path: PathBuf },

    /// Malformed `!env_var` tag
    #[error("invalid !env_var in {path}: {reason}")]
    InvalidTag { path: PathBuf, reason: String },

    /// Unknown name in `security.permissions`
    #[error("unknown permission '{name}' in {path}")]
    InvalidPermission { name: String, path: PathBuf },
}
