//! Runner error types

use retro_config::ConfigError;
use retro_interrupt::InterruptError;
use retro_script::ScriptError;
use std::path::PathBuf;
use thiserror::Error;

pub type RunResult<T> = Result<T, RunnerError>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Interrupt(#[from] InterruptError),
}
