// src/errors.rs

//! Crate-wide error taxonomy and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Invalid step range: '{from}' is not before '{to}' in the step ordering")]
    InvalidStepRange { from: String, to: String },

    #[error("Step '{step}' cannot run: predecessor '{missing}' has not completed")]
    PreconditionNotMet { step: String, missing: String },

    #[error("Command '{command}' on {host} exited with code {exit_code}: {stderr}")]
    RemoteCommand {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("No persisted state found for experiment {0}")]
    ExperimentNotFound(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Operator aborted at step '{0}'")]
    UserAborted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PostError>;
