//! Errors raised while reading, merging and checking `agentx.json5` layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// A layer is not valid JSON5.
    #[error("config syntax error: {0}")]
    Syntax(#[from] json5::Error),
    /// The merged document does not match the config model.
    #[error("config decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// A key is unknown or has the wrong type; `path` is `<layer>:<dotted.path>`.
    #[error("invalid config field {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A cross-field invariant does not hold.
    #[error("invalid config: {0}")]
    Invalid(String),
}
