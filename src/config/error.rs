//! Errors raised while loading, checking or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Cannot write configuration file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `device.baud_rate` was set to zero.
    #[error("device.baud_rate must be greater than zero")]
    ZeroBaudRate,

    /// The reader would spin without sleeping.
    #[error("device.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("{0:?} cannot be used as the submission delimiter")]
    Delimiter(char),

    #[error("Invalid log filter '{filter}': {message}")]
    LogFilter { filter: String, message: String },

    /// An `ARDUINO_SERIAL_*` override could not be parsed.
    #[error("Environment variable '{var}' is invalid: {message}")]
    Env { var: String, message: String },
}

impl ConfigError {
    pub fn env<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::Env {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
