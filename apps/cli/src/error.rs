//! Error types for the CLI

use std::path::PathBuf;

use provisioner_client::{GatewayError, TransportError};
use provisioner_core::ConfigError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("event stream gave up after {attempts} reconnect attempts")]
    StreamGaveUp { attempts: u32 },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}
