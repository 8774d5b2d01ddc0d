//! Error types for bumpwatch-core configuration.
//!
//! Each algorithmic module defines its own error enum next to the code that
//! raises it.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("config file {0} does not exist")]
    Missing(Utf8PathBuf),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
