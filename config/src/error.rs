use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve countertool home: {0}")]
    Home(#[source] std::io::Error),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value at `{key}` in {path}: {message}")]
    InvalidKey {
        path: PathBuf,
        key: String,
        message: String,
    },
    #[error("invalid -c override `{raw}`: {message}")]
    Override { raw: String, message: String },
}
