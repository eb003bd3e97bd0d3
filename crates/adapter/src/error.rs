//! Error types for the adapter binary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// Invalid config file contents or unresolvable `${VAR}` references.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
