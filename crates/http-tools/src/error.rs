//! Error types for request building and execution.

use crate::safety::sanitize_reqwest_error;
use thiserror::Error;

/// Coarse classification of transport failures, used to decide retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

#[derive(Debug, Error)]
pub enum HttpToolsError {
    /// Invalid executor / auth configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A parameter marked required was not supplied and has no default.
    #[error("Required parameter '{parameter}' missing for endpoint '{endpoint}'")]
    MissingParameter { parameter: String, endpoint: String },

    /// The path still contains `{name}` placeholders after substitution.
    #[error("Missing required path parameters: {} (path '{path}')", .placeholders.join(", "))]
    UnresolvedPlaceholder {
        placeholders: Vec<String>,
        path: String,
    },

    /// Base URL + path did not form a valid absolute URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Signing or credential encoding failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// Network-level failure (no HTTP response was received).
    #[error("http transport error: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("http error: {0}")]
    Http(String),
}

impl HttpToolsError {
    /// Transport errors that are worth another attempt (timeouts and refused/reset connections).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportErrorKind::Timeout | TransportErrorKind::Connect,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        let kind = if value.is_timeout() {
            TransportErrorKind::Timeout
        } else if value.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::Transport {
            kind,
            message: sanitize_reqwest_error(&value),
        }
    }
}

impl From<url::ParseError> for HttpToolsError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}
