//! Executor and authentication configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_SECS: f64 = 1.0;
pub const DEFAULT_RETRY_ON_STATUS: [u16; 5] = [429, 500, 502, 503, 504];
pub const DEFAULT_API_KEY_HEADER: &str = "X-MBX-APIKEY";
pub const DEFAULT_RECV_WINDOW_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
    Cookie,
}

/// Credentials for one API. Values are opaque strings (env expansion happens upstream).
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthConfig {
    #[default]
    None,
    ApiKey {
        #[serde(default)]
        location: ApiKeyLocation,
        name: String,
        value: String,
    },
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    #[serde(rename = "oauth2", rename_all = "camelCase")]
    OAuth2 {
        access_token: String,
        #[serde(default)]
        token_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    HmacSignature {
        api_key: String,
        api_secret: String,
        #[serde(default)]
        api_key_header: Option<String>,
        #[serde(default)]
        recv_window: Option<u64>,
    },
}

impl AuthConfig {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey { .. } => "apiKey",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::OAuth2 { .. } => "oauth2",
            Self::HmacSignature { .. } => "hmacSignature",
        }
    }
}

// Credentials never reach logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            other => write!(f, "AuthConfig({})", other.kind()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Per-request timeout. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempt budget per call (a value of `0` is treated as `1`).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: f64,
    #[serde(default = "default_retry_on_status")]
    pub retry_on_status: Vec<u16>,
    /// Explicit success status set. `None` means 200..=299.
    #[serde(default)]
    pub success_status: Option<Vec<u16>>,
    /// Headers sent with every request, before parameter headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            retry_on_status: DEFAULT_RETRY_ON_STATUS.to_vec(),
            success_status: None,
            headers: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay before the attempt following `attempt` (1-based): `backoff * 2^(attempt-1)`.
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        let secs = self.retry_backoff_secs * f64::from(1u32 << exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_secs() -> f64 {
    DEFAULT_RETRY_BACKOFF_SECS
}

fn default_retry_on_status() -> Vec<u16> {
    DEFAULT_RETRY_ON_STATUS.to_vec()
}
