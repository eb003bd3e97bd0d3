//! Authentication handlers.
//!
//! Handlers are pure: [`AuthHandler::apply`] takes the request's headers and query parameters and
//! returns new ones. Re-applying a handler overwrites its own fields instead of stacking them.

use crate::config::{ApiKeyLocation, AuthConfig, DEFAULT_API_KEY_HEADER, DEFAULT_RECV_WINDOW_MS};
use crate::error::{HttpToolsError, Result};
use crate::request::{Headers, QueryParams, header_key};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// The parts of a request an auth handler may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthTarget {
    pub headers: Headers,
    pub params: QueryParams,
}

impl AuthTarget {
    #[must_use]
    pub fn new(headers: Headers, params: QueryParams) -> Self {
        Self { headers, params }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthHandler {
    #[default]
    NoAuth,
    ApiKey {
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
    OAuth2 {
        access_token: String,
        token_type: String,
    },
    HmacSignature(HmacSigner),
}

impl AuthHandler {
    /// Attach credentials.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Auth`] if signing fails.
    pub fn apply(&self, target: AuthTarget) -> Result<AuthTarget> {
        let AuthTarget {
            mut headers,
            mut params,
        } = target;
        match self {
            Self::NoAuth => {}
            Self::ApiKey {
                location,
                name,
                value,
            } => match location {
                ApiKeyLocation::Header => {
                    set_header(&mut headers, name, value.clone());
                }
                ApiKeyLocation::Query => params.insert(name.clone(), value.clone()),
                ApiKeyLocation::Cookie => {
                    let key =
                        header_key(&headers, "cookie").unwrap_or_else(|| "Cookie".to_string());
                    let merged = merge_cookie(headers.get(&key).map(String::as_str), name, value);
                    headers.insert(key, merged);
                }
            },
            Self::Bearer { token } => {
                set_header(&mut headers, "Authorization", format!("Bearer {token}"));
            }
            Self::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                set_header(&mut headers, "Authorization", format!("Basic {encoded}"));
            }
            Self::OAuth2 {
                access_token,
                token_type,
            } => {
                set_header(
                    &mut headers,
                    "Authorization",
                    format!("{token_type} {access_token}"),
                );
            }
            Self::HmacSignature(signer) => {
                return signer.apply_at(AuthTarget { headers, params }, now_millis()?);
            }
        }
        Ok(AuthTarget { headers, params })
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::NoAuth)
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoAuth => "none",
            Self::ApiKey { .. } => "apiKey",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::OAuth2 { .. } => "oauth2",
            Self::HmacSignature(_) => "hmacSignature",
        }
    }

    /// Header names carrying credentials for this handler.
    #[must_use]
    pub fn sensitive_headers(&self) -> Vec<String> {
        match self {
            Self::NoAuth => Vec::new(),
            Self::ApiKey {
                location: ApiKeyLocation::Header,
                name,
                ..
            } => vec![name.clone()],
            Self::ApiKey {
                location: ApiKeyLocation::Cookie,
                ..
            } => vec!["Cookie".to_string()],
            Self::ApiKey { .. } => Vec::new(),
            Self::Bearer { .. } | Self::Basic { .. } | Self::OAuth2 { .. } => {
                vec!["Authorization".to_string()]
            }
            Self::HmacSignature(signer) => vec![signer.api_key_header.clone()],
        }
    }

    /// Query parameter names carrying credentials for this handler.
    #[must_use]
    pub fn sensitive_params(&self) -> Vec<String> {
        match self {
            Self::ApiKey {
                location: ApiKeyLocation::Query,
                name,
                ..
            } => vec![name.clone()],
            Self::HmacSignature(_) => vec!["signature".to_string()],
            _ => Vec::new(),
        }
    }
}

impl From<&AuthConfig> for AuthHandler {
    fn from(config: &AuthConfig) -> Self {
        match config {
            AuthConfig::None => Self::NoAuth,
            AuthConfig::ApiKey {
                location,
                name,
                value,
            } => Self::ApiKey {
                location: *location,
                name: name.clone(),
                value: value.clone(),
            },
            AuthConfig::Bearer { token } => Self::Bearer {
                token: token.clone(),
            },
            AuthConfig::Basic { username, password } => Self::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthConfig::OAuth2 {
                access_token,
                token_type,
            } => Self::OAuth2 {
                access_token: access_token.clone(),
                token_type: token_type.clone().unwrap_or_else(|| "Bearer".to_string()),
            },
            AuthConfig::HmacSignature {
                api_key,
                api_secret,
                api_key_header,
                recv_window,
            } => {
                let mut signer = HmacSigner::new(api_key.clone(), api_secret.clone());
                if let Some(header) = api_key_header {
                    signer = signer.with_api_key_header(header.clone());
                }
                if let Some(window) = recv_window {
                    signer = signer.with_recv_window(*window);
                }
                Self::HmacSignature(signer)
            }
        }
    }
}

impl fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuth => f.write_str("NoAuth"),
            Self::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .finish_non_exhaustive(),
            Self::Bearer { .. } => f.write_str("Bearer(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::OAuth2 { token_type, .. } => f
                .debug_struct("OAuth2")
                .field("token_type", token_type)
                .finish_non_exhaustive(),
            Self::HmacSignature(signer) => fmt::Debug::fmt(signer, f),
        }
    }
}

/// Exchange-style request signing: API key header, `timestamp` + `recvWindow` params, and an
/// HMAC-SHA256 `signature` over the key-sorted, form-encoded query string.
#[derive(Clone, PartialEq, Eq)]
pub struct HmacSigner {
    api_key: String,
    api_secret: String,
    api_key_header: String,
    recv_window: u64,
}

impl HmacSigner {
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            recv_window: DEFAULT_RECV_WINDOW_MS,
        }
    }

    #[must_use]
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    #[must_use]
    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }

    /// Hex HMAC-SHA256 of `payload` with the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Auth`] if the MAC cannot be keyed.
    pub fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| HttpToolsError::Auth(format!("invalid signing secret: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Sign with an explicit timestamp (milliseconds since the epoch).
    ///
    /// The resulting parameters are key-sorted with `signature` last, so the query string sent on
    /// the wire is exactly the signed payload followed by the signature.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Auth`] if signing fails.
    pub fn apply_at(&self, target: AuthTarget, timestamp_ms: u64) -> Result<AuthTarget> {
        let AuthTarget {
            mut headers,
            mut params,
        } = target;
        set_header(&mut headers, &self.api_key_header, self.api_key.clone());

        params.remove("signature");
        params.insert("timestamp", timestamp_ms.to_string());
        params.insert("recvWindow", self.recv_window.to_string());
        params.sort_by_key();

        let signature = self.sign(&params.encode())?;
        params.insert("signature", signature);
        Ok(AuthTarget { headers, params })
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSignature")
            .field("api_key_header", &self.api_key_header)
            .field("recv_window", &self.recv_window)
            .finish_non_exhaustive()
    }
}

/// Insert a header, replacing any existing entry with the same name in another case.
fn set_header(headers: &mut Headers, name: &str, value: String) {
    if let Some(existing) = header_key(headers, name) {
        headers.remove(&existing);
    }
    headers.insert(name.to_string(), value);
}

/// Set `name=value` inside a Cookie header value, replacing a previous pair with the same name.
fn merge_cookie(existing: Option<&str>, name: &str, value: &str) -> String {
    let mut pairs: Vec<String> = existing
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| p.split_once('=').map_or(*p, |(k, _)| k).trim() != name)
        .map(str::to_string)
        .collect();
    pairs.push(format!("{name}={value}"));
    pairs.join("; ")
}

fn now_millis() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HttpToolsError::Auth(format!("system clock before epoch: {e}")))?;
    Ok(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
