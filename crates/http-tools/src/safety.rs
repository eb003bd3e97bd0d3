//! Redaction helpers for anything that may end up in logs or execution results.

use crate::request::{Headers, QueryParams};
use url::Url;

pub const REDACTED: &str = "<redacted>";

/// Header names that always carry credentials, regardless of the configured handler.
const ALWAYS_SENSITIVE_HEADERS: [&str; 4] =
    ["authorization", "proxy-authorization", "cookie", "x-api-key"];

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Copy of `headers` with credential-bearing values replaced.
#[must_use]
pub fn redact_headers(headers: &Headers, extra_sensitive: &[String]) -> Headers {
    headers
        .iter()
        .map(|(k, v)| {
            let sensitive = ALWAYS_SENSITIVE_HEADERS
                .iter()
                .any(|s| k.eq_ignore_ascii_case(s))
                || extra_sensitive.iter().any(|s| k.eq_ignore_ascii_case(s));
            let value = if sensitive { REDACTED.to_string() } else { v.clone() };
            (k.clone(), value)
        })
        .collect()
}

/// Copy of `params` with the named values replaced, order preserved.
#[must_use]
pub fn redact_params(params: &QueryParams, sensitive: &[String]) -> QueryParams {
    params
        .iter()
        .map(|(k, v)| {
            if sensitive.iter().any(|s| s == k) {
                (k, REDACTED)
            } else {
                (k, v)
            }
        })
        .collect()
}
