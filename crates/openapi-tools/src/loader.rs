//! Loading OpenAPI 3.x / Swagger 2.x documents from a URL, a file, or literal content.

use crate::config::HashPolicy;
use crate::error::{OpenApiToolsError, Result};
use crate::resolver::dereference;
use restmcp_http_tools::safety::{redact_url, sanitize_reqwest_error};
use reqwest::Client;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Longest string still considered a candidate file path.
const MAX_PATH_CANDIDATE_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    Url(Url),
    File(PathBuf),
    Inline,
}

impl SpecSource {
    /// URL by prefix, then an existing file, otherwise literal content.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidFormat`] for empty input or a URL without a host.
    pub fn detect(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(OpenApiToolsError::InvalidFormat(
                "Content cannot be empty".to_string(),
            ));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|e| {
                OpenApiToolsError::InvalidFormat(format!("Invalid URL '{trimmed}': {e}"))
            })?;
            if url.host_str().is_none_or(str::is_empty) {
                return Err(OpenApiToolsError::InvalidFormat(format!(
                    "Invalid URL: {trimmed}"
                )));
            }
            return Ok(Self::Url(url));
        }

        if trimmed.len() < MAX_PATH_CANDIDATE_LEN && !trimmed.contains('\n') {
            let path = Path::new(trimmed);
            if path.is_file() {
                return Ok(Self::File(path.to_path_buf()));
            }
        }

        Ok(Self::Inline)
    }

    fn location(&self) -> String {
        match self {
            Self::Url(u) => redact_url(u),
            Self::File(p) => p.display().to_string(),
            Self::Inline => "<inline>".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecVersion {
    OpenApi3(String),
    Swagger2(String),
    Unknown,
}

#[must_use]
pub fn detect_spec_version(doc: &Value) -> SpecVersion {
    let as_version = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    if let Some(v) = doc.get("openapi").and_then(as_version) {
        return SpecVersion::OpenApi3(v);
    }
    if let Some(v) = doc.get("swagger").and_then(as_version) {
        return SpecVersion::Swagger2(v);
    }
    SpecVersion::Unknown
}

#[derive(Debug, Clone)]
pub struct LoadedSpec {
    /// Dereferenced and validated document.
    pub document: Value,
    pub source: SpecSource,
    pub version: SpecVersion,
    /// `sha256:<hex>` of the raw content.
    pub content_hash: String,
}

impl LoadedSpec {
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.document.pointer("/info/title").and_then(Value::as_str)
    }

    /// Base URL declared by the document, resolved against the spec URL when relative.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        let spec_url = match &self.source {
            SpecSource::Url(u) => Some(u),
            _ => None,
        };
        extract_base_url(&self.document, spec_url)
    }
}

#[derive(Debug, Clone)]
pub struct SpecLoader {
    client: Client,
    strict: bool,
    expected_hash: Option<String>,
    hash_policy: HashPolicy,
}

impl SpecLoader {
    #[must_use]
    pub fn new(client: Client, strict: bool) -> Self {
        Self {
            client,
            strict,
            expected_hash: None,
            hash_policy: HashPolicy::Ignore,
        }
    }

    #[must_use]
    pub fn with_hash(mut self, expected: Option<String>, policy: HashPolicy) -> Self {
        self.expected_hash = expected;
        self.hash_policy = policy;
        self
    }

    /// Load, dereference and validate a document.
    ///
    /// # Errors
    ///
    /// Returns fetch/read errors, [`OpenApiToolsError::InvalidFormat`] for unparseable or
    /// non-API content, and [`OpenApiToolsError::Validation`] for strict-mode violations or hash
    /// mismatches under [`HashPolicy::Fail`].
    pub async fn load(&self, source: &str) -> Result<LoadedSpec> {
        let detected = SpecSource::detect(source)?;
        let content = match &detected {
            SpecSource::Url(url) => self.fetch(url).await?,
            SpecSource::File(path) => {
                info!(path = %path.display(), "loading spec file");
                std::fs::read_to_string(path).map_err(|e| OpenApiToolsError::SpecReadFile {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            SpecSource::Inline => source.to_string(),
        };
        let location = detected.location();
        let content_hash = content_hash(&content);
        self.check_hash(&content_hash, &location)?;

        let document = self.load_content(&content, &location)?;
        Ok(LoadedSpec {
            version: detect_spec_version(&document),
            document,
            source: detected,
            content_hash,
        })
    }

    /// Parse, dereference and validate literal content.
    ///
    /// # Errors
    ///
    /// See [`SpecLoader::load`].
    pub fn load_content(&self, content: &str, location: &str) -> Result<Value> {
        let parsed = parse_content(content)?;
        if !has_api_marker(&parsed) {
            return Err(OpenApiToolsError::InvalidFormat(format!(
                "Content from '{location}' is not an OpenAPI/Swagger document \
                 (expected 'openapi', 'swagger' or 'paths')"
            )));
        }

        let mut document = match dereference(&parsed) {
            Ok(doc) => doc,
            Err(e) if self.strict => {
                return Err(OpenApiToolsError::Validation(format!(
                    "Failed to dereference spec: {e}"
                )));
            }
            Err(e) => {
                warn!(location, error = %e, "failed to dereference spec; continuing with unresolved references");
                parsed
            }
        };

        validate_document(&mut document, self.strict)?;
        Ok(document)
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        info!(url = %redact_url(url), "fetching spec");
        let fetch_err = |message: String| OpenApiToolsError::SpecFetch {
            url: redact_url(url),
            message,
        };
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status.as_u16())));
        }
        resp.text()
            .await
            .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))
    }

    fn check_hash(&self, actual: &str, location: &str) -> Result<()> {
        let Some(expected) = &self.expected_hash else {
            return Ok(());
        };
        if expected.eq_ignore_ascii_case(actual) {
            return Ok(());
        }
        match self.hash_policy {
            HashPolicy::Fail => Err(OpenApiToolsError::Validation(format!(
                "Spec hash mismatch. Expected: {expected}, Got: {actual}"
            ))),
            HashPolicy::Warn => {
                warn!(location, expected = %expected, actual, "spec hash mismatch");
                Ok(())
            }
            HashPolicy::Ignore => Ok(()),
        }
    }
}

#[must_use]
pub fn content_hash(content: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes())))
}

/// JSON when the content starts with `{`, YAML otherwise. The result must be a mapping.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::InvalidFormat`] for empty or unparseable content.
pub fn parse_content(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(OpenApiToolsError::InvalidFormat(
            "Content cannot be empty".to_string(),
        ));
    }

    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|e| OpenApiToolsError::InvalidFormat(format!("Invalid JSON: {e}")));
    }

    let value: Value = serde_yaml::from_str(trimmed)
        .map_err(|e| OpenApiToolsError::InvalidFormat(format!("Invalid YAML: {e}")))?;
    if !value.is_object() {
        return Err(OpenApiToolsError::InvalidFormat(format!(
            "Expected a mapping at the document root, got {}",
            json_kind(&value)
        )));
    }
    Ok(value)
}

fn has_api_marker(doc: &Value) -> bool {
    ["openapi", "swagger", "paths"]
        .iter()
        .any(|k| doc.get(k).is_some())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural checks. Non-strict mode fills a default `info` instead of failing.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::Validation`] for strict-mode violations and for an `info` field
/// that is not an object.
pub fn validate_document(doc: &mut Value, strict: bool) -> Result<()> {
    let Some(root) = doc.as_object_mut() else {
        return Err(OpenApiToolsError::Validation(
            "Spec must be a mapping".to_string(),
        ));
    };

    if strict {
        if !root.contains_key("openapi") && !root.contains_key("swagger") {
            return Err(OpenApiToolsError::Validation(
                "Spec must contain 'openapi' or 'swagger' version field".to_string(),
            ));
        }
        if !root.contains_key("paths") {
            return Err(OpenApiToolsError::Validation(
                "Spec must contain 'paths' field".to_string(),
            ));
        }
        if !root.contains_key("info") {
            return Err(OpenApiToolsError::Validation(
                "Missing required field: info".to_string(),
            ));
        }
    } else if !root.contains_key("info") {
        root.insert(
            "info".to_string(),
            json!({"title": "Unknown API", "version": "1.0.0"}),
        );
    }

    let Some(info) = root.get("info").and_then(Value::as_object) else {
        return Err(OpenApiToolsError::Validation(
            "'info' field must be a mapping".to_string(),
        ));
    };
    if strict {
        for field in ["title", "version"] {
            if !info.contains_key(field) {
                return Err(OpenApiToolsError::Validation(format!(
                    "'info' must contain '{field}'"
                )));
            }
        }
    }
    Ok(())
}

/// Lowercased parameter names used by the document's security schemes.
#[must_use]
pub fn extract_auth_parameters(doc: &Value) -> BTreeSet<String> {
    let schemes = doc
        .pointer("/components/securitySchemes")
        .or_else(|| doc.get("securityDefinitions"));
    let mut out = BTreeSet::new();
    let Some(Value::Object(schemes)) = schemes else {
        return out;
    };

    for scheme in schemes.values() {
        let Some(scheme) = scheme.as_object() else {
            continue;
        };
        let kind = scheme
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        match kind.as_str() {
            "apikey" => {
                if let Some(name) = scheme
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.is_empty())
                {
                    out.insert(name.to_lowercase());
                }
            }
            "http" | "basic" => {
                let http_scheme = scheme
                    .get("scheme")
                    .and_then(Value::as_str)
                    .unwrap_or("basic")
                    .to_ascii_lowercase();
                if matches!(http_scheme.as_str(), "bearer" | "basic" | "digest") {
                    out.insert("authorization".to_string());
                }
            }
            "oauth2" | "openidconnect" => {
                out.extend(
                    ["authorization", "access_token", "token"]
                        .into_iter()
                        .map(str::to_string),
                );
            }
            _ => {}
        }
    }
    out
}

/// First server URL (OpenAPI 3) or `scheme://host + basePath` (Swagger 2).
#[must_use]
pub fn extract_base_url(doc: &Value, spec_url: Option<&Url>) -> Option<String> {
    if let Some(server) = doc
        .pointer("/servers/0/url")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    {
        let server = substitute_server_variables(doc, server);
        if Url::parse(&server).is_ok() {
            return Some(server.trim_end_matches('/').to_string());
        }
        return spec_url
            .and_then(|base| base.join(&server).ok())
            .map(|u| u.to_string().trim_end_matches('/').to_string())
            .or_else(|| Some(server.trim_end_matches('/').to_string()).filter(|s| !s.is_empty()));
    }

    let host = doc.get("host").and_then(Value::as_str)?;
    let scheme = doc
        .pointer("/schemes/0")
        .and_then(Value::as_str)
        .unwrap_or("https");
    let base_path = doc
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim_end_matches('/');
    Some(format!("{scheme}://{host}{base_path}"))
}

/// Replace `{var}` in the first server URL with its declared default.
fn substitute_server_variables(doc: &Value, server: &str) -> String {
    let mut out = server.to_string();
    if let Some(vars) = doc.pointer("/servers/0/variables").and_then(Value::as_object) {
        for (name, var) in vars {
            if let Some(default) = var.get("default").and_then(Value::as_str) {
                out = out.replace(&format!("{{{name}}}"), default);
            }
        }
    }
    out
}
