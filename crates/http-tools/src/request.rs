//! Turning an endpoint plus argument values into a concrete request descriptor.

use crate::error::{HttpToolsError, Result};
use crate::model::{CanonicalEndpoint, HttpMethod, ParameterLocation};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

pub type Headers = BTreeMap<String, String>;

/// Ordered query parameters with map semantics: inserting an existing key replaces its value in
/// place, so re-applying auth never duplicates keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reorder lexicographically by key (stable for equal keys).
    pub fn sort_by_key(&mut self) {
        self.0.sort_by(|a, b| a.0.cmp(&b.0));
    }

    /// `application/x-www-form-urlencoded` serialization in current order.
    #[must_use]
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for QueryParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Fully built request, before authentication.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RequestSpec {
    pub method: HttpMethod,
    /// Base URL + substituted path, without the query string.
    pub url: String,
    pub headers: Headers,
    pub query_params: QueryParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestSpec {
    /// Absolute URL including the encoded query string.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::InvalidUrl`] if the URL is relative or malformed.
    pub fn full_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| HttpToolsError::InvalidUrl(format!("'{}': {e}", self.url)))?;
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query_params.iter());
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    base_url: Option<String>,
    default_headers: Headers,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            default_headers: Headers::new(),
        }
    }

    #[must_use]
    pub fn with_default_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.default_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// # Errors
    ///
    /// See [`RequestBuilder::build_with_headers`].
    pub fn build(&self, endpoint: &CanonicalEndpoint, args: &Map<String, Value>) -> Result<RequestSpec> {
        self.build_with_headers(endpoint, args, &Headers::new())
    }

    /// Route arguments into path/query/header/cookie/body buckets.
    ///
    /// `extra_headers` are caller-supplied headers; declared header parameters override them.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::MissingParameter`] when a required value is absent and
    /// [`HttpToolsError::UnresolvedPlaceholder`] when the path still has `{...}` placeholders.
    pub fn build_with_headers(
        &self,
        endpoint: &CanonicalEndpoint,
        args: &Map<String, Value>,
        extra_headers: &Headers,
    ) -> Result<RequestSpec> {
        let mut path = endpoint.path.clone();
        let mut headers = self.default_headers.clone();
        headers.extend(extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut query_params = QueryParams::new();
        let mut cookies: Vec<String> = Vec::new();
        let mut body_fields = Map::new();

        for param in &endpoint.parameters {
            let Some(value) = lookup(args, &param.name, &param.wire_name) else {
                if param.required {
                    return Err(HttpToolsError::MissingParameter {
                        parameter: param.name.clone(),
                        endpoint: endpoint.name.clone(),
                    });
                }
                continue;
            };

            match param.location {
                ParameterLocation::Path => {
                    let rendered = encode_path_segment(&value_to_string(value));
                    path = path.replace(&format!("{{{}}}", param.wire_name), &rendered);
                    if param.name != param.wire_name {
                        path = path.replace(&format!("{{{}}}", param.name), &rendered);
                    }
                }
                ParameterLocation::Query => {
                    query_params.insert(param.wire_name.clone(), value_to_string(value));
                }
                ParameterLocation::Header => {
                    headers.insert(param.wire_name.clone(), value_to_string(value));
                }
                ParameterLocation::Cookie => {
                    cookies.push(format!("{}={}", param.wire_name, value_to_string(value)));
                }
                ParameterLocation::Body => {
                    body_fields.insert(param.wire_name.clone(), value.clone());
                }
            }
        }

        let missing = placeholders(&path);
        if !missing.is_empty() {
            return Err(HttpToolsError::UnresolvedPlaceholder {
                placeholders: missing,
                path,
            });
        }

        if !cookies.is_empty() {
            let joined = cookies.join("; ");
            let key = header_key(&headers, "cookie").unwrap_or_else(|| "Cookie".to_string());
            let merged = match headers.get(&key).filter(|v| !v.is_empty()) {
                Some(existing) => format!("{existing}; {joined}"),
                None => joined,
            };
            headers.insert(key, merged);
        }

        let body = collect_body(endpoint, args, body_fields)?;
        if body.is_some() && header_key(&headers, "content-type").is_none() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        let url = match self.base_url.as_deref() {
            Some(base) => join_url(base, &path),
            None => path,
        };

        debug!(
            endpoint = %endpoint.name,
            method = %endpoint.method,
            query = query_params.len(),
            headers = headers.len(),
            has_body = body.is_some(),
            "built request"
        );

        Ok(RequestSpec {
            method: endpoint.method,
            url,
            headers,
            query_params,
            body,
        })
    }
}

/// Merge body-schema fields on top of declared BODY parameters.
fn collect_body(
    endpoint: &CanonicalEndpoint,
    args: &Map<String, Value>,
    mut fields: Map<String, Value>,
) -> Result<Option<Value>> {
    let Some(schema) = &endpoint.body_schema else {
        return Ok((!fields.is_empty()).then_some(Value::Object(fields)));
    };

    if !schema.is_object() {
        if let Some(whole) = args.get("body").filter(|v| !v.is_null()) {
            return Ok(Some(whole.clone()));
        }
        return Ok((!fields.is_empty()).then_some(Value::Object(fields)));
    }

    let declared = |name: &str| endpoint.parameters.iter().any(|p| p.name == name);

    // Grouped callers pass body fields under a single `body` object.
    if schema.property("body").is_none()
        && !declared("body")
        && let Some(Value::Object(group)) = args.get("body")
    {
        for (key, value) in group {
            let wire = schema
                .properties
                .as_deref()
                .and_then(|props| props.iter().find(|p| p.name == *key || p.wire_name == *key))
                .map_or_else(|| key.clone(), |p| p.wire_name.clone());
            fields.insert(wire, value.clone());
        }
    }

    for prop in schema.properties.as_deref().unwrap_or_default() {
        if declared(&prop.name) {
            continue;
        }
        if let Some(value) = lookup(args, &prop.name, &prop.wire_name) {
            fields.insert(prop.wire_name.clone(), value.clone());
        }
    }

    for required in &schema.required {
        let wire = schema
            .property(required)
            .map_or(required.as_str(), |p| p.wire_name.as_str());
        if !fields.contains_key(wire) {
            return Err(HttpToolsError::MissingParameter {
                parameter: required.clone(),
                endpoint: endpoint.name.clone(),
            });
        }
    }

    Ok((!fields.is_empty()).then_some(Value::Object(fields)))
}

/// Percent-encode one path segment so `/`, `?` and `#` in a value cannot change the route.
fn encode_path_segment(value: &str) -> String {
    let Ok(mut url) = Url::parse("http://segment.invalid/") else {
        return value.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(value);
    }
    url.path().trim_start_matches('/').to_string()
}

fn lookup<'a>(args: &'a Map<String, Value>, name: &str, wire_name: &str) -> Option<&'a Value> {
    args.get(name)
        .or_else(|| args.get(wire_name))
        .filter(|v| !v.is_null())
}

/// Case-insensitive header lookup returning the stored key.
pub(crate) fn header_key(headers: &Headers, name: &str) -> Option<String> {
    headers
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Names of `{...}` placeholders left in a path template.
#[must_use]
pub fn placeholders(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        out.push(after[..end].to_string());
        rest = &after[end + 1..];
    }
    out
}

/// String form of an argument for path/query/header/cookie placement.
///
/// Arrays become comma-separated (OpenAPI `form` style, `explode=false`).
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
        other => other.to_string(),
    }
}
