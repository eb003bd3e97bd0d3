//! Canonical endpoints → agent-facing tool definitions.

use crate::config::GeneratorConfig;
use crate::error::{OpenApiToolsError, Result};
use crate::normalizer::to_snake_case;
use crate::schema::{parameters_to_json_schema, schema_to_json_schema};
use regex::RegexBuilder;
use restmcp_http_tools::model::{CanonicalEndpoint, CanonicalSchema, HttpMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Room kept free while appending path segments to a shortened name.
const NAME_SAFETY_MARGIN: usize = 5;

/// Segments over this length are abbreviated when they no longer fit.
const ABBREVIATE_OVER: usize = 8;
const ABBREVIATED_LEN: usize = 6;

/// Credential-like parameter names hidden from tool inputs.
pub const DEFAULT_AUTH_PARAMS: [&str; 15] = [
    "signature",
    "timestamp",
    "recvwindow",
    "recv_window",
    "api_key",
    "apikey",
    "api_secret",
    "apisecret",
    "access_token",
    "accesstoken",
    "token",
    "authorization",
    "auth",
    "nonce",
    "sign",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Endpoint coordinates for registry lookups, kept even when `metadata` is off.
    #[serde(skip)]
    pub route: Option<ToolRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    pub method: HttpMethod,
    pub path: String,
    pub tags: Vec<String>,
}

impl ToolRoute {
    #[must_use]
    pub fn of(endpoint: &CanonicalEndpoint) -> Self {
        Self {
            method: endpoint.method,
            path: endpoint.path.clone(),
            tags: endpoint.tags.clone(),
        }
    }
}

impl McpTool {
    /// `{name, description, inputSchema, metadata?}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), self.name.clone().into());
        out.insert("description".into(), self.description.clone().into());
        out.insert("inputSchema".into(), self.input_schema.clone());
        if let Some(metadata) = &self.metadata {
            out.insert("metadata".into(), metadata.clone());
        }
        Value::Object(out)
    }

    /// HTTP method from the generating endpoint, else from `metadata` (tools loaded from JSON).
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match &self.route {
            Some(route) => Some(route.method.as_str()),
            None => self.metadata_str("method"),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match &self.route {
            Some(route) => Some(route.path.as_str()),
            None => self.metadata_str("path"),
        }
    }

    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        if let Some(route) = &self.route {
            return route.tags.iter().map(String::as_str).collect();
        }
        self.metadata
            .as_ref()
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

/// Endpoint selection applied before generation.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub limit: Option<usize>,
    /// Case-insensitive regex searched in the endpoint path.
    pub path_pattern: Option<String>,
    pub method: Option<HttpMethod>,
}

#[derive(Debug, Clone)]
pub struct ToolGenerator {
    include_metadata: bool,
    group_parameters: bool,
    api_prefix: Option<String>,
    auth_params: BTreeSet<String>,
    auth_override: bool,
}

impl Default for ToolGenerator {
    fn default() -> Self {
        Self {
            include_metadata: true,
            group_parameters: false,
            api_prefix: None,
            auth_params: DEFAULT_AUTH_PARAMS.iter().map(|p| normalize_auth_param(p)).collect(),
            auth_override: false,
        }
    }
}

impl ToolGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator for `config`; `detected` are names from the document's security schemes.
    #[must_use]
    pub fn from_config<'a>(
        config: &GeneratorConfig,
        api_name: Option<&str>,
        detected: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut generator = Self::new()
            .with_metadata(config.include_metadata)
            .with_grouped_parameters(config.group_parameters);
        if let Some(name) = api_name {
            generator = generator.with_api_name(name);
        }
        if let Some(params) = &config.auth_params {
            generator = generator.with_auth_params(params);
        }
        if config.detect_auth_params {
            generator = generator.with_detected_auth_params(detected);
        }
        generator
    }

    #[must_use]
    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    #[must_use]
    pub fn with_grouped_parameters(mut self, grouped: bool) -> Self {
        self.group_parameters = grouped;
        self
    }

    #[must_use]
    pub fn with_api_name(mut self, api_name: &str) -> Self {
        self.api_prefix = Some(to_snake_case(api_name)).filter(|p| !p.is_empty());
        self
    }

    /// Replace the whole exclusion set. Later detected names are ignored.
    #[must_use]
    pub fn with_auth_params<'a>(mut self, params: impl IntoIterator<Item = &'a String>) -> Self {
        self.auth_params = params.into_iter().map(|p| normalize_auth_param(p)).collect();
        self.auth_override = true;
        self
    }

    #[must_use]
    pub fn with_detected_auth_params<'a>(
        mut self,
        params: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        if !self.auth_override {
            self.auth_params
                .extend(params.into_iter().map(|p| normalize_auth_param(p)));
        }
        self
    }

    #[must_use]
    pub fn auth_params(&self) -> &BTreeSet<String> {
        &self.auth_params
    }

    #[must_use]
    pub fn is_auth_param(&self, name: &str) -> bool {
        self.auth_params.contains(&normalize_auth_param(name))
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidPattern`] for an invalid `path_pattern`.
    pub fn generate_tools(
        &self,
        endpoints: &[CanonicalEndpoint],
        filter: &ToolFilter,
    ) -> Result<Vec<McpTool>> {
        let path_regex = filter
            .path_pattern
            .as_deref()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| OpenApiToolsError::invalid_pattern(p, &e))
            })
            .transpose()?;

        Ok(endpoints
            .iter()
            .filter(|e| filter.method.is_none_or(|m| e.method == m))
            .filter(|e| path_regex.as_ref().is_none_or(|re| re.is_match(&e.path)))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|e| self.generate_tool(e))
            .collect())
    }

    #[must_use]
    pub fn generate_tool(&self, endpoint: &CanonicalEndpoint) -> McpTool {
        McpTool {
            name: self.tool_name(endpoint),
            description: describe(endpoint),
            input_schema: self.input_schema(endpoint),
            metadata: self.include_metadata.then(|| metadata(endpoint)),
            route: Some(ToolRoute::of(endpoint)),
        }
    }

    /// Prefixed endpoint name, shortened to at most [`MAX_TOOL_NAME_LEN`] characters.
    ///
    /// Shortening keeps the prefix and the leading method segment, drops `v<digits>`, `api` and
    /// `sapi` segments, then appends the rest while they fit.
    #[must_use]
    pub fn tool_name(&self, endpoint: &CanonicalEndpoint) -> String {
        let full = match &self.api_prefix {
            Some(prefix) => format!("{prefix}_{}", endpoint.name),
            None => endpoint.name.clone(),
        };
        if full.chars().count() <= MAX_TOOL_NAME_LEN {
            return full;
        }

        let mut segments = endpoint.name.split('_').filter(|s| !s.is_empty());
        let method = segments.next().unwrap_or_default();
        let mut name = match &self.api_prefix {
            Some(prefix) => format!("{prefix}_{method}"),
            None => method.to_string(),
        };

        let budget = MAX_TOOL_NAME_LEN - NAME_SAFETY_MARGIN;
        for segment in segments.filter(|s| !is_noise_segment(s)) {
            let len = name.chars().count();
            let seg_len = segment.chars().count();
            if len + 1 + seg_len <= budget {
                name.push('_');
                name.push_str(segment);
                continue;
            }
            name.push('_');
            if seg_len > ABBREVIATE_OVER {
                name.extend(segment.chars().take(ABBREVIATED_LEN));
            } else {
                name.push_str(segment);
            }
            break;
        }

        if name.chars().count() > MAX_TOOL_NAME_LEN {
            name = name.chars().take(MAX_TOOL_NAME_LEN).collect();
        }
        name
    }

    fn input_schema(&self, endpoint: &CanonicalEndpoint) -> Value {
        let params: Vec<_> = endpoint
            .parameters
            .iter()
            .filter(|p| !self.is_auth_param(&p.name))
            .cloned()
            .collect();
        let mut schema = parameters_to_json_schema(&params, self.group_parameters);

        if let (Some(body), Some(root)) = (&endpoint.body_schema, schema.as_object_mut()) {
            self.merge_body(root, body);
        }
        schema
    }

    /// Add the body schema to an input schema: flat properties, a `body` group, or a whole
    /// `body` value for non-object bodies. Required lists are unioned.
    fn merge_body(&self, root: &mut Map<String, Value>, body: &CanonicalSchema) {
        let body_schema = schema_to_json_schema(body);
        let mut required = match root.remove("required") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let mut add_required = |name: Value| {
            if !required.contains(&name) {
                required.push(name);
            }
        };

        let properties = root
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(properties) = properties.as_object_mut() {
            match (body.is_object(), self.group_parameters) {
                (true, false) => {
                    if let Some(Value::Object(body_props)) = body_schema.get("properties") {
                        for (name, prop) in body_props {
                            // Declared parameters keep their slot.
                            properties
                                .entry(name.clone())
                                .or_insert_with(|| prop.clone());
                        }
                    }
                    for name in &body.required {
                        add_required(Value::from(name.as_str()));
                    }
                }
                (true, true) => {
                    let group = properties
                        .entry("body")
                        .or_insert_with(|| Value::Object(Map::new()));
                    merge_body_group(group, &body_schema);
                    let group_required = group
                        .get("required")
                        .and_then(Value::as_array)
                        .is_some_and(|r| !r.is_empty());
                    if group_required {
                        add_required(Value::from("body"));
                    }
                }
                (false, _) => {
                    properties.insert("body".into(), body_schema);
                    add_required(Value::from("body"));
                }
            }
        }

        if !required.is_empty() {
            root.insert("required".into(), Value::Array(required));
        }
    }
}

/// Overlay an object body schema onto a (possibly existing) grouped `body` object.
fn merge_body_group(group: &mut Value, body_schema: &Value) {
    let Some(group) = group.as_object_mut() else {
        return;
    };
    group.insert("type".into(), "object".into());
    if let Some(description) = body_schema.get("description") {
        group.insert("description".into(), description.clone());
    }

    let props = group
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let (Some(props), Some(Value::Object(body_props))) =
        (props.as_object_mut(), body_schema.get("properties"))
    {
        for (name, prop) in body_props {
            props.entry(name.clone()).or_insert_with(|| prop.clone());
        }
    }

    if let Some(Value::Array(body_required)) = body_schema.get("required") {
        let required = group
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(required) = required.as_array_mut() {
            for name in body_required {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }
    }
}

fn describe(endpoint: &CanonicalEndpoint) -> String {
    let text = endpoint
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .or_else(|| {
            endpoint
                .summary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        });
    match text {
        Some(text) => format!(
            "{text}\n\nEndpoint: {} {}",
            endpoint.method, endpoint.path
        ),
        None => format!("Makes a {} request to {}", endpoint.method, endpoint.path),
    }
}

fn metadata(endpoint: &CanonicalEndpoint) -> Value {
    let mut out = Map::new();
    out.insert("method".into(), endpoint.method.as_str().into());
    out.insert("path".into(), endpoint.path.clone().into());
    if !endpoint.tags.is_empty() {
        out.insert("tags".into(), endpoint.tags.clone().into());
    }
    if endpoint.deprecated {
        out.insert("deprecated".into(), true.into());
    }
    if let Some(response) = &endpoint.response_schema {
        out.insert("responseSchema".into(), schema_to_json_schema(response));
    }
    Value::Object(out)
}

fn is_noise_segment(segment: &str) -> bool {
    let version = segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
    version || segment == "api" || segment == "sapi"
}

fn normalize_auth_param(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}
