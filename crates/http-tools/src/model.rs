//! Canonical endpoint model.
//!
//! Ingestion (`restmcp-openapi-tools`) produces these records; the request builder and executor
//! consume them. They are plain data and are not mutated after normalization. The only way to
//! derive a new endpoint from an existing one is [`CanonicalEndpoint::variant`], which clones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Operation lookup order used when walking a path item.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Lowercase key used by OpenAPI path items (`get`, `post`, ...).
    #[must_use]
    pub fn operation_key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Head => "head",
            Self::Options => "options",
        }
    }

    /// Case-insensitive parse; `None` for methods outside the supported set.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }

    #[must_use]
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    Cookie,
}

impl ParameterLocation {
    /// Map an OpenAPI/Swagger `in` value. Unknown locations fall back to `Query`.
    #[must_use]
    pub fn from_openapi(s: &str) -> Self {
        match s {
            "path" => Self::Path,
            "header" => Self::Header,
            "body" | "formData" => Self::Body,
            "cookie" => Self::Cookie,
            _ => Self::Query,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl DataType {
    /// Map a schema `type` value. Non-string or unrecognized tags become `String`.
    #[must_use]
    pub fn from_type_value(value: &Value) -> Self {
        match value.as_str() {
            Some("integer" | "number") => Self::Number,
            Some("boolean" | "bool") => Self::Boolean,
            Some("object") => Self::Object,
            Some("array") => Self::Array,
            Some("null") => Self::Null,
            _ => Self::String,
        }
    }

    /// JSON Schema type keyword.
    #[must_use]
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalParameter {
    /// snake_case name exposed to tool callers.
    pub name: String,
    /// Name as written in the API document; used on the wire.
    pub wire_name: String,
    pub location: ParameterLocation,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl CanonicalParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, location: ParameterLocation, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            wire_name: name.clone(),
            name,
            location,
            data_type,
            required: false,
            description: None,
            default: None,
            example: None,
        }
    }

    #[must_use]
    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub name: String,
    pub wire_name: String,
    pub schema: CanonicalSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Object properties in document order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<SchemaProperty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<CanonicalSchema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl CanonicalSchema {
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            properties: None,
            items: None,
            required: Vec::new(),
            description: None,
            example: None,
        }
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        self.data_type == DataType::Object
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties
            .as_deref()
            .and_then(|props| props.iter().find(|p| p.name == name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEndpoint {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: Vec<CanonicalParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<CanonicalSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<CanonicalSchema>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Security requirement objects, passed through untouched.
    #[serde(default)]
    pub security: Vec<Value>,
    #[serde(default)]
    pub deprecated: bool,
}

impl CanonicalEndpoint {
    #[must_use]
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            description: None,
            summary: None,
            parameters: Vec::new(),
            body_schema: None,
            response_schema: None,
            tags: Vec::new(),
            security: Vec::new(),
            deprecated: false,
        }
    }

    /// Whether credentials must be attached when calling this endpoint.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !self.security.is_empty()
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &CanonicalParameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// Clone this endpoint with a modified identity, path, security and tags.
    #[must_use]
    pub fn variant(&self, spec: &VariantSpec) -> CanonicalEndpoint {
        let mut endpoint = self.clone();
        if !spec.name_prefix.is_empty() {
            endpoint.name = format!("{}_{}", spec.name_prefix, self.name);
        }
        if !spec.path_from.is_empty() {
            endpoint.path = self.path.replace(&spec.path_from, &spec.path_to);
        }
        if let Some(security) = &spec.security {
            endpoint.security.clone_from(security);
        }
        if let Some(tag) = &spec.tag
            && !endpoint.tags.contains(tag)
        {
            endpoint.tags.push(tag.clone());
        }
        if let Some(prefix) = &spec.description_prefix {
            endpoint.description = Some(match &self.description {
                Some(d) => format!("{prefix} {d}"),
                None => prefix.clone(),
            });
        }
        endpoint
    }
}

/// How to derive a parallel endpoint from an existing one (e.g. a monitoring copy of a catalog
/// endpoint that targets a different dataset and requires credentials).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSpec {
    /// Only endpoints whose path contains this substring get a variant. Empty matches all.
    #[serde(default)]
    pub path_contains: String,
    #[serde(default)]
    pub name_prefix: String,
    #[serde(default)]
    pub path_from: String,
    #[serde(default)]
    pub path_to: String,
    /// Replacement security requirements. `None` keeps the original ones.
    #[serde(default)]
    pub security: Option<Vec<Value>>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub description_prefix: Option<String>,
}

impl VariantSpec {
    #[must_use]
    pub fn applies_to(&self, endpoint: &CanonicalEndpoint) -> bool {
        self.path_contains.is_empty() || endpoint.path.contains(&self.path_contains)
    }
}
