//! Raw OpenAPI/Swagger document → ordered [`CanonicalEndpoint`] records.
//!
//! Input is expected to be dereferenced already. Anything malformed below the path-item level is
//! skipped or defaulted; only strict mode turns a missing `paths` into an error.

use crate::error::{OpenApiToolsError, Result};
use restmcp_http_tools::model::{
    CanonicalEndpoint, CanonicalParameter, CanonicalSchema, DataType, HttpMethod,
    ParameterLocation, SchemaProperty,
};
use restmcp_http_tools::request::placeholders;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Response codes probed for the response schema, in order.
const RESPONSE_CODES: [&str; 3] = ["200", "201", "default"];

/// `camelCase`, `PascalCase`, `kebab-case` and spaced words to `snake_case`.
/// Only a lowercase letter followed by an uppercase one splits a word, so `v2Items` becomes
/// `v2items`.
///
/// Idempotent: `to_snake_case(&to_snake_case(s)) == to_snake_case(s)`.
#[must_use]
pub fn to_snake_case(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        let c = if c == '-' || c == ' ' { '_' } else { c };
        if c.is_ascii_uppercase() && prev.is_some_and(|p| p.is_ascii_lowercase()) {
            spaced.push('_');
        }
        spaced.push(c);
        prev = Some(c);
    }

    let mut out = String::with_capacity(spaced.len());
    for c in spaced.to_lowercase().chars() {
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    strict: bool,
}

impl Normalizer {
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// One endpoint per operation, in path order then [`HttpMethod::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Validation`] in strict mode when `paths` is missing or not a
    /// mapping.
    pub fn normalize(&self, doc: &Value) -> Result<Vec<CanonicalEndpoint>> {
        let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
            if self.strict {
                return Err(OpenApiToolsError::Validation(
                    "Spec must contain a 'paths' mapping".to_string(),
                ));
            }
            warn!("spec has no 'paths' mapping; no endpoints produced");
            return Ok(Vec::new());
        };

        let global_security = doc
            .get("security")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut endpoints = Vec::new();
        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                debug!(path, "skipping non-object path item");
                continue;
            };
            let shared_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for method in HttpMethod::ALL {
                let Some(operation) = item.get(method.operation_key()) else {
                    continue;
                };
                let Some(operation) = operation.as_object() else {
                    debug!(path, %method, "skipping non-object operation");
                    continue;
                };
                let endpoint =
                    normalize_operation(method, path, operation, shared_params, &global_security);
                debug!(
                    name = %endpoint.name,
                    %method,
                    path,
                    parameters = endpoint.parameters.len(),
                    "normalized endpoint"
                );
                endpoints.push(endpoint);
            }
        }
        Ok(endpoints)
    }
}

fn normalize_operation(
    method: HttpMethod,
    path: &str,
    operation: &Map<String, Value>,
    shared_params: &[Value],
    global_security: &[Value],
) -> CanonicalEndpoint {
    let mut endpoint = CanonicalEndpoint::new(endpoint_name(operation, method, path), method, path);

    let summary = non_empty_str(operation.get("summary"));
    endpoint.description = non_empty_str(operation.get("description")).or_else(|| summary.clone());
    endpoint.summary = summary;

    let raw_params = merge_parameters(
        shared_params,
        operation
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    );

    let mut swagger_body = None;
    for raw in &raw_params {
        if raw.get("in").and_then(Value::as_str) == Some("body")
            && let Some(schema) = raw.get("schema")
        {
            if swagger_body.is_none() {
                swagger_body = Some(normalize_schema(schema));
            }
            continue;
        }
        if let Some(param) = normalize_parameter(raw) {
            endpoint.parameters.push(param);
        }
    }

    endpoint.body_schema = operation
        .get("requestBody")
        .and_then(|rb| rb.get("content"))
        .and_then(schema_from_content)
        .or(swagger_body);

    if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
        for code in RESPONSE_CODES {
            let Some(response) = responses.get(code) else {
                continue;
            };
            if let Some(content) = response.get("content") {
                endpoint.response_schema = schema_from_content(content);
                break;
            }
            if let Some(schema) = response.get("schema") {
                endpoint.response_schema = Some(normalize_schema(schema));
                break;
            }
        }
    }

    endpoint.tags = operation
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // An explicit `security` key, even an empty list, overrides the document default.
    endpoint.security = match operation.get("security") {
        Some(Value::Array(reqs)) => reqs.clone(),
        Some(_) => Vec::new(),
        None => global_security.to_vec(),
    };

    endpoint.deprecated = operation
        .get("deprecated")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    endpoint
}

/// `operationId` in snake_case, else `method + static segments [+ by_<params>]`.
fn endpoint_name(operation: &Map<String, Value>, method: HttpMethod, path: &str) -> String {
    if let Some(id) = operation.get("operationId").and_then(Value::as_str) {
        let name = to_snake_case(id);
        if !name.is_empty() {
            return name;
        }
    }

    let mut parts = vec![method.operation_key().to_string()];
    parts.extend(
        path.split('/')
            .filter(|seg| !seg.is_empty() && !seg.starts_with('{'))
            .map(sanitize_segment),
    );
    let params = placeholders(path);
    if !params.is_empty() {
        parts.push("by".to_string());
        parts.extend(params.iter().map(|p| sanitize_segment(p)));
    }
    to_snake_case(&parts.join("_"))
}

/// Characters outside `[A-Za-z0-9_]` become `_`.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Path-item parameters overridden by operation parameters with the same `(in, name)`.
fn merge_parameters(shared: &[Value], own: &[Value]) -> Vec<Value> {
    let key = |p: &Value| {
        (
            p.get("in").and_then(Value::as_str).unwrap_or("query").to_string(),
            p.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        )
    };

    let mut merged: Vec<Value> = shared.iter().filter(|p| p.is_object()).cloned().collect();
    for param in own.iter().filter(|p| p.is_object()) {
        let k = key(param);
        match merged.iter_mut().find(|existing| key(existing) == k) {
            Some(existing) => *existing = param.clone(),
            None => merged.push(param.clone()),
        }
    }
    merged
}

fn normalize_parameter(raw: &Value) -> Option<CanonicalParameter> {
    let location_raw = raw.get("in").and_then(Value::as_str).unwrap_or("query");
    let wire_name = raw.get("name").and_then(Value::as_str).unwrap_or_default();
    if wire_name.trim().is_empty() {
        warn!(location = location_raw, "dropping parameter with empty name");
        return None;
    }
    let name = to_snake_case(wire_name);
    if name.is_empty() {
        warn!(
            parameter = wire_name,
            location = location_raw,
            "dropping parameter whose name is empty after normalization"
        );
        return None;
    }

    let location = ParameterLocation::from_openapi(location_raw);
    // OpenAPI 3 nests type information under `schema`; Swagger 2 puts it on the parameter.
    let typed = raw.get("schema").filter(|s| s.is_object()).unwrap_or(raw);
    let data_type = typed
        .get("type")
        .map_or(DataType::String, DataType::from_type_value);

    let mut param = CanonicalParameter::new(name, location, data_type)
        .with_wire_name(wire_name)
        .required(
            location == ParameterLocation::Path
                || raw.get("required").and_then(Value::as_bool).unwrap_or(false),
        );
    if let Some(description) = non_empty_str(raw.get("description")) {
        param = param.with_description(description);
    }
    if let Some(default) = typed.get("default").or_else(|| raw.get("default")) {
        param = param.with_default(default.clone());
    }
    param.example = raw
        .get("example")
        .or_else(|| typed.get("example"))
        .cloned();
    Some(param)
}

/// Schema of the preferred media type: JSON, then JSON-suffixed types, XML, wildcard.
fn schema_from_content(content: &Value) -> Option<CanonicalSchema> {
    let content = content.as_object()?;
    let exact = |key: &str| content.get(key).and_then(|m| m.get("schema"));

    exact("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media, _)| {
                    let essence = media.split(';').next().unwrap_or_default().trim();
                    essence == "application/json" || essence.ends_with("+json")
                })
                .and_then(|(_, m)| m.get("schema"))
        })
        .or_else(|| exact("application/xml"))
        .or_else(|| exact("*/*"))
        .map(normalize_schema)
}

/// Recursive schema conversion. A schema without `type` is an object unless it has `items`.
#[must_use]
pub fn normalize_schema(schema: &Value) -> CanonicalSchema {
    let data_type = match schema.get("type") {
        Some(t) => DataType::from_type_value(t),
        None if schema.get("items").is_some() => DataType::Array,
        None => DataType::Object,
    };
    let mut out = CanonicalSchema::new(data_type);

    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        let mut properties = Vec::with_capacity(props.len());
        merge_properties(&mut properties, props);
        out.properties = Some(properties);
    }

    if let Some(items) = schema.get("items").filter(|i| i.is_object()) {
        out.items = Some(Box::new(normalize_schema(items)));
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        push_required(&mut out.required, required.iter().filter_map(Value::as_str));
    }

    if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
        for member in members {
            let member = normalize_schema(member);
            if let Some(member_props) = member.properties {
                let properties = out.properties.get_or_insert_with(Vec::new);
                for prop in member_props {
                    match properties.iter_mut().find(|p| p.name == prop.name) {
                        Some(existing) => *existing = prop,
                        None => properties.push(prop),
                    }
                }
            }
            push_required(&mut out.required, member.required.iter().map(String::as_str));
            if out.description.is_none() {
                out.description = member.description;
            }
        }
    }

    out.description = non_empty_str(schema.get("description")).or(out.description);
    out.example = schema.get("example").cloned();
    out
}

fn merge_properties(into: &mut Vec<SchemaProperty>, props: &Map<String, Value>) {
    for (wire_name, value) in props {
        let name = to_snake_case(wire_name);
        if name.is_empty() {
            warn!(property = %wire_name, "dropping schema property whose name is empty after normalization");
            continue;
        }
        if into.iter().any(|p| p.name == name) {
            warn!(property = %wire_name, normalized = %name, "dropping schema property with duplicate normalized name");
            continue;
        }
        into.push(SchemaProperty {
            name,
            wire_name: wire_name.clone(),
            schema: normalize_schema(value),
        });
    }
}

fn push_required<'a>(into: &mut Vec<String>, names: impl Iterator<Item = &'a str>) {
    for name in names.map(to_snake_case) {
        if !name.is_empty() && !into.contains(&name) {
            into.push(name);
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_case_conversion() {
        for (input, expected) in [
            ("getUserById", "get_user_by_id"),
            ("GetUser", "get_user"),
            ("list-pets", "list_pets"),
            ("Find pets  by tag", "find_pets_by_tag"),
            ("X-API-KEY", "x_api_key"),
            ("recvWindow", "recv_window"),
            ("__already_snake__", "already_snake"),
            ("v3Ticker24hr", "v3ticker24hr"),
            ("getV2Items", "get_v2items"),
            ("HTTPServer", "httpserver"),
            ("", ""),
            ("---", ""),
        ] {
            assert_eq!(to_snake_case(input), expected, "{input}");
            assert_eq!(to_snake_case(&to_snake_case(input)), expected, "{input}");
        }
    }

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Pets", "version": "1"},
            "security": [{"key": []}],
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        {"name": "petId", "in": "path", "schema": {"type": "integer"}},
                        {"name": "X-Trace", "in": "header", "schema": {"type": "string"}}
                    ],
                    "delete": {"operationId": "deletePet", "security": []},
                    "get": {
                        "summary": "Find pet",
                        "tags": ["pets", 3],
                        "parameters": [
                            {"name": "X-Trace", "in": "header", "required": true, "schema": {"type": "string"}},
                            {"name": "", "in": "query"},
                            {"name": "--", "in": "query"},
                            {"name": "fields", "in": "query", "schema": {"type": "array", "default": ["id"]}}
                        ],
                        "responses": {
                            "404": {"description": "nope"},
                            "200": {"content": {"application/xml": {"schema": {"type": "string"}},
                                                "application/json": {"schema": {"type": "object", "properties": {"petName": {"type": "string"}}}}}}
                        }
                    }
                },
                "/bogus": "not an object"
            }
        })
    }

    #[test]
    fn endpoints_follow_document_and_method_order() {
        let endpoints = Normalizer::default().normalize(&petstore()).expect("normalize");
        let names: Vec<_> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["get_pets_by_pet_id", "delete_pet"]);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[1].method, HttpMethod::Delete);
    }

    #[test]
    fn parameters_merge_and_drop_empty_names() {
        let endpoints = Normalizer::default().normalize(&petstore()).expect("normalize");
        let get = &endpoints[0];

        let names: Vec<_> = get.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["pet_id", "x_trace", "fields"]);

        let pet_id = &get.parameters[0];
        assert_eq!(pet_id.wire_name, "petId");
        assert_eq!(pet_id.location, ParameterLocation::Path);
        assert_eq!(pet_id.data_type, DataType::Number);
        assert!(pet_id.required);

        let trace = &get.parameters[1];
        assert!(trace.required, "operation parameter overrides path item");
        assert_eq!(get.parameters[2].default, Some(json!(["id"])));
        assert_eq!(get.parameters[2].data_type, DataType::Array);
    }

    #[test]
    fn security_description_tags_and_response() {
        let endpoints = Normalizer::default().normalize(&petstore()).expect("normalize");
        let (get, delete) = (&endpoints[0], &endpoints[1]);

        assert_eq!(get.security, vec![json!({"key": []})]);
        assert!(get.requires_auth());
        assert!(delete.security.is_empty(), "explicit empty security is public");

        assert_eq!(get.description.as_deref(), Some("Find pet"));
        assert_eq!(get.summary.as_deref(), Some("Find pet"));
        assert_eq!(get.tags, ["pets"]);

        let response = get.response_schema.as_ref().expect("response schema");
        assert!(response.is_object());
        let prop = response.property("pet_name").expect("pet_name");
        assert_eq!(prop.wire_name, "petName");
    }

    #[test]
    fn swagger_body_parameter_becomes_body_schema() {
        let doc = json!({
            "swagger": "2.0",
            "paths": {"/pets": {"post": {
                "parameters": [
                    {"in": "body", "name": "pet", "schema": {
                        "properties": {"name": {"type": "string"}, "photoUrls": {"type": "array", "items": {"type": "string"}}},
                        "required": ["name", "photoUrls"]
                    }},
                    {"in": "formData", "name": "note", "type": "string"}
                ],
                "responses": {"201": {"schema": {"type": "array", "items": {"type": "integer"}}}}
            }}}
        });
        let endpoints = Normalizer::default().normalize(&doc).expect("normalize");
        let post = &endpoints[0];
        assert_eq!(post.name, "post_pets");

        let body = post.body_schema.as_ref().expect("body");
        assert!(body.is_object());
        assert_eq!(body.required, ["name", "photo_urls"]);
        assert_eq!(body.property("photo_urls").map(|p| p.wire_name.as_str()), Some("photoUrls"));

        assert_eq!(post.parameters.len(), 1);
        assert_eq!(post.parameters[0].location, ParameterLocation::Body);

        let response = post.response_schema.as_ref().expect("response");
        assert_eq!(response.data_type, DataType::Array);
        assert_eq!(response.items.as_ref().map(|i| i.data_type), Some(DataType::Number));
    }

    #[test]
    fn all_of_members_are_merged() {
        let schema = json!({
            "allOf": [
                {"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]},
                {"properties": {"name": {"type": "string"}}, "required": ["name"]}
            ],
            "properties": {"tag": {"type": "string"}}
        });
        let out = normalize_schema(&schema);
        let names: Vec<_> = out
            .properties
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["tag", "id", "name"]);
        assert_eq!(out.required, ["id", "name"]);
    }

    #[test]
    fn missing_paths_depends_on_strictness() {
        let doc = json!({"openapi": "3.0.0"});
        assert!(Normalizer::new(false).normalize(&doc).expect("lenient").is_empty());
        assert!(matches!(
            Normalizer::new(true).normalize(&doc),
            Err(OpenApiToolsError::Validation(_))
        ));
    }

    #[test]
    fn synthesized_names_sanitize_segments() {
        let doc = json!({"paths": {"/api/v3/ticker.price/{symbol}/{Interval}": {"get": {}}}});
        let endpoints = Normalizer::default().normalize(&doc).expect("normalize");
        assert_eq!(
            endpoints[0].name,
            "get_api_v3_ticker_price_by_symbol_interval"
        );
    }
}
