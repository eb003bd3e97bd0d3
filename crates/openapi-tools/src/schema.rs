//! Canonical parameters and schemas as JSON Schema fragments.

use restmcp_http_tools::model::{CanonicalParameter, CanonicalSchema, ParameterLocation};
use serde_json::{Map, Value, json};

/// Group order in grouped input schemas.
pub const GROUP_ORDER: [ParameterLocation; 5] = [
    ParameterLocation::Path,
    ParameterLocation::Query,
    ParameterLocation::Header,
    ParameterLocation::Cookie,
    ParameterLocation::Body,
];

#[must_use]
pub fn parameter_to_json_schema(param: &CanonicalParameter) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), param.data_type.json_type().into());
    if let Some(description) = &param.description {
        out.insert("description".into(), description.clone().into());
    }
    if let Some(default) = &param.default {
        out.insert("default".into(), default.clone());
    }
    if let Some(example) = &param.example {
        out.insert("examples".into(), json!([example]));
    }
    Value::Object(out)
}

/// `{type: object, properties, required?}` over `params`, either flat or nested by location.
#[must_use]
pub fn parameters_to_json_schema(params: &[CanonicalParameter], grouped: bool) -> Value {
    if !grouped {
        return object_schema(params.iter());
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for location in GROUP_ORDER {
        let members: Vec<_> = params.iter().filter(|p| p.location == location).collect();
        if members.is_empty() {
            continue;
        }
        if members.iter().any(|p| p.required) {
            required.push(Value::from(location.as_str()));
        }
        properties.insert(location.as_str().into(), object_schema(members.into_iter()));
    }
    with_required(properties, required)
}

#[must_use]
pub fn schema_to_json_schema(schema: &CanonicalSchema) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), schema.data_type.json_type().into());
    if let Some(description) = &schema.description {
        out.insert("description".into(), description.clone().into());
    }
    if let Some(props) = &schema.properties {
        let properties: Map<String, Value> = props
            .iter()
            .map(|p| (p.name.clone(), schema_to_json_schema(&p.schema)))
            .collect();
        out.insert("properties".into(), Value::Object(properties));
    }
    if let Some(items) = &schema.items {
        out.insert("items".into(), schema_to_json_schema(items));
    }
    if !schema.required.is_empty() {
        out.insert("required".into(), json!(schema.required));
    }
    if let Some(example) = &schema.example {
        out.insert("examples".into(), json!([example]));
    }
    Value::Object(out)
}

fn object_schema<'a>(params: impl Iterator<Item = &'a CanonicalParameter>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in params {
        if param.required {
            required.push(Value::from(param.name.clone()));
        }
        properties.insert(param.name.clone(), parameter_to_json_schema(param));
    }
    with_required(properties, required)
}

fn with_required(properties: Map<String, Value>, required: Vec<Value>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), "object".into());
    out.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }
    Value::Object(out)
}
