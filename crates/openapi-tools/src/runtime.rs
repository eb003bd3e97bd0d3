//! OpenAPI tool source runtime.
//!
//! Discovery (load → normalize → generate → register) happens once in [`OpenApiToolSource::start`];
//! afterwards [`OpenApiToolSource::call_tool`] maps a tool name back to its endpoint and runs it
//! through the executor.

use crate::config::{ApiServerConfig, ConditionalAuthRule};
use crate::error::{OpenApiToolsError, Result};
use crate::generator::{McpTool, ToolGenerator};
use crate::loader::{SpecLoader, extract_auth_parameters};
use crate::normalizer::Normalizer;
use crate::registry::ToolRegistry;
use crate::schema::GROUP_ORDER;
use parking_lot::RwLock;
use reqwest::Client;
use restmcp_http_tools::auth::AuthHandler;
use restmcp_http_tools::executor::{AuthScope, ExecutionResult, Executor};
use restmcp_http_tools::model::{CanonicalEndpoint, ParameterLocation};
use restmcp_http_tools::semantics::annotations_for_method;
use restmcp_http_tools::transport::{HttpTransport, ReqwestTransport};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Tool source exposing the operations of one OpenAPI/Swagger document as MCP tools.
#[derive(Clone)]
pub struct OpenApiToolSource {
    /// Source name (used for logs and error context).
    name: String,
    config: ApiServerConfig,
    /// Used for fetching the spec.
    client: Client,
    /// Used for API calls.
    transport: Arc<dyn HttpTransport>,
    /// Credentials from config; applied per call as decided by [`Self::resolve_auth`].
    auth: AuthHandler,
    state: Arc<RwLock<Option<Arc<SourceState>>>>,
}

/// Everything `start` discovers. Replaced wholesale, never mutated in place.
struct SourceState {
    spec_title: Option<String>,
    base_url: String,
    registry: ToolRegistry,
    /// Tool name → endpoint, keyed by the generator's own naming.
    endpoints: HashMap<String, CanonicalEndpoint>,
    executor: Executor,
}

impl OpenApiToolSource {
    /// Create a new tool source. Call [`Self::start`] before listing or calling tools.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ApiServerConfig) -> Self {
        let client = Client::new();
        let transport = Arc::new(ReqwestTransport::with_client(client.clone()));
        Self::with_transport(name, config, client, transport)
    }

    #[must_use]
    pub fn with_transport(
        name: impl Into<String>,
        config: ApiServerConfig,
        client: Client,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let auth = AuthHandler::from(&config.auth);
        Self {
            name: name.into(),
            config,
            client,
            transport,
            auth,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Create and start a tool source in one step.
    ///
    /// # Errors
    ///
    /// See [`Self::start`].
    pub async fn build(name: impl Into<String>, config: ApiServerConfig) -> Result<Self> {
        let src = Self::new(name, config);
        src.start().await?;
        Ok(src)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the spec, discover endpoints and register their tools.
    ///
    /// # Errors
    ///
    /// Returns loader and normalizer errors, and [`OpenApiToolsError::Config`] when no base URL is
    /// configured or declared by the spec.
    pub async fn start(&self) -> Result<()> {
        let loader = SpecLoader::new(self.client.clone(), self.config.strict)
            .with_hash(self.config.spec_hash.clone(), self.config.spec_hash_policy);
        let loaded = loader.load(&self.config.spec).await?;

        let base_url = self
            .config
            .base_url
            .clone()
            .or_else(|| loaded.base_url())
            .ok_or_else(|| {
                OpenApiToolsError::Config(format!(
                    "No base URL configured for '{}' and none found in spec",
                    self.name
                ))
            })?;

        let mut endpoints = Normalizer::new(self.config.strict).normalize(&loaded.document)?;
        self.add_variants(&mut endpoints);
        let discovered = endpoints.len();
        endpoints.retain(|e| self.should_auto_discover(e));

        let detected = if self.config.generator.detect_auth_params {
            extract_auth_parameters(&loaded.document)
        } else {
            BTreeSet::new()
        };
        let generator = ToolGenerator::from_config(
            &self.config.generator,
            self.config.api_name.as_deref(),
            &detected,
        );

        let mut registry = ToolRegistry::new(
            self.config
                .api_name
                .clone()
                .or_else(|| loaded.title().map(str::to_string)),
        );
        let mut by_name = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let tool = generator.generate_tool(&endpoint);
            let tool_name = tool.name.clone();
            match registry.add(tool) {
                Ok(()) => {
                    by_name.insert(tool_name, endpoint);
                }
                Err(OpenApiToolsError::DuplicateTool(dup)) => {
                    tracing::warn!(
                        source = %self.name,
                        tool = %dup,
                        method = %endpoint.method,
                        path = %endpoint.path,
                        "duplicate tool name; skipping endpoint"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            source = %self.name,
            discovered,
            tools = registry.len(),
            base_url = %base_url,
            "discovered tools from OpenAPI spec"
        );

        let executor = Executor::with_transport(
            Some(base_url.clone()),
            self.config.executor.clone(),
            self.transport.clone(),
        );
        *self.state.write() = Some(Arc::new(SourceState {
            spec_title: loaded.title().map(str::to_string),
            base_url,
            registry,
            endpoints: by_name,
            executor,
        }));
        Ok(())
    }

    fn add_variants(&self, endpoints: &mut Vec<CanonicalEndpoint>) {
        let variants: Vec<_> = self
            .config
            .variants
            .iter()
            .flat_map(|spec| {
                endpoints
                    .iter()
                    .filter(|e| spec.applies_to(e))
                    .map(|e| e.variant(spec))
            })
            .collect();
        if !variants.is_empty() {
            tracing::debug!(source = %self.name, count = variants.len(), "added endpoint variants");
        }
        endpoints.extend(variants);
    }

    /// Include/exclude globs over `"METHOD /path"` or the endpoint name. Exclude wins.
    fn should_auto_discover(&self, endpoint: &CanonicalEndpoint) -> bool {
        let discover = &self.config.auto_discover;
        if !discover.is_enabled() {
            return false;
        }
        let operation = format!("{} {}", endpoint.method, endpoint.path);
        let matches = |pattern: &String| {
            glob_match(pattern, &operation) || glob_match(pattern, &endpoint.name)
        };

        if discover.exclude_patterns().iter().any(matches) {
            return false;
        }
        let include = discover.include_patterns();
        include.is_empty() || include.iter().any(matches)
    }

    fn state(&self) -> Result<Arc<SourceState>> {
        self.state.read().clone().ok_or_else(|| {
            OpenApiToolsError::Runtime(format!("tool source '{}' has not been started", self.name))
        })
    }

    /// The MCP `Tool`s exposed by this source. Empty before `start`.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let Ok(state) = self.state() else {
            return Vec::new();
        };
        state
            .registry
            .tools()
            .iter()
            .map(|t| {
                let schema = t.input_schema.as_object().cloned().unwrap_or_else(JsonObject::new);
                let mut tool = Tool::new(t.name.clone(), t.description.clone(), Arc::new(schema));
                if let Some(endpoint) = state.endpoints.get(&t.name) {
                    tool.annotations =
                        Some(annotations_for_method(endpoint.method, endpoint.summary.clone()));
                }
                tool
            })
            .collect()
    }

    /// Generated tool definitions in registration order.
    #[must_use]
    pub fn mcp_tools(&self) -> Vec<McpTool> {
        self.state()
            .map(|s| s.registry.tools().to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn endpoint_for_tool(&self, name: &str) -> Option<CanonicalEndpoint> {
        self.state().ok()?.endpoints.get(name).cloned()
    }

    /// The base URL chosen during `start`.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.state().ok().map(|s| s.base_url.clone())
    }

    /// The `info.title` of the loaded spec.
    #[must_use]
    pub fn spec_title(&self) -> Option<String> {
        self.state().ok()?.spec_title.clone()
    }

    /// Run one tool call. API-level failures and unknown tools come back as `isError` results.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Runtime`] if the source has not been started.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        match self.execute_tool(name, arguments).await? {
            Ok(result) => Ok(call_result(&result)),
            Err(message) => {
                tracing::warn!(source = %self.name, tool = name, error = %message, "tool call rejected");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: {message}"
                ))]))
            }
        }
    }

    /// Like [`Self::call_tool`] but returns the raw execution result. The inner `Err` carries a
    /// message for calls that never reached the executor.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Runtime`] if the source has not been started.
    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<std::result::Result<ExecutionResult, String>> {
        let state = self.state()?;
        let Some(endpoint) = state.endpoints.get(name) else {
            return Ok(Err(format!("Tool not found: {name}")));
        };

        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Ok(Err(format!(
                    "Tool arguments must be a JSON object, got {other}"
                )));
            }
        };
        let args = if self.config.generator.group_parameters {
            flatten_grouped_arguments(endpoint, args)
        } else {
            args
        };

        let (auth, scope) = self.resolve_auth(name, &args);
        tracing::debug!(source = %self.name, tool = name, ?scope, auth = auth.kind(), "executing tool");
        Ok(Ok(state
            .executor
            .execute_with(endpoint, &args, auth, scope)
            .await))
    }

    /// Scope for one call: a call matching a conditional rule always gets credentials, any other
    /// call follows the endpoint's declared security.
    fn resolve_auth(&self, tool: &str, args: &Map<String, Value>) -> (&AuthHandler, AuthScope) {
        let forced = self
            .config
            .conditional_auth
            .iter()
            .any(|rule| rule_matches(rule, tool, args));
        let scope = if forced {
            AuthScope::Always
        } else {
            AuthScope::Security
        };
        (&self.auth, scope)
    }
}

fn rule_matches(rule: &ConditionalAuthRule, tool: &str, args: &Map<String, Value>) -> bool {
    let by_tool = rule.tools.iter().any(|pattern| glob_match(pattern, tool));
    let by_argument = rule.argument.as_ref().is_some_and(|m| {
        args.get(&m.name)
            .is_some_and(|value| m.values.iter().any(|v| v == value))
    });
    by_tool || by_argument
}

/// Lift `path`/`query`/`header`/`cookie` groups to the top level. From the `body` group only
/// declared BODY parameters (e.g. `formData`) are lifted; the rest stays grouped for the request
/// builder, which reads body-schema fields from it.
fn flatten_grouped_arguments(
    endpoint: &CanonicalEndpoint,
    mut args: Map<String, Value>,
) -> Map<String, Value> {
    // A real parameter with the group's name is a value, not a group.
    let is_group = |group: &str| !endpoint.parameters.iter().any(|p| p.name == group);

    for location in GROUP_ORDER {
        let group = location.as_str();
        if location == ParameterLocation::Body || !is_group(group) {
            continue;
        }
        if let Some(Value::Object(members)) = args.remove(group) {
            for (key, value) in members {
                args.entry(key).or_insert(value);
            }
        }
    }

    let body_group = ParameterLocation::Body.as_str();
    if is_group(body_group)
        && let Some(Value::Object(members)) = args.get_mut(body_group)
    {
        let lifted: Vec<(String, Value)> = endpoint
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Body)
            .filter_map(|p| {
                members
                    .remove(&p.name)
                    .or_else(|| members.remove(&p.wire_name))
                    .map(|value| (p.name.clone(), value))
            })
            .collect();
        if members.is_empty() && endpoint.body_schema.is_none() {
            args.remove(body_group);
        }
        for (key, value) in lifted {
            args.entry(key).or_insert(value);
        }
    }
    args
}

fn call_result(result: &ExecutionResult) -> CallToolResult {
    let response = &result.response;
    if !result.success {
        let message = response.error.as_deref().unwrap_or("Execution failed");
        return CallToolResult::error(vec![Content::text(format!("Error: {message}"))]);
    }

    let body = match &response.data {
        Some(Value::String(s)) => s.clone(),
        Some(data) => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
        None => response.raw_text.clone(),
    };
    let text = format!(
        "{body}\n\n---\nExecution Time: {:.2}ms\nStatus Code: {}\nAttempts: {}",
        result.elapsed_ms(),
        response.status_code,
        result.attempts
    );
    CallToolResult::success(vec![Content::text(text)])
}

/// Whole-string glob match: `*` is any sequence, `?` any single character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0usize;
    let mut t = 0usize;
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some(p);
                p += 1;
                star_t = t;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => {
                let Some(s) = star else {
                    return false;
                };
                p = s + 1;
                star_t += 1;
                t = star_t;
            }
        }
    }

    while pattern.get(p) == Some(&'*') {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArgumentMatch;
    use restmcp_http_tools::config::AuthConfig;
    use restmcp_http_tools::model::{CanonicalParameter, DataType, HttpMethod};
    use serde_json::json;

    #[test]
    fn glob_matching() {
        assert!(glob_match("GET /pets*", "GET /pets/{id}"));
        assert!(glob_match("*", ""));
        assert!(glob_match("get_?ser", "get_user"));
        assert!(glob_match("monitoring_*", "monitoring_get_records"));
        assert!(!glob_match("monitoring_*", "get_monitoring_records"));
        assert!(!glob_match("GET /pets", "GET /pets/{id}"));
        assert!(glob_match("*delete*", "DELETE /pets/{id}".to_lowercase().as_str()));
    }

    fn source(rules: Vec<ConditionalAuthRule>) -> OpenApiToolSource {
        let mut config = ApiServerConfig::new("unused");
        config.auth = AuthConfig::Bearer {
            token: "t".to_string(),
        };
        config.conditional_auth = rules;
        OpenApiToolSource::new("test", config)
    }

    #[test]
    fn auth_without_rules_follows_security() {
        let src = source(Vec::new());
        let (auth, scope) = src.resolve_auth("anything", &Map::new());
        assert!(!auth.is_none());
        assert_eq!(scope, AuthScope::Security);
    }

    #[test]
    fn auth_rules_match_tool_glob_or_argument() {
        let src = source(vec![
            ConditionalAuthRule {
                tools: vec!["monitoring_*".to_string()],
                argument: None,
            },
            ConditionalAuthRule {
                tools: Vec::new(),
                argument: Some(ArgumentMatch {
                    name: "dataset_id".to_string(),
                    values: vec![json!("ods-api-monitoring")],
                }),
            },
        ]);

        let (auth, scope) = src.resolve_auth("monitoring_get_records", &Map::new());
        assert!(!auth.is_none());
        assert_eq!(scope, AuthScope::Always);

        let mut args = Map::new();
        args.insert("dataset_id".to_string(), json!("ods-api-monitoring"));
        let (_, scope) = src.resolve_auth("get_records", &args);
        assert_eq!(scope, AuthScope::Always);

        args.insert("dataset_id".to_string(), json!("public-data"));
        let (auth, scope) = src.resolve_auth("get_records_monitoring", &args);
        assert!(!auth.is_none());
        assert_eq!(scope, AuthScope::Security, "substring of a rule glob is not a match");
    }

    #[test]
    fn grouped_arguments_are_flattened() {
        let mut endpoint = CanonicalEndpoint::new("get_pet", HttpMethod::Get, "/pets/{id}");
        endpoint.parameters = vec![
            CanonicalParameter::new("id", ParameterLocation::Path, DataType::Number),
            CanonicalParameter::new("query", ParameterLocation::Query, DataType::String),
        ];
        let args = json!({
            "path": {"id": 7},
            "query": "literal",
            "header": {"x_trace": "t"},
            "body": {"a": 1}
        });
        let Value::Object(args) = args else {
            unreachable!("object literal")
        };
        let flat = flatten_grouped_arguments(&endpoint, args);
        assert_eq!(flat.get("id"), Some(&json!(7)));
        assert_eq!(flat.get("query"), Some(&json!("literal")));
        assert_eq!(flat.get("x_trace"), Some(&json!("t")));
        assert_eq!(flat.get("body"), Some(&json!({"a": 1})));
        assert!(flat.get("path").is_none());
    }

    #[test]
    fn form_fields_are_lifted_from_body_group() {
        let mut endpoint = CanonicalEndpoint::new("add_note", HttpMethod::Post, "/notes");
        endpoint.parameters = vec![
            CanonicalParameter::new("note", ParameterLocation::Body, DataType::String)
                .required(true),
            CanonicalParameter::new("due_date", ParameterLocation::Body, DataType::String)
                .with_wire_name("dueDate"),
        ];
        let Value::Object(args) = json!({"body": {"note": "hi", "dueDate": "2026-01-01"}}) else {
            unreachable!("object literal")
        };
        let flat = flatten_grouped_arguments(&endpoint, args);
        assert_eq!(flat.get("note"), Some(&json!("hi")));
        assert_eq!(flat.get("due_date"), Some(&json!("2026-01-01")));
        assert!(flat.get("body").is_none(), "emptied group without a body schema is dropped");
    }

    #[tokio::test]
    async fn calls_before_start_fail() {
        let src = source(Vec::new());
        assert!(src.list_tools().is_empty());
        assert!(matches!(
            src.call_tool("x", Value::Null).await,
            Err(OpenApiToolsError::Runtime(_))
        ));
    }
}
