use restmcp_http_tools::config::AuthConfig;
use restmcp_http_tools::model::VariantSpec;
use restmcp_openapi_tools::config::{AutoDiscoverConfig, ConditionalAuthRule};
use restmcp_openapi_tools::{ApiServerConfig, OpenApiToolSource, OpenApiToolsError};
use restmcp_test_support::{MockApi, MockResponse};
use rmcp::model::CallToolResult;
use serde_json::{Value, json};

const PETSTORE: &str = r#"
openapi: 3.0.3
info:
  title: Petstore
  version: "1.0"
servers:
  - url: /v1
security:
  - bearerAuth: []
components:
  securitySchemes:
    bearerAuth:
      type: http
      scheme: bearer
paths:
  /pets:
    get:
      operationId: listPets
      summary: List pets
      security: []
      parameters:
        - name: maxItems
          in: query
          schema:
            type: integer
        - name: api_key
          in: query
          schema:
            type: string
    post:
      operationId: createPet
      tags: [pets]
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  type: string
                petType:
                  type: string
  /pets/{petId}:
    get:
      operationId: getPet
      summary: Get one pet
      parameters:
        - name: petId
          in: path
          schema:
            type: integer
    delete:
      operationId: deletePet
      parameters:
        - name: petId
          in: path
          schema:
            type: integer
"#;

fn config(api: &MockApi) -> ApiServerConfig {
    let mut config = ApiServerConfig::new(PETSTORE);
    config.base_url = Some(api.url("/v1"));
    config.executor.retry_backoff_secs = 0.0;
    config
}

fn bearer(token: &str) -> AuthConfig {
    AuthConfig::Bearer {
        token: token.to_string(),
    }
}

async fn started(config: ApiServerConfig) -> OpenApiToolSource {
    OpenApiToolSource::build("petstore", config)
        .await
        .expect("start tool source")
}

/// `(is_error, text)` of the first content block.
fn outcome(result: &CallToolResult) -> (bool, String) {
    let value = serde_json::to_value(result).expect("serialize result");
    let is_error = value["isError"].as_bool().unwrap_or(false);
    let text = value["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    (is_error, text)
}

fn echoed_body(text: &str) -> Value {
    let (body, _) = text.split_once("\n\n---\n").expect("footer");
    serde_json::from_str(body).expect("echo json")
}

#[tokio::test]
async fn lists_tools_with_annotations() {
    let api = MockApi::start().await.expect("mock api");
    let source = started(config(&api)).await;

    let names: Vec<String> = source.list_tools().iter().map(|t| t.name.to_string()).collect();
    assert_eq!(names, ["list_pets", "create_pet", "get_pet", "delete_pet"]);
    assert_eq!(source.spec_title().as_deref(), Some("Petstore"));

    let tools = serde_json::to_value(source.list_tools()).expect("tools json");
    let list = &tools[0];
    assert_eq!(list["annotations"]["readOnlyHint"], true);
    assert_eq!(list["annotations"]["title"], "List pets");
    let props = list["inputSchema"]["properties"].as_object().expect("props");
    assert!(props.contains_key("max_items"));
    assert!(!props.contains_key("api_key"), "auth params are hidden");

    let delete = &tools[3];
    assert_eq!(delete["annotations"]["destructiveHint"], true);
    assert_eq!(delete["inputSchema"]["required"], json!(["pet_id"]));

    let create = &tools[1];
    assert_eq!(create["inputSchema"]["required"], json!(["name"]));
    assert!(create["inputSchema"]["properties"]["pet_type"].is_object());
}

#[tokio::test]
async fn successful_call_renders_body_and_footer() {
    let api = MockApi::start().await.expect("mock api");
    let source = started(config(&api)).await;

    let result = source
        .call_tool("list_pets", json!({"max_items": 5}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(!is_error, "{text}");
    assert!(text.contains("Status Code: 200"), "{text}");
    assert!(text.contains("Attempts: 1"), "{text}");
    assert!(text.contains("Execution Time: "), "{text}");

    let echo = echoed_body(&text);
    assert_eq!(echo["path"], "/v1/pets");
    assert_eq!(echo["query"], "maxItems=5");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].header("authorization").is_none());
}

#[tokio::test]
async fn body_fields_use_wire_names() {
    let api = MockApi::start().await.expect("mock api");
    let source = started(config(&api)).await;

    let result = source
        .call_tool("create_pet", json!({"name": "Rex", "pet_type": "dog"}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(!is_error, "{text}");

    let request = &api.requests()[0];
    assert_eq!(request.method, "POST");
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body, json!({"name": "Rex", "petType": "dog"}));
}

#[tokio::test]
async fn missing_required_parameter_never_sends() {
    let api = MockApi::start().await.expect("mock api");
    let source = started(config(&api)).await;

    let result = source
        .call_tool("get_pet", json!({}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(is_error);
    assert!(text.starts_with("Error: Failed to build request:"), "{text}");
    assert!(text.contains("pet_id"), "{text}");
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn retries_retryable_statuses() {
    let api = MockApi::start().await.expect("mock api");
    api.script_statuses("GET", "/v1/pets/7", &[503, 503, 200]);
    let source = started(config(&api)).await;

    let result = source
        .call_tool("get_pet", json!({"pet_id": 7}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(!is_error, "{text}");
    assert!(text.contains("Attempts: 3"), "{text}");
    assert_eq!(api.requests().len(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let api = MockApi::start().await.expect("mock api");
    api.script(
        "GET",
        "/v1/pets/9",
        [MockResponse::json(404, &json!({"message": "Pet not found"}))],
    );
    let source = started(config(&api)).await;

    let result = source
        .call_tool("get_pet", json!({"pet_id": 9}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(is_error);
    assert!(text.starts_with("Error: "), "{text}");
    assert!(text.contains("Pet not found"), "{text}");
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn credentials_only_reach_secured_endpoints() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.auth = bearer("s3cret");
    let source = started(config).await;

    source
        .call_tool("list_pets", json!({}))
        .await
        .expect("call");
    source
        .call_tool("get_pet", json!({"pet_id": 1}))
        .await
        .expect("call");

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].header("authorization").is_none());
    assert_eq!(requests[1].header("authorization"), Some("Bearer s3cret"));
}

#[tokio::test]
async fn conditional_rules_decide_credentials() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.auth = bearer("s3cret");
    config.conditional_auth = vec![ConditionalAuthRule {
        tools: vec!["list_*".to_string()],
        argument: None,
    }];
    let source = started(config).await;

    source
        .call_tool("list_pets", json!({}))
        .await
        .expect("call");
    source
        .call_tool("get_pet", json!({"pet_id": 1}))
        .await
        .expect("call");

    let requests = api.requests();
    assert_eq!(
        requests[0].header("authorization"),
        Some("Bearer s3cret"),
        "rule forces credentials onto a public endpoint"
    );
    assert_eq!(requests[1].header("authorization"), Some("Bearer s3cret"));
}

#[tokio::test]
async fn hmac_signing_appends_signature_last() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.auth = AuthConfig::HmacSignature {
        api_key: "key-1".to_string(),
        api_secret: "secret".to_string(),
        api_key_header: None,
        recv_window: Some(5000),
    };
    let source = started(config).await;

    let result = source
        .call_tool("get_pet", json!({"pet_id": 3}))
        .await
        .expect("call");
    assert!(!outcome(&result).0);

    let request = &api.requests()[0];
    assert_eq!(request.header("x-mbx-apikey"), Some("key-1"));
    let keys: Vec<String> = request.query_pairs().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["recvWindow", "timestamp", "signature"]);
    assert_eq!(request.query_param("recvWindow").as_deref(), Some("5000"));
}

#[tokio::test]
async fn auto_discover_filters_endpoints() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.auto_discover = AutoDiscoverConfig::Detailed {
        include: vec!["GET /pets*".to_string(), "create_pet".to_string()],
        exclude: vec!["get_pet".to_string()],
    };
    let source = started(config).await;

    let names: Vec<String> = source.mcp_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(names, ["list_pets", "create_pet"]);

    let mut disabled = self::config(&api);
    disabled.auto_discover = AutoDiscoverConfig::Enabled(false);
    assert!(started(disabled).await.list_tools().is_empty());
}

#[tokio::test]
async fn variants_clone_matching_endpoints() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.variants = vec![VariantSpec {
        path_contains: "{petId}".to_string(),
        name_prefix: "archive".to_string(),
        path_from: "/pets".to_string(),
        path_to: "/archive/pets".to_string(),
        ..VariantSpec::default()
    }];
    let source = started(config).await;

    let endpoint = source
        .endpoint_for_tool("archive_get_pet")
        .expect("variant registered");
    assert_eq!(endpoint.path, "/archive/pets/{petId}");

    source
        .call_tool("archive_delete_pet", json!({"pet_id": 4}))
        .await
        .expect("call");
    assert_eq!(api.requests()[0].path, "/v1/archive/pets/4");
}

#[tokio::test]
async fn grouped_arguments_reach_the_wire() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = config(&api);
    config.generator.group_parameters = true;
    let source = started(config).await;

    let tools = serde_json::to_value(source.list_tools()).expect("tools json");
    assert_eq!(tools[2]["inputSchema"]["required"], json!(["path"]));

    source
        .call_tool("get_pet", json!({"path": {"pet_id": 11}}))
        .await
        .expect("call");
    source
        .call_tool("create_pet", json!({"body": {"name": "Tom", "pet_type": "cat"}}))
        .await
        .expect("call");

    let requests = api.requests();
    assert_eq!(requests[0].path, "/v1/pets/11");
    let body: Value = serde_json::from_str(&requests[1].body).expect("json body");
    assert_eq!(body, json!({"name": "Tom", "petType": "cat"}));
}

const NOTES_SWAGGER: &str = r#"
swagger: "2.0"
info:
  title: Notes
  version: "1.0"
paths:
  /notes:
    post:
      operationId: addNote
      parameters:
        - name: note
          in: formData
          required: true
          type: string
        - name: noteTag
          in: formData
          type: string
      responses:
        "201":
          description: created
"#;

#[tokio::test]
async fn grouped_form_fields_reach_the_wire() {
    let api = MockApi::start().await.expect("mock api");
    let mut config = ApiServerConfig::new(NOTES_SWAGGER);
    config.base_url = Some(api.base_url().to_string());
    config.executor.retry_backoff_secs = 0.0;
    config.generator.group_parameters = true;
    let source = started(config).await;

    let tools = serde_json::to_value(source.list_tools()).expect("tools json");
    assert_eq!(tools[0]["name"], "add_note");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["body"]));

    let result = source
        .call_tool("add_note", json!({"body": {"note": "hi", "note_tag": "x"}}))
        .await
        .expect("call");
    let (is_error, text) = outcome(&result);
    assert!(!is_error, "{text}");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/notes");
    let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body, json!({"note": "hi", "noteTag": "x"}));
}

#[tokio::test]
async fn rejected_calls_are_error_results() {
    let api = MockApi::start().await.expect("mock api");
    let source = started(config(&api)).await;

    let (is_error, text) = outcome(
        &source
            .call_tool("no_such_tool", json!({}))
            .await
            .expect("call"),
    );
    assert!(is_error);
    assert_eq!(text, "Error: Tool not found: no_such_tool");

    let (is_error, text) = outcome(
        &source
            .call_tool("list_pets", json!([1, 2]))
            .await
            .expect("call"),
    );
    assert!(is_error);
    assert!(text.contains("must be a JSON object"), "{text}");
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn spec_fetched_by_url_resolves_relative_server() {
    let api = MockApi::start().await.expect("mock api");
    api.script(
        "GET",
        "/openapi.yaml",
        [MockResponse::text(200, PETSTORE)],
    );
    let source = started(ApiServerConfig::new(api.url("/openapi.yaml"))).await;

    assert_eq!(source.base_url(), Some(api.url("/v1")));
    assert_eq!(source.list_tools().len(), 4);
}

#[tokio::test]
async fn unreadable_spec_fails_start() {
    let source = OpenApiToolSource::new("broken", ApiServerConfig::new("title: nothing here\nfoo: 1\n"));
    let err = source.start().await.expect_err("not an OpenAPI document");
    assert!(matches!(err, OpenApiToolsError::InvalidFormat(_)), "{err}");
}
