use restmcp_test_support::MockApi;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

const SPEC: &str = r#"
openapi: 3.0.3
info:
  title: Notes
  version: "1"
paths:
  /notes:
    get:
      operationId: listNotes
      parameters:
        - name: pageSize
          in: query
          schema:
            type: integer
  /notes/{noteId}:
    delete:
      operationId: deleteNote
      security:
        - token: []
      parameters:
        - name: noteId
          in: path
          required: true
          schema:
            type: string
components:
  securitySchemes:
    token:
      type: http
      scheme: bearer
"#;

fn write_config(dir: &Path, base_url: &str) -> PathBuf {
    std::fs::write(dir.join("notes.yaml"), SPEC).expect("write spec");
    let config = format!(
        "name: notes\nspec: notes.yaml\nbaseUrl: {base_url}\nauth:\n  type: bearer\n  token: ${{NOTES_TOKEN}}\nexecutor:\n  maxRetries: 1\n"
    );
    let path = dir.join("adapter.yaml");
    std::fs::write(&path, config).expect("write config");
    path
}

async fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_restmcp-adapter"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("NOTES_TOKEN", "n0tes")
        .env("RUST_LOG", "warn")
        .output()
        .await
        .expect("run adapter")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

#[tokio::test]
async fn tools_prints_generated_definitions() {
    let api = MockApi::start().await.expect("mock api");
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), api.base_url());

    let output = run(&config, &["tools"]).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let tools = stdout_json(&output);
    let names: Vec<&str> = tools
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, ["list_notes", "delete_note"]);
    assert_eq!(tools[0]["inputSchema"]["properties"]["page_size"]["type"], "number");
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn call_prints_envelope_and_uses_expanded_secret() {
    let api = MockApi::start().await.expect("mock api");
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), api.base_url());

    let output = run(&config, &["call", "delete_note", "--args", r#"{"note_id": "n-1"}"#]).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let envelope = stdout_json(&output);
    let text = envelope["content"][0]["text"].as_str().expect("text");
    assert!(text.contains("Status Code: 200"), "{text}");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path, "/notes/n-1");
    assert_eq!(requests[0].header("authorization"), Some("Bearer n0tes"));
}

#[tokio::test]
async fn failed_call_exits_non_zero() {
    let api = MockApi::start().await.expect("mock api");
    api.script_statuses("GET", "/notes", &[500]);
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), api.base_url());

    let output = run(&config, &["call", "list_notes"]).await;
    assert_eq!(output.status.code(), Some(1));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["isError"], true);
    assert_eq!(api.requests().len(), 1, "maxRetries 1 means a single attempt");
}
