//! The HTTP client seam used by the executor.

use crate::error::Result;
use crate::model::HttpMethod;
use crate::request::Headers;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// A request ready to go on the wire (auth already applied, query already encoded).
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Sends one request and returns the raw response. Non-2xx statuses are responses, not errors;
/// only failures to obtain a response are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpToolsError;
    use axum::{
        Router,
        body::Bytes,
        http::{HeaderMap, Method, Uri},
        routing::any,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reqwest_transport_sends_headers_and_json_body() {
        async fn echo_handler(
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: Bytes,
        ) -> (axum::http::StatusCode, axum::Json<Value>) {
            (
                axum::http::StatusCode::CREATED,
                axum::Json(json!({
                    "method": method.as_str(),
                    "path": uri.path(),
                    "query": uri.query().unwrap_or(""),
                    "x_trace": headers.get("x-trace").and_then(|v| v.to_str().ok()),
                    "body": String::from_utf8_lossy(&body),
                })),
            )
        }

        let app = Router::new().route("/{*path}", any(echo_handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");

        let server = axum::serve(listener, app);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = server.with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let server_handle = tokio::spawn(async move { server.await });

        let mut headers = Headers::new();
        headers.insert("X-Trace".to_string(), "t-1".to_string());
        let transport = ReqwestTransport::new().expect("client");
        let raw = transport
            .send(OutboundRequest {
                method: HttpMethod::Post,
                url: Url::parse(&format!("http://{addr}/pets?limit=2")).expect("url"),
                headers,
                body: Some(json!({"name": "Rex"})),
                timeout: Some(Duration::from_secs(5)),
            })
            .await
            .expect("send");

        assert_eq!(raw.status, 201);
        assert!(raw.content_type().is_some_and(|ct| ct.contains("json")));
        let echoed: Value = serde_json::from_str(&raw.body).expect("json");
        assert_eq!(echoed["method"], "POST");
        assert_eq!(echoed["path"], "/pets");
        assert_eq!(echoed["query"], "limit=2");
        assert_eq!(echoed["x_trace"], "t-1");
        assert_eq!(echoed["body"], r#"{"name":"Rex"}"#);

        let _ = shutdown_tx.send(());
        server_handle
            .await
            .expect("server task join")
            .expect("server result");
    }

    #[tokio::test]
    async fn connection_refused_is_a_retryable_transport_error() {
        let port = restmcp_test_support::pick_unused_port().expect("port");
        let transport = ReqwestTransport::new().expect("client");
        let err = transport
            .send(OutboundRequest {
                method: HttpMethod::Get,
                url: Url::parse(&format!("http://127.0.0.1:{port}/")).expect("url"),
                headers: Headers::new(),
                body: None,
                timeout: Some(Duration::from_secs(2)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HttpToolsError::Transport { .. }));
        assert!(err.is_retryable());
    }
}
