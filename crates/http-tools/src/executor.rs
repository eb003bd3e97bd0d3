//! Request execution with retry and exponential backoff.
//!
//! One call moves through: build → authenticate → attempt(n) → {success, retry → attempt(n+1),
//! failed}. Every path ends in exactly one [`ExecutionResult`].

use crate::auth::{AuthHandler, AuthTarget};
use crate::config::ExecutorConfig;
use crate::error::{HttpToolsError, Result};
use crate::model::CanonicalEndpoint;
use crate::request::{RequestBuilder, RequestSpec};
use crate::response::{ProcessedResponse, ResponseProcessor};
use crate::safety::{redact_headers, redact_params};
use crate::transport::{HttpTransport, OutboundRequest, ReqwestTransport};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// When to attach credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScope {
    /// Only if the endpoint declares a non-empty security requirement.
    #[default]
    Security,
    /// Always, regardless of the endpoint's declared security.
    Always,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub endpoint_name: String,
    pub success: bool,
    pub response: ProcessedResponse,
    /// What was sent, with credentials redacted. `None` if building failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_details: Option<RequestSpec>,
    #[serde(rename = "execution_time_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub attempts: u32,
}

impl ExecutionResult {
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

struct Prepared {
    outbound: OutboundRequest,
    details: RequestSpec,
}

pub struct Executor {
    builder: RequestBuilder,
    processor: ResponseProcessor,
    config: ExecutorConfig,
    transport: Arc<dyn HttpTransport>,
}

impl Executor {
    /// Executor backed by a fresh `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: Option<String>, config: ExecutorConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(base_url, config, transport))
    }

    #[must_use]
    pub fn with_transport(
        base_url: Option<String>,
        config: ExecutorConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let builder = RequestBuilder::new(base_url).with_default_headers(
            config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self {
            builder,
            processor: ResponseProcessor::new(config.success_status.clone()),
            config,
            transport,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.builder.base_url()
    }

    /// Execute with credentials gated by the endpoint's declared security.
    pub async fn execute(
        &self,
        endpoint: &CanonicalEndpoint,
        args: &Map<String, Value>,
        auth: &AuthHandler,
    ) -> ExecutionResult {
        self.execute_with(endpoint, args, auth, AuthScope::Security)
            .await
    }

    pub async fn execute_with(
        &self,
        endpoint: &CanonicalEndpoint,
        args: &Map<String, Value>,
        auth: &AuthHandler,
        scope: AuthScope,
    ) -> ExecutionResult {
        let started = Instant::now();

        let prepared = match self.prepare(endpoint, args, auth, scope) {
            Ok(p) => p,
            Err(e) => {
                warn!(endpoint = %endpoint.name, error = %e, "failed to build request");
                return ExecutionResult {
                    endpoint_name: endpoint.name.clone(),
                    success: false,
                    response: ProcessedResponse::failure(format!("Failed to build request: {e}")),
                    request_details: None,
                    elapsed: started.elapsed(),
                    attempts: 0,
                };
            }
        };

        let max_attempts = self.config.max_attempts();
        let mut attempt: u32 = 0;
        let last_error: HttpToolsError = loop {
            attempt += 1;
            match self.transport.send(prepared.outbound.clone()).await {
                Ok(raw) => {
                    let processed = self.processor.process(raw);
                    if !processed.success
                        && self.config.is_retryable_status(processed.status_code)
                        && attempt < max_attempts
                    {
                        let delay = self.config.backoff_after(attempt);
                        warn!(
                            endpoint = %endpoint.name,
                            status = processed.status_code,
                            attempt,
                            ?delay,
                            "retryable status; backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    debug!(
                        endpoint = %endpoint.name,
                        status = processed.status_code,
                        success = processed.success,
                        attempt,
                        "request finished"
                    );
                    return ExecutionResult {
                        endpoint_name: endpoint.name.clone(),
                        success: processed.success,
                        response: processed,
                        request_details: Some(prepared.details),
                        elapsed: started.elapsed(),
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff_after(attempt);
                    warn!(
                        endpoint = %endpoint.name,
                        error = %e,
                        attempt,
                        ?delay,
                        "transport failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break e,
            }
        };

        warn!(endpoint = %endpoint.name, error = %last_error, attempts = attempt, "request failed");
        ExecutionResult {
            endpoint_name: endpoint.name.clone(),
            success: false,
            response: ProcessedResponse::failure(format!(
                "Request failed after {attempt} attempts: {last_error}"
            )),
            request_details: Some(prepared.details),
            elapsed: started.elapsed(),
            attempts: attempt,
        }
    }

    /// Run calls one after another with the same auth handler.
    pub async fn execute_batch(
        &self,
        calls: &[(CanonicalEndpoint, Map<String, Value>)],
        auth: &AuthHandler,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(calls.len());
        for (endpoint, args) in calls {
            results.push(self.execute(endpoint, args, auth).await);
        }
        results
    }

    fn prepare(
        &self,
        endpoint: &CanonicalEndpoint,
        args: &Map<String, Value>,
        auth: &AuthHandler,
        scope: AuthScope,
    ) -> Result<Prepared> {
        let mut spec = self.builder.build(endpoint, args)?;

        let authenticate = scope == AuthScope::Always || endpoint.requires_auth();
        if authenticate && !auth.is_none() {
            let target = auth.apply(AuthTarget::new(
                std::mem::take(&mut spec.headers),
                std::mem::take(&mut spec.query_params),
            ))?;
            spec.headers = target.headers;
            spec.query_params = target.params;
        }

        let url = spec.full_url()?;
        let details = RequestSpec {
            method: spec.method,
            url: spec.url.clone(),
            headers: redact_headers(&spec.headers, &auth.sensitive_headers()),
            query_params: redact_params(&spec.query_params, &auth.sensitive_params()),
            body: spec.body.clone(),
        };
        let outbound = OutboundRequest {
            method: spec.method,
            url,
            headers: spec.headers,
            body: spec.body,
            timeout: self.config.timeout(),
        };
        Ok(Prepared { outbound, details })
    }
}
