//! Response classification, lenient body parsing and error-message extraction.

use crate::transport::RawResponse;
use mime::Mime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw bodies longer than this are cut when used as an error message.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Fields probed (in order) for an error message in a JSON error body.
const ERROR_FIELDS: [&str; 5] = ["error", "message", "error_description", "detail", "title"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedResponse {
    pub status_code: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub raw_text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessedResponse {
    /// A failure that never produced an HTTP response.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            success: false,
            data: None,
            raw_text: String::new(),
            headers: BTreeMap::new(),
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseProcessor {
    /// `None` means 200..=299.
    success_status: Option<Vec<u16>>,
}

impl ResponseProcessor {
    #[must_use]
    pub fn new(success_status: Option<Vec<u16>>) -> Self {
        Self { success_status }
    }

    #[must_use]
    pub fn is_success(&self, status: u16) -> bool {
        match &self.success_status {
            Some(codes) => codes.contains(&status),
            None => (200..300).contains(&status),
        }
    }

    /// Never fails: malformed JSON degrades to raw text.
    #[must_use]
    pub fn process(&self, raw: RawResponse) -> ProcessedResponse {
        let success = self.is_success(raw.status);
        let data = parse_body(&raw.body, raw.content_type());
        let error = (!success).then(|| extract_error(raw.status, &raw.body));
        ProcessedResponse {
            status_code: raw.status,
            success,
            data,
            raw_text: raw.body,
            headers: raw.headers,
            error,
        }
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(mime) = content_type.and_then(|ct| ct.parse::<Mime>().ok()) else {
        return false;
    };
    mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON)
}

fn looks_like_json(body: &str) -> bool {
    matches!(body.trim_start().chars().next(), Some('{' | '['))
}

fn parse_body(body: &str, content_type: Option<&str>) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    if (is_json_content_type(content_type) || looks_like_json(body))
        && let Ok(v) = serde_json::from_str::<Value>(body)
    {
        return Some(v);
    }
    Some(Value::String(body.to_string()))
}

/// Best-effort human-readable message for a failed response.
#[must_use]
pub fn extract_error(status: u16, body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return raw_error(status, body);
    };

    if let Value::Object(map) = &parsed {
        for field in ERROR_FIELDS {
            match map.get(field) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(message) = inner.get("message") {
                        return match message {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                    }
                }
                _ => {}
            }
        }
    }
    parsed.to_string()
}

fn raw_error(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {status}: Request failed");
    }
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return format!("HTTP {status}: {cut}...");
    }
    format!("HTTP {status}: {body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_success_set_is_2xx() {
        let p = ResponseProcessor::default();
        assert!(p.is_success(200));
        assert!(p.is_success(204));
        assert!(!p.is_success(301));
        assert!(!p.is_success(404));

        let custom = ResponseProcessor::new(Some(vec![200, 404]));
        assert!(custom.is_success(404));
        assert!(!custom.is_success(201));
    }

    #[test]
    fn json_is_parsed_by_content_type_or_shape() {
        let p = ResponseProcessor::default();
        let r = p.process(
            RawResponse::new(200, r#"{"ok":true}"#)
                .with_header("Content-Type", "application/json; charset=utf-8"),
        );
        assert_eq!(r.data, Some(json!({"ok": true})));
        assert!(r.error.is_none());

        let r = p.process(RawResponse::new(200, "  [1,2]"));
        assert_eq!(r.data, Some(json!([1, 2])));

        let r = p.process(
            RawResponse::new(200, r#"{"a":1}"#).with_header("content-type", "application/problem+json"),
        );
        assert_eq!(r.data, Some(json!({"a": 1})));
    }

    #[test]
    fn malformed_json_degrades_to_text() {
        let p = ResponseProcessor::default();
        let r = p.process(
            RawResponse::new(200, "{not json").with_header("content-type", "application/json"),
        );
        assert_eq!(r.data, Some(Value::String("{not json".to_string())));
        assert!(r.success);
    }

    #[test]
    fn error_fields_are_probed_in_order() {
        assert_eq!(
            extract_error(400, r#"{"message":"m","error":"e"}"#),
            "e".to_string()
        );
        assert_eq!(
            extract_error(400, r#"{"error":{"message":"nested","code":7}}"#),
            "nested".to_string()
        );
        assert_eq!(
            extract_error(422, r#"{"detail":"bad input"}"#),
            "bad input".to_string()
        );
        assert_eq!(extract_error(500, r#"{"code":9}"#), r#"{"code":9}"#.to_string());
    }

    #[test]
    fn non_json_errors_fall_back_to_status_line() {
        assert_eq!(extract_error(502, "bad gateway"), "HTTP 502: bad gateway");
        assert_eq!(extract_error(503, ""), "HTTP 503: Request failed");

        let long = "x".repeat(600);
        let msg = extract_error(500, &long);
        assert!(msg.starts_with("HTTP 500: xxx"));
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), "HTTP 500: ".len() + MAX_ERROR_BODY_CHARS + 3);
    }

    #[test]
    fn failed_response_carries_error_and_data() {
        let r = ResponseProcessor::default().process(RawResponse::new(
            404,
            r#"{"error":"not found"}"#,
        ));
        assert!(!r.success);
        assert_eq!(r.status_code, 404);
        assert_eq!(r.error.as_deref(), Some("not found"));
        assert_eq!(r.data, Some(json!({"error": "not found"})));
    }
}
