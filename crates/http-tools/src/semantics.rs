//! Tool annotations derived from HTTP method semantics (RFC 9110).

use crate::model::HttpMethod;
use rmcp::model::ToolAnnotations;

/// Hints for an endpoint-backed tool. `openWorldHint` is always set: every call leaves the
/// process.
#[must_use]
pub fn annotations_for_method(method: HttpMethod, title: Option<String>) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method {
        HttpMethod::Get | HttpMethod::Head | HttpMethod::Options => (true, false, Some(true)),
        HttpMethod::Post => (false, false, Some(false)),
        HttpMethod::Put | HttpMethod::Delete => (false, true, Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        HttpMethod::Patch => (false, true, None),
    };
    ToolAnnotations {
        title,
        read_only_hint: Some(read_only),
        destructive_hint: Some(destructive),
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
