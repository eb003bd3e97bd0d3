//! Error types for `restmcp-openapi-tools`.

use restmcp_http_tools::error::HttpToolsError;
use thiserror::Error;

/// Main error type for spec ingestion and tool generation.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Empty or unparseable content, or a document that is not an API description.
    #[error("Invalid spec format: {0}")]
    InvalidFormat(String),

    /// Structurally invalid document (strict mode).
    #[error("Spec validation error: {0}")]
    Validation(String),

    #[error("Circular reference detected: {reference}")]
    CircularReference { reference: String },

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("failed to fetch spec from '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec from '{location}': {message}")]
    SpecParse { location: String, message: String },

    /// Configuration errors (invalid config, missing fields, conflicts).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Runtime errors (source not started, invalid arguments).
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    HttpTools(#[from] HttpToolsError),
}

impl OpenApiToolsError {
    pub(crate) fn invalid_pattern(pattern: &str, err: &regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for ingestion and generation operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
