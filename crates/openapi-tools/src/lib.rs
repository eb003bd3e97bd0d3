//! OpenAPI/Swagger ingestion and MCP tool generation.
//!
//! The pipeline is: [`loader`] → [`resolver`] → [`normalizer`] → [`generator`] (via [`schema`])
//! → [`registry`]. [`runtime::OpenApiToolSource`] wires it to the executor from
//! `restmcp-http-tools` for tool calls.

pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod normalizer;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod schema;

pub use config::ApiServerConfig;
pub use error::{OpenApiToolsError, Result};
pub use runtime::OpenApiToolSource;
