//! HTTP side of RestMCP: the canonical endpoint model, request building, authentication,
//! execution with retries, and response processing.
//!
//! Ingestion of API documents lives in `restmcp-openapi-tools`; this crate only consumes
//! [`model::CanonicalEndpoint`] records.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod request;
pub mod response;
pub mod safety;
pub mod semantics;
pub mod transport;
