//! Toolshed - a configuration-driven tool server
//!
//! Operators describe sources (database pools, REST endpoints, cloud admin
//! APIs), auth services (identity-token validators), and tools (bindings of
//! a source, a parameterized operation, and an authorization policy) in one
//! YAML document. The server exposes every tool over two transports that
//! share a single invocation pipeline:
//!
//! - plain HTTP/JSON under `/api/tool/{name}/`
//! - MCP (JSON-RPC 2.0) under `/mcp`
//!
//! # Request flow
//!
//! Verify identity tokens into a claims map, check the tool's
//! authorization policy, coerce body parameters and inject authenticated
//! claims, dispatch against the bound source under the request deadline,
//! then shape the result for the calling surface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod params;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sources;
pub mod tools;

pub use error::{Result, ServerError};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
