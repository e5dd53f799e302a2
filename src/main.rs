//! Toolshed - configuration-driven tool server
//!
//! Loads the tools document, resolves it against the built-in plugin
//! registry, and serves every tool over HTTP/JSON and MCP.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use toolshed::cli::Cli;
use toolshed::config::{self, ToolsFile};
use toolshed::registry::Registry;
use toolshed::server::{Server, ServerSettings};
use toolshed::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // the registration list runs before any request is served; a duplicate
    // kind here is a programming error and aborts startup
    let registry = match Registry::builtin() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to build plugin registry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let text = match std::fs::read_to_string(&cli.config) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read tools file {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let file = match ToolsFile::parse(&text) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to parse tools file {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let toolset = match config::resolve(&registry, &file).await {
        Ok(toolset) => toolset,
        Err(e) => {
            error!("Failed to resolve configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut settings = ServerSettings::default();
    if let Some(address) = cli.address {
        settings.address = address;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(timeout) = cli.request_timeout {
        settings.request_timeout = timeout;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Starting toolshed"
    );

    let server = Server::new(settings, toolset);
    match server.run().await {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
