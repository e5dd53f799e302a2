//! Command-line interface

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Configuration-driven tool server for databases and cloud APIs
#[derive(Parser, Debug)]
#[command(name = "toolshed")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the tools document (YAML)
    #[arg(short, long, default_value = "tools.yaml", env = "TOOLSHED_CONFIG")]
    pub config: PathBuf,

    /// Address to bind to
    #[arg(short, long, env = "TOOLSHED_ADDRESS")]
    pub address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TOOLSHED_PORT")]
    pub port: Option<u16>,

    /// Per-request dispatch deadline
    #[arg(long, value_parser = humantime::parse_duration, env = "TOOLSHED_REQUEST_TIMEOUT")]
    pub request_timeout: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TOOLSHED_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "TOOLSHED_LOG_FORMAT")]
    pub log_format: Option<String>,
}
