//! MCP protocol types - JSON-RPC 2.0 framing and the tool method surface

mod messages;
mod types;

pub use messages::*;
pub use types::*;
