//! Invocation pipeline - the fixed per-request step sequence
//!
//! Both protocol surfaces funnel into [`invoke`]. The step order is part of
//! the contract and must not change: verify claims, authorize, parse
//! parameters, dispatch under the request deadline. Result shaping stays
//! with the surface that called in.

use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::{self, strip_bearer};
use crate::config::ToolSet;
use crate::{Result, ServerError};

/// Run one tool invocation through the pipeline
pub async fn invoke(
    toolset: &ToolSet,
    tool_name: &str,
    headers: &HeaderMap,
    args: &Map<String, Value>,
    timeout: Duration,
) -> Result<Value> {
    let tool = toolset
        .tool(tool_name)
        .ok_or_else(|| ServerError::UnknownTool(tool_name.to_string()))?;

    // 1. verify claims for every configured service
    let claims = auth::verify_claims(toolset.auth_services(), headers).await?;

    // 2. membership-only authorization
    if !tool.authorized(&claims) {
        return Err(ServerError::Unauthorized(format!(
            "tool {tool_name} requires a verified token from one of [{}]",
            tool.auth_required().join(", ")
        )));
    }

    // 3. body and claims into ordered, typed values
    let params = tool.parse_params(args, &claims)?;

    // 4. dispatch under the request deadline
    debug!(tool = %tool_name, params = params.len(), "dispatching");
    let access_token = bearer_token(headers);
    match tokio::time::timeout(timeout, tool.invoke(params, access_token.as_deref())).await {
        Ok(result) => result,
        Err(_) => Err(ServerError::DeadlineExceeded(timeout)),
    }
}

/// Access token forwarded to tools that call out on the caller's behalf
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(strip_bearer)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
