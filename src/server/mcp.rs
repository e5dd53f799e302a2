//! MCP surface - JSON-RPC 2.0 over HTTP with session handling
//!
//! Sessions are opaque ids with an idle timeout; the server keeps no
//! per-session tool state, so an expired or unknown session id never fails
//! a request. Tool failures surface as successful JSON-RPC responses with
//! `isError: true`, per MCP convention; only protocol-level problems
//! (malformed JSON, unknown methods) become JSON-RPC errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::rpc_codes;
use crate::protocol::{
    Info, InitializeParams, InitializeResult, JsonRpcResponse, RequestId, ServerCapabilities,
    ToolsCallParams, ToolsCallResult, ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::server::AppState;
use crate::server::pipeline;

/// Header carrying the opaque session id
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Active MCP sessions keyed by id
pub struct SessionStore {
    sessions: DashMap<String, Instant>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create a store with the given idle timeout
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    /// Issue a fresh session id
    #[must_use]
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Instant::now());
        id
    }

    /// Record activity on a session, ignoring unknown ids
    pub fn touch(&self, id: &str) {
        if let Some(mut last_seen) = self.sessions.get_mut(id) {
            *last_seen = Instant::now();
        }
    }

    /// Drop sessions idle past the timeout; returns how many were removed
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, last_seen| last_seen.elapsed() < self.idle_timeout);
        before - self.sessions.len()
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Handle one JSON-RPC message posted to `/mcp`
pub async fn handle_message(state: &Arc<AppState>, headers: &HeaderMap, raw: &Value) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    if let Some(id) = &session_id {
        state.sessions.touch(id);
    }

    let Some(method) = raw.get("method").and_then(Value::as_str) else {
        let response =
            JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "missing method field");
        return with_session(
            (StatusCode::BAD_REQUEST, Json(response)).into_response(),
            session_id.as_deref(),
        );
    };

    // notifications carry no id and expect no body
    if method.starts_with("notifications/") {
        debug!(notification = %method, "acknowledging notification");
        return with_session(
            (StatusCode::ACCEPTED, Json(json!({}))).into_response(),
            session_id.as_deref(),
        );
    }

    let Some(id) = raw.get("id").cloned().and_then(parse_request_id) else {
        let response = JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "request is missing a valid id",
        );
        return with_session(
            (StatusCode::BAD_REQUEST, Json(response)).into_response(),
            session_id.as_deref(),
        );
    };
    let params = raw.get("params");

    match method {
        "initialize" => handle_initialize(state, id, params),
        "ping" => with_session(
            (StatusCode::OK, Json(JsonRpcResponse::success(id, json!({})))).into_response(),
            session_id.as_deref(),
        ),
        "tools/list" => with_session(
            handle_tools_list(state, id),
            session_id.as_deref(),
        ),
        "tools/call" => with_session(
            handle_tools_call(state, id, headers, params).await,
            session_id.as_deref(),
        ),
        other => {
            warn!(method = %other, "unknown MCP method");
            let response = JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            );
            with_session(
                (StatusCode::OK, Json(response)).into_response(),
                session_id.as_deref(),
            )
        }
    }
}

fn handle_initialize(state: &Arc<AppState>, id: RequestId, params: Option<&Value>) -> Response {
    let params: InitializeParams = params
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let client_version = params.protocol_version.as_deref().unwrap_or("2024-11-05");
    let negotiated = negotiate_version(client_version);
    debug!(client = %client_version, negotiated = %negotiated, "protocol version negotiation");

    let session_id = state.sessions.create();

    let result = InitializeResult {
        protocol_version: negotiated.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: Info {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: None,
    };

    let response = match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
    };
    with_session(
        (StatusCode::OK, Json(response)).into_response(),
        Some(&session_id),
    )
}

fn handle_tools_list(state: &Arc<AppState>, id: RequestId) -> Response {
    let toolset = state.toolsets.load();
    let mut tools: Vec<_> = toolset
        .tools()
        .values()
        .map(|tool| tool.mcp_manifest())
        .collect();
    tools.sort_by(|a, b| a.name.cmp(&b.name));

    let result = ToolsListResult {
        tools,
        next_cursor: None,
    };
    let response = match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn handle_tools_call(
    state: &Arc<AppState>,
    id: RequestId,
    headers: &HeaderMap,
    params: Option<&Value>,
) -> Response {
    let params: ToolsCallParams = match params.cloned().map(serde_json::from_value) {
        Some(Ok(parsed)) => parsed,
        Some(Err(e)) => {
            let response = JsonRpcResponse::error(
                Some(id),
                rpc_codes::INVALID_PARAMS,
                format!("invalid tools/call params: {e}"),
            );
            return (StatusCode::OK, Json(response)).into_response();
        }
        None => {
            let response = JsonRpcResponse::error(
                Some(id),
                rpc_codes::INVALID_PARAMS,
                "tools/call requires params",
            );
            return (StatusCode::OK, Json(response)).into_response();
        }
    };

    let args: Map<String, Value> = match params.arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            let response = JsonRpcResponse::error(
                Some(id),
                rpc_codes::INVALID_PARAMS,
                format!(
                    "invalid tools/call arguments: expected object, got {other}"
                ),
            );
            return (StatusCode::OK, Json(response)).into_response();
        }
    };

    let toolset = state.toolsets.load();
    let result = pipeline::invoke(
        &toolset,
        &params.name,
        headers,
        &args,
        state.request_timeout,
    )
    .await;

    // tool failures are isError results, not JSON-RPC errors
    let call_result = match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(text) => ToolsCallResult::text(text),
            Err(e) => ToolsCallResult::error(e.to_string()),
        },
        Err(e) => ToolsCallResult::error(e.to_string()),
    };

    let response = match serde_json::to_value(call_result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn parse_request_id(value: Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s)),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

/// Attach the session id header to a response
fn with_session(mut response: Response, session_id: Option<&str>) -> Response {
    if let Some(id) = session_id {
        if let Ok(value) = id.parse() {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_expire_after_idle_timeout() {
        let store = SessionStore::new(Duration::from_millis(0));
        let id = store.create();
        assert_eq!(store.len(), 1);
        // zero timeout: everything is idle immediately
        assert_eq!(store.sweep(), 1);
        assert!(store.is_empty());
        store.touch(&id); // unknown id after sweep, must not panic
    }

    #[test]
    fn touch_refreshes_known_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create();
        store.touch(&id);
        assert_eq!(store.sweep(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn request_id_accepts_string_and_number() {
        assert_eq!(
            parse_request_id(json!(7)),
            Some(RequestId::Number(7))
        );
        assert_eq!(
            parse_request_id(json!("abc")),
            Some(RequestId::String("abc".to_string()))
        );
        assert_eq!(parse_request_id(json!(null)), None);
        assert_eq!(parse_request_id(json!(1.5)), None);
    }
}
