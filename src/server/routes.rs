//! HTTP router and handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{ServerError, rpc_codes};
use crate::protocol::JsonRpcResponse;
use crate::server::{AppState, mcp, pipeline};

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/tool/{name}/", get(manifest_handler))
        .route("/api/tool/{name}/invoke", post(invoke_handler))
        .route("/mcp", post(mcp_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /healthz - readiness probe
async fn healthz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let toolset = state.toolsets.load();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": toolset.tools().len(),
    }))
}

/// GET /api/tool/{name}/ - single-tool manifest
async fn manifest_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let toolset = state.toolsets.load();
    match toolset.tool(&name) {
        Some(tool) => match serde_json::to_value(tool.manifest()) {
            Ok(manifest) => {
                let mut tools = Map::new();
                tools.insert(name, manifest);
                Json(json!({ "tools": tools })).into_response()
            }
            Err(e) => error_response(&ServerError::from(e)),
        },
        None => error_response(&ServerError::UnknownTool(name)),
    }
}

/// POST /api/tool/{name}/invoke - run the invocation pipeline
async fn invoke_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _inflight = state.inflight.acquire().await;

    let args: Map<String, Value> = if body.is_empty() {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return error_response(&ServerError::BadRequest(format!(
                    "request body must be a JSON object, got {}",
                    json_kind(&other)
                )));
            }
            Err(e) => {
                return error_response(&ServerError::BadRequest(format!(
                    "request body is not valid JSON: {e}"
                )));
            }
        }
    };

    let toolset = state.toolsets.load();
    match pipeline::invoke(&toolset, &name, &headers, &args, state.request_timeout).await {
        Ok(result) => {
            debug!(tool = %name, "invocation succeeded");
            Json(json!({ "result": result })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// POST /mcp - JSON-RPC endpoint
async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _inflight = state.inflight.acquire().await;

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let response = JsonRpcResponse::error(
                None,
                rpc_codes::PARSE_ERROR,
                format!("invalid JSON: {e}"),
            );
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    mcp::handle_message(&state, &headers, &raw).await
}

/// Map a pipeline error onto the REST error envelope
fn error_response(error: &ServerError) -> Response {
    (
        error.status_code(),
        Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
