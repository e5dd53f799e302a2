//! Shared fixtures for the integration suite
//!
//! Every scenario runs against an in-memory SQLite source so the suite is
//! hermetic: the single pooled connection owns the database for the
//! lifetime of the tool set.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::Value;

use toolshed::config::{ToolSetHandle, ToolsFile, resolve};
use toolshed::registry::Registry;
use toolshed::server::mcp::SessionStore;
use toolshed::server::routes::create_router;
use toolshed::server::AppState;
use toolshed::sources::sqlite::SqliteSource;

/// Tools document used by most scenarios
pub const USERS_DOC: &str = r"
sources:
  my-sqlite:
    kind: sqlite
    database: ':memory:'
authServices:
  my-google-auth:
    kind: google
    clientId: test-client-id
    jwksUri: 'http://127.0.0.1:1/certs'
tools:
  my-tool-by-id:
    kind: sqlite-sql
    source: my-sqlite
    description: Look up one user by id.
    statement: 'SELECT id, name FROM users WHERE id = ?'
    parameters:
      - {name: id, type: integer, description: user id}
  my-broken-tool:
    kind: sqlite-sql
    source: my-sqlite
    description: Malformed statement.
    statement: 'SELEC 1;'
  my-auth-tool:
    kind: sqlite-sql
    source: my-sqlite
    description: Rows for the verified caller.
    statement: 'SELECT id, name FROM users WHERE name = ?'
    parameters:
      - name: email
        type: string
        description: verified email claim
        authServices:
          - {name: my-google-auth, field: email}
  my-auth-required-tool:
    kind: sqlite-sql
    source: my-sqlite
    description: Gated liveness query.
    statement: 'SELECT 1 AS one'
    authRequired: [my-google-auth]
";

/// Resolve a document, seed the users fixture, and wrap it in a router
pub async fn setup_app(doc: &str) -> (Router, Arc<AppState>) {
    setup_app_with_timeout(doc, Duration::from_secs(5)).await
}

/// Same as [`setup_app`] with an explicit dispatch deadline
pub async fn setup_app_with_timeout(doc: &str, request_timeout: Duration) -> (Router, Arc<AppState>) {
    let registry = Registry::builtin().expect("builtin registry");
    let file = ToolsFile::parse(doc).expect("tools document");
    let toolset = resolve(&registry, &file).await.expect("resolve");

    if let Some(source) = toolset.sources().get("my-sqlite") {
        let sqlite = source
            .as_any()
            .downcast_ref::<SqliteSource>()
            .expect("sqlite source");
        seed_users(sqlite.pool()).await;
    }

    let state = Arc::new(AppState {
        toolsets: Arc::new(ToolSetHandle::new(toolset)),
        sessions: SessionStore::new(Duration::from_secs(30 * 60)),
        inflight: Arc::new(tokio::sync::Semaphore::new(100)),
        request_timeout,
    });
    (create_router(Arc::clone(&state)), state)
}

async fn seed_users(pool: &sqlx::SqlitePool) {
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(pool)
        .await
        .expect("create users table");
    sqlx::query("INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Jane'), (3, 'Sid'), (4, NULL)")
        .execute(pool)
        .await
        .expect("seed users");
}

/// Issue one request against the router
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    use tower::util::ServiceExt;
    app.clone().oneshot(request).await.expect("infallible")
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Build a JSON POST request
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
