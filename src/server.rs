//! HTTP API.
//!
//! Two views over the same engine: a tool-dispatch surface for agents and
//! a small REST surface for the screener UI. Both go through the tool
//! registry, so parameter validation and error mapping are shared.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | Registered tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool; result wrapped in `{ "result": ... }` |
//! | `GET`  | `/api/documents` | `list_documents` |
//! | `GET`  | `/api/stocks/{symbol}/documents` | `find_company_documents` |
//! | `GET`  | `/api/stocks/{symbol}/fundamentals` | `get_company_fundamentals` (`?document_pattern=`) |
//! | `GET`  | `/api/stocks/{symbol}/metrics` | `get_stock_metrics` (`?timeframe=`) |
//! | `GET`  | `/api/stocks/search` | `search_stocks` (`?pattern=&limit=`) |
//! | `GET`  | `/api/screen` | `screen_stocks_by_metrics` (criteria as query parameters) |
//! | `POST` | `/api/documents/analyze` | `analyze_document` |
//! | `*`    | `/mcp` | MCP Streamable HTTP |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "symbol must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `store_unavailable` (503), `tool_error` (500).

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::Engine;
use crate::error::{DocumentError, StoreError};
use crate::mcp::{streamable_http_service, McpBridge};
use crate::metrics::ScreenCriteria;
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    tools: Arc<ToolRegistry>,
}

/// Build the full router. Exposed so tests can serve it on any listener.
pub fn build_router(engine: Arc<Engine>, tools: Arc<ToolRegistry>) -> Router {
    let bridge = McpBridge::new(engine.clone(), tools.clone());

    let state = AppState { engine, tools };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/analyze", post(handle_analyze))
        .route("/api/stocks/{symbol}/documents", get(handle_find_documents))
        .route("/api/stocks/{symbol}/fundamentals", get(handle_fundamentals))
        .route("/api/stocks/{symbol}/metrics", get(handle_metrics))
        .route("/api/stocks/search", get(handle_search))
        .route("/api/screen", get(handle_screen))
        .nest_service("/mcp", streamable_http_service(bridge))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until Ctrl-C.
pub async fn run_server(engine: Arc<Engine>) -> anyhow::Result<()> {
    run_server_with_tools(engine, Arc::new(ToolRegistry::with_builtins())).await
}

/// Like [`run_server`], with a caller-supplied registry (e.g. built-ins plus custom tools).
pub async fn run_server_with_tools(
    engine: Arc<Engine>,
    tools: Arc<ToolRegistry>,
) -> anyhow::Result<()> {
    let bind_addr = engine.config().server.bind.clone();

    for t in tools.tools() {
        tracing::debug!(tool = t.name(), builtin = t.is_builtin(), "tool registered");
    }

    let app = build_router(engine, tools);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening (HTTP API + MCP at /mcp)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

/// Map a tool failure to a status code, preferring typed errors over message text.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);

    if let Some(doc_err) = err.downcast_ref::<DocumentError>() {
        let status = match doc_err.code() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            "timeout" => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        return AppError::new(status, doc_err.code(), message);
    }
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        return match store_err {
            StoreError::NotFound(_) => not_found(message),
            StoreError::Unavailable(_) => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
            }
        };
    }

    let text = err.to_string();
    if text.contains("not found") {
        not_found(message)
    } else if text.contains("must not be empty") || text.contains("invalid") {
        bad_request(message)
    } else if text.contains("timed out") {
        AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", message)
    } else {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
    }
}

/// Validate and run one tool, returning its bare result.
async fn dispatch(state: &AppState, name: &str, params: Value) -> Result<Value, AppError> {
    let tool = state
        .tools
        .find(name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let ctx = ToolContext::new(state.engine.clone());
    let result = tool
        .execute(params, &ctx)
        .await
        .map_err(|e| classify_tool_error(name, e))?;

    tracing::debug!(tool = name, "tool call served");
    Ok(result)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.engine.list_documents().len(),
    })
}

// ============ Tool dispatch ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let result = dispatch(&state, &name, params).await?;
    Ok(Json(json!({ "result": result })))
}

// ============ REST ============

async fn handle_list_documents(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    dispatch(&state, "list_documents", json!({})).await.map(Json)
}

async fn handle_find_documents(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, AppError> {
    dispatch(&state, "find_company_documents", json!({ "symbol": symbol }))
        .await
        .map(Json)
}

#[derive(Deserialize)]
struct FundamentalsQuery {
    document_pattern: Option<String>,
}

async fn handle_fundamentals(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<FundamentalsQuery>,
) -> Result<Json<Value>, AppError> {
    let mut params = json!({ "symbol": symbol });
    if let Some(pattern) = query.document_pattern {
        params["document_pattern"] = Value::String(pattern);
    }
    dispatch(&state, "get_company_fundamentals", params)
        .await
        .map(Json)
}

#[derive(Deserialize)]
struct MetricsQuery {
    timeframe: Option<String>,
}

async fn handle_metrics(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, AppError> {
    let mut params = json!({ "symbol": symbol });
    if let Some(timeframe) = query.timeframe {
        params["timeframe"] = Value::String(timeframe);
    }
    dispatch(&state, "get_stock_metrics", params).await.map(Json)
}

#[derive(Deserialize)]
struct SearchQuery {
    pattern: Option<String>,
    limit: Option<u64>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let mut params = json!({ "pattern": query.pattern.unwrap_or_default() });
    if let Some(limit) = query.limit {
        params["limit"] = json!(limit);
    }
    dispatch(&state, "search_stocks", params).await.map(Json)
}

async fn handle_screen(
    State(state): State<AppState>,
    query: Result<Query<ScreenCriteria>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(criteria) =
        query.map_err(|e| bad_request(format!("invalid criteria: {}", e.body_text())))?;
    let criteria = serde_json::to_value(&criteria).map_err(|e| bad_request(e.to_string()))?;
    dispatch(&state, "screen_stocks_by_metrics", json!({ "criteria": criteria }))
        .await
        .map(Json)
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(params): Json<Value>,
) -> Result<Json<Value>, AppError> {
    dispatch(&state, "analyze_document", params).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use std::path::PathBuf;

    #[test]
    fn typed_errors_pick_status() {
        let e = classify_tool_error(
            "analyze_document",
            DocumentError::NotFound("X.pdf".into()).into(),
        );
        assert_eq!(e.status, StatusCode::NOT_FOUND);

        let e = classify_tool_error(
            "analyze_document",
            DocumentError::Extraction(ExtractionError::Timeout {
                path: PathBuf::from("X.pdf"),
                secs: 30,
            })
            .into(),
        );
        assert_eq!(e.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(e.code, "timeout");

        let e = classify_tool_error(
            "get_stock_metrics",
            StoreError::Unavailable("down".into()).into(),
        );
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn untyped_errors_fall_back_to_message_text() {
        let e = classify_tool_error("x", anyhow::anyhow!("symbol must not be empty"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        let e = classify_tool_error("x", anyhow::anyhow!("boom"));
        assert_eq!(e.code, "tool_error");
    }
}
