//! HTTP surface for the tool catalog and tool-call dispatch, plus metrics
//! export. Grounded on this repo's existing `mcp::http::{list_tools,
//! call_tool}`, generalized from this repo's existing per-tool
//! `tool_registry` indirection to a direct `tooling::tool_catalog` lookup
//! since this crate advertises a fixed four-tool surface rather than a
//! dynamically renamed/aliased one.

use super::handlers;
use super::handlers::common::McpCallResult;
use super::tooling::{tool_catalog_for_state, ToolCatalogEntry};
use crate::app_state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<ToolCatalogEntry> for McpTool {
    fn from(entry: ToolCatalogEntry) -> Self {
        McpTool {
            name: entry.name.to_string(),
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            input_schema: entry.input_schema,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn list_tools_for_state(state: &AppState) -> McpToolsResponse {
    McpToolsResponse {
        tools: tool_catalog_for_state(state).into_iter().map(McpTool::from).collect(),
    }
}

pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<McpToolsResponse> {
    Json(list_tools_for_state(state.as_ref()))
}

pub async fn call_tool_inner(state: &AppState, request: McpCallRequest) -> Result<McpCallResult, (StatusCode, ErrorResponse)> {
    info!("MCP tool call: {}", request.name);
    match request.name.as_str() {
        "scrape" => Ok(handlers::scrape::handle(state, request.arguments).await),
        "map" => Ok(handlers::map::handle(state, request.arguments).await),
        "crawl" => Ok(handlers::crawl::handle(state, request.arguments).await),
        "search" => Ok(handlers::search::handle(state, request.arguments).await),
        other => Err((
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                error: format!("unknown tool: {other}"),
            },
        )),
    }
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResult>, (StatusCode, Json<ErrorResponse>)> {
    call_tool_inner(state.as_ref(), request)
        .await
        .map(Json)
        .map_err(|(status, err)| (status, Json(err)))
}

pub async fn metrics_text(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render_text()
}

pub async fn metrics_json(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.metrics.snapshot()))
}
