//! One handler module per tool, each exposing a uniform
//! `handle(&AppState, serde_json::Value) -> McpCallResult` entry point so
//! `mcp::http`/`mcp::stdio` can dispatch on tool name without a match per
//! response shape.

pub mod common;
pub mod crawl;
pub mod map;
pub mod scrape;
pub mod search;
