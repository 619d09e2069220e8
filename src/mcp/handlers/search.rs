//! `search` tool handler: returns both a human-readable
//! summary and the full structured result as an embedded resource in the
//! same response, since search results are consumed both by a human (read
//! the summary) and a follow-up tool call (parse the structured hits).

use super::common::{error_result, EmbeddedResource, McpCallResult, McpContent};
use crate::app_state::AppState;
use crate::core::types::{Resource, ResourceMetadata, SearchRequest, Tier};
use crate::error::PipelineError;
use crate::remote::search as remote_search;
use std::time::Instant;

pub async fn handle(state: &AppState, args: serde_json::Value) -> McpCallResult {
    let started = Instant::now();
    let result = run(state, args).await;
    let is_error = result.is_err();
    let response = result.unwrap_or_else(|e| error_result(&e));
    state
        .metrics
        .record_request(is_error, started.elapsed().as_millis() as u64);
    response
}

async fn run(state: &AppState, args: serde_json::Value) -> Result<McpCallResult, PipelineError> {
    let request: SearchRequest = serde_json::from_value(args)
        .map_err(|e| PipelineError::validation("body", format!("malformed search request: {e}")))?;
    if request.query.trim().is_empty() {
        return Err(PipelineError::validation("query", "must not be empty"));
    }

    let result = remote_search::search(&state.remote_client, &request).await?;

    let summary = if result.hits.is_empty() {
        format!("No results for \"{}\".", request.query)
    } else {
        let lines: Vec<String> = result
            .hits
            .iter()
            .take(10)
            .enumerate()
            .map(|(i, hit)| format!("{}. {} — {}\n   {}", i + 1, hit.title, hit.url, hit.snippet))
            .collect();
        format!("{} result(s) for \"{}\":\n\n{}", result.hits.len(), request.query, lines.join("\n"))
    };

    let structured = serde_json::to_string_pretty(&result)
        .map_err(|e| PipelineError::Protocol(format!("failed to serialize search result: {e}")))?;

    let now = chrono::Utc::now();
    let resource = Resource {
        uri: format!("pulse-crawl://search/{}", now.timestamp_millis()),
        name: format!("search:{}", request.query),
        mime_type: "application/json".to_string(),
        description: Some(format!("structured search results for \"{}\"", request.query)),
        text: structured,
        metadata: ResourceMetadata {
            source_strategy: "remote".to_string(),
            timestamp: now.to_rfc3339(),
            tier: Tier::Raw,
            extract_prompt: None,
            origin_url: request.query.clone(),
            clean: false,
        },
    };

    Ok(McpCallResult {
        content: vec![
            McpContent::Text { text: summary },
            McpContent::Resource {
                resource: EmbeddedResource {
                    uri: resource.uri,
                    name: resource.name,
                    mime_type: resource.mime_type,
                    description: resource.description,
                    text: resource.text,
                },
            },
        ],
        is_error: false,
    })
}
