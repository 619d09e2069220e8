//! `map` tool handler: lists discoverable URLs for a site,
//! paginated locally over the remote service's full result set.

use super::common::{error_result, with_pagination_hint, EmbeddedResource, McpCallResult, McpContent};
use crate::app_state::AppState;
use crate::core::types::{MapRequest, Resource, ResourceMetadata, ResultHandling, Tier};
use crate::error::PipelineError;
use crate::remote::map as remote_map;
use crate::validate::validate_map_request;
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
    let request: MapRequest = serde_json::from_value(args)
        .map_err(|e| PipelineError::validation("body", format!("malformed map request: {e}")))?;
    let url = validate_map_request(&request)?;

    let result = remote_map::map(&state.remote_client, &request).await?;

    let (start, max_results) = (request.start_index, request.max_results);
    let end = match max_results {
        Some(n) => (start + n).min(result.entries.len()),
        None => result.entries.len(),
    };
    let start = start.min(result.entries.len());
    let page = &result.entries[start..end];
    let truncated = end < result.entries.len();

    let body = serde_json::json!({
        "entries": page,
        "total": result.total,
    });
    let body_text = serde_json::to_string_pretty(&body)
        .map_err(|e| PipelineError::Protocol(format!("failed to serialize map result: {e}")))?;

    match request.result_handling {
        ResultHandling::ReturnOnly => {
            let text = with_pagination_hint(body_text, truncated, end);
            Ok(McpCallResult {
                content: vec![McpContent::Text { text }],
                is_error: false,
            })
        }
        ResultHandling::SaveAndReturn | ResultHandling::SaveOnly => {
            let resource = save_page(state, &url, &body_text, page.len()).await?;
            Ok(build_response(&request, &resource, truncated, end))
        }
    }
}

async fn save_page(
    state: &AppState,
    url: &str,
    body_text: &str,
    page_len: usize,
) -> Result<Resource, PipelineError> {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let now = chrono::Utc::now();
    let uri = format!("pulse-crawl://map/{host}/{}/page-{page_len}", now.timestamp_millis());

    let resource = Resource {
        uri,
        name: format!("map:{url}"),
        mime_type: "application/json".to_string(),
        description: Some(format!("site map for {url}")),
        text: body_text.to_string(),
        metadata: ResourceMetadata {
            source_strategy: "remote".to_string(),
            timestamp: now.to_rfc3339(),
            tier: Tier::Raw,
            extract_prompt: None,
            origin_url: url.to_string(),
            clean: false,
        },
    };
    let uri = state.cache.write(resource.clone()).await?;
    Ok(Resource { uri, ..resource })
}

fn build_response(request: &MapRequest, resource: &Resource, truncated: bool, next_index: usize) -> McpCallResult {
    match request.result_handling {
        ResultHandling::SaveAndReturn => {
            let text = with_pagination_hint(resource.text.clone(), truncated, next_index);
            McpCallResult {
                content: vec![McpContent::Resource {
                    resource: EmbeddedResource {
                        uri: resource.uri.clone(),
                        name: resource.name.clone(),
                        mime_type: resource.mime_type.clone(),
                        description: resource.description.clone(),
                        text,
                    },
                }],
                is_error: false,
            }
        }
        ResultHandling::SaveOnly => McpCallResult {
            content: vec![McpContent::ResourceLink {
                uri: resource.uri.clone(),
                name: resource.name.clone(),
                mime_type: resource.mime_type.clone(),
                description: resource.description.clone(),
            }],
            is_error: false,
        },
        ResultHandling::ReturnOnly => unreachable!("ReturnOnly never reaches build_response"),
    }
}
