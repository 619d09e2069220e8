//! `crawl` tool handler: dispatches to start / poll /
//! cancel based on which of `url`/`jobId`/`cancel` the caller supplied.

use super::common::{error_result, EmbeddedResource, McpCallResult, McpContent};
use crate::app_state::AppState;
use crate::core::types::{CrawlRequest, CrawlState, Resource, ResourceMetadata, Tier};
use crate::error::PipelineError;
use crate::remote::crawl as remote_crawl;
use crate::validate::validate_crawl_request;
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
    let request: CrawlRequest = serde_json::from_value(args)
        .map_err(|e| PipelineError::validation("body", format!("malformed crawl request: {e}")))?;
    validate_crawl_request(&request)?;

    if let Some(job_id) = &request.job_id {
        if request.cancel {
            remote_crawl::cancel(&state.remote_client, job_id).await?;
            return Ok(McpCallResult {
                content: vec![McpContent::Text {
                    text: serde_json::json!({"jobId": job_id, "state": "cancelled"}).to_string(),
                }],
                is_error: false,
            });
        }
        return poll(state, job_id).await;
    }

    let url = request.url.as_deref().expect("validate_crawl_request enforces exactly one of url/jobId");
    let job_id = remote_crawl::start(&state.remote_client, &request).await?;
    Ok(McpCallResult {
        content: vec![McpContent::Text {
            text: serde_json::json!({"jobId": job_id, "url": url, "state": "scraping"}).to_string(),
        }],
        is_error: false,
    })
}

async fn poll(state: &AppState, job_id: &str) -> Result<McpCallResult, PipelineError> {
    let outcome = remote_crawl::poll(&state.remote_client, job_id, None).await?;

    let body = serde_json::json!({
        "jobId": job_id,
        "state": outcome.state,
        "progress": outcome.progress,
        "pages": outcome.pages,
        "cursor": outcome.cursor,
    });
    let body_text = serde_json::to_string_pretty(&body)
        .map_err(|e| PipelineError::Protocol(format!("failed to serialize crawl result: {e}")))?;

    if outcome.state == CrawlState::Scraping {
        return Ok(McpCallResult {
            content: vec![McpContent::Text { text: body_text }],
            is_error: false,
        });
    }

    let now = chrono::Utc::now();
    let resource = Resource {
        uri: format!("pulse-crawl://crawl/results/{}", now.timestamp_millis()),
        name: format!("crawl:{job_id}"),
        mime_type: "application/json".to_string(),
        description: Some(format!("crawl results for job {job_id}")),
        text: body_text,
        metadata: ResourceMetadata {
            source_strategy: "remote".to_string(),
            timestamp: now.to_rfc3339(),
            tier: Tier::Raw,
            extract_prompt: None,
            origin_url: job_id.to_string(),
            clean: false,
        },
    };
    let uri = state.cache.write(resource.clone()).await?;

    Ok(McpCallResult {
        content: vec![McpContent::Resource {
            resource: EmbeddedResource {
                uri,
                name: resource.name,
                mime_type: resource.mime_type,
                description: resource.description,
                text: resource.text,
            },
        }],
        is_error: false,
    })
}
