//! `crawl` tool → remote service `/crawl` endpoints.
//!
//! The remote service models a crawl as an async job: starting one returns a
//! `jobId` immediately, and subsequent polls with that id return progress
//! plus whatever page results have completed since the last poll (`cursor`
//! keeps the handler from re-returning pages it already emitted).

use super::client::RemoteClient;
use crate::core::types::{CrawlPageResult, CrawlProgress, CrawlRequest, CrawlState};
use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartCrawlRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_pages: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_patterns: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_patterns: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartCrawlResponse {
    job_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollCrawlResponse {
    state: RemoteCrawlState,
    completed: usize,
    #[serde(default)]
    total_estimate: Option<usize>,
    #[serde(default)]
    pages: Vec<RemotePage>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RemoteCrawlState {
    Scraping,
    Completed,
    Failed,
    Cancelled,
}

impl From<RemoteCrawlState> for CrawlState {
    fn from(value: RemoteCrawlState) -> Self {
        match value {
            RemoteCrawlState::Scraping => CrawlState::Scraping,
            RemoteCrawlState::Completed => CrawlState::Completed,
            RemoteCrawlState::Failed => CrawlState::Failed,
            RemoteCrawlState::Cancelled => CrawlState::Cancelled,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePage {
    url: String,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub struct PollOutcome {
    pub state: CrawlState,
    pub progress: CrawlProgress,
    pub pages: Vec<CrawlPageResult>,
    pub cursor: Option<String>,
}

pub async fn start(client: &RemoteClient, request: &CrawlRequest) -> PipelineResult<String> {
    let url = request.url.as_deref().unwrap_or_default();
    let body = StartCrawlRequest {
        url,
        max_pages: request.max_pages,
        include_patterns: &request.include_patterns,
        exclude_patterns: &request.exclude_patterns,
    };
    let response: StartCrawlResponse = client.post_json("crawl", &body).await?;
    Ok(response.job_id)
}

pub async fn poll(client: &RemoteClient, job_id: &str, cursor: Option<&str>) -> PipelineResult<PollOutcome> {
    let path = match cursor {
        Some(c) => format!("crawl/{job_id}?cursor={c}"),
        None => format!("crawl/{job_id}"),
    };
    let response: PollCrawlResponse = client.get_json(&path).await?;

    Ok(PollOutcome {
        state: response.state.into(),
        progress: CrawlProgress {
            completed: response.completed,
            total_estimate: response.total_estimate,
        },
        pages: response
            .pages
            .into_iter()
            .map(|p| CrawlPageResult {
                url: p.url,
                markdown: p.markdown,
                title: p.title,
            })
            .collect(),
        cursor: response.cursor,
    })
}

pub async fn cancel(client: &RemoteClient, job_id: &str) -> PipelineResult<()> {
    #[derive(Serialize)]
    struct Empty {}
    let _: serde_json::Value = client
        .post_json(&format!("crawl/{job_id}/cancel"), &Empty {})
        .await?;
    Ok(())
}
