//! `map` tool → remote service `/map` endpoint.

use super::client::RemoteClient;
use crate::core::types::{MapEntry, MapRequest, MapResult};
use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};

/// `maxResults` is deliberately not part of this request: it is the
/// tool's own pagination cap (§4.1), applied locally by the handler over
/// the full discovered set. Forwarding it here would have the remote
/// service return a single already-truncated page, making `total` equal
/// the page size instead of the true site total and breaking pagination
/// across calls.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteMapRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteMapEntry {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteMapResponse {
    links: Vec<RemoteMapEntry>,
}

pub async fn map(client: &RemoteClient, request: &MapRequest) -> PipelineResult<MapResult> {
    let remote_request = RemoteMapRequest {
        url: &request.url,
        search: request.search.as_deref(),
    };

    let response: RemoteMapResponse = client.post_json("map", &remote_request).await?;

    let entries: Vec<MapEntry> = response
        .links
        .into_iter()
        .map(|e| MapEntry {
            url: e.url,
            title: e.title,
            description: e.description,
        })
        .collect();
    let total = entries.len();

    Ok(MapResult { entries, total })
}
