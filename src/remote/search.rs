//! `search` tool → remote service `/search` endpoint.

use super::client::RemoteClient;
use crate::core::types::{SearchHit, SearchRequest, SearchResult, SearchSourceKind};
use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_based_search: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSearchHit {
    url: String,
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct RemoteSearchResponse {
    results: Vec<RemoteSearchHit>,
}

fn source_str(kind: SearchSourceKind) -> &'static str {
    match kind {
        SearchSourceKind::Web => "web",
        SearchSourceKind::Images => "images",
        SearchSourceKind::News => "news",
    }
}

fn parse_category(s: Option<String>) -> Option<SearchSourceKind> {
    match s.as_deref() {
        Some("web") => Some(SearchSourceKind::Web),
        Some("images") => Some(SearchSourceKind::Images),
        Some("news") => Some(SearchSourceKind::News),
        _ => None,
    }
}

pub async fn search(client: &RemoteClient, request: &SearchRequest) -> PipelineResult<SearchResult> {
    let remote_request = RemoteSearchRequest {
        query: &request.query,
        limit: request.limit,
        sources: request.sources.iter().copied().map(source_str).collect(),
        time_based_search: request.time_based_search.as_deref(),
    };

    let response: RemoteSearchResponse = client.post_json("search", &remote_request).await?;

    let hits = response
        .results
        .into_iter()
        .map(|h| SearchHit {
            url: h.url,
            title: h.title,
            snippet: h.snippet,
            category: parse_category(h.category),
        })
        .collect();

    Ok(SearchResult { hits })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_str_round_trips_through_parse_category() {
        for kind in [SearchSourceKind::Web, SearchSourceKind::Images, SearchSourceKind::News] {
            let s = source_str(kind);
            assert_eq!(parse_category(Some(s.to_string())), Some(kind));
        }
    }

    #[test]
    fn parse_category_is_none_for_unrecognized_values() {
        assert_eq!(parse_category(Some("unknown".to_string())), None);
        assert_eq!(parse_category(None), None);
    }
}
