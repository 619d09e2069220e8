//! Shared response-shaping helpers used by every tool handler. Grounded on
//! the existing `McpContent`/`McpCallResponse` pair (`mcp::http`),
//! generalized to the three content kinds (text / embedded resource /
//! resource link) instead of this repo's existing text-only `McpContent`.

use crate::core::types::Resource;
use crate::error::PipelineError;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum McpContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "resource")]
    Resource { resource: EmbeddedResource },
    #[serde(rename = "resource_link")]
    ResourceLink {
        uri: String,
        name: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct EmbeddedResource {
    pub uri: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct McpCallResult {
    pub content: Vec<McpContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

pub fn text_result(text: impl Into<String>) -> McpCallResult {
    McpCallResult {
        content: vec![McpContent::Text { text: text.into() }],
        is_error: false,
    }
}

pub fn resource_result(resource: &Resource) -> McpCallResult {
    McpCallResult {
        content: vec![McpContent::Resource {
            resource: EmbeddedResource {
                uri: resource.uri.clone(),
                name: resource.name.clone(),
                mime_type: resource.mime_type.clone(),
                description: resource.description.clone(),
                text: resource.text.clone(),
            },
        }],
        is_error: false,
    }
}

pub fn resource_link_result(resource: &Resource) -> McpCallResult {
    McpCallResult {
        content: vec![McpContent::ResourceLink {
            uri: resource.uri.clone(),
            name: resource.name.clone(),
            mime_type: resource.mime_type.clone(),
            description: resource.description.clone(),
        }],
        is_error: false,
    }
}

/// Every handler error funnels through here rather than propagating past
/// the MCP boundary — tool calls always return `200` with `isError` set,
/// never an HTTP error status.
pub fn error_result(err: &PipelineError) -> McpCallResult {
    let body = json!({
        "error": {
            "kind": err.kind().as_str(),
            "message": err.to_string(),
            "retryable": err.retryable(),
            "retryAfterMs": err.retry_after_ms(),
        }
    });
    McpCallResult {
        content: vec![McpContent::Text {
            text: serde_json::to_string(&body).unwrap_or_else(|_| err.to_string()),
        }],
        is_error: true,
    }
}

/// Appends a pagination hint when `body` was truncated to `max_chars`
/// starting at `start_index`.
pub fn paginate(body: &str, start_index: usize, max_chars: Option<usize>) -> (String, bool) {
    let chars: Vec<char> = body.chars().collect();
    let start = start_index.min(chars.len());
    let end = match max_chars {
        Some(max) => (start + max).min(chars.len()),
        None => chars.len(),
    };
    let slice: String = chars[start..end].iter().collect();
    let truncated = end < chars.len();
    (slice, truncated)
}

pub fn with_pagination_hint(slice: String, truncated: bool, next_index: usize) -> String {
    if truncated {
        format!("{slice}\n\n[truncated; next startIndex: {next_index}]")
    } else {
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_returns_whole_body_without_max_chars() {
        let (slice, truncated) = paginate("hello world", 0, None);
        assert_eq!(slice, "hello world");
        assert!(!truncated);
    }

    #[test]
    fn paginate_truncates_at_max_chars() {
        let (slice, truncated) = paginate("hello world", 0, Some(5));
        assert_eq!(slice, "hello");
        assert!(truncated);
    }

    #[test]
    fn paginate_respects_start_index() {
        let (slice, truncated) = paginate("hello world", 6, None);
        assert_eq!(slice, "world");
        assert!(!truncated);
    }

    #[test]
    fn paginate_clamps_start_index_past_the_end() {
        let (slice, truncated) = paginate("hi", 100, None);
        assert_eq!(slice, "");
        assert!(!truncated);
    }

    #[test]
    fn paginate_counts_by_char_not_byte() {
        let body = "héllo wörld";
        let (slice, truncated) = paginate(body, 0, Some(5));
        assert_eq!(slice.chars().count(), 5);
        assert!(truncated);
    }

    #[test]
    fn with_pagination_hint_appends_only_when_truncated() {
        let untruncated = with_pagination_hint("body".to_string(), false, 10);
        assert_eq!(untruncated, "body");
        let truncated = with_pagination_hint("body".to_string(), true, 10);
        assert!(truncated.contains("next startIndex: 10"));
    }

    #[test]
    fn error_result_marks_is_error_and_carries_kind() {
        let err = PipelineError::validation("url", "must not be empty");
        let result = error_result(&err);
        assert!(result.is_error);
        let McpContent::Text { text } = &result.content[0] else {
            panic!("expected text content");
        };
        assert!(text.contains("validation"));
    }
}
