//! Request validation.
//!
//! Validation happens once, at the handler boundary, and produces a single
//! `PipelineError::Validation` naming the offending field — it never panics
//! and never partially applies.

use crate::core::types::{BrowserAction, BrowserActionKind, CrawlRequest, MapRequest, ScrapeRequest};
use crate::error::{PipelineError, PipelineResult};

/// Normalizes `url` (prepends `https://` if no scheme is present) and checks
/// the result is absolute. Mirrors "protocol prepended if absent,
/// trimmed".
pub fn normalize_url(raw: &str) -> PipelineResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::validation("url", "must not be empty"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| PipelineError::validation("url", format!("not a valid absolute URL: {e}")))?;
    if parsed.host_str().is_none() {
        return Err(PipelineError::validation("url", "must be absolute (have a host)"));
    }
    Ok(parsed.to_string())
}

pub fn validate_scrape_request(request: &ScrapeRequest) -> PipelineResult<String> {
    let url = normalize_url(&request.url)?;

    if let Some(max_chars) = request.max_chars {
        if max_chars == 0 {
            return Err(PipelineError::validation("maxChars", "must be > 0 when provided"));
        }
    }

    for action in &request.actions {
        validate_action(action)?;
    }

    Ok(url)
}

pub fn validate_map_request(request: &MapRequest) -> PipelineResult<String> {
    let url = normalize_url(&request.url)?;
    if let Some(max_results) = request.max_results {
        if max_results == 0 {
            return Err(PipelineError::validation("maxResults", "must be > 0 when provided"));
        }
    }
    Ok(url)
}

/// Enforces the crawl tool's start/status/cancel dispatch contract:
/// exactly one of `url`/`jobId` must be present.
pub fn validate_crawl_request(request: &CrawlRequest) -> PipelineResult<()> {
    match (&request.url, &request.job_id) {
        (Some(_), Some(_)) => Err(PipelineError::validation(
            "url/jobId",
            "exactly one of url and jobId must be present, not both",
        )),
        (None, None) => Err(PipelineError::validation(
            "url/jobId",
            "exactly one of url and jobId must be present",
        )),
        _ => Ok(()),
    }
}

/// Field requirements per `BrowserActionKind` — the runtime half of the
/// flattened (no-`oneOf`) `BrowserAction` schema.
pub fn validate_action(action: &BrowserAction) -> PipelineResult<()> {
    let path = "actions[]";
    match action.kind {
        BrowserActionKind::Click | BrowserActionKind::WaitForSelector => {
            require(action.selector.is_some(), path, "selector is required")
        }
        BrowserActionKind::Write => {
            require(action.selector.is_some(), path, "selector is required")?;
            require(action.text.is_some(), path, "text is required")
        }
        BrowserActionKind::Press => require(action.key.is_some(), path, "key is required"),
        BrowserActionKind::Wait => require(action.milliseconds.is_some(), path, "milliseconds is required"),
        BrowserActionKind::Scroll => require(
            action.x.is_some() || action.y.is_some(),
            path,
            "at least one of x/y is required",
        ),
        BrowserActionKind::Screenshot | BrowserActionKind::Scrape => Ok(()),
    }
}

fn require(condition: bool, path: &str, rule: &str) -> PipelineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PipelineError::validation(path, rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn action(kind: BrowserActionKind) -> BrowserAction {
        BrowserAction {
            kind,
            selector: None,
            text: None,
            milliseconds: None,
            key: None,
            x: None,
            y: None,
            full_page: None,
        }
    }

    #[test]
    fn normalize_url_prepends_scheme_when_absent() {
        let url = normalize_url("example.com/path").unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.contains("example.com"));
    }

    #[test]
    fn normalize_url_passes_through_absolute_url() {
        let url = normalize_url("http://example.com/path").unwrap();
        assert_eq!(url, "http://example.com/path");
    }

    #[test]
    fn normalize_url_trims_whitespace() {
        let url = normalize_url("  example.com  ").unwrap();
        assert!(url.contains("example.com"));
    }

    #[test]
    fn normalize_url_rejects_empty_string() {
        let err = normalize_url("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn normalize_url_rejects_hostless_scheme() {
        let err = normalize_url("file:///etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn scrape_request_rejects_zero_max_chars() {
        let mut request = ScrapeRequest {
            url: "example.com".to_string(),
            ..ScrapeRequest::default()
        };
        request.max_chars = Some(0);
        let err = validate_scrape_request(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn scrape_request_accepts_valid_max_chars() {
        let mut request = ScrapeRequest {
            url: "example.com".to_string(),
            ..ScrapeRequest::default()
        };
        request.max_chars = Some(100);
        assert!(validate_scrape_request(&request).is_ok());
    }

    #[test]
    fn crawl_request_rejects_both_url_and_job_id() {
        let request = CrawlRequest {
            url: Some("example.com".to_string()),
            job_id: Some("abc".to_string()),
            ..CrawlRequest::default()
        };
        assert!(validate_crawl_request(&request).is_err());
    }

    #[test]
    fn crawl_request_rejects_neither_url_nor_job_id() {
        let request = CrawlRequest::default();
        assert!(validate_crawl_request(&request).is_err());
    }

    #[test]
    fn crawl_request_accepts_url_only() {
        let request = CrawlRequest {
            url: Some("example.com".to_string()),
            ..CrawlRequest::default()
        };
        assert!(validate_crawl_request(&request).is_ok());
    }

    #[test]
    fn crawl_request_accepts_job_id_only() {
        let request = CrawlRequest {
            job_id: Some("abc".to_string()),
            ..CrawlRequest::default()
        };
        assert!(validate_crawl_request(&request).is_ok());
    }

    #[test]
    fn click_requires_selector() {
        assert!(validate_action(&action(BrowserActionKind::Click)).is_err());
        let mut a = action(BrowserActionKind::Click);
        a.selector = Some("#btn".to_string());
        assert!(validate_action(&a).is_ok());
    }

    #[test]
    fn wait_for_selector_requires_selector() {
        assert!(validate_action(&action(BrowserActionKind::WaitForSelector)).is_err());
    }

    #[test]
    fn write_requires_selector_and_text() {
        let mut a = action(BrowserActionKind::Write);
        assert!(validate_action(&a).is_err());
        a.selector = Some("#input".to_string());
        assert!(validate_action(&a).is_err());
        a.text = Some("hello".to_string());
        assert!(validate_action(&a).is_ok());
    }

    #[test]
    fn press_requires_key() {
        assert!(validate_action(&action(BrowserActionKind::Press)).is_err());
        let mut a = action(BrowserActionKind::Press);
        a.key = Some("Enter".to_string());
        assert!(validate_action(&a).is_ok());
    }

    #[test]
    fn wait_requires_milliseconds() {
        assert!(validate_action(&action(BrowserActionKind::Wait)).is_err());
        let mut a = action(BrowserActionKind::Wait);
        a.milliseconds = Some(500);
        assert!(validate_action(&a).is_ok());
    }

    #[test]
    fn scroll_requires_x_or_y() {
        assert!(validate_action(&action(BrowserActionKind::Scroll)).is_err());
        let mut a = action(BrowserActionKind::Scroll);
        a.x = Some(0);
        assert!(validate_action(&a).is_ok());
        let mut b = action(BrowserActionKind::Scroll);
        b.y = Some(100);
        assert!(validate_action(&b).is_ok());
    }

    #[test]
    fn screenshot_and_scrape_need_nothing() {
        assert!(validate_action(&action(BrowserActionKind::Screenshot)).is_ok());
        assert!(validate_action(&action(BrowserActionKind::Scrape)).is_ok());
    }
}
