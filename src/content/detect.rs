//! Content-type detection: MIME → URL suffix → body sniff.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Markdown,
    Pdf,
    Json,
    Xml,
    Text,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Markdown => "markdown",
            ContentType::Pdf => "pdf",
            ContentType::Json => "json",
            ContentType::Xml => "xml",
            ContentType::Text => "text",
        }
    }
}

/// Detect the content type of a fetched body. `reported_mime` is trusted
/// first if the fetcher supplied one.
pub fn detect_content_type(url: &str, reported_mime: Option<&str>, body: &str) -> ContentType {
    if let Some(mime) = reported_mime {
        if let Some(t) = from_mime(mime) {
            return t;
        }
    }
    if let Some(t) = from_suffix(url) {
        return t;
    }
    sniff_body(body)
}

fn from_mime(mime: &str) -> Option<ContentType> {
    let mime = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => Some(ContentType::Html),
        "text/markdown" => Some(ContentType::Markdown),
        "application/pdf" => Some(ContentType::Pdf),
        "application/json" => Some(ContentType::Json),
        "application/xml" | "text/xml" => Some(ContentType::Xml),
        "text/plain" => Some(ContentType::Text),
        _ => None,
    }
}

fn from_suffix(url: &str) -> Option<ContentType> {
    let path = url::Url::parse(url).ok().map(|u| u.path().to_ascii_lowercase());
    let path = path.unwrap_or_else(|| url.to_ascii_lowercase());
    if path.ends_with(".pdf") {
        Some(ContentType::Pdf)
    } else if path.ends_with(".json") {
        Some(ContentType::Json)
    } else if path.ends_with(".xml") {
        Some(ContentType::Xml)
    } else if path.ends_with(".md") || path.ends_with(".markdown") {
        Some(ContentType::Markdown)
    } else {
        None
    }
}

fn sniff_body(body: &str) -> ContentType {
    let head: String = body.trim_start().chars().take(512).collect();
    let lower = head.to_ascii_lowercase();
    if lower.starts_with("%pdf-") {
        ContentType::Pdf
    } else if head.starts_with('{') || head.starts_with('[') {
        ContentType::Json
    } else if lower.starts_with("<?xml") {
        ContentType::Xml
    } else if lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.contains("<body") {
        ContentType::Html
    } else {
        ContentType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusts_reported_mime() {
        assert_eq!(
            detect_content_type("https://x.test/a", Some("application/pdf"), "garbage"),
            ContentType::Pdf
        );
    }

    #[test]
    fn falls_back_to_suffix() {
        assert_eq!(
            detect_content_type("https://x.test/doc.json", None, "not really json"),
            ContentType::Json
        );
    }

    #[test]
    fn falls_back_to_sniff() {
        assert_eq!(
            detect_content_type("https://x.test/page", None, "<!DOCTYPE html><html></html>"),
            ContentType::Html
        );
    }
}
