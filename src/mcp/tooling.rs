//! The four advertised tool schemas.
//!
//! Hand-written rather than derived: the flattened `BrowserAction` shape
//! (no `oneOf`/`anyOf`/`allOf` anywhere, at any depth) is easiest to audit
//! directly in the literal. Grounded on this repo's existing
//! `tooling::tool_catalog()`, one `ToolCatalogEntry` per tool instead of the
//! prior eleven.

use crate::app_state::AppState;
use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub struct ToolCatalogEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

const BROWSER_ACTION_SCHEMA: fn() -> Value = || {
    json!({
        "type": "object",
        "properties": {
            "kind": {
                "type": "string",
                "enum": ["click", "write", "press", "wait", "waitForSelector", "scroll", "screenshot", "scrape"]
            },
            "selector": {"type": "string", "description": "CSS selector; required for click/write/waitForSelector"},
            "text": {"type": "string", "description": "Text to type; required for write"},
            "milliseconds": {"type": "integer", "minimum": 0, "description": "Required for wait"},
            "key": {"type": "string", "description": "Key name to press; required for press"},
            "x": {"type": "integer", "description": "Horizontal scroll offset"},
            "y": {"type": "integer", "description": "Vertical scroll offset"},
            "fullPage": {"type": "boolean", "description": "Capture the full page; for screenshot"}
        },
        "required": ["kind"]
    })
};

pub fn tool_catalog(extractor_enabled: bool) -> Vec<ToolCatalogEntry> {
    let mut scrape_properties = json!({
        "url": {"type": "string", "description": "Page URL; scheme is prepended if absent"},
        "timeoutMs": {"type": "integer", "minimum": 1},
        "maxChars": {"type": "integer", "minimum": 1},
        "startIndex": {"type": "integer", "minimum": 0, "default": 0},
        "resultHandling": {"type": "string", "enum": ["returnOnly", "saveAndReturn", "saveOnly"], "default": "returnOnly"},
        "forceRescrape": {"type": "boolean", "default": false},
        "cleanScrape": {"type": "boolean", "default": false},
        "actions": {"type": "array", "items": BROWSER_ACTION_SCHEMA()},
        "headers": {"type": "object", "additionalProperties": {"type": "string"}},
        "includeTags": {"type": "array", "items": {"type": "string"}},
        "excludeTags": {"type": "array", "items": {"type": "string"}},
        "formats": {
            "type": "array",
            "items": {"type": "string", "enum": ["markdown", "html", "rawHtml", "links", "screenshot"]}
        },
        "proxy": {"type": "string", "enum": ["auto", "basic", "stealth"], "default": "auto"},
        "maxAgeMs": {"type": "integer", "minimum": 0}
    });
    if extractor_enabled {
        scrape_properties["extractPrompt"] =
            json!({"type": "string", "description": "Natural-language query answered from the page content"});
    }

    vec![
        ToolCatalogEntry {
            name: "scrape",
            title: "Scrape a URL",
            description: "Fetch one page through the best available strategy for its domain, optionally cleaning the HTML and/or extracting an answer from it.",
            input_schema: json!({
                "type": "object",
                "properties": scrape_properties,
                "required": ["url"]
            }),
        },
        ToolCatalogEntry {
            name: "map",
            title: "Map a site",
            description: "List URLs discoverable from a site, optionally filtered by a search term, paginated with startIndex/maxResults.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "startIndex": {"type": "integer", "minimum": 0, "default": 0},
                    "maxResults": {"type": "integer", "minimum": 1},
                    "resultHandling": {"type": "string", "enum": ["returnOnly", "saveAndReturn", "saveOnly"], "default": "returnOnly"},
                    "search": {"type": "string"}
                },
                "required": ["url"]
            }),
        },
        ToolCatalogEntry {
            name: "crawl",
            title: "Crawl a site",
            description: "Start, poll, or cancel an asynchronous multi-page crawl. Provide url to start a job, jobId to poll or cancel one — exactly one of the two.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "jobId": {"type": "string"},
                    "cancel": {"type": "boolean", "default": false},
                    "maxPages": {"type": "integer", "minimum": 1},
                    "includePatterns": {"type": "array", "items": {"type": "string"}},
                    "excludePatterns": {"type": "array", "items": {"type": "string"}}
                }
            }),
        },
        ToolCatalogEntry {
            name: "search",
            title: "Search the web",
            description: "Query the web and return ranked hits across web/images/news sources.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 1},
                    "sources": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["web", "images", "news"]}
                    },
                    "timeBasedSearch": {
                        "type": "string",
                        "description": "qdr:{h,d,w,m,y} preset or cdr:1,cd_min:MM/DD/YYYY,cd_max:MM/DD/YYYY custom range"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

pub fn tool_catalog_for_state(state: &AppState) -> Vec<ToolCatalogEntry> {
    tool_catalog(state.extractor.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_no_union_combinators(value: &Value, path: &str) {
        match value {
            Value::Object(map) => {
                for key in ["oneOf", "anyOf", "allOf"] {
                    assert!(!map.contains_key(key), "{path} contains forbidden combinator {key}");
                }
                for (k, v) in map {
                    assert_no_union_combinators(v, &format!("{path}.{k}"));
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    assert_no_union_combinators(item, &format!("{path}[{i}]"));
                }
            }
            _ => {}
        }
    }

    #[test]
    fn no_schema_uses_a_union_combinator_at_any_depth() {
        for extractor_enabled in [false, true] {
            for tool in tool_catalog(extractor_enabled) {
                assert_no_union_combinators(&tool.input_schema, tool.name);
            }
        }
    }

    #[test]
    fn every_tool_has_a_non_empty_name_and_schema() {
        for tool in tool_catalog(true) {
            assert!(!tool.name.is_empty());
            assert!(tool.input_schema.get("type").is_some());
        }
    }

    #[test]
    fn scrape_schema_gains_extract_prompt_only_when_extractor_enabled() {
        let without = tool_catalog(false).into_iter().find(|t| t.name == "scrape").unwrap();
        let with = tool_catalog(true).into_iter().find(|t| t.name == "scrape").unwrap();
        assert!(without.input_schema["properties"].get("extractPrompt").is_none());
        assert!(with.input_schema["properties"].get("extractPrompt").is_some());
    }

    #[test]
    fn crawl_schema_has_no_required_fields() {
        let crawl = tool_catalog(true).into_iter().find(|t| t.name == "crawl").unwrap();
        assert!(crawl.input_schema.get("required").is_none());
    }
}
