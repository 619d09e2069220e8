//! HTML → Markdown cleaning.
//!
//! Grounded on the existing `rust_scraper::clean` multi-pass pipeline
//! (preprocess → readability pass → heuristic main-content extraction →
//! best-of selection by word count → whole-document fallback), trimmed of
//! domain-specific special-casing (mdBook, GitHub-blob rewriting) that has
//! no counterpart in this spec. Cleaning is a pure function of
//! `(html, options)`: no clock reads, no randomness, no network calls.

use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use select::{
    document::Document,
    predicate::{Attr, Name, Predicate},
};
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

/// Tags always dropped before any extraction pass runs — scripts, styles,
/// and structural chrome that is never main content.
const ALWAYS_STRIPPED: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "form", "button", "svg", "iframe",
];

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).expect("static tag pattern")
}

fn self_closing_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*/?>")).expect("static tag pattern")
}

fn strip_tags(html: &str, tags: &[&str]) -> String {
    let mut out = html.to_string();
    for tag in tags {
        out = tag_regex(tag).replace_all(&out, "").to_string();
        out = self_closing_regex(tag).replace_all(&out, "").to_string();
    }
    out
}

fn restrict_to_tags(html: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return html.to_string();
    }
    let doc = Document::from(html);
    let mut kept = String::new();
    for tag in tags {
        for node in doc.find(Name(tag.as_str())) {
            kept.push_str(&node.html());
            kept.push('\n');
        }
    }
    if kept.trim().is_empty() {
        html.to_string()
    } else {
        kept
    }
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

static BLANK_RUN: OnceLock<Regex> = OnceLock::new();

fn post_clean_text(text: &str) -> String {
    let blank_run = BLANK_RUN.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"));
    let collapsed = blank_run.replace_all(text, "\n\n");
    collapsed
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Heuristic main-content extraction via `article`/`main`/`[role=main]`
/// selection — the fallback when readability's own heuristics miss.
fn heuristic_main_extraction(html: &str) -> String {
    let doc = Document::from(html);
    let pred = Name("article")
        .or(Name("main"))
        .or(Attr("role", "main"));
    let mut combined = String::new();
    for node in doc.find(pred) {
        combined.push_str(&node.text());
        combined.push('\n');
    }
    combined
}

/// Clean `html` into semantic Markdown, honoring `opts.include_tags` /
/// `opts.exclude_tags`. Deterministic: identical input + options always
/// produce identical output.
pub fn clean_html(html: &str, base_url: &str, opts: &CleanOptions) -> PipelineResult<String> {
    if html.trim().is_empty() {
        return Ok(String::new());
    }

    let base = Url::parse(base_url)
        .map_err(|e| PipelineError::Content(format!("invalid base URL for cleaning: {e}")))?;

    let exclude: Vec<&str> = ALWAYS_STRIPPED
        .iter()
        .copied()
        .chain(opts.exclude_tags.iter().map(|s| s.as_str()))
        .collect();
    let preprocessed = strip_tags(html, &exclude);
    let scoped = restrict_to_tags(&preprocessed, &opts.include_tags);

    let readability_text = match readability::extractor::extract(&mut scoped.as_bytes(), &base) {
        Ok(product) => post_clean_text(&html2md::parse_html(&product.content)),
        Err(_) => String::new(),
    };

    let heuristic_text = post_clean_text(&heuristic_main_extraction(&scoped));

    let rt_words = count_words(&readability_text);
    let ht_words = count_words(&heuristic_text);

    let chosen = if rt_words == 0 && ht_words > 0 {
        heuristic_text
    } else if ht_words == 0 && rt_words > 0 {
        readability_text
    } else if ht_words > rt_words.saturating_add(20) {
        heuristic_text
    } else if rt_words > 0 {
        readability_text
    } else {
        post_clean_text(&html2md::parse_html(&scoped))
    };

    if chosen.trim().len() < 80 {
        let whole = post_clean_text(&html2md::parse_html(&scoped));
        if whole.len() > chosen.len() {
            return Ok(whole);
        }
    }

    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head><script>evil()</script></head>
        <body>
          <nav>Home | About</nav>
          <article>
            <h1>Title</h1>
            <p>This is the first paragraph of real content with enough words to win heuristic scoring easily.</p>
            <p>And a second paragraph with even more words describing the subject matter in detail for the reader.</p>
          </article>
          <footer>Copyright 2024</footer>
        </body></html>
    "#;

    #[test]
    fn strips_scripts_and_nav() {
        let out = clean_html(SAMPLE, "https://example.com/", &CleanOptions::default()).unwrap();
        assert!(!out.contains("evil()"));
        assert!(!out.to_lowercase().contains("home | about"));
        assert!(out.contains("first paragraph"));
    }

    #[test]
    fn is_deterministic() {
        let opts = CleanOptions::default();
        let a = clean_html(SAMPLE, "https://example.com/", &opts).unwrap();
        let b = clean_html(SAMPLE, "https://example.com/", &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn passthrough_for_empty_input() {
        let out = clean_html("", "https://example.com/", &CleanOptions::default()).unwrap();
        assert_eq!(out, "");
    }
}
