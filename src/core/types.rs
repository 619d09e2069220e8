//! Core data model shared by the tool surface, strategy engine, content
//! pipeline, and resource cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Result handling / proxy / formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultHandling {
    ReturnOnly,
    SaveAndReturn,
    SaveOnly,
}

impl Default for ResultHandling {
    fn default() -> Self {
        ResultHandling::ReturnOnly
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    Auto,
    Basic,
    Stealth,
}

impl Default for ProxyMode {
    fn default() -> Self {
        ProxyMode::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Html,
    RawHtml,
    Links,
    Screenshot,
}

/// A single browser action. The public JSON Schema for this type carries no
/// union combinator: `kind` is a required enum discriminator and every other
/// field is optional, with runtime validation enforcing which fields a given
/// `kind` actually requires (see `validate::validate_action`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserAction {
    pub kind: BrowserActionKind,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub milliseconds: Option<u64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
    #[serde(default)]
    pub full_page: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BrowserActionKind {
    Click,
    Write,
    Press,
    Wait,
    WaitForSelector,
    Scroll,
    Screenshot,
    Scrape,
}

// ---------------------------------------------------------------------------
// Scrape request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeRequest {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub max_chars: Option<usize>,
    pub start_index: usize,
    pub result_handling: ResultHandling,
    pub force_rescrape: bool,
    pub clean_scrape: bool,
    pub extract_prompt: Option<String>,
    pub actions: Vec<BrowserAction>,
    pub headers: HashMap<String, String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub formats: Vec<OutputFormat>,
    pub proxy: ProxyMode,
    pub max_age_ms: Option<u64>,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: None,
            max_chars: None,
            start_index: 0,
            result_handling: ResultHandling::default(),
            force_rescrape: false,
            clean_scrape: false,
            extract_prompt: None,
            actions: Vec::new(),
            headers: HashMap::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            formats: Vec::new(),
            proxy: ProxyMode::default(),
            max_age_ms: None,
        }
    }
}

/// The content tier a request is ultimately asking for. Computed from
/// `extract_prompt` / `clean_scrape`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Cleaned,
    Extracted,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Cleaned => "cleaned",
            Tier::Extracted => "extracted",
        }
    }
}

impl ScrapeRequest {
    /// Tier requested: extracted if a prompt is present,
    /// else cleaned if `clean_scrape`, else raw.
    pub fn requested_tier(&self) -> Tier {
        if self.extract_prompt.is_some() {
            Tier::Extracted
        } else if self.clean_scrape {
            Tier::Cleaned
        } else {
            Tier::Raw
        }
    }
}

/// The fingerprint key that identifies a reusable artifact for one user
/// intent: (normalized URL, extractPrompt, clean-flag, tier). Two requests
/// differing only in fields that don't affect this tuple share an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub url: String,
    pub extract_prompt: Option<String>,
    pub clean: bool,
    pub tier: Tier,
}

impl Fingerprint {
    pub fn new(url: &str, extract_prompt: Option<&str>, clean: bool, tier: Tier) -> Self {
        Self {
            url: url.to_string(),
            extract_prompt: extract_prompt.map(|s| s.to_string()),
            clean,
            tier,
        }
    }

    /// Stable string encoding, used as the cache's internal map key and as
    /// the basis of on-disk directory names.
    pub fn to_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.url,
            self.extract_prompt.as_deref().unwrap_or(""),
            self.clean,
            self.tier.as_str()
        )
    }

    /// The fingerprint for the `raw` tier of the same URL — used to look up
    /// or share a base artifact regardless of what the caller ultimately asked for.
    pub fn raw_sibling(&self) -> Fingerprint {
        Fingerprint {
            url: self.url.clone(),
            extract_prompt: None,
            clean: false,
            tier: Tier::Raw,
        }
    }

    pub fn cleaned_sibling(&self) -> Fingerprint {
        Fingerprint {
            url: self.url.clone(),
            extract_prompt: None,
            clean: true,
            tier: Tier::Cleaned,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttemptDiagnostic {
    pub strategy: String,
    pub succeeded: bool,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub url: String,
    pub strategy_used: String,
    pub raw: Option<String>,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
    pub content_type: String,
    pub diagnostics: Vec<StrategyAttemptDiagnostic>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub source_strategy: String,
    pub timestamp: String,
    pub tier: Tier,
    pub extract_prompt: Option<String>,
    pub origin_url: String,
    /// The `cleanScrape` the artifact was produced under — part of the
    /// fingerprint tuple, so it must be the request's actual value rather
    /// than inferred from `tier` (an `extracted` artifact can come from
    /// either a raw or a cleaned base, and the two are not interchangeable).
    pub clean: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
    pub description: Option<String>,
    pub text: String,
    pub metadata: ResourceMetadata,
}

// ---------------------------------------------------------------------------
// Strategy descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    JavascriptRender,
    AntiBotBypass,
    PdfParse,
    Screenshot,
    RawHtml,
    BrowserActions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyClass {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyDescriptor {
    pub name: &'static str,
    pub capabilities: &'static [Capability],
    pub cost_class: CostClass,
    pub latency_class: LatencyClass,
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapRequest {
    pub url: String,
    pub start_index: usize,
    pub max_results: Option<usize>,
    pub result_handling: ResultHandling,
    pub search: Option<String>,
}

impl Default for MapRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            start_index: 0,
            max_results: None,
            result_handling: ResultHandling::default(),
            search: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResult {
    pub entries: Vec<MapEntry>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlRequest {
    pub url: Option<String>,
    pub job_id: Option<String>,
    pub cancel: bool,
    pub max_pages: Option<usize>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    Scraping,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    pub completed: usize,
    pub total_estimate: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPageResult {
    pub url: String,
    pub markdown: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub job_id: String,
    pub state: CrawlState,
    pub progress: CrawlProgress,
    pub results: Vec<CrawlPageResult>,
    pub cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSourceKind {
    Web,
    Images,
    News,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub sources: Vec<SearchSourceKind>,
    /// `qdr:{h,d,w,m,y}` preset or `cdr:1,cd_min:MM/DD/YYYY,cd_max:MM/DD/YYYY`
    /// custom form, passed through unchanged to the remote service.
    pub time_based_search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub category: Option<SearchSourceKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
}
