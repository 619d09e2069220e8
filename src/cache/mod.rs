//! Multi-tier content-addressed resource cache.
//!
//! Grounded on the existing `AppState.scrape_cache: moka::future::Cache<String,
//! ScrapeResponse>` single-tier TTL cache, generalized into a fingerprint-keyed,
//! multi-tier cache behind a pluggable backend (`memory` / `filesystem`), with
//! per-fingerprint in-flight deduplication (`inflight`) implementing the
//! at-most-once concurrent build guarantee the pipeline requires.

pub mod filesystem;
pub mod inflight;
pub mod memory;

use crate::core::types::{Fingerprint, Resource, Tier};
use crate::error::PipelineResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use filesystem::FilesystemCache;
pub use inflight::{InFlightRegistry, SingleFlight};
pub use memory::MemoryCache;

#[derive(Debug, Clone, Default)]
pub struct MultiTierWrite {
    pub url: String,
    pub raw: Option<String>,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
    pub extract_prompt: Option<String>,
    pub strategy: String,
    /// The request's actual `cleanScrape` flag. Only meaningful for the
    /// `extracted` tier's fingerprint: `raw` is always fingerprinted
    /// `clean=false` and `cleaned` always `clean=true`, but `extracted` is
    /// genuinely keyed on whether it was extracted from the raw or cleaned
    /// base, so it must carry the real flag rather than infer one from tier.
    pub clean_scrape: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MultiTierUris {
    pub raw: Option<String>,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
}

/// Recognized retention knobs: all three are clamped, never
/// exceeded, by every backend.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub ttl_ms: u64,
    pub max_size_bytes: u64,
    pub max_items: usize,
}

#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// Persist a single resource (used by `map`/`crawl`, whose URIs follow
    /// their own scheme rather than the scrape tiered layout).
    async fn write(&self, resource: Resource) -> PipelineResult<String>;

    /// Persist every tier produced in one scrape pass atomically: readers
    /// either see all of them or none.
    async fn write_multi(&self, write: MultiTierWrite) -> PipelineResult<MultiTierUris>;

    async fn read(&self, uri: &str) -> PipelineResult<Resource>;
    async fn find_by_url(&self, url: &str) -> Vec<Resource>;
    async fn find_by_url_and_extract(&self, url: &str, extract_prompt: Option<&str>) -> Vec<Resource>;
    async fn list(&self) -> Vec<Resource>;
    async fn exists(&self, uri: &str) -> bool;
    async fn delete(&self, uri: &str);

    /// Look up a still-fresh (within `max_age_ms`) artifact for `fingerprint`'s
    /// own tier (spec: "`maxAge` applies to the tier being served").
    async fn lookup_fresh(&self, fingerprint: &Fingerprint, max_age_ms: Option<u64>) -> Option<Resource>;
}

/// `scraped://<host>/<path>_<tier>_<ISO-timestamp>`. Tier is folded
/// into the opaque suffix rather than a lossy reuse of `<path>` so that the
/// three tiers of one URL never collide.
pub fn scraped_uri(url: &str, tier: Tier, at: DateTime<Utc>) -> String {
    let parsed = url::Url::parse(url).ok();
    let host = parsed.as_ref().and_then(|u| u.host_str()).unwrap_or("unknown").to_string();
    let path_raw = parsed.as_ref().map(|u| u.path()).unwrap_or("/");
    let path = if path_raw.trim_matches('/').is_empty() {
        "root".to_string()
    } else {
        path_raw.trim_matches('/').replace('/', "_")
    };
    format!("scraped://{host}/{path}_{}_{}", tier.as_str(), at.to_rfc3339())
}

pub fn fresh_enough(timestamp: DateTime<Utc>, max_age_ms: Option<u64>) -> bool {
    match max_age_ms {
        None => true,
        Some(max_age) => {
            let age = Utc::now().signed_duration_since(timestamp);
            age.num_milliseconds() >= 0 && (age.num_milliseconds() as u64) <= max_age
        }
    }
}
