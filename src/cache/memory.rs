//! In-memory LRU backend: fast, process-lifetime.
//!
//! Storage is a `moka::future::Cache` keyed by URI, giving TTL-based expiry
//! for free (`time_to_live` set from the retention policy). `maxSize` /
//! `maxItems` are enforced manually via an insertion-order index so both
//! knobs can be honored independently — moka's own capacity dimension can
//! only track one metric at a time.

use super::{scraped_uri, MultiTierUris, MultiTierWrite, Retention, ResourceCache};
use crate::core::types::{Fingerprint, Resource, ResourceMetadata, Tier};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::Collector;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Index {
    by_url: HashMap<String, Vec<String>>,
    by_fingerprint: HashMap<String, String>,
    order: VecDeque<String>,
    total_bytes: u64,
}

pub struct MemoryCache {
    store: moka::future::Cache<String, Resource>,
    index: Mutex<Index>,
    retention: Retention,
    metrics: Arc<Collector>,
}

impl MemoryCache {
    pub fn new(retention: Retention, metrics: Arc<Collector>) -> Self {
        let store = moka::future::Cache::builder()
            .time_to_live(Duration::from_millis(retention.ttl_ms))
            .build();
        Self {
            store,
            index: Mutex::new(Index::default()),
            retention,
            metrics,
        }
    }

    async fn insert_indexed(&self, resource: Resource) {
        let uri = resource.uri.clone();
        let url = resource.metadata.origin_url.clone();
        let bytes = resource.text.len() as u64;
        let fingerprint_key = fingerprint_key_for(&resource);

        self.store.insert(uri.clone(), resource).await;

        let mut index = self.index.lock().await;
        index.by_url.entry(url).or_default().push(uri.clone());
        if let Some(key) = fingerprint_key {
            index.by_fingerprint.insert(key, uri.clone());
        }
        index.order.push_back(uri.clone());
        index.total_bytes += bytes;
        self.metrics.record_cache_write(bytes);

        self.evict_if_needed(&mut index).await;
    }

    async fn evict_if_needed(&self, index: &mut Index) {
        while index.order.len() > self.retention.max_items
            || index.total_bytes > self.retention.max_size_bytes
        {
            let Some(victim_uri) = index.order.pop_front() else {
                break;
            };
            if let Some(victim) = self.store.get(&victim_uri).await {
                index.total_bytes = index.total_bytes.saturating_sub(victim.text.len() as u64);
                if let Some(uris) = index.by_url.get_mut(&victim.metadata.origin_url) {
                    uris.retain(|u| u != &victim_uri);
                }
                index.by_fingerprint.retain(|_, v| v != &victim_uri);
                self.metrics.record_cache_eviction(victim.text.len() as u64);
            }
            self.store.invalidate(&victim_uri).await;
        }
    }
}

fn fingerprint_key_for(resource: &Resource) -> Option<String> {
    Some(
        Fingerprint::new(
            &resource.metadata.origin_url,
            resource.metadata.extract_prompt.as_deref(),
            resource.metadata.clean,
            resource.metadata.tier,
        )
        .to_key(),
    )
}

#[async_trait]
impl ResourceCache for MemoryCache {
    async fn write(&self, resource: Resource) -> PipelineResult<String> {
        let uri = resource.uri.clone();
        self.insert_indexed(resource).await;
        Ok(uri)
    }

    async fn write_multi(&self, write: MultiTierWrite) -> PipelineResult<MultiTierUris> {
        let now = Utc::now();
        let mut uris = MultiTierUris::default();

        for (tier, text) in [
            (Tier::Raw, &write.raw),
            (Tier::Cleaned, &write.cleaned),
            (Tier::Extracted, &write.extracted),
        ] {
            let Some(text) = text else { continue };
            let uri = scraped_uri(&write.url, tier, now);
            let resource = Resource {
                uri: uri.clone(),
                name: write.url.clone(),
                mime_type: if tier == Tier::Raw { "text/html".to_string() } else { "text/markdown".to_string() },
                description: None,
                text: text.clone(),
                metadata: ResourceMetadata {
                    source_strategy: write.strategy.clone(),
                    timestamp: now.to_rfc3339(),
                    tier,
                    extract_prompt: if tier == Tier::Extracted { write.extract_prompt.clone() } else { None },
                    origin_url: write.url.clone(),
                    clean: match tier {
                        Tier::Raw => false,
                        Tier::Cleaned => true,
                        Tier::Extracted => write.clean_scrape,
                    },
                },
            };
            self.insert_indexed(resource).await;
            match tier {
                Tier::Raw => uris.raw = Some(uri),
                Tier::Cleaned => uris.cleaned = Some(uri),
                Tier::Extracted => uris.extracted = Some(uri),
            }
        }

        Ok(uris)
    }

    async fn read(&self, uri: &str) -> PipelineResult<Resource> {
        self.store
            .get(uri)
            .await
            .ok_or_else(|| PipelineError::Cache(format!("no resource at {uri}")))
    }

    async fn find_by_url(&self, url: &str) -> Vec<Resource> {
        let uris = {
            let index = self.index.lock().await;
            index.by_url.get(url).cloned().unwrap_or_default()
        };
        let mut out = Vec::new();
        for uri in uris {
            if let Some(r) = self.store.get(&uri).await {
                out.push(r);
            }
        }
        out
    }

    async fn find_by_url_and_extract(&self, url: &str, extract_prompt: Option<&str>) -> Vec<Resource> {
        self.find_by_url(url)
            .await
            .into_iter()
            .filter(|r| r.metadata.extract_prompt.as_deref() == extract_prompt)
            .collect()
    }

    async fn list(&self) -> Vec<Resource> {
        let uris: Vec<String> = {
            let index = self.index.lock().await;
            index.order.iter().cloned().collect()
        };
        let mut out = Vec::new();
        for uri in uris {
            if let Some(r) = self.store.get(&uri).await {
                out.push(r);
            }
        }
        out
    }

    async fn exists(&self, uri: &str) -> bool {
        self.store.get(uri).await.is_some()
    }

    async fn delete(&self, uri: &str) {
        if let Some(resource) = self.store.get(uri).await {
            let mut index = self.index.lock().await;
            index.order.retain(|u| u != uri);
            index.total_bytes = index.total_bytes.saturating_sub(resource.text.len() as u64);
            if let Some(uris) = index.by_url.get_mut(&resource.metadata.origin_url) {
                uris.retain(|u| u != uri);
            }
            index.by_fingerprint.retain(|_, v| v != uri);
        }
        self.store.invalidate(uri).await;
    }

    async fn lookup_fresh(&self, fingerprint: &Fingerprint, max_age_ms: Option<u64>) -> Option<Resource> {
        let uri = {
            let index = self.index.lock().await;
            index.by_fingerprint.get(&fingerprint.to_key()).cloned()
        };
        let uri = uri?;
        let resource = self.store.get(&uri).await?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&resource.metadata.timestamp)
            .ok()?
            .with_timezone(&Utc);
        if super::fresh_enough(timestamp, max_age_ms) {
            self.metrics.record_cache_hit();
            Some(resource)
        } else {
            self.metrics.record_cache_miss();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(retention: Retention) -> MemoryCache {
        MemoryCache::new(retention, Arc::new(Collector::new()))
    }

    fn generous_retention() -> Retention {
        Retention {
            ttl_ms: 60_000,
            max_size_bytes: 1_000_000,
            max_items: 1_000,
        }
    }

    #[tokio::test]
    async fn write_multi_persists_every_provided_tier() {
        let cache = cache(generous_retention());
        let uris = cache
            .write_multi(MultiTierWrite {
                url: "https://example.com/a".to_string(),
                raw: Some("<html></html>".to_string()),
                cleaned: Some("cleaned text".to_string()),
                extracted: None,
                extract_prompt: None,
                strategy: "native".to_string(),
                clean_scrape: false,
            })
            .await
            .unwrap();

        assert!(uris.raw.is_some());
        assert!(uris.cleaned.is_some());
        assert!(uris.extracted.is_none());
        assert!(cache.exists(uris.raw.as_ref().unwrap()).await);
        assert!(cache.exists(uris.cleaned.as_ref().unwrap()).await);
    }

    #[tokio::test]
    async fn lookup_fresh_finds_the_artifact_for_its_own_fingerprint() {
        let cache = cache(generous_retention());
        cache
            .write_multi(MultiTierWrite {
                url: "https://example.com/b".to_string(),
                raw: Some("<html></html>".to_string()),
                cleaned: None,
                extracted: None,
                extract_prompt: None,
                strategy: "native".to_string(),
                clean_scrape: false,
            })
            .await
            .unwrap();

        let fp = Fingerprint::new("https://example.com/b", None, false, Tier::Raw);
        let found = cache.lookup_fresh(&fp, None).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn lookup_fresh_does_not_cross_tiers() {
        let cache = cache(generous_retention());
        cache
            .write_multi(MultiTierWrite {
                url: "https://example.com/c".to_string(),
                raw: Some("<html></html>".to_string()),
                cleaned: None,
                extracted: None,
                extract_prompt: None,
                strategy: "native".to_string(),
                clean_scrape: false,
            })
            .await
            .unwrap();

        let cleaned_fp = Fingerprint::new("https://example.com/c", None, true, Tier::Cleaned);
        assert!(cache.lookup_fresh(&cleaned_fp, None).await.is_none());
    }

    #[tokio::test]
    async fn lookup_fresh_rejects_stale_artifacts() {
        let old = Utc::now() - chrono::Duration::milliseconds(10_000);
        assert!(!super::super::fresh_enough(old, Some(1_000)));
        assert!(super::super::fresh_enough(old, Some(60_000)));
    }

    #[tokio::test]
    async fn eviction_enforces_max_items() {
        let cache = cache(Retention {
            ttl_ms: 60_000,
            max_size_bytes: 1_000_000,
            max_items: 2,
        });

        for i in 0..5 {
            cache
                .write(Resource {
                    uri: format!("scraped://example.com/{i}"),
                    name: format!("page-{i}"),
                    mime_type: "text/html".to_string(),
                    description: None,
                    text: "x".repeat(10),
                    metadata: ResourceMetadata {
                        source_strategy: "native".to_string(),
                        timestamp: Utc::now().to_rfc3339(),
                        tier: Tier::Raw,
                        extract_prompt: None,
                        origin_url: format!("https://example.com/{i}"),
                        clean: false,
                    },
                })
                .await
                .unwrap();
        }

        assert_eq!(cache.list().await.len(), 2);
        // Oldest entries are evicted first.
        assert!(!cache.exists("scraped://example.com/0").await);
        assert!(cache.exists("scraped://example.com/4").await);
    }

    #[tokio::test]
    async fn eviction_enforces_max_size_bytes() {
        let cache = cache(Retention {
            ttl_ms: 60_000,
            max_size_bytes: 25,
            max_items: 1_000,
        });

        for i in 0..5 {
            cache
                .write(Resource {
                    uri: format!("scraped://example.com/{i}"),
                    name: format!("page-{i}"),
                    mime_type: "text/html".to_string(),
                    description: None,
                    text: "x".repeat(10),
                    metadata: ResourceMetadata {
                        source_strategy: "native".to_string(),
                        timestamp: Utc::now().to_rfc3339(),
                        tier: Tier::Raw,
                        extract_prompt: None,
                        origin_url: format!("https://example.com/{i}"),
                        clean: false,
                    },
                })
                .await
                .unwrap();
        }

        let remaining = cache.list().await;
        assert!(remaining.len() <= 2);
    }

    #[tokio::test]
    async fn delete_removes_from_index_and_store() {
        let cache = cache(generous_retention());
        let uri = cache
            .write(Resource {
                uri: "scraped://example.com/only".to_string(),
                name: "only".to_string(),
                mime_type: "text/html".to_string(),
                description: None,
                text: "content".to_string(),
                metadata: ResourceMetadata {
                    source_strategy: "native".to_string(),
                    timestamp: Utc::now().to_rfc3339(),
                    tier: Tier::Raw,
                    extract_prompt: None,
                    origin_url: "https://example.com/only".to_string(),
                    clean: false,
                },
            })
            .await
            .unwrap();

        assert!(cache.exists(&uri).await);
        cache.delete(&uri).await;
        assert!(!cache.exists(&uri).await);
        assert!(cache.find_by_url("https://example.com/only").await.is_empty());
    }
}
