//! Filesystem-backed `ResourceCache`: durable across restarts.
//!
//! Layout: `<root>/<host>/<path-slug>/<tier>_<timestamp>.json`, one file per
//! resource holding the full `Resource` (text + metadata) as JSON. Writes go
//! to a `.tmp` sibling and are renamed into place, mirroring this repo's existing
//! learned-store persistence pattern (`strategy::learned_store::persist`) so
//! a crash mid-write never leaves a half-written resource visible.

use super::{MultiTierUris, MultiTierWrite, Retention, ResourceCache};
use crate::core::types::{Fingerprint, Resource, ResourceMetadata, Tier};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::Collector;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Index {
    by_url: HashMap<String, Vec<String>>,
    by_fingerprint: HashMap<String, String>,
    order: Vec<String>,
    total_bytes: u64,
}

pub struct FilesystemCache {
    root: PathBuf,
    index: Mutex<Index>,
    retention: Retention,
    metrics: Arc<Collector>,
}

impl FilesystemCache {
    pub async fn new(root: PathBuf, retention: Retention, metrics: Arc<Collector>) -> PipelineResult<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PipelineError::Cache(format!("creating cache root {}: {e}", root.display())))?;
        let mut index = Index::default();
        rebuild_index(&root, &mut index).await;
        Ok(Self {
            root,
            index: Mutex::new(index),
            retention,
            metrics,
        })
    }

    fn path_for(&self, uri: &str) -> PathBuf {
        self.root.join(slug_for_uri(uri))
    }

    async fn write_resource(&self, resource: Resource) -> PipelineResult<String> {
        let uri = resource.uri.clone();
        let path = self.path_for(&uri);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Cache(format!("creating cache dir: {e}")))?;
        }
        let json = serde_json::to_vec_pretty(&resource)
            .map_err(|e| PipelineError::Cache(format!("serializing resource: {e}")))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| PipelineError::Cache(format!("writing cache file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::Cache(format!("renaming cache file: {e}")))?;

        let bytes = resource.text.len() as u64;
        let fingerprint_key = Fingerprint::new(
            &resource.metadata.origin_url,
            resource.metadata.extract_prompt.as_deref(),
            resource.metadata.clean,
            resource.metadata.tier,
        )
        .to_key();

        let mut index = self.index.lock().await;
        index
            .by_url
            .entry(resource.metadata.origin_url.clone())
            .or_default()
            .push(uri.clone());
        index.by_fingerprint.insert(fingerprint_key, uri.clone());
        index.order.push(uri.clone());
        index.total_bytes += bytes;
        self.metrics.record_cache_write(bytes);
        self.evict_if_needed(&mut index).await;

        Ok(uri)
    }

    async fn evict_if_needed(&self, index: &mut Index) {
        while index.order.len() > self.retention.max_items
            || index.total_bytes > self.retention.max_size_bytes
        {
            if index.order.is_empty() {
                break;
            }
            let victim_uri = index.order.remove(0);
            let path = self.path_for(&victim_uri);
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if let Ok(resource) = serde_json::from_slice::<Resource>(&bytes) {
                    index.total_bytes = index.total_bytes.saturating_sub(resource.text.len() as u64);
                    if let Some(uris) = index.by_url.get_mut(&resource.metadata.origin_url) {
                        uris.retain(|u| u != &victim_uri);
                    }
                    index.by_fingerprint.retain(|_, v| v != &victim_uri);
                    self.metrics.record_cache_eviction(resource.text.len() as u64);
                }
            }
            let _ = tokio::fs::remove_file(&path).await;
        }
    }

    async fn read_from_disk(&self, uri: &str) -> Option<Resource> {
        let path = self.path_for(uri);
        let bytes = tokio::fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

fn slug_for_uri(uri: &str) -> PathBuf {
    let cleaned = uri.replace("scraped://", "").replace("://", "_");
    let parts: Vec<&str> = cleaned.splitn(2, '/').collect();
    match parts.as_slice() {
        [host, rest] => PathBuf::from(host).join(format!("{}.json", rest.replace('/', "_"))),
        [only] => PathBuf::from(format!("{}.json", only)),
        _ => PathBuf::from("unknown.json"),
    }
}

async fn rebuild_index(root: &Path, index: &mut Index) {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(resource) = serde_json::from_slice::<Resource>(&bytes) else {
                continue;
            };
            let bytes_len = resource.text.len() as u64;
            let fingerprint_key = Fingerprint::new(
                &resource.metadata.origin_url,
                resource.metadata.extract_prompt.as_deref(),
                resource.metadata.clean,
                resource.metadata.tier,
            )
            .to_key();
            index
                .by_url
                .entry(resource.metadata.origin_url.clone())
                .or_default()
                .push(resource.uri.clone());
            index.by_fingerprint.insert(fingerprint_key, resource.uri.clone());
            index.order.push(resource.uri.clone());
            index.total_bytes += bytes_len;
        }
    }
}

#[async_trait]
impl ResourceCache for FilesystemCache {
    async fn write(&self, resource: Resource) -> PipelineResult<String> {
        self.write_resource(resource).await
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
            let uri = super::scraped_uri(&write.url, tier, now);
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
            self.write_resource(resource).await?;
            match tier {
                Tier::Raw => uris.raw = Some(uri),
                Tier::Cleaned => uris.cleaned = Some(uri),
                Tier::Extracted => uris.extracted = Some(uri),
            }
        }

        Ok(uris)
    }

    async fn read(&self, uri: &str) -> PipelineResult<Resource> {
        self.read_from_disk(uri)
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
            if let Some(r) = self.read_from_disk(&uri).await {
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
            index.order.clone()
        };
        let mut out = Vec::new();
        for uri in uris {
            if let Some(r) = self.read_from_disk(&uri).await {
                out.push(r);
            }
        }
        out
    }

    async fn exists(&self, uri: &str) -> bool {
        tokio::fs::metadata(self.path_for(uri)).await.is_ok()
    }

    async fn delete(&self, uri: &str) {
        if let Some(resource) = self.read_from_disk(uri).await {
            let mut index = self.index.lock().await;
            index.order.retain(|u| u != uri);
            index.total_bytes = index.total_bytes.saturating_sub(resource.text.len() as u64);
            if let Some(uris) = index.by_url.get_mut(&resource.metadata.origin_url) {
                uris.retain(|u| u != uri);
            }
            index.by_fingerprint.retain(|_, v| v != uri);
        }
        let _ = tokio::fs::remove_file(self.path_for(uri)).await;
    }

    async fn lookup_fresh(&self, fingerprint: &Fingerprint, max_age_ms: Option<u64>) -> Option<Resource> {
        let uri = {
            let index = self.index.lock().await;
            index.by_fingerprint.get(&fingerprint.to_key()).cloned()
        };
        let uri = uri?;
        let resource = self.read_from_disk(&uri).await?;
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

    fn temp_root(label: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("fs_cache_test_{label}_{}_{}", std::process::id(), id))
    }

    fn generous_retention() -> Retention {
        Retention {
            ttl_ms: 60_000,
            max_size_bytes: 1_000_000,
            max_items: 1_000,
        }
    }

    fn resource(uri: &str, url: &str, tier: Tier) -> Resource {
        Resource {
            uri: uri.to_string(),
            name: url.to_string(),
            mime_type: "text/html".to_string(),
            description: None,
            text: "hello world".to_string(),
            metadata: ResourceMetadata {
                source_strategy: "native".to_string(),
                timestamp: Utc::now().to_rfc3339(),
                tier,
                extract_prompt: None,
                origin_url: url.to_string(),
                clean: tier != Tier::Raw,
            },
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_disk() {
        let root = temp_root("roundtrip");
        let cache = FilesystemCache::new(root.clone(), generous_retention(), Arc::new(Collector::new()))
            .await
            .unwrap();

        let uri = cache
            .write(resource("scraped://example.com/a_raw_x", "https://example.com/a", Tier::Raw))
            .await
            .unwrap();
        let read_back = cache.read(&uri).await.unwrap();
        assert_eq!(read_back.text, "hello world");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn rebuild_index_recovers_state_across_restarts() {
        let root = temp_root("restart");
        {
            let cache = FilesystemCache::new(root.clone(), generous_retention(), Arc::new(Collector::new()))
                .await
                .unwrap();
            cache
                .write(resource("scraped://example.com/b_raw_x", "https://example.com/b", Tier::Raw))
                .await
                .unwrap();
        }

        let reopened = FilesystemCache::new(root.clone(), generous_retention(), Arc::new(Collector::new()))
            .await
            .unwrap();
        let found = reopened.find_by_url("https://example.com/b").await;
        assert_eq!(found.len(), 1);

        let fp = Fingerprint::new("https://example.com/b", None, false, Tier::Raw);
        assert!(reopened.lookup_fresh(&fp, None).await.is_some());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn delete_removes_file_and_index_entries() {
        let root = temp_root("delete");
        let cache = FilesystemCache::new(root.clone(), generous_retention(), Arc::new(Collector::new()))
            .await
            .unwrap();

        let uri = cache
            .write(resource("scraped://example.com/c_raw_x", "https://example.com/c", Tier::Raw))
            .await
            .unwrap();
        assert!(cache.exists(&uri).await);
        cache.delete(&uri).await;
        assert!(!cache.exists(&uri).await);
        assert!(cache.find_by_url("https://example.com/c").await.is_empty());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn eviction_enforces_max_items_on_disk() {
        let root = temp_root("evict");
        let cache = FilesystemCache::new(
            root.clone(),
            Retention {
                ttl_ms: 60_000,
                max_size_bytes: 1_000_000,
                max_items: 2,
            },
            Arc::new(Collector::new()),
        )
        .await
        .unwrap();

        for i in 0..5 {
            cache
                .write(resource(
                    &format!("scraped://example.com/d{i}_raw_x"),
                    &format!("https://example.com/d{i}"),
                    Tier::Raw,
                ))
                .await
                .unwrap();
        }

        assert_eq!(cache.list().await.len(), 2);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
