//! Process-wide application state: every field here is built once
//! at startup and shared read-only (behind `Arc`) for the life of the
//! process. Grounded on the existing `core::app_state::AppState`, whose
//! `http_client` / cache / config fields are kept, generalized from a single
//! search/scrape cache pair into the full strategy engine + resource cache +
//! extractor + metrics wiring this spec needs.

use crate::cache::{FilesystemCache, InFlightRegistry, MemoryCache, ResourceCache, Retention, SingleFlight};
use crate::config::{AppConfig, StorageBackendKind};
use crate::content::extract::{ChatCompletionExtractor, Extractor};
use crate::metrics::Collector;
use crate::mcp::handlers::scrape::RawArtifact;
use crate::remote::{RemoteClient, RemoteStrategy};
use crate::strategy::{LearnedStore, NativeFetcher, Strategy, StrategyEngine};
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
    pub strategy_engine: Arc<StrategyEngine>,
    pub learned_store: Arc<LearnedStore>,
    pub cache: Arc<dyn ResourceCache>,
    pub inflight: Arc<InFlightRegistry>,
    /// Single-flights the `raw` tier fetch per URL, independent of
    /// `inflight`'s per-(tier,extractPrompt) fingerprint locking, so two
    /// scrapes of the same URL that only differ in `extractPrompt` share one
    /// underlying fetch even when neither ever writes to `cache`.
    pub raw_fetch: Arc<SingleFlight<RawArtifact>>,
    pub extractor: Option<Arc<dyn Extractor>>,
    pub remote_client: RemoteClient,
    pub metrics: Arc<Collector>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage_backend", &matches!(self.config.storage_backend, StorageBackendKind::Memory))
            .field("extractor_enabled", &self.extractor.is_some())
            .finish()
    }
}

impl AppState {
    /// Build the full process-wide singleton set. Fails only if the
    /// filesystem cache backend can't create its root directory — every
    /// other failure (missing extractor config, empty learned store) is
    /// degrade-gracefully rather than fatal,
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let metrics = Arc::new(Collector::new());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let learned_store = Arc::new(LearnedStore::load(config.learned_store_path.clone()));

        let remote_client = RemoteClient::new(
            http_client.clone(),
            config.remote_base_url.clone(),
            config.remote_api_key.clone(),
        );

        let strategies: Vec<Arc<dyn Strategy>> = vec![
            Arc::new(NativeFetcher::new(http_client.clone())),
            Arc::new(RemoteStrategy::new(remote_client.clone())),
        ];

        let strategy_engine = Arc::new(StrategyEngine::new(
            strategies,
            learned_store.clone(),
            config.optimize_for,
        ));

        let retention = Retention {
            ttl_ms: config.retention.ttl_ms,
            max_size_bytes: config.retention.max_size_bytes,
            max_items: config.retention.max_items,
        };

        let cache: Arc<dyn ResourceCache> = match config.storage_backend {
            StorageBackendKind::Memory => Arc::new(MemoryCache::new(retention, metrics.clone())),
            StorageBackendKind::Filesystem => Arc::new(
                FilesystemCache::new(config.storage_root.clone(), retention, metrics.clone()).await?,
            ),
        };

        let extractor: Option<Arc<dyn Extractor>> =
            ChatCompletionExtractor::from_config(http_client.clone(), &config)
                .map(|e| Arc::new(e) as Arc<dyn Extractor>);

        Ok(Self {
            config,
            http_client,
            strategy_engine,
            learned_store,
            cache,
            inflight: Arc::new(InFlightRegistry::new()),
            raw_fetch: Arc::new(SingleFlight::new()),
            extractor,
            remote_client,
            metrics,
        })
    }
}
