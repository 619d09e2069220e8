//! Environment/file configuration resolution.
//!
//! A JSON file is tried first at a couple of candidate paths, then every
//! field has an env-var fallback, then a hardcoded default. Nothing here
//! ever panics on a missing or malformed file.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeFor {
    Cost,
    Speed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorProvider {
    ProviderA,
    ProviderB,
    ProviderBCompatible,
}

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub ttl_ms: u64,
    pub max_size_bytes: u64,
    pub max_items: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl_ms: 24 * 60 * 60 * 1000,
            max_size_bytes: 512 * 1024 * 1024,
            max_items: 50_000,
        }
    }
}

/// File-backed overrides, deserialized from `pulse-crawl.json` if present.
/// Every field is optional; absence falls through to the env-var / default
/// chain in `AppConfig::load`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct FileConfig {
    remote_api_key: Option<String>,
    remote_base_url: Option<String>,
    optimize_for: Option<String>,
    learned_store_path: Option<String>,
    storage_backend: Option<String>,
    storage_root: Option<String>,
    retention_ttl_ms: Option<u64>,
    retention_max_size_bytes: Option<u64>,
    retention_max_items: Option<usize>,
    extractor_provider: Option<String>,
    extractor_api_key: Option<String>,
    extractor_base_url: Option<String>,
    extractor_model: Option<String>,
    map_default_country: Option<String>,
    map_default_languages: Option<Vec<String>>,
    map_default_max_results: Option<usize>,
    port: Option<u16>,
    production: Option<bool>,
    allowed_hosts: Option<Vec<String>>,
    allowed_origins: Option<Vec<String>>,
    session_resumable: Option<bool>,
}

fn load_file_config() -> FileConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("pulse-crawl.json"),
            PathBuf::from("../pulse-crawl.json"),
        ];
        if let Ok(p) = std::env::var("PULSE_CRAWL_CONFIG") {
            v.insert(0, PathBuf::from(p));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<FileConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("pulse-crawl.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "pulse-crawl.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return FileConfig::default();
                }
            },
            Err(_) => continue,
        }
    }
    FileConfig::default()
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Process-wide, immutable once built at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub remote_api_key: Option<String>,
    pub remote_base_url: String,
    pub optimize_for: OptimizeFor,
    pub learned_store_path: PathBuf,
    pub storage_backend: StorageBackendKind,
    pub storage_root: PathBuf,
    pub retention: RetentionPolicy,
    pub extractor_provider: Option<ExtractorProvider>,
    pub extractor_api_key: Option<String>,
    pub extractor_base_url: Option<String>,
    pub extractor_model: Option<String>,
    pub map_default_country: String,
    pub map_default_languages: Vec<String>,
    pub map_default_max_results: usize,

    /// Remote-transport (HTTP-exposed variant) options. DNS rebinding
    /// protection and session-lifecycle enforcement are the transport
    /// collaborator's job, not the core's — these fields are read here and
    /// handed to it, never interpreted by the pipeline itself.
    pub port: u16,
    pub production: bool,
    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub session_resumable: bool,
}

impl AppConfig {
    pub fn load() -> Self {
        let file = load_file_config();

        let optimize_for = file
            .optimize_for
            .or_else(|| env_str("OPTIMIZE_FOR"))
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "speed" => OptimizeFor::Speed,
                _ => OptimizeFor::Cost,
            })
            .unwrap_or(OptimizeFor::Cost);

        let storage_backend = file
            .storage_backend
            .or_else(|| env_str("STORAGE_BACKEND"))
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "filesystem" | "fs" => StorageBackendKind::Filesystem,
                _ => StorageBackendKind::Memory,
            })
            .unwrap_or(StorageBackendKind::Memory);

        let storage_root = file
            .storage_root
            .or_else(|| env_str("STORAGE_ROOT"))
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_root);

        let learned_store_path = file
            .learned_store_path
            .or_else(|| env_str("LEARNED_STORE_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(default_learned_store_path);

        let extractor_provider = file
            .extractor_provider
            .or_else(|| env_str("EXTRACTOR_PROVIDER"))
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "provider-a" | "provider_a" => Some(ExtractorProvider::ProviderA),
                "provider-b" | "provider_b" => Some(ExtractorProvider::ProviderB),
                "provider-b-compatible" | "provider_b_compatible" => {
                    Some(ExtractorProvider::ProviderBCompatible)
                }
                _ => None,
            });

        Self {
            remote_api_key: file.remote_api_key.or_else(|| env_str("REMOTE_API_KEY")),
            remote_base_url: file
                .remote_base_url
                .or_else(|| env_str("REMOTE_BASE_URL"))
                .unwrap_or_else(|| "https://api.remote-scraping-service.example/v1".to_string()),
            optimize_for,
            learned_store_path,
            storage_backend,
            storage_root,
            retention: RetentionPolicy {
                ttl_ms: file
                    .retention_ttl_ms
                    .or_else(|| env_str("RETENTION_TTL_MS").and_then(|v| v.parse().ok()))
                    .unwrap_or_else(|| RetentionPolicy::default().ttl_ms),
                max_size_bytes: file
                    .retention_max_size_bytes
                    .or_else(|| env_str("RETENTION_MAX_SIZE_BYTES").and_then(|v| v.parse().ok()))
                    .unwrap_or_else(|| RetentionPolicy::default().max_size_bytes),
                max_items: file
                    .retention_max_items
                    .or_else(|| env_str("RETENTION_MAX_ITEMS").and_then(|v| v.parse().ok()))
                    .unwrap_or_else(|| RetentionPolicy::default().max_items),
            },
            extractor_provider,
            extractor_api_key: file
                .extractor_api_key
                .or_else(|| env_str("EXTRACTOR_API_KEY")),
            extractor_base_url: file
                .extractor_base_url
                .or_else(|| env_str("EXTRACTOR_BASE_URL")),
            extractor_model: file.extractor_model.or_else(|| env_str("EXTRACTOR_MODEL")),
            map_default_country: file
                .map_default_country
                .or_else(|| env_str("MAP_DEFAULT_COUNTRY"))
                .unwrap_or_else(|| "us".to_string()),
            map_default_languages: file.map_default_languages.unwrap_or_else(|| vec!["en".to_string()]),
            map_default_max_results: file
                .map_default_max_results
                .or_else(|| env_str("MAP_DEFAULT_MAX_RESULTS").and_then(|v| v.parse().ok()))
                .unwrap_or(100),

            port: file
                .port
                .or_else(|| env_str("PORT").and_then(|v| v.parse().ok()))
                .or_else(|| env_str("PULSE_CRAWL_PORT").and_then(|v| v.parse().ok()))
                .unwrap_or(5000),
            production: file
                .production
                .or_else(|| env_str("PRODUCTION").map(|v| v == "1" || v.eq_ignore_ascii_case("true")))
                .unwrap_or(false),
            allowed_hosts: file
                .allowed_hosts
                .or_else(|| env_str("ALLOWED_HOSTS").map(|v| split_csv(&v)))
                .unwrap_or_default(),
            allowed_origins: file
                .allowed_origins
                .or_else(|| env_str("ALLOWED_ORIGINS").map(|v| split_csv(&v)))
                .unwrap_or_default(),
            session_resumable: file
                .session_resumable
                .or_else(|| env_str("SESSION_RESUMABLE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")))
                .unwrap_or(true),
        }
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pulse-crawl")
        .join("cache")
}

fn default_learned_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pulse-crawl")
        .join("strategies.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empty_entries() {
        assert_eq!(
            split_csv("a.example.com, b.example.com ,,c.example.com"),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }

    #[test]
    fn split_csv_of_empty_string_is_empty() {
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn retention_policy_default_is_sane() {
        let r = RetentionPolicy::default();
        assert!(r.ttl_ms > 0);
        assert!(r.max_size_bytes > 0);
        assert!(r.max_items > 0);
    }
}
