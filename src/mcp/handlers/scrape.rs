//! `scrape` tool handler: the full acquisition pipeline.

use super::common::{error_result, paginate, with_pagination_hint, McpCallResult, McpContent, EmbeddedResource};
use crate::app_state::AppState;
use crate::cache::MultiTierWrite;
use crate::content::{clean_html, detect_content_type, CleanOptions, ContentType};
use crate::core::types::{Fingerprint, Resource, ResourceMetadata, ResultHandling, ScrapeRequest, Tier};
use crate::error::PipelineError;
use crate::strategy::FetchOptions;
use crate::validate::validate_scrape_request;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub async fn handle(state: &AppState, args: serde_json::Value) -> McpCallResult {
    let started = Instant::now();
    let result = run(state, args).await;
    let is_error = result.is_err();
    let response = result.unwrap_or_else(|e| error_result(&e));
    state
        .metrics
        .record_request(is_error, started.elapsed().as_millis() as u64);
    response
}

async fn run(state: &AppState, args: serde_json::Value) -> Result<McpCallResult, PipelineError> {
    let request: ScrapeRequest = serde_json::from_value(args)
        .map_err(|e| PipelineError::validation("body", format!("malformed scrape request: {e}")))?;

    let url = validate_scrape_request(&request)?;
    let tier = request.requested_tier();
    let fingerprint = Fingerprint::new(
        &url,
        request.extract_prompt.as_deref(),
        request.clean_scrape,
        tier,
    );

    let lookup_allowed = !request.force_rescrape && request.result_handling != ResultHandling::SaveOnly;

    if lookup_allowed {
        if let Some(resource) = state.cache.lookup_fresh(&fingerprint, request.max_age_ms).await {
            return Ok(build_response(&request, &resource.text, &resource));
        }
    }

    let lock_key = fingerprint.to_key();
    let handle = state.inflight.lock_for(&lock_key).await;
    let _guard = handle.lock().await;

    if lookup_allowed {
        if let Some(resource) = state.cache.lookup_fresh(&fingerprint, request.max_age_ms).await {
            state.inflight.release(&lock_key, handle).await;
            return Ok(build_response(&request, &resource.text, &resource));
        }
    }

    let outcome = fetch_and_process(state, &url, &request, &fingerprint).await;
    state.inflight.release(&lock_key, handle).await;
    outcome
}

/// The `raw` tier of a URL, either just fetched or reused from the cache.
/// Kept separate from the clean/extract pass so two requests for the same
/// URL that differ only in `extractPrompt` can share one underlying fetch.
/// `Clone` because a single-flight result is handed out to every waiter on
/// the same raw fingerprint, not just whoever triggered the fetch.
#[derive(Clone)]
pub(crate) struct RawArtifact {
    text: String,
    strategy: String,
    content_type: ContentType,
    freshly_fetched: Arc<AtomicBool>,
}

/// Fetches the `raw` tier, single-flighted on the `raw` fingerprint rather
/// than the full (tier-specific) one, so overlapping requests differing only
/// in `extractPrompt` or `cleanScrape` fetch the underlying page at most
/// once — even when neither call ever persists to the cache (`ReturnOnly`,
/// the default). A lock-then-recheck-the-cache scheme doesn't cover that
/// case since there's nothing for a second waiter to find once the first
/// caller's lock releases; `state.raw_fetch` instead hands every waiter a
/// clone of the exact value the first caller computed.
async fn acquire_raw(
    state: &AppState,
    url: &str,
    request: &ScrapeRequest,
    raw_fp: &Fingerprint,
) -> Result<RawArtifact, PipelineError> {
    let lookup_allowed = !request.force_rescrape;

    if lookup_allowed {
        if let Some(resource) = state.cache.lookup_fresh(raw_fp, request.max_age_ms).await {
            return Ok(reuse_cached_raw(url, resource));
        }
    }

    let key = raw_fp.to_key();
    state
        .raw_fetch
        .run(&key, || fetch_raw(state, url, request))
        .await
}

fn reuse_cached_raw(url: &str, resource: Resource) -> RawArtifact {
    let content_type = detect_content_type(url, Some(&resource.mime_type), &resource.text);
    RawArtifact {
        text: resource.text,
        strategy: resource.metadata.source_strategy,
        content_type,
        freshly_fetched: Arc::new(AtomicBool::new(false)),
    }
}

async fn fetch_raw(state: &AppState, url: &str, request: &ScrapeRequest) -> Result<RawArtifact, PipelineError> {
    let fetch_opts = FetchOptions {
        headers: request.headers.clone(),
        actions: request.actions.clone(),
        proxy: request.proxy,
    };
    let timeout = Duration::from_millis(request.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));

    let attempt = state.strategy_engine.attempt(url, &fetch_opts, timeout).await?;

    for diag in &attempt.diagnostics {
        state
            .metrics
            .record_strategy_attempt(&diag.strategy, diag.succeeded, diag.elapsed_ms);
    }

    let Some((strategy_name, fetched)) = attempt.outcome else {
        let summary = attempt
            .diagnostics
            .iter()
            .map(|d| {
                format!(
                    "{}: {} ({}ms)",
                    d.strategy,
                    d.error_message.as_deref().unwrap_or("failed"),
                    d.elapsed_ms
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PipelineError::Network(format!(
            "every strategy failed for {url}: {summary}"
        )));
    };

    let content_type = detect_content_type(url, fetched.content_type.as_deref(), &fetched.content);
    Ok(RawArtifact {
        text: fetched.content,
        strategy: strategy_name,
        content_type,
        freshly_fetched: Arc::new(AtomicBool::new(true)),
    })
}

async fn fetch_and_process(
    state: &AppState,
    url: &str,
    request: &ScrapeRequest,
    fingerprint: &Fingerprint,
) -> Result<McpCallResult, PipelineError> {
    let raw_fp = fingerprint.raw_sibling();
    let raw_artifact = acquire_raw(state, url, request, &raw_fp).await?;

    let RawArtifact { text: raw, strategy: strategy_name, content_type, freshly_fetched } = raw_artifact;
    // Every waiter on the same single-flighted fetch holds a clone of the
    // same flag; only the first to claim it persists the raw tier below, so
    // concurrent siblings don't each re-write the same content.
    let should_persist_raw = freshly_fetched.swap(false, Ordering::SeqCst);
    let mut warnings = Vec::new();

    let cleaned = if request.clean_scrape {
        if content_type == ContentType::Html {
            let opts = CleanOptions {
                include_tags: request.include_tags.clone(),
                exclude_tags: request.exclude_tags.clone(),
            };
            match clean_html(&raw, url, &opts) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("scrape: cleaning failed for {}: {}", url, e);
                    warnings.push(format!("cleaning failed, showing raw content: {e}"));
                    None
                }
            }
        } else {
            // Cleaning is defined only for HTML; non-HTML content passes through.
            Some(raw.clone())
        }
    } else {
        None
    };

    let extracted = if let Some(prompt) = &request.extract_prompt {
        match &state.extractor {
            Some(extractor) => {
                let input = cleaned.as_deref().unwrap_or(&raw);
                match extractor.extract(input, prompt).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("scrape: extraction failed for {}: {}", url, e);
                        warnings.push(format!("extraction failed, showing lower tier content: {e}"));
                        None
                    }
                }
            }
            None => {
                warnings.push("extractPrompt supplied but no extractor is configured".to_string());
                None
            }
        }
    } else {
        None
    };

    let mut resource = Resource {
        uri: String::new(),
        name: url.to_string(),
        mime_type: content_type.as_str().to_string(),
        description: None,
        text: raw.clone(),
        metadata: ResourceMetadata {
            source_strategy: strategy_name.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            tier: Tier::Raw,
            extract_prompt: request.extract_prompt.clone(),
            origin_url: url.to_string(),
            clean: request.clean_scrape,
        },
    };

    if request.result_handling != ResultHandling::ReturnOnly {
        let uris = state
            .cache
            .write_multi(MultiTierWrite {
                url: url.to_string(),
                raw: if should_persist_raw { Some(raw.clone()) } else { None },
                cleaned: cleaned.clone(),
                extracted: extracted.clone(),
                extract_prompt: request.extract_prompt.clone(),
                strategy: strategy_name.clone(),
                clean_scrape: request.clean_scrape,
            })
            .await?;

        let (uri, tier) = if let Some(uri) = &uris.extracted {
            (uri.clone(), Tier::Extracted)
        } else if let Some(uri) = &uris.cleaned {
            (uri.clone(), Tier::Cleaned)
        } else {
            (uris.raw.clone().unwrap_or_default(), Tier::Raw)
        };
        resource.uri = uri;
        resource.metadata.tier = tier;
    }

    let primary_text = extracted.as_deref().or(cleaned.as_deref()).unwrap_or(&raw);
    let mut body = primary_text.to_string();
    if !warnings.is_empty() {
        body = format!("{}\n\n[warnings] {}", body, warnings.join(" | "));
    }

    Ok(build_response(request, &body, &resource))
}

fn build_response(request: &ScrapeRequest, primary_text: &str, resource: &Resource) -> McpCallResult {
    let (slice, truncated) = paginate(primary_text, request.start_index, request.max_chars);
    let next_index = request.start_index + slice.chars().count();
    let body = with_pagination_hint(slice, truncated, next_index);

    match request.result_handling {
        ResultHandling::ReturnOnly => McpCallResult {
            content: vec![McpContent::Text { text: body }],
            is_error: false,
        },
        ResultHandling::SaveAndReturn => McpCallResult {
            content: vec![McpContent::Resource {
                resource: EmbeddedResource {
                    uri: resource.uri.clone(),
                    name: resource.name.clone(),
                    mime_type: resource.mime_type.clone(),
                    description: resource.description.clone(),
                    text: body,
                },
            }],
            is_error: false,
        },
        ResultHandling::SaveOnly => McpCallResult {
            content: vec![McpContent::ResourceLink {
                uri: resource.uri.clone(),
                name: resource.name.clone(),
                mime_type: resource.mime_type.clone(),
                description: resource.description.clone(),
            }],
            is_error: false,
        },
    }
}
