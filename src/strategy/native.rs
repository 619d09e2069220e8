//! The native (direct-HTTP) fetch strategy.
//!
//! This is the one strategy whose implementation belongs to the core — it
//! has no further external collaborator behind it, unlike the remote
//! service adapter (`crate::remote`). Grounded on the existing plain
//! `reqwest` GET path inside `tools::scrape::scrape_url_full`, wrapped in
//! `backoff::future::retry` the same way prior code retries transient
//! failures, and mapped onto the shared error taxonomy instead of
//! bubbling `anyhow`.

use super::{FetchOptions, FetchOutcome, Strategy};
use crate::core::types::{Capability, CostClass, LatencyClass, StrategyDescriptor};
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

pub struct NativeFetcher {
    client: reqwest::Client,
}

impl NativeFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify_status(status: StatusCode, retry_after_ms: Option<u64>) -> PipelineError {
        match status.as_u16() {
            401 | 403 => PipelineError::Auth(format!("native fetcher received {status}")),
            402 => PipelineError::Payment(format!("native fetcher received {status}")),
            429 => PipelineError::RateLimit {
                message: format!("native fetcher received {status}"),
                retry_after_ms,
            },
            400..=499 => PipelineError::Validation {
                path: "url".to_string(),
                rule: format!("upstream returned {status}"),
            },
            500..=599 => PipelineError::Server(format!("native fetcher received {status}")),
            _ => PipelineError::Protocol(format!("unexpected status {status}")),
        }
    }
}

#[async_trait]
impl Strategy for NativeFetcher {
    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "native",
            capabilities: &[Capability::RawHtml, Capability::PdfParse],
            cost_class: CostClass::Free,
            latency_class: LatencyClass::Fast,
        }
    }

    async fn fetch(
        &self,
        url: &str,
        opts: &FetchOptions,
        deadline: Duration,
    ) -> PipelineResult<FetchOutcome> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(deadline))
            .build();

        let client = self.client.clone();
        let url = url.to_string();
        let headers = opts.headers.clone();

        let response = retry(backoff, || {
            let client = client.clone();
            let url = url.clone();
            let headers = headers.clone();
            async move {
                let mut builder = client.get(&url);
                for (k, v) in &headers {
                    builder = builder.header(k, v);
                }
                let resp = builder.send().await.map_err(|e| {
                    if e.is_timeout() {
                        backoff::Error::permanent(PipelineError::Timeout { elapsed_ms: 0 })
                    } else if e.is_connect() {
                        backoff::Error::transient(PipelineError::Network(e.to_string()))
                    } else {
                        backoff::Error::permanent(PipelineError::Network(e.to_string()))
                    }
                })?;

                let status = resp.status();
                if status.is_server_error() || status.as_u16() == 429 {
                    let retry_after_ms = crate::remote::client::retry_after_ms_from_headers(resp.headers());
                    return Err(backoff::Error::transient(Self::classify_status(status, retry_after_ms)));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(Self::classify_status(status, None)));
                }
                Ok(resp)
            }
        })
        .await
        .map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        let mut metadata = HashMap::new();
        metadata.insert("strategy".to_string(), "native".to_string());

        Ok(FetchOutcome {
            content: body,
            content_type,
            metadata,
        })
    }
}
