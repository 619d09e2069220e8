//! Remote-service `Strategy` implementation: JS rendering, anti-bot bypass,
//! screenshots, and browser actions the native fetcher can't do.

use super::client::RemoteClient;
use crate::core::types::{BrowserAction, Capability, CostClass, LatencyClass, ProxyMode, StrategyDescriptor};
use crate::error::PipelineResult;
use crate::strategy::{FetchOptions, FetchOutcome, Strategy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteScrapeRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    actions: &'a [BrowserAction],
    stealth: bool,
    timeout_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteScrapeResponse {
    content: String,
    content_type: Option<String>,
    #[serde(default)]
    final_url: Option<String>,
}

pub struct RemoteStrategy {
    client: RemoteClient,
}

impl RemoteStrategy {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Strategy for RemoteStrategy {
    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "remote",
            capabilities: &[
                Capability::JavascriptRender,
                Capability::AntiBotBypass,
                Capability::Screenshot,
                Capability::RawHtml,
                Capability::BrowserActions,
            ],
            cost_class: CostClass::Paid,
            latency_class: LatencyClass::Slow,
        }
    }

    async fn fetch(&self, url: &str, opts: &FetchOptions, deadline: Duration) -> PipelineResult<FetchOutcome> {
        let request = RemoteScrapeRequest {
            url,
            headers: opts.headers.clone(),
            actions: &opts.actions,
            stealth: matches!(opts.proxy, ProxyMode::Stealth),
            timeout_ms: deadline.as_millis() as u64,
        };

        let response: RemoteScrapeResponse = self.client.post_json("scrape", &request).await?;

        let mut metadata = HashMap::new();
        metadata.insert("strategy".to_string(), "remote".to_string());
        if let Some(final_url) = response.final_url {
            metadata.insert("final_url".to_string(), final_url);
        }

        Ok(FetchOutcome {
            content: response.content,
            content_type: response.content_type,
            metadata,
        })
    }
}
