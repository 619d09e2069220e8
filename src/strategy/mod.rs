//! Scrape strategy engine.
//!
//! A `Strategy` is a named fetcher with a declared capability set. The
//! engine orders strategies for one request honoring hard constraints
//! (capability requirements), soft constraints (the learned per-domain
//! order) and a global operator knob (`OPTIMIZE_FOR`), then runs them in
//! order until one succeeds or the budget runs out.

pub mod engine;
pub mod learned_store;
pub mod native;

use crate::core::types::{BrowserAction, Capability, ProxyMode, StrategyDescriptor};
use crate::error::PipelineResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub use engine::StrategyEngine;
pub use learned_store::LearnedStore;
pub use native::NativeFetcher;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub actions: Vec<BrowserAction>,
    pub proxy: ProxyMode,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub content: String,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// A fetch strategy. Implementations are process-wide singletons registered
/// once at startup — no mutable state beyond what's behind
/// interior mutability (e.g. a connection pool).
#[async_trait]
pub trait Strategy: Send + Sync {
    fn descriptor(&self) -> StrategyDescriptor;

    /// Fetch `url`. `deadline` is the remaining time budget for this single
    /// attempt, already derived from the request's total timeout.
    async fn fetch(
        &self,
        url: &str,
        opts: &FetchOptions,
        deadline: Duration,
    ) -> PipelineResult<FetchOutcome>;

    fn capabilities(&self) -> &'static [Capability] {
        self.descriptor().capabilities
    }
}

/// Whether `opts` require a capability no strategy in `all` can satisfy —
/// a hard constraint violation
pub fn required_capabilities(opts: &FetchOptions) -> Vec<Capability> {
    let mut required = Vec::new();
    if !opts.actions.is_empty() {
        required.push(Capability::BrowserActions);
    }
    if matches!(opts.proxy, ProxyMode::Stealth) {
        required.push(Capability::AntiBotBypass);
    }
    required
}
