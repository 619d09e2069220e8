//! Ordered strategy selection + attempt loop.
//!
//! Grounded on the existing `tools::scrape::scrape_url_full` CDP-first →
//! forced-CDP → `backoff`-wrapped-native → fallback chain, generalized from
//! a fixed 3-strategy sequence into an ordered list over the `Strategy`
//! trait, with outcomes recorded against the learned store after every
//! attempt.

use super::{required_capabilities, FetchOptions, FetchOutcome, LearnedStore, Strategy};
use crate::config::OptimizeFor;
use crate::core::types::{Capability, StrategyAttemptDiagnostic};
use crate::error::{ErrorKind, PipelineError, PipelineResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Budget reserved out of the user's total timeout for content processing
/// (cleaning / extraction) after a successful fetch.
const PROCESSING_RESERVE: Duration = Duration::from_millis(500);

pub struct StrategyEngine {
    strategies: Vec<Arc<dyn Strategy>>,
    learned_store: Arc<LearnedStore>,
    optimize_for: OptimizeFor,
}

pub struct AttemptResult {
    pub outcome: Option<(String, FetchOutcome)>,
    pub diagnostics: Vec<StrategyAttemptDiagnostic>,
}

impl StrategyEngine {
    pub fn new(
        strategies: Vec<Arc<dyn Strategy>>,
        learned_store: Arc<LearnedStore>,
        optimize_for: OptimizeFor,
    ) -> Self {
        Self {
            strategies,
            learned_store,
            optimize_for,
        }
    }

    /// Order strategies for `url` given `opts`, honoring hard, soft, and
    /// global constraints. Returns an error if a hard
    /// capability requirement eliminates every strategy.
    pub fn select_order(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> PipelineResult<Vec<Arc<dyn Strategy>>> {
        let required = required_capabilities(opts);
        let eligible: Vec<Arc<dyn Strategy>> = self
            .strategies
            .iter()
            .filter(|s| required.iter().all(|cap| s.capabilities().contains(cap)))
            .cloned()
            .collect();

        if eligible.is_empty() {
            let names: Vec<&str> = required.iter().map(capability_name).collect();
            return Err(PipelineError::validation(
                "actions/proxy",
                format!(
                    "no configured strategy satisfies required capabilities: {}",
                    names.join(", ")
                ),
            ));
        }

        let domain = super::learned_store::hostname(url).unwrap_or_default();
        let mut ordered = eligible.clone();

        match self.optimize_for {
            OptimizeFor::Speed => {
                if let Some(preferred) = self.learned_store.most_recently_successful(&domain) {
                    stable_move_to_front(&mut ordered, &preferred);
                }
            }
            OptimizeFor::Cost => {
                ordered.sort_by_key(|s| match s.descriptor().cost_class {
                    crate::core::types::CostClass::Free => 0,
                    crate::core::types::CostClass::Paid => 1,
                });
            }
        }

        // Soft constraint: the learned per-domain order, applied as a final
        // stable pass so it can reorder within the cost/speed-sorted list
        // without violating either.
        let preferred_names = self.learned_store.preferred_order(&domain);
        for name in preferred_names.iter().rev() {
            stable_move_to_front(&mut ordered, name);
        }

        Ok(ordered)
    }

    /// Run the attempt loop: try each strategy in order with a per-strategy
    /// timeout derived from the remaining budget, recording outcomes against
    /// the learned store.
    pub async fn attempt(
        &self,
        url: &str,
        opts: &FetchOptions,
        total_timeout: Duration,
    ) -> PipelineResult<AttemptResult> {
        let ordered = self.select_order(url, opts)?;
        let domain = super::learned_store::hostname(url).unwrap_or_default();
        let deadline = Instant::now() + total_timeout;
        let mut diagnostics = Vec::new();

        for strategy in &ordered {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let attempt_budget = remaining.saturating_sub(PROCESSING_RESERVE).max(Duration::from_millis(1));
            let name = strategy.descriptor().name.to_string();
            let started = Instant::now();

            info!("strategy engine: attempting {} for {}", name, url);
            let result = tokio::time::timeout(attempt_budget, strategy.fetch(url, opts, attempt_budget)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(Ok(outcome)) => {
                    diagnostics.push(StrategyAttemptDiagnostic {
                        strategy: name.clone(),
                        succeeded: true,
                        error_kind: None,
                        error_message: None,
                        elapsed_ms,
                    });
                    self.learned_store.record_success(&domain, &name);
                    return Ok(AttemptResult {
                        outcome: Some((name, outcome)),
                        diagnostics,
                    });
                }
                Ok(Err(err)) => {
                    warn!("strategy engine: {} failed for {}: {}", name, url, err);
                    diagnostics.push(StrategyAttemptDiagnostic {
                        strategy: name.clone(),
                        succeeded: false,
                        error_kind: Some(err.kind().as_str().to_string()),
                        error_message: Some(err.to_string()),
                        elapsed_ms,
                    });
                    self.learned_store
                        .record_failure(&domain, &name, &err.to_string(), err.kind().is_transient());
                }
                Err(_) => {
                    diagnostics.push(StrategyAttemptDiagnostic {
                        strategy: name.clone(),
                        succeeded: false,
                        error_kind: Some(ErrorKind::Timeout.as_str().to_string()),
                        error_message: Some("strategy attempt exceeded its deadline".to_string()),
                        elapsed_ms,
                    });
                    self.learned_store
                        .record_failure(&domain, &name, "timeout", true);
                }
            }
        }

        Ok(AttemptResult {
            outcome: None,
            diagnostics,
        })
    }
}

fn capability_name(cap: &Capability) -> &'static str {
    match cap {
        Capability::JavascriptRender => "javascript-render",
        Capability::AntiBotBypass => "anti-bot-bypass",
        Capability::PdfParse => "pdf-parse",
        Capability::Screenshot => "screenshot",
        Capability::RawHtml => "raw-html",
        Capability::BrowserActions => "browser-actions",
    }
}

fn stable_move_to_front(strategies: &mut Vec<Arc<dyn Strategy>>, name: &str) {
    if let Some(idx) = strategies.iter().position(|s| s.descriptor().name == name) {
        let s = strategies.remove(idx);
        strategies.insert(0, s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CostClass, LatencyClass, StrategyDescriptor};
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FakeStrategy {
        name: &'static str,
        capabilities: &'static [Capability],
        cost_class: CostClass,
    }

    #[async_trait::async_trait]
    impl Strategy for FakeStrategy {
        fn descriptor(&self) -> StrategyDescriptor {
            StrategyDescriptor {
                name: self.name,
                capabilities: self.capabilities,
                cost_class: self.cost_class,
                latency_class: LatencyClass::Fast,
            }
        }

        async fn fetch(&self, _url: &str, _opts: &FetchOptions, _deadline: Duration) -> PipelineResult<FetchOutcome> {
            Ok(FetchOutcome {
                content: format!("content from {}", self.name),
                content_type: None,
                metadata: HashMap::new(),
            })
        }
    }

    fn learned_store() -> Arc<LearnedStore> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        Arc::new(LearnedStore::load(PathBuf::from(format!(
            "{}/engine_test_{}_{}.md",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        ))))
    }

    fn engine(strategies: Vec<Arc<dyn Strategy>>, optimize_for: OptimizeFor) -> StrategyEngine {
        StrategyEngine::new(strategies, learned_store(), optimize_for)
    }

    #[test]
    fn hard_capability_requirement_eliminates_ineligible_strategies() {
        let native = Arc::new(FakeStrategy {
            name: "native",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let browser = Arc::new(FakeStrategy {
            name: "browser",
            capabilities: &[Capability::RawHtml, Capability::BrowserActions],
            cost_class: CostClass::Paid,
        });
        let eng = engine(vec![native, browser], OptimizeFor::Cost);

        let opts = FetchOptions {
            actions: vec![],
            ..FetchOptions::default()
        };
        let order = eng.select_order("https://example.com", &opts).unwrap();
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn browser_actions_requirement_rules_out_strategies_without_it() {
        use crate::core::types::{BrowserAction, BrowserActionKind};

        let native = Arc::new(FakeStrategy {
            name: "native",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let eng = engine(vec![native], OptimizeFor::Cost);

        let opts = FetchOptions {
            actions: vec![BrowserAction {
                kind: BrowserActionKind::Click,
                selector: Some("#btn".to_string()),
                text: None,
                milliseconds: None,
                key: None,
                x: None,
                y: None,
                full_page: None,
            }],
            ..FetchOptions::default()
        };
        let err = eng.select_order("https://example.com", &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn cost_optimization_orders_free_before_paid() {
        let paid = Arc::new(FakeStrategy {
            name: "paid",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Paid,
        });
        let free = Arc::new(FakeStrategy {
            name: "free",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let eng = engine(vec![paid, free], OptimizeFor::Cost);

        let order = eng.select_order("https://example.com", &FetchOptions::default()).unwrap();
        assert_eq!(order[0].descriptor().name, "free");
        assert_eq!(order[1].descriptor().name, "paid");
    }

    #[test]
    fn learned_preference_reorders_within_the_constraint_sort() {
        let a = Arc::new(FakeStrategy {
            name: "a",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let b = Arc::new(FakeStrategy {
            name: "b",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let store = learned_store();
        store.record_success("example.com", "b");
        let eng = StrategyEngine::new(vec![a, b], store, OptimizeFor::Cost);

        let order = eng.select_order("https://example.com", &FetchOptions::default()).unwrap();
        assert_eq!(order[0].descriptor().name, "b");
    }

    #[tokio::test]
    async fn attempt_succeeds_on_first_eligible_strategy() {
        let native = Arc::new(FakeStrategy {
            name: "native",
            capabilities: &[Capability::RawHtml],
            cost_class: CostClass::Free,
        });
        let eng = engine(vec![native], OptimizeFor::Cost);

        let result = eng
            .attempt("https://example.com", &FetchOptions::default(), Duration::from_secs(5))
            .await
            .unwrap();

        let (name, outcome) = result.outcome.expect("one strategy must have succeeded");
        assert_eq!(name, "native");
        assert!(outcome.content.contains("native"));
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].succeeded);
    }
}
