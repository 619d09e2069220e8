//! Per-domain learned strategy preferences.
//!
//! Persisted as a human-readable Markdown table, one section per domain —
//! grounded on the existing `features::auth_registry` atomic
//! write-to-temp-then-rename idiom, adapted to a richer per-domain record
//! and a Markdown (rather than JSON) body.
//!
//! The store is loaded fresh and rewritten whole on every mutation: writes
//! are serialized behind a process-wide lock so concurrent callers never
//! observe or produce a half-written file.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Same-strategy consecutive non-transient failures before it is demoted
/// below other candidates for that domain.
const DEMOTE_AFTER_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct StrategyRecord {
    pub name: String,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub last_failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainPreference {
    pub order: Vec<StrategyRecord>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DomainPreference {
    fn record_or_insert(&mut self, name: &str) -> usize {
        if let Some(i) = self.order.iter().position(|r| r.name == name) {
            return i;
        }
        self.order.push(StrategyRecord {
            name: name.to_string(),
            success_count: 0,
            consecutive_failures: 0,
            last_failure_reason: None,
        });
        self.order.len() - 1
    }

    fn record_success(&mut self, name: &str) {
        let idx = self.record_or_insert(name);
        self.order[idx].success_count += 1;
        self.order[idx].consecutive_failures = 0;
        self.order[idx].last_failure_reason = None;
        // Move to head if not already among the top two.
        if idx > 1 {
            let rec = self.order.remove(idx);
            self.order.insert(0, rec);
        }
        self.last_updated = Some(Utc::now());
    }

    fn record_failure(&mut self, name: &str, reason: &str, transient: bool) {
        let idx = self.record_or_insert(name);
        self.order[idx].last_failure_reason = Some(reason.to_string());
        if transient {
            // Rate-limit / transient errors never cause demotion.
            self.last_updated = Some(Utc::now());
            return;
        }
        self.order[idx].consecutive_failures += 1;
        if self.order[idx].consecutive_failures >= DEMOTE_AFTER_CONSECUTIVE_FAILURES && idx == 0 {
            let rec = self.order.remove(idx);
            self.order.push(rec);
        }
        self.last_updated = Some(Utc::now());
    }

    /// Preferred order of strategy names, most-preferred first.
    pub fn preferred_names(&self) -> Vec<String> {
        self.order.iter().map(|r| r.name.clone()).collect()
    }

    /// Name of the strategy with the most recent success, if any — used by
    /// `OPTIMIZE_FOR=speed`.
    pub fn most_recently_successful(&self) -> Option<String> {
        self.order
            .iter()
            .max_by_key(|r| r.success_count)
            .filter(|r| r.success_count > 0)
            .map(|r| r.name.clone())
    }
}

pub struct LearnedStore {
    path: PathBuf,
    domains: Mutex<HashMap<String, DomainPreference>>,
}

impl LearnedStore {
    pub fn load(path: PathBuf) -> Self {
        let domains = match std::fs::read_to_string(&path) {
            Ok(text) => match parse_markdown(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        "learned_store: malformed content at {} ({}) — starting from an empty store",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            domains: Mutex::new(domains),
        }
    }

    pub fn preferred_order(&self, domain: &str) -> Vec<String> {
        self.domains
            .lock()
            .unwrap()
            .get(domain)
            .map(|p| p.preferred_names())
            .unwrap_or_default()
    }

    pub fn most_recently_successful(&self, domain: &str) -> Option<String> {
        self.domains
            .lock()
            .unwrap()
            .get(domain)
            .and_then(|p| p.most_recently_successful())
    }

    pub fn record_success(&self, domain: &str, strategy: &str) {
        let mut guard = self.domains.lock().unwrap();
        guard.entry(domain.to_string()).or_default().record_success(strategy);
        self.persist(&guard);
    }

    pub fn record_failure(&self, domain: &str, strategy: &str, reason: &str, transient: bool) {
        let mut guard = self.domains.lock().unwrap();
        guard
            .entry(domain.to_string())
            .or_default()
            .record_failure(strategy, reason, transient);
        self.persist(&guard);
    }

    fn persist(&self, domains: &HashMap<String, DomainPreference>) {
        let body = render_markdown(domains);
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("learned_store: failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        let tmp = self.path.with_extension("md.tmp");
        if let Err(e) = std::fs::write(&tmp, &body) {
            warn!("learned_store: failed to write temp file {}: {}", tmp.display(), e);
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(
                "learned_store: failed to rename {} -> {}: {}",
                tmp.display(),
                self.path.display(),
                e
            );
        }
    }
}

fn render_markdown(domains: &HashMap<String, DomainPreference>) -> String {
    let mut out = String::from("# Learned strategy preferences\n\n");
    let mut names: Vec<&String> = domains.keys().collect();
    names.sort();
    for domain in names {
        let pref = &domains[domain];
        out.push_str(&format!("## {}\n\n", domain));
        out.push_str(&format!(
            "last_updated: {}\n\n",
            pref.last_updated
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        ));
        out.push_str("| strategy | success_count | consecutive_failures | last_failure_reason |\n");
        out.push_str("| --- | --- | --- | --- |\n");
        for rec in &pref.order {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                rec.name,
                rec.success_count,
                rec.consecutive_failures,
                rec.last_failure_reason.as_deref().unwrap_or("-")
            ));
        }
        out.push('\n');
    }
    out
}

fn parse_markdown(text: &str) -> Result<HashMap<String, DomainPreference>, String> {
    let mut domains = HashMap::new();
    let mut current_domain: Option<String> = None;
    let mut current_pref = DomainPreference::default();

    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("## ") {
            if let Some(domain) = current_domain.take() {
                domains.insert(domain, std::mem::take(&mut current_pref));
            }
            current_domain = Some(name.trim().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("last_updated: ") {
            if rest.trim() != "-" {
                current_pref.last_updated = DateTime::parse_from_rfc3339(rest.trim())
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            }
            continue;
        }
        if line.starts_with("| ---") || line.starts_with("| strategy") || !line.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = line.trim_matches('|').split('|').map(|c| c.trim()).collect();
        if cells.len() != 4 {
            return Err(format!("malformed row: {line}"));
        }
        let success_count: u64 = cells[1].parse().map_err(|_| format!("bad success_count: {line}"))?;
        let consecutive_failures: u32 = cells[2]
            .parse()
            .map_err(|_| format!("bad consecutive_failures: {line}"))?;
        current_pref.order.push(StrategyRecord {
            name: cells[0].to_string(),
            success_count,
            consecutive_failures,
            last_failure_reason: if cells[3] == "-" {
                None
            } else {
                Some(cells[3].to_string())
            },
        });
    }
    if let Some(domain) = current_domain.take() {
        domains.insert(domain, current_pref);
    }
    Ok(domains)
}

pub fn hostname(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(|h| h.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_success_is_recorded_and_preferred() {
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        assert_eq!(pref.preferred_names(), vec!["native".to_string()]);
        assert_eq!(pref.order[0].success_count, 1);
    }

    #[test]
    fn repeated_failures_demote_the_leading_strategy() {
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        pref.record_success("remote");
        // native leads; fail it three times non-transiently to demote it.
        pref.record_failure("native", "timeout", false);
        pref.record_failure("native", "timeout", false);
        assert_eq!(pref.preferred_names()[0], "native");
        pref.record_failure("native", "timeout", false);
        assert_eq!(pref.preferred_names()[0], "remote");
        assert_eq!(pref.preferred_names().last().unwrap(), "native");
    }

    #[test]
    fn transient_failures_never_demote() {
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        pref.record_success("remote");
        for _ in 0..10 {
            pref.record_failure("native", "rate limited", true);
        }
        assert_eq!(pref.preferred_names()[0], "native");
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        pref.record_failure("native", "timeout", false);
        pref.record_failure("native", "timeout", false);
        pref.record_success("native");
        assert_eq!(pref.order[0].consecutive_failures, 0);
    }

    #[test]
    fn most_recently_successful_picks_highest_success_count() {
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        pref.record_success("remote");
        pref.record_success("remote");
        assert_eq!(pref.most_recently_successful(), Some("remote".to_string()));
    }

    #[test]
    fn most_recently_successful_is_none_without_any_success() {
        let pref = DomainPreference::default();
        assert_eq!(pref.most_recently_successful(), None);
    }

    #[test]
    fn markdown_round_trips_through_render_and_parse() {
        let mut domains = HashMap::new();
        let mut pref = DomainPreference::default();
        pref.record_success("native");
        pref.record_failure("remote", "upstream 500", true);
        domains.insert("example.com".to_string(), pref);

        let rendered = render_markdown(&domains);
        let parsed = parse_markdown(&rendered).expect("well-formed markdown must parse");

        let roundtripped = parsed.get("example.com").expect("domain section preserved");
        let names: Vec<&str> = roundtripped.order.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"native"));
        assert!(names.contains(&"remote"));
    }

    #[test]
    fn malformed_table_row_is_reported_as_an_error() {
        let text = "# Learned strategy preferences\n\n## example.com\n\nlast_updated: -\n\n| strategy | success_count | consecutive_failures | last_failure_reason |\n| --- | --- | --- | --- |\n| native | not-a-number | 0 | - |\n";
        assert!(parse_markdown(text).is_err());
    }

    #[test]
    fn load_recovers_to_an_empty_store_on_malformed_content() {
        let dir = std::env::temp_dir().join(format!("learned_store_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("malformed.md");
        std::fs::write(&path, "| native | not-a-number | 0 | - |\n").unwrap();

        let store = LearnedStore::load(path.clone());
        assert!(store.preferred_order("example.com").is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn record_success_persists_and_is_visible_through_preferred_order() {
        let dir = std::env::temp_dir().join(format!("learned_store_test_persist_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("learned.md");

        let store = LearnedStore::load(path.clone());
        store.record_success("example.com", "native");
        assert_eq!(store.preferred_order("example.com"), vec!["native".to_string()]);
        assert!(path.exists());

        let reloaded = LearnedStore::load(path.clone());
        assert_eq!(reloaded.preferred_order("example.com"), vec!["native".to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn hostname_extracts_host_from_absolute_url() {
        assert_eq!(hostname("https://example.com/page"), Some("example.com".to_string()));
    }

    #[test]
    fn hostname_is_none_for_unparseable_input() {
        assert_eq!(hostname("not a url"), None);
    }
}
