//! Lookup index over a rule store
//!
//! Builds three structures so a query never scans the full rule set: a
//! shortcut table keyed by hashed 5-byte windows, a domain table keyed by
//! hashed `if-domain` literals, and a catch-all list. The index is a
//! probabilistic pre-filter: a hash hit only nominates a candidate, the
//! matcher always re-validates.

use std::collections::HashMap;

use crate::hash::{hash_domain, hash_window, SHORTCUT_WINDOW};
use crate::rules::RuleStore;
use crate::{domains::host_suffixes, url::extract_host};

/// Scheme prefixes whose fragments make useless shortcuts: indexing on
/// them would nominate nearly every URL.
const GENERIC_SHORTCUT_SOURCES: &[&str] = &["https://www.", "wss://"];

pub struct NetworkEngine {
    shortcut_table: HashMap<u32, Vec<u32>>,
    domain_table: HashMap<u32, Vec<u32>>,
    catch_all: Vec<u32>,
}

impl NetworkEngine {
    /// Index every rule by exactly one strategy: shortcut when one of
    /// usable quality exists (cheapest to probe), otherwise permitted
    /// domains, otherwise the catch-all list.
    pub fn new(store: &RuleStore) -> Self {
        let mut engine = Self {
            shortcut_table: HashMap::new(),
            domain_table: HashMap::new(),
            catch_all: Vec::new(),
        };
        // Bucket occupancy per window hash, used to spread rules across
        // shortcut buckets.
        let mut histogram: HashMap<u32, u32> = HashMap::new();

        for (index, rule) in store.iter().enumerate() {
            let index = index as u32;

            if let Some(shortcut) = rule.shortcut.as_deref().filter(|s| is_usable_shortcut(s)) {
                let hash = pick_window(shortcut, &histogram);
                engine.shortcut_table.entry(hash).or_default().push(index);
                *histogram.entry(hash).or_insert(0) += 1;
                continue;
            }

            let mut indexed = false;
            if let Some(permitted) = &rule.trigger.if_domain {
                for pattern in permitted {
                    let literal = pattern.strip_prefix('*').unwrap_or(pattern);
                    // Wildcard-TLD forms have no fixed suffix to hash.
                    if literal.ends_with(".*") {
                        continue;
                    }
                    engine
                        .domain_table
                        .entry(hash_domain(literal))
                        .or_default()
                        .push(index);
                    indexed = true;
                }
            }

            if !indexed {
                engine.catch_all.push(index);
            }
        }

        log::debug!(
            "index built: {} shortcut buckets, {} domain buckets, {} catch-all",
            engine.shortcut_table.len(),
            engine.domain_table.len(),
            engine.catch_all.len()
        );
        engine
    }

    /// Gather candidate rule indices for a URL: domain-table hits for every
    /// host suffix, shortcut-table hits for every 5-byte URL window, then
    /// the catch-all list. Duplicates are fine; the matcher deduplicates.
    pub fn lookup(&self, url: &str) -> Vec<u32> {
        let url_lc = url.to_lowercase();
        let mut candidates = Vec::new();

        if let Some(host) = extract_host(&url_lc) {
            for suffix in host_suffixes(host) {
                if let Some(hits) = self.domain_table.get(&hash_domain(suffix)) {
                    candidates.extend_from_slice(hits);
                }
            }
        }

        for window in url_lc.as_bytes().windows(SHORTCUT_WINDOW) {
            if let Some(hits) = self.shortcut_table.get(&hash_window(window)) {
                candidates.extend_from_slice(hits);
            }
        }

        candidates.extend_from_slice(&self.catch_all);
        candidates
    }

    pub fn catch_all_len(&self) -> usize {
        self.catch_all.len()
    }
}

fn is_usable_shortcut(shortcut: &str) -> bool {
    shortcut.len() >= SHORTCUT_WINDOW
        && !GENERIC_SHORTCUT_SOURCES
            .iter()
            .any(|source| source.contains(shortcut))
}

/// Choose the least-occupied 5-byte window of the shortcut.
fn pick_window(shortcut: &str, histogram: &HashMap<u32, u32>) -> u32 {
    let mut best_hash = 0;
    let mut best_count = u32::MAX;
    for window in shortcut.as_bytes().windows(SHORTCUT_WINDOW) {
        let hash = hash_window(window);
        let count = histogram.get(&hash).copied().unwrap_or(0);
        if count < best_count {
            best_count = count;
            best_hash = hash;
        }
    }
    best_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleStore;

    fn store(json: &str) -> RuleStore {
        RuleStore::parse(json).unwrap()
    }

    #[test]
    fn shortcut_rule_found_by_url_window() {
        let store = store(
            r#"[{"trigger": {"url-filter": "||tracker.example^"},
                 "action": {"type": "block"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        let hits = engine.lookup("https://tracker.example/pixel.gif");
        assert!(hits.contains(&0));
        assert!(engine.lookup("https://other.example/").is_empty());
    }

    #[test]
    fn domain_rule_found_by_host_suffix() {
        let store = store(
            r#"[{"trigger": {"url-filter": ".*", "if-domain": ["*example.com"]},
                 "action": {"type": "css-display-none", "selector": ".ads"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        assert!(engine.lookup("https://sub.example.com/page").contains(&0));
        assert!(engine.lookup("https://example.org/page").is_empty());
    }

    #[test]
    fn shortcut_takes_precedence_over_domains() {
        let store = store(
            r#"[{"trigger": {"url-filter": "||banners.example^",
                             "if-domain": ["*example.com"]},
                 "action": {"type": "block"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        // Not domain-indexed: a page URL on the permitted domain that does
        // not contain the shortcut nominates nothing.
        assert!(engine.lookup("https://example.com/clean").is_empty());
        assert!(engine
            .lookup("https://banners.example/ad.js")
            .contains(&0));
    }

    #[test]
    fn unselective_rules_land_in_catch_all() {
        let store = store(
            r#"[{"trigger": {"url-filter": ".*"}, "action": {"type": "ignore-previous-rules"}},
                {"trigger": {"url-filter": "^ws"}, "action": {"type": "block"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        assert_eq!(engine.catch_all_len(), 2);
        let hits = engine.lookup("https://anything.example/");
        assert!(hits.contains(&0) && hits.contains(&1));
    }

    #[test]
    fn generic_scheme_shortcut_not_indexed_by_window() {
        // Shortcut "https" would nominate every https URL; the rule must
        // fall through to domain indexing instead.
        let store = store(
            r#"[{"trigger": {"url-filter": "https", "if-domain": ["*example.com"]},
                 "action": {"type": "block"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        assert!(engine.lookup("https://example.org/x").is_empty());
        assert!(engine.lookup("https://example.com/x").contains(&0));
    }

    #[test]
    fn wildcard_tld_domains_stay_reachable() {
        let store = store(
            r#"[{"trigger": {"url-filter": ".*", "if-domain": ["google.*"]},
                 "action": {"type": "css-display-none", "selector": ".ads"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        // No literal suffix to hash, so the rule is consulted on every query.
        assert!(engine.lookup("https://google.de/").contains(&0));
        assert!(engine.lookup("https://example.org/").contains(&0));
    }

    #[test]
    fn every_rule_is_indexed_somewhere() {
        let store = store(
            r#"[{"trigger": {"url-filter": "||tracker.example^"}, "action": {"type": "block"}},
                {"trigger": {"url-filter": ".*", "if-domain": ["*site.test"]},
                 "action": {"type": "css-display-none", "selector": ".x"}},
                {"trigger": {"url-filter": ".*"}, "action": {"type": "ignore-previous-rules"}}]"#,
        );
        let engine = NetworkEngine::new(&store);
        let mut all: Vec<u32> = Vec::new();
        for hits in engine.shortcut_table.values() {
            all.extend_from_slice(hits);
        }
        for hits in engine.domain_table.values() {
            all.extend_from_slice(hits);
        }
        all.extend_from_slice(&engine.catch_all);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
    }
}
