//! URL matching with priority and override semantics
//!
//! Candidates nominated by the lookup index are sorted back into rule
//! order and evaluated in reverse, so later-declared rules win. A
//! confirmed `ignore-previous-rules` action discards everything
//! accumulated for the query and stops evaluation — a full override,
//! not per-category.

use serde::{Deserialize, Serialize};

use crate::domains::is_domain_or_subdomain;
use crate::index::NetworkEngine;
use crate::rules::{Action, BlockerRule, RuleStore};
use crate::url::extract_host;

/// Per-URL action payload handed to the content script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPayload {
    pub scripts: Vec<String>,
    #[serde(rename = "cssExtended")]
    pub css_extended: Vec<String>,
    #[serde(rename = "cssInject")]
    pub css_inject: Vec<String>,
    pub scriptlets: Vec<String>,
}

impl MatchPayload {
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
            && self.css_extended.is_empty()
            && self.css_inject.is_empty()
            && self.scriptlets.is_empty()
    }
}

pub struct Matcher<'a> {
    store: &'a RuleStore,
    index: &'a NetworkEngine,
}

impl<'a> Matcher<'a> {
    pub fn new(store: &'a RuleStore, index: &'a NetworkEngine) -> Self {
        Self { store, index }
    }

    /// Collect the actions applying to one URL.
    pub fn match_url(&self, url: &str) -> MatchPayload {
        let mut candidates = self.index.lookup(url);
        candidates.sort_unstable();
        candidates.dedup();

        let url_lc = url.to_lowercase();
        let host = extract_host(&url_lc).unwrap_or("");

        let mut payload = MatchPayload::default();
        for &index in candidates.iter().rev() {
            let rule = match self.store.get(index as usize) {
                Some(rule) => rule,
                None => continue,
            };
            if !rule_matches(rule, url, &url_lc, host) {
                continue;
            }
            match &rule.action {
                Action::IgnorePreviousRules => {
                    payload = MatchPayload::default();
                    break;
                }
                Action::Script { script } if !script.is_empty() => {
                    payload.scripts.push(script.clone());
                }
                Action::CssDisplayNone { selector } if !selector.is_empty() => {
                    payload.css_extended.push(selector.clone());
                }
                Action::CssInject { css } if !css.is_empty() => {
                    payload.css_inject.push(css.clone());
                }
                Action::Scriptlet {
                    scriptlet,
                    scriptlet_param,
                } if !scriptlet.is_empty() => {
                    payload.scriptlets.push(match scriptlet_param {
                        Some(param) if !param.is_empty() => {
                            format!("{scriptlet}({param})")
                        }
                        _ => scriptlet.clone(),
                    });
                }
                // Network blocking has no per-URL payload; empty payloads
                // are skipped.
                _ => {}
            }
        }
        payload
    }
}

/// Exact trigger semantics for one candidate.
fn rule_matches(rule: &BlockerRule, url: &str, url_lc: &str, host: &str) -> bool {
    if let Some(shortcut) = &rule.shortcut {
        if !url_lc.contains(shortcut.as_str()) {
            return false;
        }
    }

    let permitted = rule
        .trigger
        .if_domain
        .as_deref()
        .filter(|d| !d.is_empty());
    let restricted = rule
        .trigger
        .unless_domain
        .as_deref()
        .filter(|d| !d.is_empty());

    if permitted.is_some() || restricted.is_some() {
        if host.is_empty() {
            return false;
        }
        // The compiler never emits both lists; treat it as non-matching
        // if a hand-edited document does.
        if permitted.is_some() && restricted.is_some() {
            return false;
        }
        if let Some(patterns) = restricted {
            if patterns.iter().any(|p| is_domain_or_subdomain(host, p)) {
                return false;
            }
        }
        if let Some(patterns) = permitted {
            if !patterns.iter().any(|p| is_domain_or_subdomain(host, p)) {
                return false;
            }
        }
    }

    rule.matches_url(url)
}
