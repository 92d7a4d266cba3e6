//! Content-blocker rule store
//!
//! Parses a content-blocker JSON array into [`BlockerRule`] entries,
//! preserving array order — the index is the rule's priority key for the
//! matcher. Each rule carries a precomputed match shortcut and a compiled
//! regex that is built on the first match attempt and cached in a
//! write-once cell.

use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Sentinel pattern matching every URL.
pub const ANY_URL: &str = ".*";
/// Sentinel pattern matching every web-scheme URL (the `||` anchor prefix).
pub const ANY_URL_SCHEME: &str = "^[htpsw]+:\\/\\/";

/// Matching condition of a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    #[serde(rename = "url-filter")]
    pub url_filter: String,

    #[serde(rename = "if-domain", skip_serializing_if = "Option::is_none")]
    pub if_domain: Option<Vec<String>>,

    #[serde(rename = "unless-domain", skip_serializing_if = "Option::is_none")]
    pub unless_domain: Option<Vec<String>>,

    #[serde(
        rename = "url-filter-is-case-sensitive",
        skip_serializing_if = "Option::is_none"
    )]
    pub case_sensitive: Option<bool>,

    /// Precomputed shortcut, carried in the document when the compiler
    /// derived one. Loading falls back to deriving it from `url-filter`.
    #[serde(rename = "url-shortcut", skip_serializing_if = "Option::is_none")]
    pub url_shortcut: Option<String>,

    #[serde(rename = "resource-type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<Vec<String>>,

    /// Party scoping (`first-party` / `third-party`). Enforced by the
    /// consuming content blocker; URL-only matching cannot evaluate it.
    #[serde(rename = "load-type", skip_serializing_if = "Option::is_none")]
    pub load_type: Option<Vec<String>>,
}

/// Effect applied when a trigger matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    Block,
    CssDisplayNone {
        selector: String,
    },
    CssInject {
        css: String,
    },
    IgnorePreviousRules,
    Script {
        script: String,
    },
    Scriptlet {
        scriptlet: String,
        #[serde(rename = "scriptlet-param", skip_serializing_if = "Option::is_none")]
        scriptlet_param: Option<String>,
    },
}

/// One content-blocker entry as it appears in the JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockerEntry {
    pub trigger: Trigger,
    pub action: Action,
}

/// A compiled rule: one entry plus its match caches. Immutable after
/// construction; the regex cell is populated at most once.
pub struct BlockerRule {
    pub trigger: Trigger,
    pub action: Action,
    pub shortcut: Option<String>,
    regex: OnceCell<Option<Regex>>,
}

impl BlockerRule {
    fn new(entry: BlockerEntry) -> Self {
        let shortcut = entry
            .trigger
            .url_shortcut
            .clone()
            .map(|s| s.to_lowercase())
            .or_else(|| derive_shortcut(&entry.trigger.url_filter));
        Self {
            trigger: entry.trigger,
            action: entry.action,
            shortcut,
            regex: OnceCell::new(),
        }
    }

    /// Confirm a URL against the rule's pattern. Sentinel patterns never
    /// reach the regex engine; a pattern the engine rejects is treated as
    /// non-matching rather than an error.
    pub fn matches_url(&self, url: &str) -> bool {
        if is_any_url_pattern(&self.trigger.url_filter) {
            return true;
        }
        let compiled = self.regex.get_or_init(|| {
            let source = regex_source(&self.trigger.url_filter);
            let case_insensitive = !self.trigger.case_sensitive.unwrap_or(false);
            match RegexBuilder::new(source)
                .case_insensitive(case_insensitive)
                .build()
            {
                Ok(re) => Some(re),
                Err(err) => {
                    log::warn!("unmatchable url-filter {:?}: {err}", self.trigger.url_filter);
                    None
                }
            }
        });
        match compiled {
            Some(re) => re.is_match(url),
            None => false,
        }
    }
}

/// Is this one of the two "match everything" sentinel patterns?
pub fn is_any_url_pattern(url_filter: &str) -> bool {
    url_filter == ANY_URL || url_filter == ANY_URL_SCHEME || url_filter == "^[htpsw]+://"
}

/// The regex text to compile: delimited `/regex/` rules are compiled
/// without their delimiters.
fn regex_source(url_filter: &str) -> &str {
    if url_filter.len() > 2 && url_filter.starts_with('/') && url_filter.ends_with('/') {
        &url_filter[1..url_filter.len() - 1]
    } else {
        url_filter
    }
}

// =============================================================================
// Shortcut derivation
// =============================================================================

const MIN_SHORTCUT_LEN: usize = 2;

/// Derive a literal substring guaranteed to appear in any URL the pattern
/// can match, lower-cased. Returns `None` when no selective-enough literal
/// exists.
pub fn derive_shortcut(url_filter: &str) -> Option<String> {
    if is_any_url_pattern(url_filter) {
        return None;
    }

    let candidate = if url_filter.len() > 2
        && url_filter.starts_with('/')
        && url_filter.ends_with('/')
    {
        shortcut_from_regex(&url_filter[1..url_filter.len() - 1])?
    } else if url_filter.starts_with('^') || url_filter.contains('\\') {
        // Compiled filters are regex text; a literal split would pick up
        // metacharacters.
        shortcut_from_regex(url_filter)?
    } else {
        longest_literal_run(url_filter, |c| matches!(c, '*' | '^' | '|'))
    };

    if candidate.len() < MIN_SHORTCUT_LEN {
        return None;
    }
    Some(candidate.to_lowercase())
}

fn shortcut_from_regex(pattern: &str) -> Option<String> {
    // Lookahead makes any literal conditional; such rules go shortcut-less.
    if pattern.contains("(?") {
        return None;
    }

    // Replace balanced groups and escaped sequences with a placeholder so
    // they cannot contribute literal text.
    const PLACEHOLDER: char = '\u{1}';
    let mut cleaned = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut depth = 0u32;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
                if depth == 0 {
                    cleaned.push(PLACEHOLDER);
                }
            }
            '(' | '[' | '{' => {
                if depth == 0 {
                    cleaned.push(PLACEHOLDER);
                }
                depth += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
            }
            _ if depth > 0 => {}
            _ => cleaned.push(c),
        }
    }

    Some(longest_literal_run(&cleaned, |c| {
        matches!(c, '*' | '+' | '?' | '^' | '$' | '|' | '.' | '/' | '\u{1}')
    }))
}

fn longest_literal_run(text: &str, is_separator: impl Fn(char) -> bool) -> String {
    text.split(is_separator)
        .max_by_key(|run| run.len())
        .unwrap_or("")
        .to_string()
}

// =============================================================================
// Rule store
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("invalid content-blocker document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

/// Ordered, indexed collection of compiled rules.
pub struct RuleStore {
    rules: Vec<BlockerRule>,
}

impl RuleStore {
    /// Parse a content-blocker JSON array, preserving entry order.
    pub fn parse(json: &str) -> Result<Self, RuleStoreError> {
        let entries: Vec<BlockerEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<BlockerEntry>) -> Self {
        let rules = entries.into_iter().map(BlockerRule::new).collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BlockerRule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockerRule> {
        self.rules.iter()
    }
}
