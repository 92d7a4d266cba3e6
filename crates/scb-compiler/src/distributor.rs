//! Final document assembly.
//!
//! Collects built entries into their buckets, concatenates the buckets in
//! document order, applies the rule-count and byte-size caps and renders
//! the JSON array. Safari enforces a hard limit on content-blocker list
//! size, so truncation is part of the contract rather than an error.

use scb_core::{Action, BlockerEntry, Trigger};

use crate::builder::Category;

/// Caps applied while assembling the document.
#[derive(Debug, Clone, Copy)]
pub struct DistributorConfig {
    /// Maximum number of entries in the final document.
    pub max_rules: usize,
    /// Optional cap on the rendered JSON size in bytes.
    pub max_json_size_bytes: Option<usize>,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            // Safari's per-list ceiling.
            max_rules: 150_000,
            max_json_size_bytes: None,
        }
    }
}

/// Entries grouped by bucket, in insertion order within each bucket.
#[derive(Debug, Default)]
pub struct Distributor {
    cosmetic_wide: Vec<BlockerEntry>,
    cosmetic_domain: Vec<BlockerEntry>,
    generic_hide_exceptions: Vec<BlockerEntry>,
    url_blocking: Vec<BlockerEntry>,
    exceptions: Vec<BlockerEntry>,
    important_overrides: Vec<BlockerEntry>,
    document_exceptions: Vec<BlockerEntry>,
}

/// The rendered document plus what happened to get there.
#[derive(Debug)]
pub struct DistributionResult {
    pub json: String,
    /// Entries that made it into the document.
    pub included: usize,
    /// Entries dropped by the count or size caps.
    pub discarded: usize,
}

impl Distributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BlockerEntry, category: Category) {
        let bucket = match category {
            Category::CosmeticWide => &mut self.cosmetic_wide,
            Category::CosmeticDomainScoped => &mut self.cosmetic_domain,
            Category::GenericHideException => &mut self.generic_hide_exceptions,
            Category::UrlBlocking => &mut self.url_blocking,
            Category::Exception => &mut self.exceptions,
            Category::ImportantOverride => &mut self.important_overrides,
            Category::DocumentException => &mut self.document_exceptions,
        };
        bucket.push(entry);
    }

    pub fn len(&self) -> usize {
        self.cosmetic_wide.len()
            + self.cosmetic_domain.len()
            + self.generic_hide_exceptions.len()
            + self.url_blocking.len()
            + self.exceptions.len()
            + self.important_overrides.len()
            + self.document_exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the final JSON document, truncating at the configured
    /// caps. Bucket order is fixed; truncation cuts from the tail.
    pub fn assemble(self, config: &DistributorConfig) -> DistributionResult {
        let total = self.len();
        let entries = [
            self.cosmetic_wide,
            self.cosmetic_domain,
            self.generic_hide_exceptions,
            self.url_blocking,
            self.exceptions,
            self.important_overrides,
            self.document_exceptions,
        ];
        let entries = entries.into_iter().flatten();

        let mut json = String::from("[");
        let mut included = 0usize;

        for entry in entries.take(config.max_rules) {
            // An entry the serializer cannot render does not exist.
            let rendered = match serde_json::to_string(&entry) {
                Ok(rendered) => rendered,
                Err(err) => {
                    log::warn!("failed to serialize entry: {err}");
                    continue;
                }
            };

            let separator = if included == 0 { 0 } else { 1 };
            if let Some(cap) = config.max_json_size_bytes {
                if json.len() + separator + rendered.len() + 1 > cap {
                    break;
                }
            }

            if included > 0 {
                json.push(',');
            }
            json.push_str(&rendered);
            included += 1;
        }

        if included == 0 {
            return DistributionResult {
                json: empty_document(),
                included: 0,
                discarded: total,
            };
        }

        json.push(']');
        DistributionResult {
            json,
            included,
            discarded: total - included,
        }
    }
}

/// A content-blocker list must not be empty. The placeholder entry is an
/// `ignore-previous-rules` trigger scoped to an unregistrable domain, so
/// it can never change matching behavior.
fn empty_document() -> String {
    let placeholder = BlockerEntry {
        trigger: Trigger {
            url_filter: ".*".to_string(),
            if_domain: Some(vec!["*placeholder.invalid".to_string()]),
            ..Trigger::default()
        },
        action: Action::IgnorePreviousRules,
    };
    // A fixed struct always serializes.
    serde_json::to_string(&vec![placeholder]).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_entry(filter: &str) -> BlockerEntry {
        BlockerEntry {
            trigger: Trigger {
                url_filter: filter.to_string(),
                ..Trigger::default()
            },
            action: Action::Block,
        }
    }

    fn parse(json: &str) -> Vec<BlockerEntry> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn buckets_render_in_document_order() {
        let mut distributor = Distributor::new();
        distributor.push(block_entry("block"), Category::UrlBlocking);
        distributor.push(block_entry("important"), Category::ImportantOverride);
        distributor.push(block_entry("wide"), Category::CosmeticWide);
        distributor.push(block_entry("exception"), Category::Exception);

        let result = distributor.assemble(&DistributorConfig::default());
        let filters: Vec<String> = parse(&result.json)
            .into_iter()
            .map(|e| e.trigger.url_filter)
            .collect();
        assert_eq!(filters, vec!["wide", "block", "exception", "important"]);
        assert_eq!(result.included, 4);
        assert_eq!(result.discarded, 0);
    }

    #[test]
    fn rule_cap_cuts_the_tail() {
        let mut distributor = Distributor::new();
        for i in 0..5 {
            distributor.push(block_entry(&format!("rule-{i}")), Category::UrlBlocking);
        }

        let config = DistributorConfig {
            max_rules: 3,
            max_json_size_bytes: None,
        };
        let result = distributor.assemble(&config);
        assert_eq!(result.included, 3);
        assert_eq!(result.discarded, 2);
        assert_eq!(parse(&result.json).len(), 3);
    }

    #[test]
    fn byte_cap_stops_early() {
        let mut distributor = Distributor::new();
        for i in 0..10 {
            distributor.push(block_entry(&format!("rule-{i}")), Category::UrlBlocking);
        }

        let one_entry = serde_json::to_string(&block_entry("rule-0")).unwrap();
        let config = DistributorConfig {
            max_rules: 150_000,
            max_json_size_bytes: Some(one_entry.len() * 2),
        };
        let result = distributor.assemble(&config);
        assert!(result.included >= 1);
        assert!(result.included < 10);
        assert!(result.json.len() <= one_entry.len() * 2);
        assert_eq!(result.included + result.discarded, 10);
    }

    #[test]
    fn empty_input_yields_placeholder_document() {
        let result = Distributor::new().assemble(&DistributorConfig::default());
        assert_eq!(result.included, 0);
        let entries = parse(&result.json);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, Action::IgnorePreviousRules);
        assert_eq!(
            entries[0].trigger.if_domain,
            Some(vec!["*placeholder.invalid".to_string()])
        );
    }
}
