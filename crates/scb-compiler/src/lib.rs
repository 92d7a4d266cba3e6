//! Safari Content-Blocker Compiler
//!
//! This crate compiles ABP-style filter lists into Safari content-blocker
//! JSON. Lines are parsed into network and cosmetic rules, built into
//! trigger/action entries, grouped into ordered buckets and rendered into
//! a single capped JSON document.

pub mod builder;
pub mod distributor;
pub mod parser;
pub mod pattern;

pub use builder::{build_entry, BuildError, Category};
pub use distributor::{DistributionResult, Distributor, DistributorConfig};
pub use parser::{parse_rule_line, CosmeticRule, NetworkRule, ParseError, ParsedRule};
pub use pattern::{compile_pattern, is_supported_regex, PatternError};

/// Per-run accounting for a filter list conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Rules that made it into the document.
    pub converted: usize,
    /// Rules cut by the count or size caps.
    pub discarded: usize,
    /// Lines that failed to parse or convert.
    pub errors: usize,
}

/// A finished conversion: the JSON document plus its stats.
#[derive(Debug)]
pub struct ConversionResult {
    pub json: String,
    pub stats: ConversionStats,
}

/// Compiles a filter list into a content-blocker JSON document.
///
/// Comments and blank lines are skipped. A line that cannot be parsed or
/// expressed counts as an error and the conversion keeps going; per-rule
/// failure is normal when feeding real-world lists.
pub fn compile_filter_list(text: &str, config: &DistributorConfig) -> ConversionResult {
    let mut distributor = Distributor::new();
    let mut errors = 0usize;

    for line in text.lines() {
        let parsed = match parser::parse_rule_line(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(err) => {
                log::debug!("skipping rule {line:?}: {err}");
                errors += 1;
                continue;
            }
        };

        match builder::build_entry(&parsed) {
            Ok((entry, category)) => distributor.push(entry, category),
            Err(err) => {
                log::debug!("cannot convert rule {line:?}: {err}");
                errors += 1;
            }
        }
    }

    let result = distributor.assemble(config);
    log::info!(
        "compiled {} entries ({} discarded, {} errors)",
        result.included,
        result.discarded,
        errors
    );

    ConversionResult {
        json: result.json,
        stats: ConversionStats {
            converted: result.included,
            discarded: result.discarded,
            errors,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scb_core::{Action, BlockerEntry};

    fn compile(lines: &[&str]) -> ConversionResult {
        compile_filter_list(&lines.join("\n"), &DistributorConfig::default())
    }

    #[test]
    fn mixed_list_end_to_end() {
        let result = compile(&["example.com##.ads-banner", "||test.com^$image"]);
        assert_eq!(result.stats.converted, 2);
        assert_eq!(result.stats.errors, 0);

        let entries: Vec<BlockerEntry> = serde_json::from_str(&result.json).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(
            entries[0].trigger.if_domain,
            Some(vec!["*example.com".to_string()])
        );
        assert_eq!(
            entries[0].action,
            Action::CssDisplayNone {
                selector: ".ads-banner".to_string()
            }
        );

        assert_eq!(
            entries[1].trigger.url_filter,
            "^[htpsw]+:\\/\\/([a-z0-9-]+\\.)?test\\.com([\\/:&\\?].*)?$"
        );
        assert_eq!(
            entries[1].trigger.resource_type,
            Some(vec!["image".to_string()])
        );
        assert_eq!(entries[1].action, Action::Block);
    }

    #[test]
    fn document_field_names_are_kebab_case() {
        let result = compile(&["||test.com^$image,domain=example.org"]);
        let value: serde_json::Value = serde_json::from_str(&result.json).unwrap();
        let trigger = &value[0]["trigger"];
        assert!(trigger["url-filter"].as_str().unwrap().contains("test"));
        assert_eq!(trigger["if-domain"][0], "*example.org");
        assert_eq!(trigger["resource-type"][0], "image");
        assert_eq!(value[0]["action"]["type"], "block");
    }

    #[test]
    fn bad_lines_are_counted_not_fatal() {
        let result = compile(&[
            "||ok.com^",
            "||bad.com^$unknownoption",
            "! just a comment",
            "example.com#@#.ads-banner",
            "/unsupported\\d/",
        ]);
        assert_eq!(result.stats.converted, 1);
        // The cosmetic exception is skipped like a comment, not counted.
        assert_eq!(result.stats.errors, 2);
    }

    #[test]
    fn exception_ordering_survives_compilation() {
        let result = compile(&[
            "@@||test.com^",
            "||test.com^",
            "##.sponsored",
            "||ads.test.com^$important",
        ]);
        let entries: Vec<BlockerEntry> = serde_json::from_str(&result.json).unwrap();
        let kinds: Vec<&Action> = entries.iter().map(|e| &e.action).collect();

        assert_eq!(entries.len(), 4);
        // wide cosmetic, blocking, exception, important.
        assert!(matches!(kinds[0], Action::CssDisplayNone { .. }));
        assert!(matches!(kinds[1], Action::Block));
        assert!(matches!(kinds[2], Action::IgnorePreviousRules));
        assert!(matches!(kinds[3], Action::Block));
    }

    #[test]
    fn compiled_document_round_trips_into_the_engine() {
        let result = compile(&[
            "||ads.example.org^",
            "@@||good.example.org^",
            "example.org##.promo",
        ]);

        let store = scb_core::RuleStore::parse(&result.json).unwrap();
        let index = scb_core::NetworkEngine::new(&store);
        let matcher = scb_core::Matcher::new(&store, &index);

        let lookup = index.lookup("https://ads.example.org/pixel.gif");
        assert!(!lookup.is_empty());

        // The cosmetic scope *example.org covers the subdomain too; the
        // block rule contributes no page payload of its own.
        let payload = matcher.match_url("https://ads.example.org/pixel.gif");
        assert_eq!(payload.css_extended, vec![".promo".to_string()]);

        let payload = matcher.match_url("https://example.org/index.html");
        assert_eq!(payload.css_extended, vec![".promo".to_string()]);

        let payload = matcher.match_url("https://clean.test/page");
        assert!(payload.is_empty());
    }
}
