//! Parsed rule to content-blocker entry conversion.
//!
//! Every parsed rule becomes one [`BlockerEntry`] tagged with the bucket
//! it belongs to. Bucket order is what makes `ignore-previous-rules`
//! semantics work: an exception only cancels entries placed before it in
//! the final document.

use scb_core::{Action, BlockerEntry, Trigger};
use thiserror::Error;

use crate::parser::{CosmeticBody, CosmeticRule, NetworkRule, ParsedRule};
use crate::pattern::{url_filter_for_pattern, PatternError, REGEX_ANY_URL};

/// Output buckets, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Cosmetic rules with no domain restriction.
    CosmeticWide,
    /// Cosmetic rules scoped to specific domains.
    CosmeticDomainScoped,
    /// `$elemhide` / `$generichide` exceptions cancelling cosmetics.
    GenericHideException,
    /// Plain blocking rules.
    UrlBlocking,
    /// `@@` exceptions for blocking rules.
    Exception,
    /// `$important` blocking rules, placed after plain exceptions.
    ImportantOverride,
    /// `$document` exceptions and exceptions to `$important` rules.
    DocumentException,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("cannot extract a domain from pattern: {0}")]
    NoDomain(String),
}

/// Converts one parsed rule into an entry plus its bucket.
pub fn build_entry(rule: &ParsedRule) -> Result<(BlockerEntry, Category), BuildError> {
    match rule {
        ParsedRule::Cosmetic(rule) => build_cosmetic_entry(rule),
        ParsedRule::Network(rule) => build_network_entry(rule),
    }
}

// ============================================================================
// Cosmetic rules
// ============================================================================

fn build_cosmetic_entry(rule: &CosmeticRule) -> Result<(BlockerEntry, Category), BuildError> {
    let trigger = Trigger {
        url_filter: REGEX_ANY_URL.to_string(),
        if_domain: domain_field(&rule.permitted_domains),
        unless_domain: domain_field(&rule.restricted_domains),
        ..Trigger::default()
    };

    let action = match &rule.body {
        CosmeticBody::ElementHide { selector } => Action::CssDisplayNone {
            selector: selector.clone(),
        },
        CosmeticBody::CssInject { css } => Action::CssInject { css: css.clone() },
        CosmeticBody::Scriptlet { name, param } => Action::Scriptlet {
            scriptlet: name.clone(),
            scriptlet_param: param.clone(),
        },
        CosmeticBody::Script { script } => Action::Script {
            script: script.clone(),
        },
    };

    let category = if rule.permitted_domains.is_empty() {
        Category::CosmeticWide
    } else {
        Category::CosmeticDomainScoped
    };

    Ok((BlockerEntry { trigger, action }, category))
}

// ============================================================================
// Network rules
// ============================================================================

fn build_network_entry(rule: &NetworkRule) -> Result<(BlockerEntry, Category), BuildError> {
    if rule.is_exception && rule.document_level {
        return build_domain_wide_exception(rule, Category::DocumentException);
    }
    if rule.is_exception && rule.cancels_cosmetics {
        return build_domain_wide_exception(rule, Category::GenericHideException);
    }

    let trigger = Trigger {
        url_filter: url_filter_for_pattern(&rule.pattern)?,
        if_domain: domain_field(&rule.permitted_domains),
        unless_domain: domain_field(&rule.restricted_domains),
        case_sensitive: rule.match_case.then_some(true),
        // The raw pattern yields a better shortcut than anything that can
        // be recovered from the compiled regex.
        url_shortcut: scb_core::rules::derive_shortcut(&rule.pattern),
        resource_type: (!rule.resource_types.is_empty()).then(|| rule.resource_types.clone()),
        load_type: rule.third_party.map(|third| {
            vec![if third { "third-party" } else { "first-party" }.to_string()]
        }),
    };

    let (action, category) = if rule.is_exception {
        let category = if rule.important {
            // Exceptions to important rules have to come after them.
            Category::DocumentException
        } else {
            Category::Exception
        };
        (Action::IgnorePreviousRules, category)
    } else if rule.important {
        (Action::Block, Category::ImportantOverride)
    } else {
        (Action::Block, Category::UrlBlocking)
    };

    Ok((BlockerEntry { trigger, action }, category))
}

/// Builds an `ignore-previous-rules` entry that fires for every URL on
/// the domain named by the rule's pattern.
fn build_domain_wide_exception(
    rule: &NetworkRule,
    category: Category,
) -> Result<(BlockerEntry, Category), BuildError> {
    let domain = extract_domain(&rule.pattern)
        .ok_or_else(|| BuildError::NoDomain(rule.pattern.clone()))?;

    let trigger = Trigger {
        url_filter: REGEX_ANY_URL.to_string(),
        if_domain: domain_field(&[domain]),
        ..Trigger::default()
    };

    Ok((
        BlockerEntry {
            trigger,
            action: Action::IgnorePreviousRules,
        },
        category,
    ))
}

/// Pulls the domain out of an anchored pattern such as `||example.com^`
/// or `|https://example.com/`.
fn extract_domain(pattern: &str) -> Option<String> {
    let rest = if let Some(rest) = pattern.strip_prefix("||") {
        rest
    } else {
        let unanchored = pattern.strip_prefix('|').unwrap_or(pattern);
        match unanchored.find("://") {
            Some(pos) => &unanchored[pos + 3..],
            None => unanchored,
        }
    };

    let end = rest
        .find(|c| matches!(c, '^' | '/' | '$' | '*' | ':' | '?' | '|'))
        .unwrap_or(rest.len());
    let domain = &rest[..end];

    if domain.is_empty() || !domain.contains('.') {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

/// Formats a domain list for an `if-domain` / `unless-domain` field. A
/// leading `*` opts the entry into subdomain matching; wildcard-TLD
/// domains are carried through unchanged.
fn domain_field<S: AsRef<str>>(domains: &[S]) -> Option<Vec<String>> {
    if domains.is_empty() {
        return None;
    }
    Some(
        domains
            .iter()
            .map(|d| {
                let d = d.as_ref();
                if d.ends_with(".*") {
                    d.to_string()
                } else {
                    format!("*{d}")
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_rule_line;

    fn build(line: &str) -> (BlockerEntry, Category) {
        let rule = parse_rule_line(line).unwrap().unwrap();
        build_entry(&rule).unwrap()
    }

    #[test]
    fn scoped_element_hide() {
        let (entry, category) = build("example.com##.ads-banner");
        assert_eq!(category, Category::CosmeticDomainScoped);
        assert_eq!(entry.trigger.url_filter, ".*");
        assert_eq!(
            entry.trigger.if_domain,
            Some(vec!["*example.com".to_string()])
        );
        assert_eq!(
            entry.action,
            Action::CssDisplayNone {
                selector: ".ads-banner".to_string()
            }
        );
    }

    #[test]
    fn generic_element_hide_is_wide() {
        let (entry, category) = build("##.sponsored");
        assert_eq!(category, Category::CosmeticWide);
        assert_eq!(entry.trigger.if_domain, None);
    }

    #[test]
    fn blocking_rule_with_resource_type() {
        let (entry, category) = build("||test.com^$image");
        assert_eq!(category, Category::UrlBlocking);
        assert_eq!(
            entry.trigger.url_filter,
            "^[htpsw]+:\\/\\/([a-z0-9-]+\\.)?test\\.com([\\/:&\\?].*)?$"
        );
        assert_eq!(
            entry.trigger.resource_type,
            Some(vec!["image".to_string()])
        );
        assert_eq!(entry.action, Action::Block);
    }

    #[test]
    fn third_party_maps_to_load_type() {
        let (entry, _) = build("||ads.test.com^$third-party");
        assert_eq!(
            entry.trigger.load_type,
            Some(vec!["third-party".to_string()])
        );

        let (entry, _) = build("||ads.test.com^$~third-party");
        assert_eq!(
            entry.trigger.load_type,
            Some(vec!["first-party".to_string()])
        );
    }

    #[test]
    fn important_rules_land_after_exceptions() {
        let (_, category) = build("||ads.test.com^$important");
        assert_eq!(category, Category::ImportantOverride);

        let (_, category) = build("@@||ads.test.com^$important");
        assert_eq!(category, Category::DocumentException);
    }

    #[test]
    fn document_exception_is_domain_wide() {
        let (entry, category) = build("@@||example.com^$document");
        assert_eq!(category, Category::DocumentException);
        assert_eq!(entry.trigger.url_filter, ".*");
        assert_eq!(
            entry.trigger.if_domain,
            Some(vec!["*example.com".to_string()])
        );
        assert_eq!(entry.action, Action::IgnorePreviousRules);
    }

    #[test]
    fn generichide_exception() {
        let (entry, category) = build("@@||example.com^$generichide");
        assert_eq!(category, Category::GenericHideException);
        assert_eq!(entry.action, Action::IgnorePreviousRules);
        assert_eq!(
            entry.trigger.if_domain,
            Some(vec!["*example.com".to_string()])
        );
    }

    #[test]
    fn document_exception_without_domain_fails() {
        let rule = parse_rule_line("@@*$document").unwrap().unwrap();
        assert!(matches!(
            build_entry(&rule),
            Err(BuildError::NoDomain(_))
        ));
    }

    #[test]
    fn wildcard_tld_domain_is_not_double_starred() {
        let (entry, _) = build("google.*##.ads");
        assert_eq!(entry.trigger.if_domain, Some(vec!["google.*".to_string()]));
    }

    #[test]
    fn unsupported_regex_pattern_is_rejected() {
        let rule = parse_rule_line("/ads\\d+/").unwrap().unwrap();
        assert!(matches!(
            build_entry(&rule),
            Err(BuildError::Pattern(PatternError::UnsupportedRegex(_)))
        ));
    }
}
