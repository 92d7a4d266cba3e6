//! Filter list line parser.
//!
//! Splits a filter list into network rules and cosmetic rules before any
//! content-blocker JSON is produced. Parsing is strict per line and lax
//! per list: a line the parser cannot express is reported as an error and
//! the rest of the list keeps going.

use once_cell::sync::Lazy;
use scb_core::PrefixMatcher;
use thiserror::Error;

/// Cosmetic rule markers, longest first so the prefix matcher picks the
/// most specific one at a given position.
const COSMETIC_MARKERS: &[&str] = &["#@$#", "#@#", "#$#", "#%#", "##"];

static MARKER_MATCHER: Lazy<PrefixMatcher> =
    Lazy::new(|| PrefixMatcher::new(COSMETIC_MARKERS.iter().map(|m| m.to_string())));

// ============================================================================
// Parsed rule model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRule {
    Network(NetworkRule),
    Cosmetic(CosmeticRule),
}

/// A network rule: a URL pattern plus the modifiers that survived option
/// parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRule {
    pub pattern: String,
    pub is_exception: bool,
    pub important: bool,
    /// `$document` on an exception: disable all filtering on the page.
    pub document_level: bool,
    /// `$elemhide` / `$generichide`: cancel cosmetic rules only.
    pub cancels_cosmetics: bool,
    pub match_case: bool,
    /// `$third-party` / `$~third-party`.
    pub third_party: Option<bool>,
    pub permitted_domains: Vec<String>,
    pub restricted_domains: Vec<String>,
    pub resource_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmeticBody {
    /// `##`: hide elements matching a CSS selector.
    ElementHide { selector: String },
    /// `#$#`: inject a CSS rule.
    CssInject { css: String },
    /// `#%#//scriptlet(...)`: run a named scriptlet.
    Scriptlet { name: String, param: Option<String> },
    /// `#%#`: run raw JavaScript.
    Script { script: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmeticRule {
    pub permitted_domains: Vec<String>,
    pub restricted_domains: Vec<String>,
    pub body: CosmeticBody,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty rule body")]
    EmptyBody,

    #[error("unsupported option: {0}")]
    UnsupportedOption(String),

    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("unsupported marker: {0}")]
    UnsupportedMarker(String),

    #[error("domain list mixes inclusions and exclusions")]
    MixedDomainList,

    #[error("malformed scriptlet body: {0}")]
    MalformedScriptlet(String),
}

// ============================================================================
// Line parsing
// ============================================================================

/// Parses one trimmed filter list line. Returns `None` for blank lines
/// and comments.
pub fn parse_rule_line(line: &str) -> Result<Option<ParsedRule>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
        return Ok(None);
    }

    if let Some((pos, marker)) = find_cosmetic_marker(line) {
        // Cosmetic exceptions cancel rules this compiler never emits;
        // skip them like comments instead of charging an error.
        if matches!(marker, "#@#" | "#@$#") {
            return Ok(None);
        }
        return parse_cosmetic_rule(&line[..pos], marker, &line[pos + marker.len()..])
            .map(|r| Some(ParsedRule::Cosmetic(r)));
    }

    parse_network_rule(line).map(|r| Some(ParsedRule::Network(r)))
}

/// Finds the leftmost cosmetic marker in a line. Scans for `#` and asks
/// the prefix matcher whether a marker starts there.
fn find_cosmetic_marker(line: &str) -> Option<(usize, &'static str)> {
    for (pos, _) in line.match_indices('#') {
        if let Some(found) = MARKER_MATCHER.longest_match(&line[pos..]) {
            let marker = COSMETIC_MARKERS
                .iter()
                .copied()
                .find(|m| *m == found)?;
            return Some((pos, marker));
        }
    }
    None
}

fn parse_cosmetic_rule(
    domains: &str,
    marker: &str,
    body: &str,
) -> Result<CosmeticRule, ParseError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ParseError::EmptyBody);
    }

    let (permitted, restricted) = parse_domain_list(domains, ',')?;

    let body = match marker {
        "##" => CosmeticBody::ElementHide {
            selector: body.to_string(),
        },
        "#$#" => CosmeticBody::CssInject {
            css: body.to_string(),
        },
        "#%#" => {
            if let Some(inner) = body.strip_prefix("//scriptlet(") {
                let (name, param) = parse_scriptlet_body(inner)?;
                CosmeticBody::Scriptlet { name, param }
            } else {
                CosmeticBody::Script {
                    script: body.to_string(),
                }
            }
        }
        other => return Err(ParseError::UnsupportedMarker(other.to_string())),
    };

    Ok(CosmeticRule {
        permitted_domains: permitted,
        restricted_domains: restricted,
        body,
    })
}

/// Parses `'name', 'arg')` as left by stripping the `//scriptlet(`
/// prefix. Arguments past the first are folded into one parameter
/// string.
fn parse_scriptlet_body(inner: &str) -> Result<(String, Option<String>), ParseError> {
    let inner = inner
        .strip_suffix(')')
        .ok_or_else(|| ParseError::MalformedScriptlet(inner.to_string()))?;

    let mut parts = inner.splitn(2, ',');
    let name = unquote(parts.next().unwrap_or("").trim());
    if name.is_empty() {
        return Err(ParseError::MalformedScriptlet(inner.to_string()));
    }

    let param = parts
        .next()
        .map(|rest| {
            rest.split(',')
                .map(|a| unquote(a.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|p| !p.is_empty());

    Ok((name, param))
}

fn unquote(s: &str) -> String {
    let s = s
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s);
    s.to_string()
}

// ============================================================================
// Network rules
// ============================================================================

fn parse_network_rule(line: &str) -> Result<NetworkRule, ParseError> {
    let mut rule = NetworkRule::default();

    let mut line = line;
    if let Some(rest) = line.strip_prefix("@@") {
        rule.is_exception = true;
        line = rest.trim_start();
    }

    let (pattern, options) = split_rule_options(line);
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(ParseError::EmptyBody);
    }
    rule.pattern = pattern.to_string();

    if let Some(options) = options {
        apply_options(&mut rule, options)?;
    }

    Ok(rule)
}

/// Splits a rule at its options delimiter. Regex rules (`/.../`) never
/// carry options here, which keeps `$` inside the regex body intact.
fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    if line.len() > 2 && line.starts_with('/') && line.ends_with('/') {
        return (line, None);
    }
    match line.rfind('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

fn apply_options(rule: &mut NetworkRule, options: &str) -> Result<(), ParseError> {
    for raw in options.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let lower = raw.to_ascii_lowercase();

        match lower.as_str() {
            "important" => rule.important = true,
            "match-case" => rule.match_case = true,
            "document" => rule.document_level = true,
            "elemhide" | "generichide" => rule.cancels_cosmetics = true,
            "third-party" => rule.third_party = Some(true),
            "~third-party" => rule.third_party = Some(false),
            _ => {
                if let Some(domains) = lower.strip_prefix("domain=") {
                    let (permitted, restricted) = parse_domain_list(domains, '|')?;
                    rule.permitted_domains = permitted;
                    rule.restricted_domains = restricted;
                } else if let Some(safari_type) = map_resource_type(&lower) {
                    if !rule.resource_types.contains(&safari_type.to_string()) {
                        rule.resource_types.push(safari_type.to_string());
                    }
                } else if lower.starts_with('~') {
                    return Err(ParseError::UnsupportedResourceType(raw.to_string()));
                } else {
                    return Err(ParseError::UnsupportedOption(raw.to_string()));
                }
            }
        }
    }
    Ok(())
}

/// Maps a filter list resource type to the content-blocker vocabulary.
fn map_resource_type(name: &str) -> Option<&'static str> {
    match name {
        "script" => Some("script"),
        "image" => Some("image"),
        "stylesheet" => Some("style-sheet"),
        "font" => Some("font"),
        "media" => Some("media"),
        "popup" => Some("popup"),
        "subdocument" => Some("document"),
        "xmlhttprequest" | "websocket" | "ping" | "other" => Some("raw"),
        _ => None,
    }
}

/// Parses a separated domain list with `~` exclusions. A list that mixes
/// inclusions and exclusions cannot be expressed in a single trigger and
/// is rejected outright.
fn parse_domain_list(
    text: &str,
    separator: char,
) -> Result<(Vec<String>, Vec<String>), ParseError> {
    let mut permitted = Vec::new();
    let mut restricted = Vec::new();

    for part in text.split(separator) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.strip_prefix('~') {
            Some(domain) => restricted.push(domain.to_ascii_lowercase()),
            None => permitted.push(part.to_ascii_lowercase()),
        }
    }

    if !permitted.is_empty() && !restricted.is_empty() {
        return Err(ParseError::MixedDomainList);
    }
    Ok((permitted, restricted))
}
