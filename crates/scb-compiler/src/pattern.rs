//! Filter pattern to regex translation.
//!
//! Filter patterns use three mask characters on top of plain text: `|`
//! anchors the start or end of the URL, `||` anchors the start of a
//! (sub)domain, and `^` matches a separator. `*` is a wildcard. Everything
//! else is literal text and gets escaped before it lands in the regex.

use thiserror::Error;

/// Regex matching any URL. Patterns that carry no information at all
/// (`*`, `|`, `||`) short-circuit to this instead of going through the
/// translator.
pub const REGEX_ANY_URL: &str = ".*";

/// Expansion of the `||` mask: any supported scheme followed by an
/// optional subdomain chain.
pub const REGEX_START_URL: &str = "^[htpsw]+:\\/\\/([a-z0-9-]+\\.)?";

/// Expansion of `^` in the middle of a pattern: at most one separator.
const REGEX_SEPARATOR: &str = "[\\/:&\\?]?";

/// Expansion of `^` at the end of a pattern: a separator followed by
/// anything, or nothing at all (end of the URL counts as a separator).
const REGEX_END_SEPARATOR: &str = "([\\/:&\\?].*)?$";

/// Regex metacharacters that must be escaped when they appear as literal
/// text in a filter pattern.
const SPECIAL_CHARS: &[char] = &[
    '.', '+', '?', '$', '{', '}', '(', ')', '[', ']', '/', '\\',
];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("unsupported regex: {0}")]
    UnsupportedRegex(String),
}

// ============================================================================
// Pattern translation
// ============================================================================

/// Translates a filter pattern into the regex string stored in the
/// `url-filter` field of a content-blocker trigger.
///
/// The translation is a single left-to-right pass; there is no AST. Mask
/// characters expand to fixed regex fragments and everything else is
/// escaped literally.
pub fn compile_pattern(pattern: &str) -> Result<String, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern == "*" || pattern == "|" || pattern == "||" {
        return Ok(REGEX_ANY_URL.to_string());
    }

    let mut out = String::with_capacity(pattern.len() * 2);
    let chars: Vec<char> = pattern.chars().collect();
    let last = chars.len() - 1;

    let mut i = 0;
    while i <= last {
        let c = chars[i];
        match c {
            '|' => {
                if i == 0 {
                    if chars.get(1) == Some(&'|') {
                        out.push_str(REGEX_START_URL);
                        i += 2;
                        continue;
                    }
                    out.push('^');
                } else if i == last {
                    out.push('$');
                } else {
                    // A pipe inside the pattern is literal text.
                    out.push_str("\\|");
                }
            }
            '^' => {
                if i == last {
                    out.push_str(REGEX_END_SEPARATOR);
                } else {
                    out.push_str(REGEX_SEPARATOR);
                }
            }
            '*' => out.push_str(".*"),
            c if SPECIAL_CHARS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        i += 1;
    }

    Ok(out)
}

/// Translates the pattern of a network rule into a `url-filter` value.
///
/// Rules delimited by `/` carry a raw regex: the delimiters are stripped
/// and the body is checked against the supported subset instead of being
/// translated.
pub fn url_filter_for_pattern(pattern: &str) -> Result<String, PatternError> {
    if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        let body = &pattern[1..pattern.len() - 1];
        if !is_supported_regex(body) {
            return Err(PatternError::UnsupportedRegex(body.to_string()));
        }
        return Ok(body.to_string());
    }
    compile_pattern(pattern)
}

// ============================================================================
// Regex subset validation
// ============================================================================

/// Checks a raw regex against the subset the content-blocker engine
/// accepts.
///
/// Rejected constructs: unescaped alternation, non-capturing or named
/// groups (`(?`), shorthand classes (`\d`, `\w`, `\s`, `\b` and their
/// uppercase forms), backreferences, stacked quantifiers, and unbalanced
/// brackets or parentheses. Character class contents are treated as
/// opaque so POSIX classes like `[[:alpha:]]` pass through.
pub fn is_supported_regex(regex: &str) -> bool {
    let chars: Vec<char> = regex.chars().collect();
    let mut paren_depth: i32 = 0;
    let mut in_class = false;
    let mut prev_quantifier = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '\\' {
            let Some(&next) = chars.get(i + 1) else {
                return false;
            };
            if matches!(next, 'd' | 'w' | 's' | 'b' | 'D' | 'W' | 'S' | 'B')
                || next.is_ascii_digit()
            {
                return false;
            }
            prev_quantifier = false;
            i += 2;
            continue;
        }

        if in_class {
            // POSIX classes like [:alpha:] nest inside a class; their
            // closing "]" must not terminate the outer class.
            if c == '[' && chars.get(i + 1) == Some(&':') {
                let mut j = i + 2;
                loop {
                    match chars.get(j) {
                        Some(&':') if chars.get(j + 1) == Some(&']') => break,
                        Some(_) => j += 1,
                        None => return false,
                    }
                }
                i = j + 2;
                continue;
            }
            if c == ']' {
                in_class = false;
            }
            i += 1;
            continue;
        }

        match c {
            '[' => {
                in_class = true;
                prev_quantifier = false;
            }
            ']' => return false,
            '(' => {
                if chars.get(i + 1) == Some(&'?') {
                    return false;
                }
                paren_depth += 1;
                prev_quantifier = false;
            }
            ')' => {
                paren_depth -= 1;
                if paren_depth < 0 {
                    return false;
                }
                prev_quantifier = false;
            }
            '|' => return false,
            '*' | '+' | '?' => {
                if prev_quantifier {
                    return false;
                }
                prev_quantifier = true;
            }
            '{' => {
                // A bounded repetition counts as a quantifier.
                let Some(close) = chars[i..].iter().position(|&c| c == '}') else {
                    return false;
                };
                if prev_quantifier {
                    return false;
                }
                prev_quantifier = true;
                i += close + 1;
                continue;
            }
            '}' => return false,
            _ => prev_quantifier = false,
        }
        i += 1;
    }

    paren_depth == 0 && !in_class
}
