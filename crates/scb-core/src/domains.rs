//! Domain scoping helpers
//!
//! Implements the `if-domain` / `unless-domain` matching rules: exact
//! hosts, subdomains, the `*example.com` wildcard-prefix form, and the
//! `example.*` wildcard-TLD form which resolves the public suffix first.

/// Common two-part public suffixes used when resolving the wildcard-TLD
/// domain form. A full Public Suffix List is overkill for trigger scoping;
/// this mirrors the registrable-domain heuristic used at compile time.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Iterator over dot-delimited host suffixes, most specific first:
/// `mail.google.com` yields `mail.google.com`, `google.com`, `com`.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = match result.find('.') {
            Some(idx) if idx + 1 < result.len() => Some(&result[idx + 1..]),
            _ => None,
        };
        Some(result)
    }
}

/// Walk host suffixes from the full host down to the last label.
pub fn host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter {
        current: if host.is_empty() { None } else { Some(host) },
    }
}

/// Registrable domain (eTLD+1) of a host, by heuristic.
pub fn registrable_domain(host: &str) -> &str {
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return host;
    }

    let last_two_len = labels[n - 2].len() + 1 + labels[n - 1].len();
    let last_two = &host[host.len() - last_two_len..];
    let keep = if COMMON_TWO_PART_TLDS.contains(&last_two) { 3 } else { 2 };

    let mut len = 0;
    for label in &labels[n - keep..] {
        len += label.len() + 1;
    }
    &host[host.len() - (len - 1)..]
}

/// Check one `if-domain` / `unless-domain` pattern against a host.
///
/// Forms, in the order they are tried:
/// - `*example.com` — host ends with the suffix after the `*`;
/// - `example.*` — the host's registrable domain, public suffix
///   stripped, equals the pattern base;
/// - `example.com` — exact host, or any subdomain of it.
pub fn is_domain_or_subdomain(host: &str, pattern: &str) -> bool {
    if host.is_empty() || pattern.is_empty() {
        return false;
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return host.ends_with(suffix);
    }

    if let Some(base) = pattern.strip_suffix(".*") {
        let etld1 = registrable_domain(host);
        return match etld1.find('.') {
            Some(idx) => &etld1[..idx] == base,
            None => etld1 == base,
        };
    }

    host == pattern
        || (host.len() > pattern.len()
            && host.ends_with(pattern)
            && host.as_bytes()[host.len() - pattern.len() - 1] == b'.')
}
