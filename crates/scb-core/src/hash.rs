//! Hash functions for the lookup index
//!
//! Both the domain table and the shortcut table are keyed with the same
//! DJB2-style rolling hash so an index built by one process can be probed
//! by another without any shared seed material.

/// DJB2 seed value.
const DJB2_SEED: u32 = 5381;

/// DJB2 rolling hash over a byte slice.
///
/// `h = h * 33 + byte`, computed with wrapping arithmetic. Short keys
/// (domain suffixes, 5-byte shortcut windows) dominate the workload, so a
/// multiplicative byte-at-a-time hash beats anything with setup cost.
#[inline]
pub fn djb2(data: &[u8]) -> u32 {
    let mut h = DJB2_SEED;
    for &b in data {
        h = (h << 5).wrapping_add(h).wrapping_add(b as u32);
    }
    h
}

/// Hash a domain suffix for the domain table.
/// Lowercases ASCII bytes on the fly so probes are case-insensitive.
#[inline]
pub fn hash_domain(domain: &str) -> u32 {
    let mut h = DJB2_SEED;
    for &b in domain.as_bytes() {
        let b = if b.is_ascii_uppercase() { b + 32 } else { b };
        h = (h << 5).wrapping_add(h).wrapping_add(b as u32);
    }
    h
}

/// Window width used by the shortcut table.
pub const SHORTCUT_WINDOW: usize = 5;

/// Hash one 5-byte shortcut window.
#[inline]
pub fn hash_window(window: &[u8]) -> u32 {
    debug_assert_eq!(window.len(), SHORTCUT_WINDOW);
    djb2(window)
}
