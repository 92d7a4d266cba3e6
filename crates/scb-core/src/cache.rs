//! Per-URL result cache
//!
//! Repeated navigation events query the same URL over and over; memoizing
//! the matcher output sidesteps the candidate walk entirely. Racing
//! misses recompute redundantly and the last writer wins, which is safe
//! because the payload for a given URL is deterministic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::matcher::MatchPayload;

pub struct ResultCache {
    entries: RwLock<HashMap<String, Arc<MatchPayload>>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached payload for `url`, computing and storing it on a
    /// miss.
    pub fn get_or_compute(
        &self,
        url: &str,
        compute: impl FnOnce() -> MatchPayload,
    ) -> Arc<MatchPayload> {
        if let Some(hit) = self.entries.read().expect("cache lock poisoned").get(url) {
            return Arc::clone(hit);
        }

        let payload = Arc::new(compute());
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(url.to_string(), Arc::clone(&payload));
        payload
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached results, e.g. after the engine is rebuilt.
    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_per_url() {
        let cache = ResultCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_compute("https://example.com/", || {
                calls += 1;
                MatchPayload::default()
            });
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_urls_cached_separately() {
        let cache = ResultCache::new();
        cache.get_or_compute("https://a.example/", MatchPayload::default);
        cache.get_or_compute("https://b.example/", MatchPayload::default);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ResultCache::new();
        cache.get_or_compute("https://a.example/", MatchPayload::default);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_access_is_safe() {
        use std::sync::Arc as StdArc;
        let cache = StdArc::new(ResultCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = StdArc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.get_or_compute("https://example.com/", MatchPayload::default);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
    }
}
