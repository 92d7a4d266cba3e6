//! Runtime engine for Safari content-blocker rules
//!
//! This crate evaluates a compiled content-blocker JSON document against
//! URLs to decide which cosmetic and script actions apply to a page. The
//! document is parsed once into an indexed rule store; queries run a
//! probabilistic pre-filter (hashed shortcut and domain tables) and then
//! exact trigger semantics with full override support.
//!
//! # Modules
//!
//! - `hash`: DJB2 rolling hash keying both lookup tables
//! - `trie`: compact serializable trie and the literal-prefix matcher
//! - `rules`: content-blocker JSON model and the compiled rule store
//! - `index`: shortcut/domain/catch-all lookup index
//! - `matcher`: per-URL matching with priority and override semantics
//! - `cache`: thread-safe per-URL result memoization
//! - `lock`: reentrant cross-process file lock for persisted engines
//! - `storage`: version-tagged engine persistence
//! - `domains`, `url`: host scoping and URL slicing helpers

pub mod cache;
pub mod domains;
pub mod hash;
pub mod index;
#[cfg(unix)]
pub mod lock;
pub mod matcher;
pub mod rules;
pub mod storage;
pub mod trie;
pub mod url;

pub use cache::ResultCache;
pub use index::NetworkEngine;
#[cfg(unix)]
pub use lock::FileLock;
pub use matcher::{MatchPayload, Matcher};
pub use rules::{Action, BlockerEntry, BlockerRule, RuleStore, Trigger};
pub use storage::{decode_engine, encode_engine, SCHEME_VERSION};
pub use trie::{CompactTrie, PrefixMatcher, TrieNode};
