//! Persisted engine binary
//!
//! Layout: a `u32`-length-prefixed UTF-8 scheme-version tag followed by
//! the serialized rule container. A reader with a different scheme
//! version fails the load outright; the caller rebuilds from rule text
//! instead of guessing at a migration.

use crate::rules::BlockerEntry;

/// Scheme version written by this build. Bump on any incompatible change
/// to the rule container encoding.
pub const SCHEME_VERSION: &str = "scb/2";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("scheme version mismatch: found {found:?}, expected {expected:?}")]
    SchemeVersion { found: String, expected: String },
    #[error("truncated engine binary")]
    Truncated,
    #[error("version tag is not valid UTF-8")]
    InvalidTag,
    #[error("invalid rule container: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

/// Serialize the rule container behind the current scheme-version tag.
pub fn encode_engine(entries: &[BlockerEntry]) -> Result<Vec<u8>, StorageError> {
    let tag = SCHEME_VERSION.as_bytes();
    let payload = serde_json::to_vec(entries)?;

    let mut out = Vec::with_capacity(4 + tag.len() + payload.len());
    out.extend_from_slice(&(tag.len() as u32).to_le_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a persisted engine binary, verifying the scheme-version tag.
pub fn decode_engine(bytes: &[u8]) -> Result<Vec<BlockerEntry>, StorageError> {
    let tag_len_bytes = bytes.get(..4).ok_or(StorageError::Truncated)?;
    let tag_len = u32::from_le_bytes(tag_len_bytes.try_into().unwrap()) as usize;
    let tag_bytes = bytes.get(4..4 + tag_len).ok_or(StorageError::Truncated)?;
    let tag = std::str::from_utf8(tag_bytes).map_err(|_| StorageError::InvalidTag)?;

    if tag != SCHEME_VERSION {
        return Err(StorageError::SchemeVersion {
            found: tag.to_string(),
            expected: SCHEME_VERSION.to_string(),
        });
    }

    let entries = serde_json::from_slice(&bytes[4 + tag_len..])?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Action, Trigger};

    fn sample_entries() -> Vec<BlockerEntry> {
        vec![
            BlockerEntry {
                trigger: Trigger {
                    url_filter: ".*".into(),
                    if_domain: Some(vec!["*example.com".into()]),
                    ..Trigger::default()
                },
                action: Action::CssDisplayNone {
                    selector: ".ads".into(),
                },
            },
            BlockerEntry {
                trigger: Trigger {
                    url_filter: "^https:".into(),
                    ..Trigger::default()
                },
                action: Action::Block,
            },
        ]
    }

    #[test]
    fn round_trip() {
        let entries = sample_entries();
        let bytes = encode_engine(&entries).unwrap();
        let decoded = decode_engine(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn version_mismatch_fails_the_load() {
        let mut bytes = encode_engine(&sample_entries()).unwrap();
        // Corrupt the tag in place.
        bytes[4] = b'x';
        match decode_engine(&bytes) {
            Err(StorageError::SchemeVersion { expected, .. }) => {
                assert_eq!(expected, SCHEME_VERSION);
            }
            other => panic!("expected scheme version error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_binary_fails() {
        let bytes = encode_engine(&sample_entries()).unwrap();
        assert!(matches!(
            decode_engine(&bytes[..2]),
            Err(StorageError::Truncated)
        ));
    }

    #[test]
    fn garbage_payload_fails() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(SCHEME_VERSION.len() as u32).to_le_bytes());
        bytes.extend_from_slice(SCHEME_VERSION.as_bytes());
        bytes.extend_from_slice(b"not json");
        assert!(matches!(
            decode_engine(&bytes),
            Err(StorageError::InvalidDocument(_))
        ));
    }
}
