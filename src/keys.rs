//! Deterministic surrogate keys
//!
//! Keys are a digest of the natural key, so the same location or hour maps to
//! the same id in every process and every run.

use crate::types::{JsonValue, ParsedRecord};
use sha2::{Digest, Sha256};

/// Surrogate key for the natural key `parts`, in `0..modulus`.
///
/// SHA-256 of the parts joined with `_`, first 8 bytes read big-endian.
pub fn surrogate_key<S: AsRef<str>>(parts: &[S], modulus: u64) -> u64 {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("_");
    let digest = Sha256::digest(joined.as_bytes());

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % modulus.max(1)
}

/// Surrogate key computed from record fields.
///
/// `None` when any natural-key field is missing or null.
pub fn record_surrogate_key(record: &ParsedRecord, fields: &[String], modulus: u64) -> Option<u64> {
    let parts = fields
        .iter()
        .map(|field| match record.get(field)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Option<Vec<_>>>()?;
    Some(surrogate_key(&parts, modulus))
}
