//! Format validation for opaque wallet-endpoint material
//!
//! The engine never interprets handshake tokens, sync blobs, or signature
//! fragments. It only checks that they have the shape the protocol promises
//! (fixed textual prefix, bounded length) before passing them on. Anything
//! outside that shape is treated as protocol corruption, never retried.

use crate::{
    MAX_MULTISIG_INFO_LEN, MAX_SYNC_BLOB_LEN, MAX_TX_FRAGMENT_LEN, MIN_MULTISIG_INFO_LEN,
    MULTISIG_INFO_PREFIXES,
};

/// Validate a handshake token (prepare / key-exchange rounds).
///
/// Returns a description of the violation on failure. The description only
/// contains lengths and expected prefixes, never the token itself.
pub fn validate_multisig_info(info: &str) -> Result<(), String> {
    if info.len() < MIN_MULTISIG_INFO_LEN {
        return Err(format!(
            "too short: {} bytes (min: {})",
            info.len(),
            MIN_MULTISIG_INFO_LEN
        ));
    }
    if info.len() > MAX_MULTISIG_INFO_LEN {
        return Err(format!(
            "too long: {} bytes (max: {})",
            info.len(),
            MAX_MULTISIG_INFO_LEN
        ));
    }
    if !MULTISIG_INFO_PREFIXES
        .iter()
        .any(|prefix| info.starts_with(prefix))
    {
        return Err(format!(
            "missing expected prefix (one of {:?})",
            MULTISIG_INFO_PREFIXES
        ));
    }
    Ok(())
}

/// Validate an `export_multisig_info` blob used during balance sync.
///
/// Sync blobs have no fixed prefix; only emptiness and size are checked.
pub fn validate_sync_blob(blob: &str) -> Result<(), String> {
    if blob.trim().is_empty() {
        return Err("empty sync blob".to_string());
    }
    if blob.len() > MAX_SYNC_BLOB_LEN {
        return Err(format!(
            "too long: {} bytes (max: {})",
            blob.len(),
            MAX_SYNC_BLOB_LEN
        ));
    }
    Ok(())
}

/// Whether a partially signed transaction fragment looks well-formed.
///
/// Fragments are hex-encoded transaction sets; a fragment failing this
/// check does not count towards the signing threshold.
pub fn is_valid_tx_fragment(fragment: &str) -> bool {
    !fragment.is_empty()
        && fragment.len() <= MAX_TX_FRAGMENT_LEN
        && fragment.len() % 2 == 0
        && fragment.bytes().all(|b| b.is_ascii_hexdigit())
}
