//! Envelope codec for protected fields.
//!
//! A stored envelope is the 12-byte nonce followed directly by the
//! ciphertext, with no delimiter or length prefix.  The fixed nonce
//! length makes the split unambiguous.
//!
//! An empty blob is not an envelope at all: it means "no value was ever
//! set" and decodes to `None`.  A blob of 1 to 12 bytes has no room for
//! both a nonce and an authenticated payload and is rejected as
//! malformed rather than silently truncated.

use crate::crypto::encryption::NONCE_LEN;
use crate::errors::{Result, SafekeepError};

/// Concatenate nonce and ciphertext into one storable blob.
pub fn encode(nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(nonce);
    blob.extend_from_slice(ciphertext);
    blob
}

/// Split a stored blob back into its nonce and ciphertext.
///
/// Returns `Ok(None)` for an empty blob and `MalformedEnvelope` for any
/// blob too short to hold a nonce plus at least one byte of ciphertext.
pub fn decode(blob: &[u8]) -> Result<Option<([u8; NONCE_LEN], &[u8])>> {
    if blob.is_empty() {
        return Ok(None);
    }

    if blob.len() <= NONCE_LEN {
        return Err(SafekeepError::MalformedEnvelope(blob.len()));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);

    Ok(Some((nonce, ciphertext)))
}
