//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce from the
//! OS CSPRNG and returns it alongside the ciphertext.  How nonce and
//! ciphertext are stored together is the envelope codec's business
//! (`crate::crypto::envelope`), not the primitive's.
//!
//! The primitive is stateless: plain functions, safe to call from any
//! number of request handlers at once.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, SafekeepError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Build a cipher from raw key bytes, rejecting keys of the wrong length.
fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| SafekeepError::InvalidKey {
        expected: KEY_LEN,
        got: key.len(),
    })
}

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the freshly generated nonce and the ciphertext (which carries
/// the 16-byte auth tag at its end).  A new random nonce is drawn on every
/// call; the same (key, nonce) pair is never reused for two plaintexts.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let cipher = cipher_for(key)?;

    // Generate a random 12-byte nonce.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt and authenticate the plaintext.
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| SafekeepError::AuthenticationFailure)?;

    Ok((nonce.into(), ciphertext))
}

/// Decrypt data that was produced by `encrypt` under the same key and nonce.
///
/// Fails with `AuthenticationFailure` whenever the auth tag does not
/// verify.  A wrong key and tampered ciphertext are indistinguishable
/// here; no partial output is ever returned.
pub fn decrypt(key: &[u8], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SafekeepError::AuthenticationFailure)
}
