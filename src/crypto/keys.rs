//! Per-user encryption keys.
//!
//! Every user owns exactly one live 32-byte symmetric key, stored by the
//! key store as an opaque byte string.  `UserKey` wraps those bytes in
//! memory and zeroes them on drop.  Rotation retires a key permanently:
//! there is no historical key log, so once the swap commits the old key
//! is gone.

use rand::TryRngCore;
use zeroize::Zeroize;

use crate::crypto::encryption::KEY_LEN;
use crate::errors::{Result, SafekeepError};

/// A user's current encryption key, zeroed in memory when dropped.
///
/// The wrapper is deliberately opaque: the bytes come from the key store
/// and go to the AEAD primitive, and nothing else should look inside.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct UserKey {
    bytes: Vec<u8>,
}

impl UserKey {
    /// Wrap raw key bytes fetched from the key store.
    ///
    /// Length is not checked here; the AEAD primitive rejects keys of
    /// the wrong size when the key is actually used.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (to pass to the AEAD primitive or the
    /// key store).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UserKey(redacted)")
    }
}

/// Generate a fresh random 32-byte user key from the OS CSPRNG.
///
/// Fails with `KeyGenerationFailure` if the random source is unusable;
/// rotation must not proceed with a weak or absent key.
pub fn generate_user_key() -> Result<UserKey> {
    let mut bytes = vec![0u8; KEY_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SafekeepError::KeyGenerationFailure(e.to_string()))?;

    Ok(UserKey::from_bytes(bytes))
}
