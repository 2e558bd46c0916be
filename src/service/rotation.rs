//! Key rotation — re-encrypt every secret a user owns under a fresh key.
//!
//! Single pass, no persisted intermediate state: a rotation that fails
//! before the final key swap leaves the stored key and every envelope
//! untouched, and can simply be re-run from scratch.
//!
//! Serialization is the caller's responsibility and is made explicit in
//! the signature: `rotate_user_key` demands a `RotationGuard`, which can
//! only be obtained by holding the per-user exclusive section in
//! `UserLocks`.  There is no internal locking beyond that, and ordinary
//! secret writes racing an in-flight rotation remain a precondition
//! violation (a write under the old key after the swap commits becomes
//! permanently unreadable).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{error, info};
use zeroize::Zeroize;

use crate::crypto::{generate_user_key, UserKey};
use crate::domain::SecretRecord;
use crate::errors::{Result, SafekeepError};
use crate::store::{ProtectedFields, SecretRecords, UserKeys};

use super::secrets::{protect, reveal, SecretService};

/// Registry of per-user exclusive sections.
///
/// One instance is shared by everything that may rotate keys; a guard
/// for a user exists while that user's rotation is in flight.
#[derive(Default)]
pub struct UserLocks {
    active: Mutex<HashSet<String>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the exclusive section for one user.
    ///
    /// Fails with `RotationInProgress` instead of blocking when a guard
    /// for the same user is already held; the section is released when
    /// the guard drops.
    pub fn acquire(&self, user_id: &str) -> Result<RotationGuard<'_>> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| SafekeepError::Persistence("lock registry poisoned".to_string()))?;

        if !active.insert(user_id.to_string()) {
            return Err(SafekeepError::RotationInProgress(user_id.to_string()));
        }

        Ok(RotationGuard {
            locks: self,
            user_id: user_id.to_string(),
        })
    }
}

/// Proof that the holder owns a user's exclusive rotation section.
pub struct RotationGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
}

impl RotationGuard<'_> {
    /// The user this guard serializes.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.locks.active.lock() {
            active.remove(&self.user_id);
        }
    }
}

impl<R, K> SecretService<R, K>
where
    R: SecretRecords,
    K: UserKeys,
{
    /// Rotate one user's encryption key.
    ///
    /// Decrypts every protected field under the current key, re-encrypts
    /// under a freshly generated key, persists the full batch in one
    /// all-or-nothing write, and only then swaps the stored key.  Any
    /// failure before the swap leaves key and envelopes untouched.
    ///
    /// A failure of the swap itself, after the batch has committed, is
    /// the one irrecoverable window: it is logged with the fact that the
    /// re-encrypted data already persisted and surfaced as
    /// `KeySwapFailed` for manual recovery.  No compensating rollback is
    /// attempted, since rolling back the batch cannot be made atomic
    /// with the swap either.
    pub fn rotate_user_key(&self, guard: &RotationGuard<'_>) -> Result<()> {
        let user_id = guard.user_id();

        // 1. Fetch the current key; without it existing envelopes are
        //    unreadable and rotation cannot proceed.
        let current_key = self.keys().get_key(user_id)?;

        // 2. Generate the replacement key.
        let new_key = generate_user_key()?;

        // 3. Enumerate the user's secrets, envelopes included.
        let records = self.records().fetch_for_user(user_id)?;

        // 4. Reveal under the current key, re-protect under the new one.
        //    A single undecryptable record aborts the whole rotation;
        //    skipping it would silently orphan its fields on the old key.
        let mut replacements: HashMap<String, ProtectedFields> =
            HashMap::with_capacity(records.len());

        for record in &records {
            let fields = reencrypt_record(record, &current_key, &new_key).map_err(|source| {
                SafekeepError::RotationAborted {
                    secret_id: record.id.clone(),
                    source: Box::new(source),
                }
            })?;

            replacements.insert(record.id.clone(), fields);
        }

        // 5. Persist the batch as one unit.  A failure here rolls the
        //    whole batch back and the current key stays live.
        self.records()
            .bulk_replace_protected(user_id, &replacements)?;

        // 6. Swap the stored key.  From this point every stored envelope
        //    requires the new key; the old key is retired for good.
        if let Err(swap_err) = self.keys().set_key(user_id, &new_key) {
            error!(
                user_id,
                secrets = replacements.len(),
                error = %swap_err,
                "key swap failed after re-encrypted secrets were already persisted; \
                 stored envelopes now require a key that was never saved"
            );

            self.audit(
                "rotate-key",
                user_id,
                None,
                Some("key swap failed after data re-encryption; manual recovery required"),
            );

            return Err(SafekeepError::KeySwapFailed {
                user_id: user_id.to_string(),
                source: Box::new(swap_err),
            });
        }

        info!(
            user_id,
            secrets = replacements.len(),
            "encryption key rotated"
        );
        self.audit(
            "rotate-key",
            user_id,
            None,
            Some(&format!("{} secrets re-encrypted", replacements.len())),
        );

        Ok(())
    }
}

/// Re-encrypt both protected fields of one record.
///
/// Revealed plaintexts are wiped as soon as the new envelopes exist.
/// The empty-field shortcut survives rotation: an empty envelope reveals
/// to the empty string and re-protects back to an empty envelope.
fn reencrypt_record(
    record: &SecretRecord,
    current_key: &UserKey,
    new_key: &UserKey,
) -> Result<ProtectedFields> {
    let mut password = reveal(&record.encoded_secret, current_key)?;
    let encoded_secret = protect(&password, new_key)?;
    password.zeroize();

    let mut username = reveal(&record.encoded_username, current_key)?;
    let encoded_username = protect(&username, new_key)?;
    username.zeroize();

    Ok(ProtectedFields {
        encoded_secret,
        encoded_username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_per_user() {
        let locks = UserLocks::new();

        let guard = locks.acquire("alice").expect("first acquire");
        assert_eq!(guard.user_id(), "alice");

        // Same user: refused while the guard lives.
        assert!(matches!(
            locks.acquire("alice"),
            Err(SafekeepError::RotationInProgress(_))
        ));

        // A different user is unaffected.
        let other = locks.acquire("bob").expect("other user");
        drop(other);

        // Released on drop.
        drop(guard);
        assert!(locks.acquire("alice").is_ok());
    }
}
