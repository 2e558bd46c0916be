//! Secret service — encrypt-on-write, decrypt-on-read orchestration.
//!
//! Every call site goes through the same two helpers, `protect` and
//! `reveal`, so the envelope format stays consistent across create,
//! update, single-record reads, export, and rotation.
//!
//! The user's key is fetched from the key store on demand for each
//! operation and never cached process-wide: rotation swaps the persisted
//! key, and a cached copy would keep decrypting against a retired key.

use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::audit;
use crate::crypto::{decrypt, encrypt, envelope, UserKey};
use crate::domain::{ExportItem, RevealedSecret, SecretDraft, SecretListing, SecretRecord};
use crate::errors::{Result, SafekeepError};
use crate::store::{SecretRecords, UserKeys};

/// Encrypt one plaintext field into a storable envelope.
///
/// The empty string is a deliberate shortcut: an unset optional field is
/// stored as an empty blob and the AEAD primitive is never invoked for
/// it.
pub fn protect(plaintext: &str, key: &UserKey) -> Result<Vec<u8>> {
    if plaintext.is_empty() {
        return Ok(Vec::new());
    }

    let (nonce, ciphertext) = encrypt(key.as_bytes(), plaintext.as_bytes())?;
    Ok(envelope::encode(&nonce, &ciphertext))
}

/// Decrypt a stored envelope back into its plaintext string.
///
/// An empty blob reveals to the empty string without touching the AEAD
/// primitive.  `MalformedEnvelope` and `AuthenticationFailure` propagate
/// unmodified to the caller.
pub fn reveal(blob: &[u8], key: &UserKey) -> Result<String> {
    let Some((nonce, ciphertext)) = envelope::decode(blob)? else {
        return Ok(String::new());
    };

    let plaintext_bytes = decrypt(key.as_bytes(), &nonce, ciphertext)?;

    // Convert via from_utf8 which takes ownership; on error, zeroize the
    // recovered bytes before discarding them.
    String::from_utf8(plaintext_bytes).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        SafekeepError::SerializationError("secret value is not valid UTF-8".to_string())
    })
}

/// The caller-facing service for one user's secrets.
///
/// Precondition, supplied by the caller and not enforced here: no
/// ordinary write for a user may interleave with that user's in-flight
/// key rotation (see `service::rotation`).
pub struct SecretService<R, K> {
    records: R,
    keys: K,
    audit_dir: Option<PathBuf>,
}

impl<R, K> SecretService<R, K>
where
    R: SecretRecords,
    K: UserKeys,
{
    pub fn new(records: R, keys: K) -> Self {
        Self {
            records,
            keys,
            audit_dir: None,
        }
    }

    /// Enable the audit trail, written to `<dir>/audit.db`.
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(dir.into());
        self
    }

    pub(crate) fn records(&self) -> &R {
        &self.records
    }

    pub(crate) fn keys(&self) -> &K {
        &self.keys
    }

    /// Fire-and-forget audit entry; a no-op when auditing is off.
    pub(crate) fn audit(
        &self,
        operation: &str,
        user_id: &str,
        secret_name: Option<&str>,
        details: Option<&str>,
    ) {
        if let Some(dir) = &self.audit_dir {
            audit::record(dir, operation, user_id, secret_name, details);
        }
    }

    /// Create a secret from a plaintext draft.
    ///
    /// Validates before fetching the key, encrypts both protected
    /// fields, and persists the new row.  Returns the generated id.
    pub fn create(&self, user_id: &str, draft: &SecretDraft) -> Result<String> {
        draft.validate()?;

        let key = self.keys.get_key(user_id)?;
        let now = Utc::now();
        let record = SecretRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: draft.name.clone(),
            url: draft.url.clone(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            encoded_secret: protect(&draft.password, &key)?,
            encoded_username: protect(&draft.username, &key)?,
            created_at: now,
            updated_at: now,
        };

        self.records.create(&record)?;
        debug!(user_id, secret_id = %record.id, "secret created");
        self.audit("create", user_id, Some(&record.name), None);

        Ok(record.id)
    }

    /// Re-validate, re-encrypt, and replace an existing secret.
    ///
    /// The record must still belong to the calling user; the store
    /// checks ownership inside the same transaction as the write.
    pub fn update(&self, user_id: &str, id: &str, draft: &SecretDraft) -> Result<()> {
        if id.is_empty() {
            return Err(SafekeepError::Validation(
                "secret id must be provided".to_string(),
            ));
        }
        draft.validate()?;

        let key = self.keys.get_key(user_id)?;
        let existing = self.records.fetch_one(user_id, id)?;

        let record = SecretRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: draft.name.clone(),
            url: draft.url.clone(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            encoded_secret: protect(&draft.password, &key)?,
            encoded_username: protect(&draft.username, &key)?,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        self.records.update(&record)?;
        debug!(user_id, secret_id = id, "secret updated");
        self.audit("update", user_id, Some(&record.name), None);

        Ok(())
    }

    /// Delete a secret.  Ownership is checked by the store inside the
    /// delete transaction.
    pub fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(SafekeepError::Validation(
                "secret id must be provided".to_string(),
            ));
        }

        self.records.delete(user_id, id)?;
        debug!(user_id, secret_id = id, "secret deleted");
        self.audit("delete", user_id, None, Some(id));

        Ok(())
    }

    /// Fetch one secret and reveal both protected fields.
    ///
    /// This is the only read path that decrypts; listings never do.
    pub fn get(&self, user_id: &str, id: &str) -> Result<RevealedSecret> {
        let key = self.keys.get_key(user_id)?;
        let record = self.records.fetch_one(user_id, id)?;

        Ok(RevealedSecret {
            password: reveal(&record.encoded_secret, &key)?,
            username: reveal(&record.encoded_username, &key)?,
            id: record.id,
            name: record.name,
            url: record.url,
            description: record.description,
            tags: record.tags,
        })
    }

    /// List a user's secrets for index views: id, name, and tags only.
    pub fn get_all(&self, user_id: &str, tag: Option<&str>) -> Result<Vec<SecretListing>> {
        self.records.list_for_user(user_id, tag)
    }

    /// Distinct tags across the user's secrets, sorted.
    pub fn tags(&self, user_id: &str) -> Result<Vec<String>> {
        self.records.tags_for_user(user_id)
    }

    /// Reveal every secret the user owns into an export bundle.
    ///
    /// Each item carries the plaintext values and the original envelope
    /// bytes.  The first field that fails to decrypt aborts the whole
    /// export, named after the offending secret; a partial bundle would
    /// be indistinguishable from a complete one.
    pub fn export_all(&self, user_id: &str) -> Result<Vec<ExportItem>> {
        let key = self.keys.get_key(user_id)?;
        let records = self.records.fetch_for_user(user_id)?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let secret_name = record.name.clone();
            let wrap = move |source: SafekeepError| SafekeepError::ExportAborted {
                secret_name: secret_name.clone(),
                source: Box::new(source),
            };

            let password = reveal(&record.encoded_secret, &key).map_err(&wrap)?;
            let username = reveal(&record.encoded_username, &key).map_err(&wrap)?;

            items.push(ExportItem {
                name: record.name,
                url: record.url,
                description: record.description,
                tags: record.tags,
                username,
                password,
                encoded_secret: record.encoded_secret,
                encoded_username: record.encoded_username,
            });
        }

        debug!(user_id, count = items.len(), "export bundle assembled");
        self.audit(
            "export",
            user_id,
            None,
            Some(&format!("{} secrets exported", items.len())),
        );

        Ok(items)
    }
}
