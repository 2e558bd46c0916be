//! Persistence contracts for the secrets subsystem.
//!
//! The service reaches storage through two narrow traits: `SecretRecords`
//! for the secret rows and `UserKeys` for each user's current encryption
//! key.  The production implementation is `SqliteStore`; tests plug in
//! in-memory doubles.
//!
//! Every record operation is scoped to (owner, id): a secret is visible
//! and mutable only through its owning user's identifier.

use std::collections::HashMap;

use crate::crypto::UserKey;
use crate::domain::{SecretListing, SecretRecord};
use crate::errors::Result;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// The re-encrypted protected fields for one secret, as handed to
/// `bulk_replace_protected` during key rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedFields {
    pub encoded_secret: Vec<u8>,
    pub encoded_username: Vec<u8>,
}

/// Persistence for secret rows.
pub trait SecretRecords {
    /// Fetch every secret a user owns, envelopes included.
    fn fetch_for_user(&self, owner_id: &str) -> Result<Vec<SecretRecord>>;

    /// Fetch one secret by (owner, id).  `NotFound` if no such row exists
    /// for that owner.
    fn fetch_one(&self, owner_id: &str, id: &str) -> Result<SecretRecord>;

    /// List a user's secrets for index views, optionally filtered by tag.
    /// Listings carry no envelopes, ordered by name.
    fn list_for_user(&self, owner_id: &str, tag: Option<&str>) -> Result<Vec<SecretListing>>;

    /// Distinct tags across a user's secrets, sorted.
    fn tags_for_user(&self, owner_id: &str) -> Result<Vec<String>>;

    /// Insert a new record.  `AlreadyExists` if the owner already has a
    /// secret with the same name.
    fn create(&self, record: &SecretRecord) -> Result<()>;

    /// Replace an existing record.  The ownership check runs in the same
    /// transaction as the write; `NotFound` if the record does not exist
    /// or belongs to someone else.
    fn update(&self, record: &SecretRecord) -> Result<()>;

    /// Delete a record, ownership-checked inside the same transaction.
    fn delete(&self, owner_id: &str, id: &str) -> Result<()>;

    /// Replace the protected fields of many records at once, as a single
    /// all-or-nothing unit.  Either every replacement is applied or none
    /// is; a partial application would leave some rows readable only
    /// under the old key and some only under the new one.
    fn bulk_replace_protected(
        &self,
        owner_id: &str,
        replacements: &HashMap<String, ProtectedFields>,
    ) -> Result<()>;
}

/// Persistence for each user's current encryption key.
///
/// At any instant exactly one key is current for a user; `set_key`
/// replaces it with no history kept.
pub trait UserKeys {
    /// Fetch the user's current key.  `KeyUnavailable` if none is on
    /// record.
    fn get_key(&self, user_id: &str) -> Result<UserKey>;

    /// Replace the user's current key.
    fn set_key(&self, user_id: &str, key: &UserKey) -> Result<()>;
}

// One store commonly backs both contracts (SqliteStore does), so the
// service is handed two Arc clones of the same instance.
impl<T: SecretRecords + ?Sized> SecretRecords for std::sync::Arc<T> {
    fn fetch_for_user(&self, owner_id: &str) -> Result<Vec<SecretRecord>> {
        (**self).fetch_for_user(owner_id)
    }

    fn fetch_one(&self, owner_id: &str, id: &str) -> Result<SecretRecord> {
        (**self).fetch_one(owner_id, id)
    }

    fn list_for_user(&self, owner_id: &str, tag: Option<&str>) -> Result<Vec<SecretListing>> {
        (**self).list_for_user(owner_id, tag)
    }

    fn tags_for_user(&self, owner_id: &str) -> Result<Vec<String>> {
        (**self).tags_for_user(owner_id)
    }

    fn create(&self, record: &SecretRecord) -> Result<()> {
        (**self).create(record)
    }

    fn update(&self, record: &SecretRecord) -> Result<()> {
        (**self).update(record)
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        (**self).delete(owner_id, id)
    }

    fn bulk_replace_protected(
        &self,
        owner_id: &str,
        replacements: &HashMap<String, ProtectedFields>,
    ) -> Result<()> {
        (**self).bulk_replace_protected(owner_id, replacements)
    }
}

impl<T: UserKeys + ?Sized> UserKeys for std::sync::Arc<T> {
    fn get_key(&self, user_id: &str) -> Result<UserKey> {
        (**self).get_key(user_id)
    }

    fn set_key(&self, user_id: &str, key: &UserKey) -> Result<()> {
        (**self).set_key(user_id, key)
    }
}
