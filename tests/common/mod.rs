//! In-memory store doubles shared by the integration tests.
//!
//! Both doubles honor the same contracts as the SQLite adapter and add
//! failure injection so tests can force the bulk persist or the key
//! swap to fail deterministically.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use safekeep::crypto::UserKey;
use safekeep::domain::{SecretDraft, SecretListing, SecretRecord};
use safekeep::errors::{Result, SafekeepError};
use safekeep::store::{ProtectedFields, SecretRecords, UserKeys};
use safekeep::SecretService;

/// In-memory secret rows.
#[derive(Default)]
pub struct MemoryRecords {
    rows: Mutex<HashMap<String, SecretRecord>>,
    fail_bulk_replace: AtomicBool,
}

impl MemoryRecords {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next (and every later) bulk replace fail without
    /// touching any row.
    pub fn fail_bulk_replace(&self) {
        self.fail_bulk_replace.store(true, Ordering::SeqCst);
    }

    /// Direct snapshot of one stored row, bypassing the service.
    pub fn raw_record(&self, id: &str) -> Option<SecretRecord> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    /// Overwrite one row's stored secret envelope, bypassing the
    /// service (to simulate on-disk corruption).
    pub fn set_raw_secret(&self, id: &str, blob: Vec<u8>) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(id) {
            row.encoded_secret = blob;
        }
    }
}

impl SecretRecords for MemoryRecords {
    fn fetch_for_user(&self, owner_id: &str) -> Result<Vec<SecretRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut records: Vec<SecretRecord> = rows
            .values()
            .filter(|r| r.user_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn fetch_one(&self, owner_id: &str, id: &str) -> Result<SecretRecord> {
        let rows = self.rows.lock().unwrap();
        rows.get(id)
            .filter(|r| r.user_id == owner_id)
            .cloned()
            .ok_or_else(|| SafekeepError::NotFound(id.to_string()))
    }

    fn list_for_user(&self, owner_id: &str, tag: Option<&str>) -> Result<Vec<SecretListing>> {
        Ok(self
            .fetch_for_user(owner_id)?
            .into_iter()
            .filter(|r| tag.map_or(true, |t| r.tags.iter().any(|have| have == t)))
            .map(|r| SecretListing {
                id: r.id,
                name: r.name,
                tags: r.tags,
            })
            .collect())
    }

    fn tags_for_user(&self, owner_id: &str) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .fetch_for_user(owner_id)?
            .into_iter()
            .flat_map(|r| r.tags)
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    fn create(&self, record: &SecretRecord) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|r| r.user_id == record.user_id && r.name == record.name)
        {
            return Err(SafekeepError::AlreadyExists(record.name.clone()));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update(&self, record: &SecretRecord) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&record.id) {
            Some(existing) if existing.user_id == record.user_id => {
                rows.insert(record.id.clone(), record.clone());
                Ok(())
            }
            _ => Err(SafekeepError::NotFound(record.id.clone())),
        }
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(id) {
            Some(existing) if existing.user_id == owner_id => {
                rows.remove(id);
                Ok(())
            }
            _ => Err(SafekeepError::NotFound(id.to_string())),
        }
    }

    fn bulk_replace_protected(
        &self,
        owner_id: &str,
        replacements: &HashMap<String, ProtectedFields>,
    ) -> Result<()> {
        if self.fail_bulk_replace.load(Ordering::SeqCst) {
            return Err(SafekeepError::Persistence(
                "bulk replace failed (injected)".to_string(),
            ));
        }

        let mut rows = self.rows.lock().unwrap();

        // All-or-nothing: verify the whole batch before touching a row.
        for id in replacements.keys() {
            if !rows.get(id).is_some_and(|r| r.user_id == owner_id) {
                return Err(SafekeepError::Persistence(format!(
                    "bulk replace matched no secret '{id}' for this user"
                )));
            }
        }

        for (id, fields) in replacements {
            let row = rows.get_mut(id).unwrap();
            row.encoded_secret = fields.encoded_secret.clone();
            row.encoded_username = fields.encoded_username.clone();
        }

        Ok(())
    }
}

/// In-memory user keys.
#[derive(Default)]
pub struct MemoryKeys {
    keys: Mutex<HashMap<String, Vec<u8>>>,
    fail_set_key: AtomicBool,
}

impl MemoryKeys {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later key swap fail, leaving the stored key as-is.
    pub fn fail_set_key(&self) {
        self.fail_set_key.store(true, Ordering::SeqCst);
    }

    /// The raw stored key bytes for a user, if any.
    pub fn raw_key(&self, user_id: &str) -> Option<Vec<u8>> {
        self.keys.lock().unwrap().get(user_id).cloned()
    }
}

impl UserKeys for MemoryKeys {
    fn get_key(&self, user_id: &str) -> Result<UserKey> {
        self.keys
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .map(UserKey::from_bytes)
            .ok_or_else(|| SafekeepError::KeyUnavailable(user_id.to_string()))
    }

    fn set_key(&self, user_id: &str, key: &UserKey) -> Result<()> {
        if self.fail_set_key.load(Ordering::SeqCst) {
            return Err(SafekeepError::Persistence(
                "key swap failed (injected)".to_string(),
            ));
        }

        self.keys
            .lock()
            .unwrap()
            .insert(user_id.to_string(), key.as_bytes().to_vec());
        Ok(())
    }
}

/// A service over fresh in-memory doubles, with handles kept for
/// direct inspection.
pub fn memory_service() -> (
    Arc<MemoryRecords>,
    Arc<MemoryKeys>,
    SecretService<Arc<MemoryRecords>, Arc<MemoryKeys>>,
) {
    let records = MemoryRecords::new();
    let keys = MemoryKeys::new();
    let service = SecretService::new(Arc::clone(&records), Arc::clone(&keys));
    (records, keys, service)
}

/// Deterministic 32-byte test key.
pub fn test_key(fill: u8) -> UserKey {
    UserKey::from_bytes(vec![fill; 32])
}

/// A valid draft with both protected values set.
pub fn draft(name: &str) -> SecretDraft {
    SecretDraft {
        name: name.to_string(),
        url: "https://example.com/login".to_string(),
        description: "test entry".to_string(),
        tags: vec!["web".to_string()],
        username: "bob".to_string(),
        password: "p@ss".to_string(),
    }
}
