//! SQLite-backed record and key store.
//!
//! One database holds both the secret rows and the per-user encryption
//! keys.  Envelope bytes are stored as BLOBs; tags as a JSON array
//! string.  The connection sits behind a mutex so one store handle can
//! be shared across request handlers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::crypto::UserKey;
use crate::domain::{SecretListing, SecretRecord};
use crate::errors::{Result, SafekeepError};

use super::{ProtectedFields, SecretRecords, UserKeys};

/// Store adapter over a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS secrets (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    url         TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    tags        TEXT NOT NULL,
    username    BLOB NOT NULL,
    secret      BLOB NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, name)
);
CREATE INDEX IF NOT EXISTS idx_secrets_user ON secrets (user_id);

CREATE TABLE IF NOT EXISTS user_keys (
    user_id    TEXT PRIMARY KEY,
    enc_key    BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
";

impl SqliteStore {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SafekeepError::Persistence(format!("open database: {e}")))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SafekeepError::Persistence(format!("open database: {e}")))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| SafekeepError::Persistence(format!("create schema: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SafekeepError::Persistence("connection lock poisoned".to_string()))
    }

    /// Check, inside an open transaction, that a secret exists and
    /// belongs to the given user.
    fn belongs_to_user(tx: &rusqlite::Transaction<'_>, owner_id: &str, id: &str) -> Result<bool> {
        let count: i64 = tx
            .query_row(
                "SELECT COUNT(1) FROM secrets WHERE user_id = ?1 AND id = ?2",
                params![owner_id, id],
                |row| row.get(0),
            )
            .map_err(|e| SafekeepError::Persistence(format!("ownership check: {e}")))?;

        Ok(count > 0)
    }
}

/// True when the error is SQLite's unique-constraint violation, which
/// here can only be the (user_id, name) index or a duplicate id.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags)
        .map_err(|e| SafekeepError::SerializationError(format!("encode tags: {e}")))
}

fn decode_tags(raw: &str) -> Vec<String> {
    // Rows written by this store always hold a valid JSON array; treat
    // anything else as no tags rather than failing the whole read.
    serde_json::from_str(raw).unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretRecord> {
    let tags_raw: String = row.get(5)?;
    let created_raw: String = row.get(8)?;
    let updated_raw: String = row.get(9)?;

    Ok(SecretRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
        tags: decode_tags(&tags_raw),
        encoded_username: row.get(6)?,
        encoded_secret: row.get(7)?,
        created_at: parse_timestamp(&created_raw),
        updated_at: parse_timestamp(&updated_raw),
    })
}

const RECORD_COLUMNS: &str =
    "id, user_id, name, url, description, tags, username, secret, created_at, updated_at";

impl SecretRecords for SqliteStore {
    fn fetch_for_user(&self, owner_id: &str) -> Result<Vec<SecretRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM secrets WHERE user_id = ?1 ORDER BY name"
            ))
            .map_err(|e| SafekeepError::Persistence(format!("fetch secrets: {e}")))?;

        let rows = stmt
            .query_map(params![owner_id], row_to_record)
            .map_err(|e| SafekeepError::Persistence(format!("fetch secrets: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| SafekeepError::Persistence(format!("read row: {e}")))?);
        }

        Ok(records)
    }

    fn fetch_one(&self, owner_id: &str, id: &str) -> Result<SecretRecord> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM secrets WHERE user_id = ?1 AND id = ?2"),
            params![owner_id, id],
            row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => SafekeepError::NotFound(id.to_string()),
            other => SafekeepError::Persistence(format!("fetch secret: {other}")),
        })
    }

    fn list_for_user(&self, owner_id: &str, tag: Option<&str>) -> Result<Vec<SecretListing>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, tags FROM secrets WHERE user_id = ?1 ORDER BY name")
            .map_err(|e| SafekeepError::Persistence(format!("list secrets: {e}")))?;

        let rows = stmt
            .query_map(params![owner_id], |row| {
                let tags_raw: String = row.get(2)?;
                Ok(SecretListing {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    tags: decode_tags(&tags_raw),
                })
            })
            .map_err(|e| SafekeepError::Persistence(format!("list secrets: {e}")))?;

        let mut listings = Vec::new();
        for row in rows {
            let listing = row.map_err(|e| SafekeepError::Persistence(format!("read row: {e}")))?;
            if let Some(wanted) = tag {
                if !listing.tags.iter().any(|t| t == wanted) {
                    continue;
                }
            }
            listings.push(listing);
        }

        Ok(listings)
    }

    fn tags_for_user(&self, owner_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT tags FROM secrets WHERE user_id = ?1")
            .map_err(|e| SafekeepError::Persistence(format!("fetch tags: {e}")))?;

        let rows = stmt
            .query_map(params![owner_id], |row| row.get::<_, String>(0))
            .map_err(|e| SafekeepError::Persistence(format!("fetch tags: {e}")))?;

        let mut seen = std::collections::BTreeSet::new();
        for row in rows {
            let raw = row.map_err(|e| SafekeepError::Persistence(format!("read row: {e}")))?;
            for tag in decode_tags(&raw) {
                if !tag.is_empty() {
                    seen.insert(tag);
                }
            }
        }

        Ok(seen.into_iter().collect())
    }

    fn create(&self, record: &SecretRecord) -> Result<()> {
        let tags = encode_tags(&record.tags)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO secrets (id, user_id, name, url, description, tags, username, secret, \
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.user_id,
                record.name,
                record.url,
                record.description,
                tags,
                record.encoded_username,
                record.encoded_secret,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                SafekeepError::AlreadyExists(record.name.clone())
            } else {
                SafekeepError::Persistence(format!("create secret: {e}"))
            }
        })?;

        Ok(())
    }

    fn update(&self, record: &SecretRecord) -> Result<()> {
        let tags = encode_tags(&record.tags)?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SafekeepError::Persistence(format!("begin transaction: {e}")))?;

        if !Self::belongs_to_user(&tx, &record.user_id, &record.id)? {
            return Err(SafekeepError::NotFound(record.id.clone()));
        }

        tx.execute(
            "UPDATE secrets
             SET name = ?1, url = ?2, description = ?3, tags = ?4, username = ?5, secret = ?6, \
             updated_at = ?7
             WHERE user_id = ?8 AND id = ?9",
            params![
                record.name,
                record.url,
                record.description,
                tags,
                record.encoded_username,
                record.encoded_secret,
                record.updated_at.to_rfc3339(),
                record.user_id,
                record.id,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                SafekeepError::AlreadyExists(record.name.clone())
            } else {
                SafekeepError::Persistence(format!("update secret: {e}"))
            }
        })?;

        tx.commit()
            .map_err(|e| SafekeepError::Persistence(format!("commit update: {e}")))
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SafekeepError::Persistence(format!("begin transaction: {e}")))?;

        if !Self::belongs_to_user(&tx, owner_id, id)? {
            return Err(SafekeepError::NotFound(id.to_string()));
        }

        tx.execute(
            "DELETE FROM secrets WHERE user_id = ?1 AND id = ?2",
            params![owner_id, id],
        )
        .map_err(|e| SafekeepError::Persistence(format!("delete secret: {e}")))?;

        tx.commit()
            .map_err(|e| SafekeepError::Persistence(format!("commit delete: {e}")))
    }

    fn bulk_replace_protected(
        &self,
        owner_id: &str,
        replacements: &HashMap<String, ProtectedFields>,
    ) -> Result<()> {
        if replacements.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SafekeepError::Persistence(format!("begin transaction: {e}")))?;

        for (id, fields) in replacements {
            let affected = tx
                .execute(
                    "UPDATE secrets SET secret = ?1, username = ?2
                     WHERE user_id = ?3 AND id = ?4",
                    params![fields.encoded_secret, fields.encoded_username, owner_id, id],
                )
                .map_err(|e| SafekeepError::Persistence(format!("replace fields: {e}")))?;

            // One replacement missing its row means the batch is stale;
            // dropping the transaction rolls everything back.
            if affected != 1 {
                return Err(SafekeepError::Persistence(format!(
                    "bulk replace matched no secret '{id}' for this user"
                )));
            }
        }

        tx.commit()
            .map_err(|e| SafekeepError::Persistence(format!("commit bulk replace: {e}")))
    }
}

impl UserKeys for SqliteStore {
    fn get_key(&self, user_id: &str) -> Result<UserKey> {
        let conn = self.conn()?;
        let bytes: Vec<u8> = conn
            .query_row(
                "SELECT enc_key FROM user_keys WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    SafekeepError::KeyUnavailable(user_id.to_string())
                }
                other => SafekeepError::Persistence(format!("fetch key: {other}")),
            })?;

        Ok(UserKey::from_bytes(bytes))
    }

    fn set_key(&self, user_id: &str, key: &UserKey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_keys (user_id, enc_key, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET enc_key = ?2, updated_at = ?3",
            params![user_id, key.as_bytes(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| SafekeepError::Persistence(format!("store key: {e}")))?;

        Ok(())
    }
}
