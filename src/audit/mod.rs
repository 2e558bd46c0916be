//! Audit log — SQLite-based operation history.
//!
//! Stores a record of every secret operation (create, update, delete,
//! export, rotate-key) in a local SQLite database at
//! `<data_dir>/audit.db`, keyed by the acting user.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{Result, SafekeepError};

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub user_id: String,
    pub secret_name: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened — callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = data_dir.join("audit.db");
        let conn = Connection::open(&db_path).ok()?;

        // Set restrictive permissions on the audit database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        // Create the table if it doesn't exist.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                secret_name TEXT,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Fire-and-forget — errors are silently ignored.
    pub fn log(
        &self,
        operation: &str,
        user_id: &str,
        secret_name: Option<&str>,
        details: Option<&str>,
    ) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, user_id, secret_name, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, user_id, secret_name, details],
        );
    }

    /// Query a user's recent audit entries, most recent first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(
        &self,
        user_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let (sql, params): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match since {
            Some(ref ts) => (
                "SELECT id, timestamp, operation, user_id, secret_name, details
                 FROM audit_log
                 WHERE user_id = ?1 AND timestamp >= ?2
                 ORDER BY id DESC
                 LIMIT ?3",
                vec![
                    Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                    Box::new(ts.to_rfc3339()),
                    Box::new(limit_i64),
                ],
            ),
            None => (
                "SELECT id, timestamp, operation, user_id, secret_name, details
                 FROM audit_log
                 WHERE user_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
                vec![
                    Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                    Box::new(limit_i64),
                ],
            ),
        };

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| SafekeepError::Persistence(format!("audit query prepare: {e}")))?;

        let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    user_id: row.get(3)?,
                    secret_name: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| SafekeepError::Persistence(format!("audit query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries
                .push(row.map_err(|e| SafekeepError::Persistence(format!("audit row: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database (for testing/display).
    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("audit.db")
    }
}

/// Convenience helper: open, log one event, and close.
///
/// Safe to call from any operation — it never fails the parent
/// operation, whatever happens to the audit database.
pub fn record(
    data_dir: &Path,
    operation: &str,
    user_id: &str,
    secret_name: Option<&str>,
    details: Option<&str>,
) {
    if let Some(audit) = AuditLog::open(data_dir) {
        audit.log(operation, user_id, secret_name, details);
    }
}
