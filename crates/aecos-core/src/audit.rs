/// The audit chain: an append-only, hash-linked event log in SQLite.
///
/// Every entry's `entry_hash` is the SHA-256 of
/// `timestamp ‖ user ‖ action ‖ resource ‖ before_hash ‖ after_hash ‖
/// prev_entry_hash`, where `prev_entry_hash` is the previous entry's
/// `entry_hash` (empty for the first entry). Appends run inside a single
/// SQL transaction and serialise on SQLite's write lock, so the chain is
/// linear even under concurrent appenders. Tampering with any stored field
/// of any row breaks [`AuditChain::verify_chain`] at that row.
use std::fmt;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::hasher;

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT    NOT NULL,
    user        TEXT    NOT NULL,
    action      TEXT    NOT NULL,
    resource    TEXT    NOT NULL DEFAULT '',
    before_hash TEXT    NOT NULL DEFAULT '',
    after_hash  TEXT    NOT NULL DEFAULT '',
    entry_hash  TEXT    NOT NULL,
    prev_entry_hash TEXT NOT NULL DEFAULT ''
);
";

const SELECT_COLUMNS: &str = "id, timestamp, user, action, resource, before_hash, after_hash, \
     entry_hash, prev_entry_hash";

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// A single immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    /// UTC ISO-8601 timestamp of the append.
    pub timestamp: String,
    pub user: String,
    pub action: String,
    pub resource: String,
    pub before_hash: String,
    pub after_hash: String,
    /// SHA-256 over the entry tuple including `prev_entry_hash`.
    pub entry_hash: String,
    /// The previous entry's `entry_hash`; empty for the first entry.
    pub prev_entry_hash: String,
}

impl AuditEntry {
    /// Recomputes the entry hash from the stored fields and a given
    /// predecessor hash.
    ///
    /// Used both when appending and when verifying an exported log offline.
    pub fn compute_hash(&self, prev_entry_hash: &str) -> String {
        hasher::hash_string(&format!(
            "{}{}{}{}{}{}{}",
            self.timestamp,
            self.user,
            self.action,
            self.resource,
            self.before_hash,
            self.after_hash,
            prev_entry_hash
        ))
    }
}

// ---------------------------------------------------------------------------
// Errors and filters
// ---------------------------------------------------------------------------

/// Errors produced by the audit chain.
#[derive(Debug)]
pub enum AuditError {
    /// An underlying SQLite operation failed.
    Sqlite(rusqlite::Error),
    /// The export could not be serialised.
    Encoding { detail: String },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "audit database error: {e}"),
            Self::Encoding { detail } => write!(f, "audit export encoding error: {detail}"),
        }
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Encoding { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Optional AND-combined filters for [`AuditChain::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub resource: Option<String>,
    pub user: Option<String>,
    pub action: Option<String>,
    /// Inclusive lower bound on the ISO timestamp.
    pub since: Option<String>,
}

// ---------------------------------------------------------------------------
// AuditChain
// ---------------------------------------------------------------------------

/// Append-only, hash-chained audit log stored in SQLite.
pub struct AuditChain {
    conn: Connection,
}

impl fmt::Debug for AuditChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditChain").finish()
    }
}

impl AuditChain {
    /// Opens (creating if needed) the audit database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Sqlite`] if the file is missing a parent
    /// directory, locked, or otherwise unusable; there is no silent
    /// recovery.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an ephemeral in-memory audit log.
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Appends an event and returns the created entry.
    ///
    /// The read-last-hash + insert pair runs in one transaction; concurrent
    /// appenders serialise on the SQLite write lock.
    pub fn append(
        &self,
        user: &str,
        action: &str,
        resource: &str,
        before_hash: Option<&str>,
        after_hash: Option<&str>,
    ) -> Result<AuditEntry, AuditError> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let before = before_hash.unwrap_or("");
        let after = after_hash.unwrap_or("");

        let tx = self.conn.unchecked_transaction()?;
        let prev: String = tx
            .query_row(
                "SELECT entry_hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_default();

        let entry_hash = hasher::hash_string(&format!(
            "{timestamp}{user}{action}{resource}{before}{after}{prev}"
        ));

        tx.execute(
            "INSERT INTO audit_log \
             (timestamp, user, action, resource, before_hash, after_hash, \
              entry_hash, prev_entry_hash) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![timestamp, user, action, resource, before, after, entry_hash, prev],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(AuditEntry {
            id,
            timestamp,
            user: user.to_owned(),
            action: action.to_owned(),
            resource: resource.to_owned(),
            before_hash: before.to_owned(),
            after_hash: after.to_owned(),
            entry_hash,
            prev_entry_hash: prev,
        })
    }

    /// Validates the entire hash chain.
    ///
    /// Walks entries in id order, recomputing each hash from the stored
    /// fields and the running predecessor. Returns `false` at the first
    /// mismatch (stored prev ≠ running, or stored hash ≠ recomputed).
    pub fn verify_chain(&self) -> Result<bool, AuditError> {
        let entries = self.query(&AuditFilter::default())?;
        let mut prev_hash = String::new();
        for entry in entries {
            if entry.prev_entry_hash != prev_hash {
                return Ok(false);
            }
            if entry.compute_hash(&prev_hash) != entry.entry_hash {
                return Ok(false);
            }
            prev_hash = entry.entry_hash;
        }
        Ok(true)
    }

    /// Queries the log with optional filters, in id order.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(resource) = &filter.resource {
            clauses.push("resource = ?");
            bindings.push(resource.clone());
        }
        if let Some(user) = &filter.user {
            clauses.push("user = ?");
            bindings.push(user.clone());
        }
        if let Some(action) = &filter.action {
            clauses.push("action = ?");
            bindings.push(action.clone());
        }
        if let Some(since) = &filter.since {
            clauses.push("timestamp >= ?");
            bindings.push(since.clone());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {SELECT_COLUMNS} FROM audit_log{where_clause} ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bindings.iter()), |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                user: row.get(2)?,
                action: row.get(3)?,
                resource: row.get(4)?,
                before_hash: row.get(5)?,
                after_hash: row.get(6)?,
                entry_hash: row.get(7)?,
                prev_entry_hash: row.get(8)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of entries in the log.
    pub fn len(&self) -> Result<i64, AuditError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Returns `true` when the log has no entries.
    pub fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }

    /// Exports the full trail as a JSON array in id order.
    ///
    /// The export is verifiable offline: recomputing each `entry_hash`
    /// from the exported fields reproduces the stored values.
    pub fn export_json(&self) -> Result<String, AuditError> {
        let entries = self.query(&AuditFilter::default())?;
        let mut out =
            serde_json::to_string_pretty(&entries).map_err(|e| AuditError::Encoding {
                detail: e.to_string(),
            })?;
        out.push('\n');
        Ok(out)
    }
}
