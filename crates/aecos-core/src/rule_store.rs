/// SQLite-backed rule storage and queries.
///
/// The store persists [`Rule`] records in a `rules` table with JSON-encoded
/// `ifc_classes` and `check_value` columns so heterogeneous check values
/// round-trip losslessly. A full-text index over `(title, citation)` is
/// maintained by triggers when the FTS5 extension is available; otherwise
/// [`RuleStore::search`] falls back to substring `LIKE` on the base table.
use std::fmt;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::dynvalue::DynValue;
use crate::enums::CheckType;
use crate::rules::Rule;

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code_name TEXT NOT NULL,
    section TEXT NOT NULL,
    title TEXT NOT NULL,
    ifc_classes TEXT NOT NULL DEFAULT '[]',
    check_type TEXT NOT NULL,
    property_path TEXT NOT NULL,
    check_value TEXT,
    region TEXT NOT NULL DEFAULT '*',
    citation TEXT NOT NULL DEFAULT '',
    effective_date TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_rules_code ON rules(code_name);
CREATE INDEX IF NOT EXISTS idx_rules_region ON rules(region);
CREATE UNIQUE INDEX IF NOT EXISTS idx_rules_natural_key ON rules(code_name, section);
";

const FTS_SQL: &str = "\
CREATE VIRTUAL TABLE IF NOT EXISTS rules_fts USING fts5(
    title, citation, content=rules, content_rowid=id
);

CREATE TRIGGER IF NOT EXISTS rules_ai AFTER INSERT ON rules BEGIN
    INSERT INTO rules_fts(rowid, title, citation)
    VALUES (new.id, new.title, new.citation);
END;

CREATE TRIGGER IF NOT EXISTS rules_ad AFTER DELETE ON rules BEGIN
    INSERT INTO rules_fts(rules_fts, rowid, title, citation)
    VALUES ('delete', old.id, old.title, old.citation);
END;

CREATE TRIGGER IF NOT EXISTS rules_au AFTER UPDATE ON rules BEGIN
    INSERT INTO rules_fts(rules_fts, rowid, title, citation)
    VALUES ('delete', old.id, old.title, old.citation);
    INSERT INTO rules_fts(rowid, title, citation)
    VALUES (new.id, new.title, new.citation);
END;
";

const SELECT_COLUMNS: &str = "id, code_name, section, title, ifc_classes, check_type, \
     property_path, check_value, region, citation, effective_date";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the rule store.
#[derive(Debug)]
pub enum RuleStoreError {
    /// An underlying SQLite operation failed.
    Sqlite(rusqlite::Error),
    /// A rule with the same `(code_name, section)` already exists.
    Duplicate {
        code_name: String,
        section: String,
    },
    /// A stored JSON column could not be decoded, or a stored check type
    /// tag is unknown.
    Encoding {
        detail: String,
    },
}

impl fmt::Display for RuleStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "rule database error: {e}"),
            Self::Duplicate { code_name, section } => {
                write!(f, "duplicate rule {code_name} §{section}")
            }
            Self::Encoding { detail } => write!(f, "rule record encoding error: {detail}"),
        }
    }
}

impl std::error::Error for RuleStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Duplicate { .. } | Self::Encoding { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for RuleStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

// ---------------------------------------------------------------------------
// Filters and updates
// ---------------------------------------------------------------------------

/// Optional AND-combined filters for [`RuleStore::list`].
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    /// Match rules applying to this IFC class (including `*` and empty-set
    /// universal rules).
    pub ifc_class: Option<String>,
    /// Match rules for this region or the `*` universal region.
    pub region: Option<String>,
    /// Match rules from this code.
    pub code_name: Option<String>,
}

/// Whitelisted field updates for [`RuleStore::update`].
///
/// The row id and the schema are never updatable.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub code_name: Option<String>,
    pub section: Option<String>,
    pub title: Option<String>,
    pub ifc_classes: Option<Vec<String>>,
    pub check_type: Option<CheckType>,
    pub property_path: Option<String>,
    pub check_value: Option<DynValue>,
    pub region: Option<String>,
    pub citation: Option<String>,
    pub effective_date: Option<String>,
}

impl RuleUpdate {
    /// An update carrying every content field of `rule` (used when applying
    /// a regulatory modification by id).
    pub fn from_rule(rule: &Rule) -> Self {
        Self {
            code_name: None,
            section: None,
            title: Some(rule.title.clone()),
            ifc_classes: Some(rule.ifc_classes.clone()),
            check_type: Some(rule.check_type),
            property_path: Some(rule.property_path.clone()),
            check_value: Some(rule.check_value.clone()),
            region: Some(rule.region.clone()),
            citation: Some(rule.citation.clone()),
            effective_date: Some(rule.effective_date.clone()),
        }
    }
}

/// Row counts from a batched regulatory application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// RuleStore
// ---------------------------------------------------------------------------

/// SQLite-backed rule database with full-text search.
pub struct RuleStore {
    conn: Connection,
    fts: bool,
}

impl fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStore").field("fts", &self.fts).finish()
    }
}

impl RuleStore {
    /// Opens (creating if needed) the rule database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Sqlite`] if the file cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self, RuleStoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an ephemeral in-memory rule database.
    pub fn open_in_memory() -> Result<Self, RuleStoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RuleStoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        // FTS5 may be unavailable on some builds.
        let fts = match conn.execute_batch(FTS_SQL) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "FTS5 unavailable; falling back to LIKE search");
                false
            }
        };
        Ok(Self { conn, fts })
    }

    /// Whether the full-text index is active.
    pub fn fts_enabled(&self) -> bool {
        self.fts
    }

    /// Seeds an empty store with `rules`; a non-empty store is left alone.
    ///
    /// Returns the number of rules inserted (zero when the store was
    /// already populated).
    pub fn seed_if_empty(&self, rules: &[Rule]) -> Result<usize, RuleStoreError> {
        if self.count()? > 0 {
            return Ok(0);
        }
        for rule in rules {
            self.insert(rule)?;
        }
        tracing::info!(count = rules.len(), "seeded rule database");
        Ok(rules.len())
    }

    // -- CRUD ---------------------------------------------------------------

    /// Inserts a rule and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Duplicate`] when a rule with the same
    /// `(code_name, section)` already exists.
    pub fn insert(&self, rule: &Rule) -> Result<i64, RuleStoreError> {
        insert_rule(&self.conn, rule)
    }

    /// Updates whitelisted fields of the rule with `id`.
    ///
    /// Returns `true` if a row was updated.
    pub fn update(&self, id: i64, update: &RuleUpdate) -> Result<bool, RuleStoreError> {
        update_rule(&self.conn, id, update)
    }

    /// Deletes a rule by id, returning whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool, RuleStoreError> {
        let removed = self.conn.execute("DELETE FROM rules WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Fetches a single rule by id.
    pub fn get(&self, id: i64) -> Result<Option<Rule>, RuleStoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM rules WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let row = stmt
            .query_row(params![id], row_to_rule)
            .optional()?
            .transpose()?;
        Ok(row)
    }

    /// Total number of rules in the store.
    pub fn count(&self) -> Result<i64, RuleStoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
        Ok(n)
    }

    // -- Queries ------------------------------------------------------------

    /// Lists rules matching the AND-combined filters.
    ///
    /// `ifc_class` matches rules whose class list contains the class, or
    /// contains `*`, or is empty; `region` matches the given region or `*`.
    pub fn list(&self, filter: &RuleFilter) -> Result<Vec<Rule>, RuleStoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(ifc_class) = &filter.ifc_class {
            clauses.push(
                "(ifc_classes LIKE ? OR ifc_classes = '[]' OR ifc_classes LIKE '%\"*\"%')"
                    .to_owned(),
            );
            bindings.push(format!("%\"{ifc_class}\"%"));
        }
        if let Some(region) = &filter.region {
            clauses.push("(region = ? OR region = '*')".to_owned());
            bindings.push(region.clone());
        }
        if let Some(code_name) = &filter.code_name {
            clauses.push("code_name = ?".to_owned());
            bindings.push(code_name.clone());
        }

        let where_clause = if clauses.is_empty() {
            "1=1".to_owned()
        } else {
            clauses.join(" AND ")
        };
        let sql = format!("SELECT {SELECT_COLUMNS} FROM rules WHERE {where_clause} ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bindings.iter()), row_to_rule)?;
        collect_rules(rows)
    }

    /// Full-text search over `(title, citation)`.
    ///
    /// Falls back to substring `LIKE` matching when FTS5 is unavailable.
    pub fn search(&self, query: &str) -> Result<Vec<Rule>, RuleStoreError> {
        if self.fts {
            let sql = format!(
                "SELECT {} FROM rules_fts JOIN rules ON rules_fts.rowid = rules.id \
                 WHERE rules_fts MATCH ?1",
                SELECT_COLUMNS
                    .split(", ")
                    .map(|c| format!("rules.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let mut stmt = self.conn.prepare(&sql)?;
            match stmt.query_map(params![query], row_to_rule) {
                Ok(rows) => return collect_rules(rows),
                Err(e) => {
                    tracing::debug!(error = %e, "FTS query failed; falling back to LIKE");
                }
            }
        }
        let like = format!("%{query}%");
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM rules WHERE title LIKE ?1 OR citation LIKE ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![like], row_to_rule)?;
        collect_rules(rows)
    }

    /// Snapshot of every rule, in id order.
    pub fn all(&self) -> Result<Vec<Rule>, RuleStoreError> {
        self.list(&RuleFilter::default())
    }

    // -- Batched application ------------------------------------------------

    /// Applies a regulatory change set in a single transaction.
    ///
    /// Inserts `added`, rewrites `modified` by the old rule's id (falling
    /// back to insert when the old rule carries no id), and deletes
    /// `removed` by id. Any failure rolls the whole batch back.
    pub fn apply_changes(
        &self,
        added: &[Rule],
        modified: &[(Rule, Rule)],
        removed: &[Rule],
    ) -> Result<ApplyCounts, RuleStoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut counts = ApplyCounts::default();

        for rule in added {
            insert_rule(&tx, rule)?;
            counts.added += 1;
        }
        for (old, new) in modified {
            match old.id {
                Some(id) => {
                    update_rule(&tx, id, &RuleUpdate::from_rule(new))?;
                }
                None => {
                    insert_rule(&tx, new)?;
                }
            }
            counts.modified += 1;
        }
        for rule in removed {
            if let Some(id) = rule.id {
                tx.execute("DELETE FROM rules WHERE id = ?1", params![id])?;
            }
            counts.removed += 1;
        }

        tx.commit()?;
        Ok(counts)
    }

    /// Deletes every rule and inserts `rules` verbatim (row ids preserved),
    /// in one transaction.
    ///
    /// Used to restore a backup snapshot after a failed regulatory update.
    pub fn replace_all(&self, rules: &[Rule]) -> Result<(), RuleStoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM rules", [])?;
        for rule in rules {
            match rule.id {
                Some(id) => insert_rule_with_id(&tx, id, rule)?,
                None => {
                    insert_rule(&tx, rule)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn insert_rule(conn: &Connection, rule: &Rule) -> Result<i64, RuleStoreError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM rules WHERE code_name = ?1 AND section = ?2",
            params![rule.code_name, rule.section],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(RuleStoreError::Duplicate {
            code_name: rule.code_name.clone(),
            section: rule.section.clone(),
        });
    }

    conn.execute(
        "INSERT INTO rules (code_name, section, title, ifc_classes, check_type, \
         property_path, check_value, region, citation, effective_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            rule.code_name,
            rule.section,
            rule.title,
            encode_json(&rule.ifc_classes)?,
            rule.check_type.tag(),
            rule.property_path,
            encode_json(&rule.check_value)?,
            rule.region,
            rule.citation,
            rule.effective_date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Snapshot-restore insert preserving the original row id.
fn insert_rule_with_id(conn: &Connection, id: i64, rule: &Rule) -> Result<(), RuleStoreError> {
    conn.execute(
        "INSERT INTO rules (id, code_name, section, title, ifc_classes, check_type, \
         property_path, check_value, region, citation, effective_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            rule.code_name,
            rule.section,
            rule.title,
            encode_json(&rule.ifc_classes)?,
            rule.check_type.tag(),
            rule.property_path,
            encode_json(&rule.check_value)?,
            rule.region,
            rule.citation,
            rule.effective_date,
        ],
    )?;
    Ok(())
}

fn update_rule(conn: &Connection, id: i64, update: &RuleUpdate) -> Result<bool, RuleStoreError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(v) = &update.code_name {
        sets.push("code_name = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.section {
        sets.push("section = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.title {
        sets.push("title = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.ifc_classes {
        sets.push("ifc_classes = ?");
        bindings.push(encode_json(v)?);
    }
    if let Some(v) = update.check_type {
        sets.push("check_type = ?");
        bindings.push(v.tag().to_owned());
    }
    if let Some(v) = &update.property_path {
        sets.push("property_path = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.check_value {
        sets.push("check_value = ?");
        bindings.push(encode_json(v)?);
    }
    if let Some(v) = &update.region {
        sets.push("region = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.citation {
        sets.push("citation = ?");
        bindings.push(v.clone());
    }
    if let Some(v) = &update.effective_date {
        sets.push("effective_date = ?");
        bindings.push(v.clone());
    }

    if sets.is_empty() {
        return Ok(false);
    }

    let sql = format!("UPDATE rules SET {} WHERE id = ?", sets.join(", "));
    bindings.push(id.to_string());
    let changed = conn.execute(&sql, rusqlite::params_from_iter(bindings.iter()))?;
    Ok(changed > 0)
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RuleStoreError> {
    serde_json::to_string(value).map_err(|e| RuleStoreError::Encoding {
        detail: e.to_string(),
    })
}

/// Maps a `rules` row to a [`Rule`], deferring JSON decoding errors.
fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Rule, RuleStoreError>> {
    let id: i64 = row.get(0)?;
    let code_name: String = row.get(1)?;
    let section: String = row.get(2)?;
    let title: String = row.get(3)?;
    let ifc_classes_json: String = row.get(4)?;
    let check_type_tag: String = row.get(5)?;
    let property_path: String = row.get(6)?;
    let check_value_json: Option<String> = row.get(7)?;
    let region: String = row.get(8)?;
    let citation: String = row.get(9)?;
    let effective_date: String = row.get(10)?;

    Ok(decode_rule(DecodedRow {
        id,
        code_name,
        section,
        title,
        ifc_classes_json,
        check_type_tag,
        property_path,
        check_value_json,
        region,
        citation,
        effective_date,
    }))
}

struct DecodedRow {
    id: i64,
    code_name: String,
    section: String,
    title: String,
    ifc_classes_json: String,
    check_type_tag: String,
    property_path: String,
    check_value_json: Option<String>,
    region: String,
    citation: String,
    effective_date: String,
}

fn decode_rule(row: DecodedRow) -> Result<Rule, RuleStoreError> {
    let ifc_classes: Vec<String> =
        serde_json::from_str(&row.ifc_classes_json).map_err(|e| RuleStoreError::Encoding {
            detail: format!("ifc_classes for rule {}: {e}", row.id),
        })?;
    let check_value: DynValue = match &row.check_value_json {
        Some(json) => serde_json::from_str(json).map_err(|e| RuleStoreError::Encoding {
            detail: format!("check_value for rule {}: {e}", row.id),
        })?,
        None => DynValue::Null,
    };
    let check_type =
        CheckType::from_tag(&row.check_type_tag).ok_or_else(|| RuleStoreError::Encoding {
            detail: format!("unknown check_type {:?} for rule {}", row.check_type_tag, row.id),
        })?;

    Ok(Rule {
        id: Some(row.id),
        code_name: row.code_name,
        section: row.section,
        title: row.title,
        ifc_classes,
        check_type,
        property_path: row.property_path,
        check_value,
        region: row.region,
        citation: row.citation,
        effective_date: row.effective_date,
    })
}

fn collect_rules<I>(rows: I) -> Result<Vec<Rule>, RuleStoreError>
where
    I: Iterator<Item = rusqlite::Result<Result<Rule, RuleStoreError>>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}
