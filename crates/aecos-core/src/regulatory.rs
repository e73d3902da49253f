/// The regulatory update pipeline: diff, atomic apply, impact analysis.
///
/// [`diff`] keys rule sets by `(code_name, section)`. [`apply`] snapshots
/// the current store to a timestamped backup, applies the change set in one
/// transaction, restores from the snapshot if anything in the batch fails,
/// and stamps a `regulatory/<code>/<version>/<YYYYMMDD>` tag in the version
/// log. [`impact`] scans element and template folders for classes touched by
/// the change set; it reports, never mutates.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::canonical;
use crate::dynvalue::DynValue;
use crate::outcome::Warning;
use crate::rule_store::{RuleStore, RuleStoreError};
use crate::rules::Rule;
use crate::version::VersionLog;

/// Directory (under the project root) holding rule snapshots.
pub const BACKUP_DIR: &str = ".regulatory_backups";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the regulatory updater.
#[derive(Debug)]
pub enum RegulatoryError {
    /// Reading or writing the rule store failed; when a backup had been
    /// taken, the store was restored from it.
    Store(RuleStoreError),
    /// The pre-apply snapshot could not be written; the update was not
    /// attempted.
    Backup { path: PathBuf, detail: String },
    /// The batch failed *and* the snapshot could not be restored; the
    /// store may be inconsistent and the backup file is the recovery
    /// point.
    RestoreFailed {
        backup: PathBuf,
        apply_error: RuleStoreError,
        restore_error: RuleStoreError,
    },
}

impl fmt::Display for RegulatoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "regulatory update failed: {e}"),
            Self::Backup { path, detail } => {
                write!(f, "could not write rule backup {}: {detail}", path.display())
            }
            Self::RestoreFailed {
                backup,
                apply_error,
                restore_error,
            } => write!(
                f,
                "update failed ({apply_error}) and restore failed ({restore_error}); \
                 recover manually from {}",
                backup.display()
            ),
        }
    }
}

impl std::error::Error for RegulatoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Backup { .. } => None,
            Self::RestoreFailed { apply_error, .. } => Some(apply_error),
        }
    }
}

impl From<RuleStoreError> for RegulatoryError {
    fn from(e: RuleStoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// The change set between two rule sets, keyed by `(code_name, section)`.
#[derive(Debug, Clone, Default)]
pub struct RuleSetDiff {
    pub added: Vec<Rule>,
    /// `(old, new)` pairs whose key matches but whose content differs.
    pub modified: Vec<(Rule, Rule)>,
    pub removed: Vec<Rule>,
    pub unchanged: Vec<Rule>,
}

impl RuleSetDiff {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Added: {}, Modified: {}, Removed: {}, Unchanged: {}",
            self.added.len(),
            self.modified.len(),
            self.removed.len(),
            self.unchanged.len()
        )
    }

    /// Every IFC class named by a changed rule (sorted, deduplicated).
    pub fn affected_ifc_classes(&self) -> Vec<String> {
        let mut classes = std::collections::BTreeSet::new();
        for rule in &self.added {
            classes.extend(rule.ifc_classes.iter().cloned());
        }
        for (_, new) in &self.modified {
            classes.extend(new.ifc_classes.iter().cloned());
        }
        for rule in &self.removed {
            classes.extend(rule.ifc_classes.iter().cloned());
        }
        classes.into_iter().collect()
    }
}

/// Compares `old` against `new` by natural key.
pub fn diff(old: &[Rule], new: &[Rule]) -> RuleSetDiff {
    let old_map: BTreeMap<(String, String), &Rule> = old
        .iter()
        .map(|r| ((r.code_name.clone(), r.section.clone()), r))
        .collect();
    let new_map: BTreeMap<(String, String), &Rule> = new
        .iter()
        .map(|r| ((r.code_name.clone(), r.section.clone()), r))
        .collect();

    let mut result = RuleSetDiff::default();

    for (key, new_rule) in &new_map {
        match old_map.get(key) {
            None => result.added.push((*new_rule).clone()),
            Some(old_rule) => {
                if old_rule.content_differs(new_rule) {
                    result.modified.push(((*old_rule).clone(), (*new_rule).clone()));
                } else {
                    result.unchanged.push((*new_rule).clone());
                }
            }
        }
    }
    for (key, old_rule) in &old_map {
        if !new_map.contains_key(key) {
            result.removed.push((*old_rule).clone());
        }
    }

    tracing::info!(summary = %result.summary(), "rule diff");
    result
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Result of applying a regulatory update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub rules_added: usize,
    pub rules_modified: usize,
    pub rules_removed: usize,
    pub backup_path: String,
    /// The version-log tag, when tagging succeeded.
    pub tag: Option<String>,
    /// ISO timestamp of the application.
    pub applied_at: String,
    #[serde(skip)]
    pub warnings: Vec<Warning>,
}

/// Applies a diff to the rule store under backup-and-tag semantics.
///
/// Steps: snapshot every current rule to a timestamped JSON file under
/// `<project>/.regulatory_backups/`; apply adds, modifications (by the old
/// rule's id), and removals in one transaction; tag the version log
/// `regulatory/<code_name>/<version>/<YYYYMMDD>`. A failed batch restores
/// the snapshot. A failed tag is a warning, not a rollback.
pub fn apply(
    store: &RuleStore,
    diff: &RuleSetDiff,
    code_name: &str,
    version: &str,
    project_root: &Path,
    version_log: Option<&VersionLog>,
) -> Result<UpdateOutcome, RegulatoryError> {
    let applied_at = Utc::now().to_rfc3339();
    if !diff.has_changes() {
        return Ok(UpdateOutcome {
            rules_added: 0,
            rules_modified: 0,
            rules_removed: 0,
            backup_path: String::new(),
            tag: None,
            applied_at,
            warnings: Vec::new(),
        });
    }

    // Step 1 — snapshot. A failed snapshot aborts before any mutation.
    let snapshot = store.all()?;
    let backup_path = backup_file(project_root, code_name);
    canonical::write_json_atomic(&backup_path, &snapshot).map_err(|e| RegulatoryError::Backup {
        path: backup_path.clone(),
        detail: e.to_string(),
    })?;
    tracing::info!(path = %backup_path.display(), rules = snapshot.len(), "wrote rule backup");

    // Steps 2-4 — one transactional batch; restore the snapshot on failure.
    let counts = match store.apply_changes(&diff.added, &diff.modified, &diff.removed) {
        Ok(counts) => counts,
        Err(apply_error) => {
            tracing::error!(error = %apply_error, "regulatory batch failed; restoring snapshot");
            return match store.replace_all(&snapshot) {
                Ok(()) => Err(RegulatoryError::Store(apply_error)),
                Err(restore_error) => Err(RegulatoryError::RestoreFailed {
                    backup: backup_path,
                    apply_error,
                    restore_error,
                }),
            };
        }
    };

    // Step 5 — stamp the version log.
    let mut warnings = Vec::new();
    let tag = match version_log {
        Some(log) => {
            let tag_name = format!(
                "regulatory/{code_name}/{version}/{}",
                Utc::now().format("%Y%m%d")
            );
            match log.tag(&tag_name, &format!("Regulatory update: {code_name} {version}")) {
                Ok(()) => Some(tag_name),
                Err(e) => {
                    warnings.push(Warning::partial_side_effect(format!(
                        "regulatory tag failed: {e}"
                    )));
                    None
                }
            }
        }
        None => None,
    };

    tracing::info!(
        added = counts.added,
        modified = counts.modified,
        removed = counts.removed,
        "applied regulatory update"
    );
    Ok(UpdateOutcome {
        rules_added: counts.added,
        rules_modified: counts.modified,
        rules_removed: counts.removed,
        backup_path: backup_path.display().to_string(),
        tag,
        applied_at,
        warnings,
    })
}

fn backup_file(project_root: &Path, code_name: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let code = if code_name.is_empty() { "rules" } else { code_name };
    project_root
        .join(BACKUP_DIR)
        .join(format!("rules_backup_{code}_{stamp}.json"))
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

/// Which folders a change set touches; flagged for revalidation, never
/// mutated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactReport {
    pub affected_ifc_classes: Vec<String>,
    pub affected_elements: Vec<String>,
    pub affected_templates: Vec<String>,
    pub revalidation_needed: Vec<String>,
    pub total_affected: usize,
}

impl ImpactReport {
    pub fn summary(&self) -> String {
        format!(
            "Affected: {} templates, {} elements, {} need re-validation.",
            self.affected_templates.len(),
            self.affected_elements.len(),
            self.revalidation_needed.len()
        )
    }
}

/// Scans element and template folders whose `IFCClass` is named by the
/// change set. The optional `deadline` is polled between folders.
pub fn impact(
    diff: &RuleSetDiff,
    elements_dir: &Path,
    library_root: Option<&Path>,
    deadline: Option<Instant>,
) -> Result<ImpactReport, RegulatoryError> {
    let mut report = ImpactReport::default();
    if !diff.has_changes() {
        return Ok(report);
    }

    report.affected_ifc_classes = diff.affected_ifc_classes();
    let classes = &report.affected_ifc_classes;

    if elements_dir.is_dir() {
        report.affected_elements = scan_folders(elements_dir, "element_", classes, deadline)?;
    }
    if let Some(library_root) = library_root {
        if library_root.is_dir() {
            report.affected_templates =
                scan_folders(library_root, "template_", classes, deadline)?;
        }
    }

    report.revalidation_needed = report
        .affected_templates
        .iter()
        .chain(&report.affected_elements)
        .cloned()
        .collect();
    report.total_affected = report.affected_templates.len() + report.affected_elements.len();

    tracing::info!(summary = %report.summary(), "impact analysis");
    Ok(report)
}

/// Collects folder names under `root` (with the given prefix) whose
/// metadata `IFCClass` is in `classes`. Unreadable metadata is skipped.
fn scan_folders(
    root: &Path,
    prefix: &str,
    classes: &[String],
    deadline: Option<Instant>,
) -> Result<Vec<String>, RegulatoryError> {
    let mut affected = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return Ok(affected);
    };
    let mut names: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, _)| name.starts_with(prefix))
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in names {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        let Ok(metadata) = canonical::read_json::<DynValue>(&path.join("metadata.json")) else {
            continue;
        };
        let Some(ifc_class) = metadata.get("IFCClass").and_then(DynValue::as_str) else {
            continue;
        };
        let wildcard = classes.iter().any(|c| c == "*");
        if wildcard || classes.iter().any(|c| c.eq_ignore_ascii_case(ifc_class)) {
            affected.push(name);
        }
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::enums::CheckType;

    fn rule(code: &str, section: &str, classes: &[&str], value: i64) -> Rule {
        Rule {
            id: None,
            code_name: code.to_owned(),
            section: section.to_owned(),
            title: format!("{code} {section}"),
            ifc_classes: classes.iter().map(|c| (*c).to_owned()).collect(),
            check_type: CheckType::MinValue,
            property_path: "properties.thickness_mm".to_owned(),
            check_value: DynValue::Integer(value),
            region: "US".to_owned(),
            citation: String::new(),
            effective_date: "2024-01-01".to_owned(),
        }
    }

    // --- diff ---

    #[test]
    fn diff_partitions_by_natural_key() {
        let old = vec![
            rule("A", "1", &["IfcWall"], 100),
            rule("A", "2", &["IfcDoor"], 800),
            rule("B", "1", &["IfcSlab"], 150),
        ];
        let mut changed = rule("A", "2", &["IfcDoor"], 815);
        changed.title = "updated".to_owned();
        let new = vec![
            rule("A", "1", &["IfcWall"], 100),
            changed,
            rule("C", "9", &["IfcBeam"], 300),
        ];

        let d = diff(&old, &new);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.added[0].natural_key(), ("C", "9"));
        assert_eq!(d.modified.len(), 1);
        assert_eq!(d.modified[0].0.natural_key(), ("A", "2"));
        assert_eq!(d.removed.len(), 1);
        assert_eq!(d.removed[0].natural_key(), ("B", "1"));
        assert_eq!(d.unchanged.len(), 1);
        assert!(d.has_changes());
        assert_eq!(d.total_changes(), 3);
    }

    #[test]
    fn identical_sets_have_no_changes() {
        let rules = vec![rule("A", "1", &["IfcWall"], 100)];
        let d = diff(&rules, &rules);
        assert!(!d.has_changes());
        assert_eq!(d.unchanged.len(), 1);
    }

    #[test]
    fn affected_classes_union_over_changes() {
        let old = vec![rule("A", "1", &["IfcWall"], 100)];
        let new = vec![rule("B", "1", &["IfcDoor", "IfcWall"], 50)];
        let d = diff(&old, &new);
        assert_eq!(
            d.affected_ifc_classes(),
            vec!["IfcDoor".to_owned(), "IfcWall".to_owned()]
        );
    }

    // --- apply ---

    fn seeded_store(rules: &[Rule]) -> RuleStore {
        let store = RuleStore::open_in_memory().expect("store");
        for r in rules {
            store.insert(r).expect("insert");
        }
        store
    }

    #[test]
    fn apply_round_trips_to_the_new_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = seeded_store(&[
            rule("A", "1", &["IfcWall"], 100),
            rule("A", "2", &["IfcDoor"], 800),
        ]);
        let current = store.all().expect("all");

        let mut changed = rule("A", "2", &["IfcDoor"], 815);
        changed.title = "wider".to_owned();
        let target = vec![changed, rule("C", "9", &["IfcBeam"], 300)];

        let d = diff(&current, &target);
        let outcome = apply(&store, &d, "A", "2025.1", dir.path(), None).expect("apply");

        assert_eq!(outcome.rules_added, 1);
        assert_eq!(outcome.rules_modified, 1);
        assert_eq!(outcome.rules_removed, 1);
        assert!(PathBuf::from(&outcome.backup_path).is_file());

        // The store now matches the target in the natural-key dimension.
        let mut keys: Vec<(String, String)> = store
            .all()
            .expect("all")
            .iter()
            .map(|r| (r.code_name.clone(), r.section.clone()))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![("A".to_owned(), "2".to_owned()), ("C".to_owned(), "9".to_owned())]
        );
        let updated = store.all().expect("all");
        let a2 = updated.iter().find(|r| r.section == "2").expect("A §2");
        assert_eq!(a2.title, "wider");
        assert_eq!(a2.check_value, DynValue::Integer(815));
    }

    #[test]
    fn apply_restores_snapshot_on_batch_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = seeded_store(&[rule("A", "1", &["IfcWall"], 100)]);
        let before = store.all().expect("all");

        // An add colliding with an existing natural key fails the batch.
        let d = RuleSetDiff {
            added: vec![rule("NEW", "1", &["IfcSlab"], 1), rule("A", "1", &[], 2)],
            ..RuleSetDiff::default()
        };
        let result = apply(&store, &d, "A", "x", dir.path(), None);
        assert!(result.is_err());
        assert_eq!(store.all().expect("all"), before);
        // The backup file still exists as the audit trail of the attempt.
        let backups: Vec<_> = std::fs::read_dir(dir.path().join(BACKUP_DIR))
            .expect("backup dir")
            .flatten()
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn apply_tags_the_version_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = VersionLog::init(dir.path()).expect("init");
        let store = seeded_store(&[rule("A", "1", &["IfcWall"], 100)]);

        let d = RuleSetDiff {
            added: vec![rule("B", "1", &["IfcDoor"], 5)],
            ..RuleSetDiff::default()
        };
        let outcome = apply(&store, &d, "IBC2024", "2025.1", dir.path(), Some(&log))
            .expect("apply");
        let tag = outcome.tag.expect("tag");
        assert!(tag.starts_with("regulatory/IBC2024/2025.1/"));
        assert_eq!(log.list_tags(Some("regulatory/*")).expect("tags"), vec![tag]);
    }

    #[test]
    fn empty_diff_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = seeded_store(&[rule("A", "1", &["IfcWall"], 100)]);
        let outcome = apply(&store, &RuleSetDiff::default(), "A", "1", dir.path(), None)
            .expect("apply");
        assert_eq!(outcome.rules_added + outcome.rules_modified + outcome.rules_removed, 0);
        assert!(outcome.backup_path.is_empty());
        assert!(!dir.path().join(BACKUP_DIR).exists());
    }

    // --- impact ---

    #[test]
    fn impact_lists_matching_folders_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = crate::store::ElementStore::open(&dir.path().join("elements")).expect("store");
        let wall = store
            .create(crate::store::NewElement {
                ifc_class: "IfcWall".to_owned(),
                ..crate::store::NewElement::default()
            })
            .expect("create");
        store
            .create(crate::store::NewElement {
                ifc_class: "IfcDoor".to_owned(),
                ..crate::store::NewElement::default()
            })
            .expect("create");

        let d = RuleSetDiff {
            added: vec![rule("X", "1", &["IfcWall"], 1)],
            ..RuleSetDiff::default()
        };
        let report = impact(&d, &dir.path().join("elements"), None, None).expect("impact");
        assert_eq!(report.affected_ifc_classes, vec!["IfcWall".to_owned()]);
        assert_eq!(report.affected_elements, vec![wall.global_id.folder_name()]);
        assert_eq!(report.total_affected, 1);
        assert_eq!(report.revalidation_needed.len(), 1);
    }

    #[test]
    fn impact_covers_templates_too() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = crate::store::ElementStore::open(&dir.path().join("elements")).expect("store");
        let mut library =
            crate::templates::TemplateLibrary::open(&dir.path().join("templates")).expect("library");
        let wall = store
            .create(crate::store::NewElement {
                ifc_class: "IfcWall".to_owned(),
                ..crate::store::NewElement::default()
            })
            .expect("create");
        library
            .promote(
                &store.folder(&wall.global_id),
                None,
                crate::templates::TemplateMeta::default(),
            )
            .expect("promote");

        let d = RuleSetDiff {
            removed: vec![rule("X", "1", &["IfcWall"], 1)],
            ..RuleSetDiff::default()
        };
        let report = impact(
            &d,
            &dir.path().join("elements"),
            Some(&dir.path().join("templates")),
            None,
        )
        .expect("impact");
        assert_eq!(report.affected_elements.len(), 1);
        assert_eq!(report.affected_templates.len(), 1);
        assert_eq!(report.total_affected, 2);
    }
}
