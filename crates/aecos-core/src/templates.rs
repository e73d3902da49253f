/// The template library: a content-addressed registry of reusable elements.
///
/// A template is an element folder copied under the library root (named
/// `template_<id>`) plus a `template_manifest.json` carrying tags, version,
/// author, and description. `registry.json` at the library root is the
/// canonical index; every mutating operation rewrites it atomically, so a
/// crash leaves either the old or the new index, never a torn one. A corrupt
/// registry on open degrades to an empty index with a warning — the on-disk
/// folders remain authoritative.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifacts::{self, ReportSet};
use crate::canonical;
use crate::element::ElementMetadata;
use crate::newtypes::{NewtypeError, TemplateId};

pub const MANIFEST_FILENAME: &str = "template_manifest.json";
pub const REGISTRY_FILENAME: &str = "registry.json";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the template library.
#[derive(Debug)]
pub enum TemplateError {
    /// The addressed template is not in the registry.
    NotFound { template_id: String },
    /// The source folder to import does not exist.
    SourceMissing { path: PathBuf },
    /// An identifier was malformed.
    InvalidId(NewtypeError),
    /// An underlying filesystem operation failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A JSON file could not be read or written.
    Encoding { path: PathBuf, detail: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { template_id } => write!(f, "template not found: {template_id}"),
            Self::SourceMissing { path } => {
                write!(f, "source folder not found: {}", path.display())
            }
            Self::InvalidId(e) => write!(f, "{e}"),
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
            Self::Encoding { path, detail } => {
                write!(f, "encoding error at {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidId(e) => Some(e),
            Self::NotFound { .. } | Self::SourceMissing { .. } | Self::Encoding { .. } => None,
        }
    }
}

impl From<NewtypeError> for TemplateError {
    fn from(e: NewtypeError) -> Self {
        Self::InvalidId(e)
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Structured tag set attached to every template.
///
/// All fields are optional; a freshly promoted element may carry only
/// `ifc_class`, with the rest filled in over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplateTags {
    pub ifc_class: Option<String>,
    pub material: Vec<String>,
    pub region: Vec<String>,
    pub compliance_codes: Vec<String>,
    pub custom: Vec<String>,
}

impl TemplateTags {
    /// Every tag string across all fields (including `ifc_class`).
    pub fn all_strings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(class) = &self.ifc_class {
            out.push(class.clone());
        }
        out.extend(self.material.iter().cloned());
        out.extend(self.region.iter().cloned());
        out.extend(self.compliance_codes.iter().cloned());
        out.extend(self.custom.iter().cloned());
        out
    }

    /// Returns `true` if this tag set satisfies every filter in `query`.
    ///
    /// Query keys are AND-combined; list-valued filters pass when the
    /// intersection with the template's tags is non-empty, except `tags`,
    /// which requires every queried string to appear somewhere in the
    /// union of `material`, `region`, `compliance_codes`, and `custom`.
    pub fn matches(&self, query: &TemplateQuery) -> bool {
        if let Some(wanted) = &query.ifc_class {
            let Some(class) = &self.ifc_class else {
                return false;
            };
            if !class.eq_ignore_ascii_case(wanted) {
                return false;
            }
        }

        if !query.material.is_empty() && !intersects(&query.material, &self.material) {
            return false;
        }
        if !query.region.is_empty() && !intersects(&query.region, &self.region) {
            return false;
        }
        if !query.compliance_codes.is_empty()
            && !intersects(&query.compliance_codes, &self.compliance_codes)
        {
            return false;
        }

        if !query.tags.is_empty() {
            let pool: Vec<String> = self
                .material
                .iter()
                .chain(&self.region)
                .chain(&self.compliance_codes)
                .chain(&self.custom)
                .map(|s| s.to_ascii_lowercase())
                .collect();
            for tag in &query.tags {
                if !pool.contains(&tag.to_ascii_lowercase()) {
                    return false;
                }
            }
        }

        if let Some(keyword) = &query.keyword {
            let blob = self.all_strings().join(" ").to_ascii_lowercase();
            if !blob.contains(&keyword.to_ascii_lowercase()) {
                return false;
            }
        }

        true
    }
}

fn intersects(wanted: &[String], have: &[String]) -> bool {
    wanted
        .iter()
        .any(|w| have.iter().any(|h| h.eq_ignore_ascii_case(w)))
}

/// AND-combined template search filters.
#[derive(Debug, Clone, Default)]
pub struct TemplateQuery {
    pub ifc_class: Option<String>,
    pub material: Vec<String>,
    pub region: Vec<String>,
    pub compliance_codes: Vec<String>,
    /// All-of match over the union of tag fields plus custom.
    pub tags: Vec<String>,
    /// Substring over the concatenation of all tag strings.
    pub keyword: Option<String>,
    /// Substring on the entry description.
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Manifest and registry records
// ---------------------------------------------------------------------------

/// The shape of `template_manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub template_id: String,
    #[serde(default)]
    pub tags: TemplateTags,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
}

/// One row of `registry.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub template_id: String,
    pub folder_name: String,
    #[serde(default)]
    pub tags: TemplateTags,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: String,
    templates: Vec<RegistryEntry>,
}

/// Optional metadata for [`TemplateLibrary::add`] and
/// [`TemplateLibrary::promote`].
#[derive(Debug, Clone, Default)]
pub struct TemplateMeta {
    pub tags: Option<TemplateTags>,
    pub version: Option<String>,
    pub author: String,
    pub description: String,
}

/// Field updates for [`TemplateLibrary::update`]; only supplied fields
/// change.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub tags: Option<TemplateTags>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// TemplateLibrary
// ---------------------------------------------------------------------------

/// Manages the local directory of template folders.
#[derive(Debug)]
pub struct TemplateLibrary {
    root: PathBuf,
    entries: BTreeMap<String, RegistryEntry>,
}

impl TemplateLibrary {
    /// Opens the library rooted at `root`, creating the directory when
    /// absent and loading `registry.json` (corrupt registry → empty index
    /// plus warning).
    pub fn open(root: &Path) -> Result<Self, TemplateError> {
        std::fs::create_dir_all(root).map_err(|source| TemplateError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let registry_path = root.join(REGISTRY_FILENAME);
        let entries = if registry_path.is_file() {
            match canonical::read_json::<RegistryFile>(&registry_path) {
                Ok(file) => file
                    .templates
                    .into_iter()
                    .map(|e| (e.template_id.clone(), e))
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        path = %registry_path.display(),
                        error = %e,
                        "corrupt registry; starting empty (folders remain authoritative)"
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }

    /// The library root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn template_dir(&self, template_id: &TemplateId) -> PathBuf {
        self.root.join(template_id.folder_name())
    }

    /// Atomically persists the registry.
    fn save(&self) -> Result<(), TemplateError> {
        let file = RegistryFile {
            version: "1".to_owned(),
            templates: self.entries.values().cloned().collect(),
        };
        let path = self.root.join(REGISTRY_FILENAME);
        canonical::write_json_atomic(&path, &file).map_err(|e| TemplateError::Encoding {
            path,
            detail: e.to_string(),
        })
    }

    // -- CRUD ---------------------------------------------------------------

    /// Copies `source_folder` into the library as `template_<id>`, writes
    /// its manifest, and registers it. An existing template with the same
    /// id is replaced.
    pub fn add(
        &mut self,
        template_id: &TemplateId,
        source_folder: &Path,
        meta: TemplateMeta,
    ) -> Result<PathBuf, TemplateError> {
        if !source_folder.is_dir() {
            return Err(TemplateError::SourceMissing {
                path: source_folder.to_path_buf(),
            });
        }

        let tags = meta.tags.unwrap_or_default();
        let version = meta.version.unwrap_or_else(|| "1.0.0".to_owned());
        let dest = self.template_dir(template_id);
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|source| TemplateError::Io {
                path: dest.clone(),
                source,
            })?;
        }
        copy_dir(source_folder, &dest)?;

        let manifest = TemplateManifest {
            template_id: template_id.to_string(),
            tags: tags.clone(),
            version: version.clone(),
            author: meta.author.clone(),
            description: meta.description.clone(),
        };
        canonical::write_json_atomic(&dest.join(MANIFEST_FILENAME), &manifest).map_err(|e| {
            TemplateError::Encoding {
                path: dest.join(MANIFEST_FILENAME),
                detail: e.to_string(),
            }
        })?;

        let entry = RegistryEntry {
            template_id: template_id.to_string(),
            folder_name: template_id.folder_name(),
            tags,
            version,
            author: meta.author,
            description: meta.description,
        };
        self.entries.insert(entry.template_id.clone(), entry);
        self.save()?;

        if let Err(e) = artifacts::regenerate(&dest, &ReportSet::default()) {
            tracing::warn!(template_id = %template_id, error = %e, "template artifact regeneration failed");
        }

        tracing::info!(template_id = %template_id, dest = %dest.display(), "added template");
        Ok(dest)
    }

    /// Returns the template folder path, or `None` when the id is
    /// unregistered or the folder has gone missing (dangling ids resolve
    /// to `None`, never an error).
    pub fn get(&self, template_id: &str) -> Option<PathBuf> {
        let entry = self.entries.get(template_id)?;
        let folder = self.root.join(&entry.folder_name);
        folder.is_dir().then_some(folder)
    }

    /// Returns the registry entry for `template_id`.
    pub fn entry(&self, template_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(template_id)
    }

    /// Reads the manifest of a registered template.
    pub fn manifest(&self, template_id: &str) -> Option<TemplateManifest> {
        let folder = self.get(template_id)?;
        canonical::read_json(&folder.join(MANIFEST_FILENAME)).ok()
    }

    /// Updates manifest/registry metadata; unsupplied fields are preserved.
    pub fn update(
        &mut self,
        template_id: &str,
        update: &TemplateUpdate,
    ) -> Result<PathBuf, TemplateError> {
        let entry = self
            .entries
            .get_mut(template_id)
            .ok_or_else(|| TemplateError::NotFound {
                template_id: template_id.to_owned(),
            })?;

        if let Some(tags) = &update.tags {
            entry.tags = tags.clone();
        }
        if let Some(version) = &update.version {
            entry.version = version.clone();
        }
        if let Some(author) = &update.author {
            entry.author = author.clone();
        }
        if let Some(description) = &update.description {
            entry.description = description.clone();
        }

        let folder = self.root.join(&entry.folder_name);
        let manifest = TemplateManifest {
            template_id: entry.template_id.clone(),
            tags: entry.tags.clone(),
            version: entry.version.clone(),
            author: entry.author.clone(),
            description: entry.description.clone(),
        };
        canonical::write_json_atomic(&folder.join(MANIFEST_FILENAME), &manifest).map_err(|e| {
            TemplateError::Encoding {
                path: folder.join(MANIFEST_FILENAME),
                detail: e.to_string(),
            }
        })?;
        self.save()?;
        tracing::info!(template_id = %template_id, "updated template");
        Ok(folder)
    }

    /// Removes a template folder and its registry entry; `false` when the
    /// id was not registered.
    pub fn remove(&mut self, template_id: &str) -> Result<bool, TemplateError> {
        let Some(entry) = self.entries.remove(template_id) else {
            return Ok(false);
        };
        let folder = self.root.join(&entry.folder_name);
        if folder.is_dir() {
            std::fs::remove_dir_all(&folder).map_err(|source| TemplateError::Io {
                path: folder,
                source,
            })?;
        }
        self.save()?;
        tracing::info!(template_id = %template_id, "removed template");
        Ok(true)
    }

    // -- Promote ------------------------------------------------------------

    /// Promotes an element folder to a library template.
    ///
    /// The template id derives from the element's `GlobalId` unless one is
    /// given; `tags.ifc_class` auto-populates from the source metadata when
    /// absent.
    pub fn promote(
        &mut self,
        element_folder: &Path,
        template_id: Option<TemplateId>,
        mut meta: TemplateMeta,
    ) -> Result<PathBuf, TemplateError> {
        if !element_folder.is_dir() {
            return Err(TemplateError::SourceMissing {
                path: element_folder.to_path_buf(),
            });
        }

        let metadata: Option<ElementMetadata> =
            canonical::read_json(&element_folder.join("metadata.json")).ok();

        let template_id = match template_id {
            Some(id) => id,
            None => {
                let metadata = metadata.as_ref().ok_or_else(|| TemplateError::Encoding {
                    path: element_folder.join("metadata.json"),
                    detail: "cannot derive template id without readable metadata".to_owned(),
                })?;
                TemplateId::from(&metadata.global_id)
            }
        };

        let mut tags = meta.tags.take().unwrap_or_default();
        if tags.ifc_class.is_none() {
            tags.ifc_class = metadata.as_ref().map(|m| m.ifc_class.clone());
        }
        meta.tags = Some(tags);

        self.add(&template_id, element_folder, meta)
    }

    // -- Search -------------------------------------------------------------

    /// All registry entries, ordered by template id.
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.entries.values().cloned().collect()
    }

    /// Returns entries whose tags satisfy every filter in `query`.
    pub fn search(&self, query: &TemplateQuery) -> Vec<RegistryEntry> {
        self.entries
            .values()
            .filter(|entry| entry.tags.matches(query))
            .filter(|entry| match &query.description {
                Some(needle) => entry
                    .description
                    .to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase()),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no templates are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Recursively copies a directory tree.
fn copy_dir(src: &Path, dest: &Path) -> Result<(), TemplateError> {
    std::fs::create_dir_all(dest).map_err(|source| TemplateError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let entries = std::fs::read_dir(src).map_err(|source| TemplateError::Io {
        path: src.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| TemplateError::Io {
            path: src.to_path_buf(),
            source,
        })?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|source| TemplateError::Io {
                path: from.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::element::MaterialLayer;
    use crate::newtypes::GlobalId;
    use crate::store::{ElementStore, NewElement};

    fn fixture() -> (tempfile::TempDir, ElementStore, TemplateLibrary) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ElementStore::open(&dir.path().join("elements")).expect("store");
        let library = TemplateLibrary::open(&dir.path().join("templates")).expect("library");
        (dir, store, library)
    }

    fn sample_element(store: &ElementStore, id: &str) -> PathBuf {
        let global_id = GlobalId::try_from(id).expect("valid id");
        let element = store
            .create(NewElement {
                ifc_class: "IfcWall".to_owned(),
                name: Some("Wall".to_owned()),
                materials: vec![MaterialLayer::new("Concrete", Some(200.0), "wall")],
                global_id: Some(global_id.clone()),
                ..NewElement::default()
            })
            .expect("create element");
        store.folder(&element.global_id)
    }

    fn tags(materials: &[&str], regions: &[&str], codes: &[&str]) -> TemplateTags {
        TemplateTags {
            ifc_class: Some("IfcWall".to_owned()),
            material: materials.iter().map(|s| (*s).to_owned()).collect(),
            region: regions.iter().map(|s| (*s).to_owned()).collect(),
            compliance_codes: codes.iter().map(|s| (*s).to_owned()).collect(),
            custom: Vec::new(),
        }
    }

    // --- Add / get / remove ---

    #[test]
    fn add_copies_folder_and_registers() {
        let (_dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let id = TemplateId::try_from("fire-wall-2h").expect("valid id");

        let dest = library
            .add(
                &id,
                &source,
                TemplateMeta {
                    tags: Some(tags(&["concrete"], &["US"], &["IBC2024"])),
                    version: Some("1.0.0".to_owned()),
                    author: "mats".to_owned(),
                    description: "Two-hour fire wall".to_owned(),
                },
            )
            .expect("add");

        assert!(dest.join("metadata.json").is_file());
        assert!(dest.join(MANIFEST_FILENAME).is_file());
        assert_eq!(library.get("fire-wall-2h"), Some(dest.clone()));
        assert!(library.root().join(REGISTRY_FILENAME).is_file());

        let manifest = library.manifest("fire-wall-2h").expect("manifest");
        assert_eq!(manifest.template_id, "fire-wall-2h");
        assert_eq!(manifest.tags.material, vec!["concrete".to_owned()]);
    }

    #[test]
    fn add_missing_source_fails() {
        let (dir, _store, mut library) = fixture();
        let id = TemplateId::try_from("x").expect("valid id");
        let result = library.add(&id, &dir.path().join("nope"), TemplateMeta::default());
        assert!(matches!(result, Err(TemplateError::SourceMissing { .. })));
    }

    #[test]
    fn remove_reports_prior_existence() {
        let (_dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let id = TemplateId::try_from("t1").expect("valid id");
        library.add(&id, &source, TemplateMeta::default()).expect("add");

        assert!(library.remove("t1").expect("remove"));
        assert!(!library.remove("t1").expect("second remove"));
        assert!(library.get("t1").is_none());
    }

    #[test]
    fn update_preserves_unsupplied_fields() {
        let (_dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let id = TemplateId::try_from("t1").expect("valid id");
        library
            .add(
                &id,
                &source,
                TemplateMeta {
                    author: "original".to_owned(),
                    description: "desc".to_owned(),
                    ..TemplateMeta::default()
                },
            )
            .expect("add");

        library
            .update(
                "t1",
                &TemplateUpdate {
                    version: Some("2.0.0".to_owned()),
                    ..TemplateUpdate::default()
                },
            )
            .expect("update");

        let entry = library.entry("t1").expect("entry");
        assert_eq!(entry.version, "2.0.0");
        assert_eq!(entry.author, "original");
        let manifest = library.manifest("t1").expect("manifest");
        assert_eq!(manifest.version, "2.0.0");
    }

    // --- Registry durability ---

    #[test]
    fn registry_survives_reopen() {
        let (dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let id = TemplateId::try_from("t1").expect("valid id");
        library.add(&id, &source, TemplateMeta::default()).expect("add");
        drop(library);

        let reopened = TemplateLibrary::open(&dir.path().join("templates")).expect("reopen");
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("t1").is_some());
    }

    #[test]
    fn corrupt_registry_starts_empty() {
        let (dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let id = TemplateId::try_from("t1").expect("valid id");
        library.add(&id, &source, TemplateMeta::default()).expect("add");
        drop(library);

        std::fs::write(dir.path().join("templates").join(REGISTRY_FILENAME), "{broken")
            .expect("corrupt");
        let reopened = TemplateLibrary::open(&dir.path().join("templates")).expect("reopen");
        assert!(reopened.is_empty());
        // The folder itself is still on disk.
        assert!(dir.path().join("templates/template_t1").is_dir());
    }

    // --- Promote ---

    #[test]
    fn promote_derives_id_and_class_tag() {
        let (_dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");

        let dest = library
            .promote(&source, None, TemplateMeta::default())
            .expect("promote");
        assert!(dest.ends_with("template_AAAAAAAAAAAAAAAAAAAAAA"));

        let entry = library.entry("AAAAAAAAAAAAAAAAAAAAAA").expect("entry");
        assert_eq!(entry.tags.ifc_class.as_deref(), Some("IfcWall"));
    }

    #[test]
    fn promote_keeps_supplied_class_tag() {
        let (_dir, store, mut library) = fixture();
        let source = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        library
            .promote(
                &source,
                Some(TemplateId::try_from("custom-id").expect("valid id")),
                TemplateMeta {
                    tags: Some(TemplateTags {
                        ifc_class: Some("IfcCurtainWall".to_owned()),
                        ..TemplateTags::default()
                    }),
                    ..TemplateMeta::default()
                },
            )
            .expect("promote");
        let entry = library.entry("custom-id").expect("entry");
        assert_eq!(entry.tags.ifc_class.as_deref(), Some("IfcCurtainWall"));
    }

    // --- Search ---

    fn seeded_library() -> (tempfile::TempDir, TemplateLibrary) {
        let (dir, store, mut library) = fixture();
        let a = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let b = sample_element(&store, "BBBBBBBBBBBBBBBBBBBBBB");

        library
            .add(
                &TemplateId::try_from("wall-us").expect("id"),
                &a,
                TemplateMeta {
                    tags: Some(tags(&["concrete"], &["US"], &["IBC2024"])),
                    description: "Fire-rated shaft wall".to_owned(),
                    ..TemplateMeta::default()
                },
            )
            .expect("add");
        library
            .add(
                &TemplateId::try_from("wall-ca").expect("id"),
                &b,
                TemplateMeta {
                    tags: Some(tags(&["timber"], &["CA"], &["Title-24"])),
                    description: "Energy-code timber wall".to_owned(),
                    ..TemplateMeta::default()
                },
            )
            .expect("add");
        (dir, library)
    }

    #[test]
    fn search_filters_by_region_and_material() {
        let (_dir, library) = seeded_library();
        let hits = library.search(&TemplateQuery {
            region: vec!["US".to_owned()],
            ..TemplateQuery::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].template_id, "wall-us");

        let hits = library.search(&TemplateQuery {
            material: vec!["TIMBER".to_owned()],
            ..TemplateQuery::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].template_id, "wall-ca");
    }

    #[test]
    fn search_keyword_spans_all_tags() {
        let (_dir, library) = seeded_library();
        let hits = library.search(&TemplateQuery {
            keyword: Some("title-24".to_owned()),
            ..TemplateQuery::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].template_id, "wall-ca");
    }

    #[test]
    fn search_tags_are_all_of() {
        let (_dir, library) = seeded_library();
        let hits = library.search(&TemplateQuery {
            tags: vec!["concrete".to_owned(), "US".to_owned()],
            ..TemplateQuery::default()
        });
        assert_eq!(hits.len(), 1);

        let misses = library.search(&TemplateQuery {
            tags: vec!["concrete".to_owned(), "CA".to_owned()],
            ..TemplateQuery::default()
        });
        assert!(misses.is_empty());
    }

    #[test]
    fn search_description_substring() {
        let (_dir, library) = seeded_library();
        let hits = library.search(&TemplateQuery {
            description: Some("shaft".to_owned()),
            ..TemplateQuery::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].template_id, "wall-us");
    }

    #[test]
    fn adding_templates_never_shrinks_matches() {
        let (_dir, store, mut library) = fixture();
        let a = sample_element(&store, "AAAAAAAAAAAAAAAAAAAAAA");
        let query = TemplateQuery {
            material: vec!["concrete".to_owned()],
            ..TemplateQuery::default()
        };

        library
            .add(
                &TemplateId::try_from("first").expect("id"),
                &a,
                TemplateMeta {
                    tags: Some(tags(&["concrete"], &[], &[])),
                    ..TemplateMeta::default()
                },
            )
            .expect("add");
        let before = library.search(&query).len();

        let b = sample_element(&store, "BBBBBBBBBBBBBBBBBBBBBB");
        library
            .add(
                &TemplateId::try_from("second").expect("id"),
                &b,
                TemplateMeta {
                    tags: Some(tags(&["steel"], &[], &[])),
                    ..TemplateMeta::default()
                },
            )
            .expect("add");
        let after = library.search(&query).len();
        assert!(after >= before);
    }
}
