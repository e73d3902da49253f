/// The element store: folder-per-element persistence.
///
/// The canonical representation of an element *is* its folder; this module
/// owns the mapping. Every single-file write goes through the atomic
/// temp-then-rename path in [`crate::canonical`], so a torn write can leave a
/// partially-updated folder but never a partially-written file. Reads are
/// tolerant: a corrupt leaf degrades to defaults with a structured warning.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::{self, ReportSet};
use crate::canonical::{self, CanonicalError};
use crate::element::{
    Element, ElementMetadata, GeometryInfo, MaterialLayer, Psets, SpatialReference,
};
use crate::newtypes::{GlobalId, NewtypeError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the element store.
#[derive(Debug)]
pub enum StoreError {
    /// The addressed element does not exist.
    NotFound { global_id: String },
    /// An identifier was malformed.
    InvalidId(NewtypeError),
    /// `metadata.json` disagrees with the folder name.
    Integrity { folder: PathBuf, detail: String },
    /// An underlying filesystem write or read failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A required file could not be serialised or parsed.
    Encoding { path: PathBuf, detail: String },
    /// A caller-supplied deadline expired during a folder walk.
    Timeout,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { global_id } => write!(f, "element not found: {global_id}"),
            Self::InvalidId(e) => write!(f, "{e}"),
            Self::Integrity { folder, detail } => {
                write!(f, "integrity violation in {}: {detail}", folder.display())
            }
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
            Self::Encoding { path, detail } => {
                write!(f, "encoding error at {}: {detail}", path.display())
            }
            Self::Timeout => f.write_str("deadline expired during element walk"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidId(e) => Some(e),
            Self::NotFound { .. }
            | Self::Integrity { .. }
            | Self::Encoding { .. }
            | Self::Timeout => None,
        }
    }
}

impl From<NewtypeError> for StoreError {
    fn from(e: NewtypeError) -> Self {
        Self::InvalidId(e)
    }
}

fn canonical_to_store(e: CanonicalError) -> StoreError {
    match e {
        CanonicalError::Io { path, source } => StoreError::Io { path, source },
        CanonicalError::Parse { path, detail } => StoreError::Encoding { path, detail },
        CanonicalError::Serialize { detail } => StoreError::Encoding {
            path: PathBuf::new(),
            detail,
        },
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Inputs for [`ElementStore::create`].
#[derive(Debug, Clone, Default)]
pub struct NewElement {
    pub ifc_class: String,
    pub name: Option<String>,
    pub properties: Psets,
    pub materials: Vec<MaterialLayer>,
    pub geometry: GeometryInfo,
    pub spatial: SpatialReference,
    /// Explicit GlobalId; minted when absent.
    pub global_id: Option<GlobalId>,
}

/// A typed update for [`ElementStore::update`].
///
/// `name` replaces, `properties` deep-merges by pset name (new psets are
/// added, existing psets update keys in place), `materials` replaces the
/// whole list.
#[derive(Debug, Clone, Default)]
pub struct ElementUpdate {
    pub name: Option<String>,
    pub properties: Option<Psets>,
    pub materials: Option<Vec<MaterialLayer>>,
}

impl ElementUpdate {
    /// Returns `true` when the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.properties.is_none() && self.materials.is_none()
    }
}

/// Optional AND-combined filters for [`ElementStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    /// Exact, case-insensitive IFC class match.
    pub ifc_class: Option<String>,
    /// Case-insensitive substring match on the element name.
    pub name: Option<String>,
    /// Case-insensitive substring match against any material layer name.
    pub material: Option<String>,
}

impl ElementFilter {
    fn matches(&self, element: &Element) -> bool {
        if let Some(class) = &self.ifc_class {
            if !element.ifc_class.eq_ignore_ascii_case(class) {
                return false;
            }
        }
        if let Some(needle) = &self.name {
            let needle = needle.to_ascii_lowercase();
            let hit = element
                .name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(needle) = &self.material {
            let needle = needle.to_ascii_lowercase();
            let hit = element
                .materials
                .iter()
                .any(|m| m.name.to_ascii_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// ElementStore
// ---------------------------------------------------------------------------

/// Folder-per-element persistence rooted at one elements directory.
#[derive(Debug, Clone)]
pub struct ElementStore {
    elements_dir: PathBuf,
}

impl ElementStore {
    /// Opens the store, creating the elements directory if needed.
    pub fn open(elements_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(elements_dir).map_err(|source| StoreError::Io {
            path: elements_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            elements_dir: elements_dir.to_path_buf(),
        })
    }

    /// The directory the store writes element folders under.
    pub fn elements_dir(&self) -> &Path {
        &self.elements_dir
    }

    /// The folder path for an element id (whether or not it exists).
    pub fn folder(&self, global_id: &GlobalId) -> PathBuf {
        self.elements_dir.join(global_id.folder_name())
    }

    /// Whether a folder for `global_id` exists.
    pub fn exists(&self, global_id: &GlobalId) -> bool {
        self.folder(global_id).is_dir()
    }

    // -- Create -------------------------------------------------------------

    /// Creates a new element folder and regenerates its Markdown surface.
    ///
    /// A fresh GlobalId is minted when none is supplied; the default name
    /// is `<IfcClass>_<first 8 id chars>`.
    pub fn create(&self, new: NewElement) -> Result<Element, StoreError> {
        let global_id = new.global_id.unwrap_or_else(GlobalId::mint);
        let name = new.name.unwrap_or_else(|| {
            format!("{}_{}", new.ifc_class, &global_id.as_str()[..8])
        });

        let element = Element {
            global_id,
            ifc_class: new.ifc_class,
            name: Some(name),
            object_type: None,
            tag: None,
            geometry: new.geometry,
            psets: new.properties,
            materials: new.materials,
            spatial: new.spatial,
        };
        self.write_element(&element)?;
        tracing::info!(
            global_id = %element.global_id,
            ifc_class = %element.ifc_class,
            "created element"
        );
        Ok(element)
    }

    /// Writes every canonical file of `element` and regenerates artifacts.
    ///
    /// Regeneration failures log and continue; the element is durable
    /// without its Markdown surface.
    pub fn write_element(&self, element: &Element) -> Result<PathBuf, StoreError> {
        let folder = self.folder(&element.global_id);
        std::fs::create_dir_all(&folder).map_err(|source| StoreError::Io {
            path: folder.clone(),
            source,
        })?;

        canonical::write_json_atomic(&folder.join("metadata.json"), &element.metadata())
            .map_err(canonical_to_store)?;
        canonical::write_json_atomic(&folder.join("properties/psets.json"), &element.psets)
            .map_err(canonical_to_store)?;
        canonical::write_json_atomic(&folder.join("materials/materials.json"), &element.materials)
            .map_err(canonical_to_store)?;
        canonical::write_json_atomic(&folder.join("geometry/shape.json"), &element.geometry)
            .map_err(canonical_to_store)?;
        canonical::write_json_atomic(&folder.join("relationships/spatial.json"), &element.spatial)
            .map_err(canonical_to_store)?;

        if let Err(e) = artifacts::regenerate(&folder, &ReportSet::default()) {
            tracing::warn!(
                global_id = %element.global_id,
                error = %e,
                "artifact regeneration failed; element is durable without it"
            );
        }
        Ok(folder)
    }

    // -- Read ---------------------------------------------------------------

    /// Loads an element by id.
    ///
    /// Returns `Ok(None)` when the folder or its `metadata.json` is absent.
    /// Corrupt non-metadata leaves degrade to defaults with a warning. A
    /// metadata `GlobalId` that disagrees with the folder name is an
    /// integrity error.
    pub fn get(&self, global_id: &GlobalId) -> Result<Option<Element>, StoreError> {
        let folder = self.folder(global_id);
        if !folder.is_dir() {
            return Ok(None);
        }
        let meta_path = folder.join("metadata.json");
        if !meta_path.is_file() {
            return Ok(None);
        }

        let metadata: ElementMetadata = match canonical::read_json(&meta_path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(
                    path = %meta_path.display(),
                    error = %e,
                    "corrupt metadata.json; loading element with defaults"
                );
                ElementMetadata {
                    global_id: global_id.clone(),
                    name: None,
                    ifc_class: String::new(),
                    object_type: None,
                    tag: None,
                    psets: Default::default(),
                }
            }
        };
        if &metadata.global_id != global_id {
            return Err(StoreError::Integrity {
                folder,
                detail: format!(
                    "metadata GlobalId {} does not match folder id {global_id}",
                    metadata.global_id
                ),
            });
        }

        let psets: Psets = read_leaf(&folder.join("properties/psets.json"));
        let materials: Vec<MaterialLayer> = read_leaf(&folder.join("materials/materials.json"));
        let geometry: GeometryInfo = read_leaf(&folder.join("geometry/shape.json"));
        let spatial: SpatialReference = read_leaf(&folder.join("relationships/spatial.json"));

        Ok(Some(Element {
            global_id: metadata.global_id,
            ifc_class: metadata.ifc_class,
            name: metadata.name,
            object_type: metadata.object_type,
            tag: metadata.tag,
            geometry,
            psets,
            materials,
            spatial,
        }))
    }

    // -- Update -------------------------------------------------------------

    /// Applies a typed diff to an existing element and regenerates its
    /// Markdown surface.
    pub fn update(
        &self,
        global_id: &GlobalId,
        update: &ElementUpdate,
    ) -> Result<Element, StoreError> {
        let mut element = self.get(global_id)?.ok_or_else(|| StoreError::NotFound {
            global_id: global_id.to_string(),
        })?;

        if let Some(name) = &update.name {
            element.name = Some(name.clone());
        }
        if let Some(properties) = &update.properties {
            for (pset_name, props) in properties {
                let target = element.psets.entry(pset_name.clone()).or_default();
                for (key, value) in props {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(materials) = &update.materials {
            element.materials = materials.clone();
        }

        self.write_element(&element)?;
        tracing::info!(global_id = %global_id, "updated element");
        Ok(element)
    }

    // -- Delete -------------------------------------------------------------

    /// Recursively removes the element folder; `false` if it was absent.
    pub fn delete(&self, global_id: &GlobalId) -> Result<bool, StoreError> {
        let folder = self.folder(global_id);
        if !folder.is_dir() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&folder).map_err(|source| StoreError::Io {
            path: folder,
            source,
        })?;
        tracing::info!(global_id = %global_id, "deleted element");
        Ok(true)
    }

    // -- List ---------------------------------------------------------------

    /// Lists elements in lexicographic folder-name order, applying the
    /// filters. An optional `deadline` is polled between folders.
    pub fn list(
        &self,
        filter: &ElementFilter,
        deadline: Option<Instant>,
    ) -> Result<Vec<Element>, StoreError> {
        let mut folders: Vec<(String, GlobalId)> = Vec::new();
        let entries = match std::fs::read_dir(&self.elements_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(raw_id) = file_name.strip_prefix("element_") else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(global_id) = GlobalId::try_from(raw_id) else {
                tracing::warn!(folder = %file_name, "skipping folder with malformed id");
                continue;
            };
            folders.push((file_name, global_id));
        }
        folders.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        for (_, global_id) in folders {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(StoreError::Timeout);
                }
            }
            let Some(element) = self.get(&global_id)? else {
                continue;
            };
            if filter.matches(&element) {
                out.push(element);
            }
        }
        Ok(out)
    }
}

/// Tolerant leaf read: default + structured warning instead of failure.
fn read_leaf<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    if !path.is_file() {
        return T::default();
    }
    match canonical::read_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable leaf; using defaults");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::dynvalue::{DynMap, DynValue};
    use std::collections::BTreeMap;

    fn store(dir: &Path) -> ElementStore {
        ElementStore::open(&dir.join("elements")).expect("open store")
    }

    fn wall_psets(thickness: f64) -> Psets {
        let mut dims = DynMap::new();
        dims.insert("thickness_mm".to_owned(), DynValue::Float(thickness));
        let mut common = DynMap::new();
        common.insert("FireRating".to_owned(), DynValue::from("2H"));
        let mut psets = BTreeMap::new();
        psets.insert("Dimensions".to_owned(), dims);
        psets.insert("Pset_WallCommon".to_owned(), common);
        psets
    }

    fn new_wall() -> NewElement {
        NewElement {
            ifc_class: "IfcWall".to_owned(),
            name: Some("Wall-01".to_owned()),
            properties: wall_psets(200.0),
            materials: vec![MaterialLayer::new("Concrete", Some(200.0), "wall")],
            ..NewElement::default()
        }
    }

    // --- Create ---

    #[test]
    fn create_writes_the_canonical_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let element = store.create(new_wall()).expect("create");

        let folder = store.folder(&element.global_id);
        for rel in [
            "metadata.json",
            "properties/psets.json",
            "materials/materials.json",
            "geometry/shape.json",
            "relationships/spatial.json",
            "README.md",
            "COMPLIANCE.md",
            "COST.md",
            "USAGE.md",
        ] {
            assert!(folder.join(rel).is_file(), "missing {rel}");
        }
    }

    #[test]
    fn create_mints_valid_ids_and_default_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let element = store
            .create(NewElement {
                ifc_class: "IfcDoor".to_owned(),
                ..NewElement::default()
            })
            .expect("create");
        assert_eq!(element.global_id.as_str().len(), 22);
        let name = element.name.as_deref().expect("name");
        assert!(name.starts_with("IfcDoor_"));
    }

    #[test]
    fn create_honours_explicit_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let id = GlobalId::try_from("AAAAAAAAAAAAAAAAAAAAAA").expect("valid");
        let element = store
            .create(NewElement {
                ifc_class: "IfcWall".to_owned(),
                global_id: Some(id.clone()),
                ..NewElement::default()
            })
            .expect("create");
        assert_eq!(element.global_id, id);
        assert!(store.exists(&id));
    }

    // --- Round trip ---

    #[test]
    fn get_round_trips_the_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");
        let loaded = store.get(&created.global_id).expect("get").expect("present");
        assert_eq!(loaded, created);
    }

    #[test]
    fn get_absent_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let id = GlobalId::try_from("AAAAAAAAAAAAAAAAAAAAAA").expect("valid");
        assert!(store.get(&id).expect("get").is_none());
    }

    #[test]
    fn corrupt_leaf_degrades_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");
        let folder = store.folder(&created.global_id);
        std::fs::write(folder.join("materials/materials.json"), "{broken").expect("corrupt");

        let loaded = store.get(&created.global_id).expect("get").expect("present");
        assert!(loaded.materials.is_empty());
        assert_eq!(loaded.psets, created.psets);
    }

    #[test]
    fn mismatched_metadata_id_is_integrity_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");
        let folder = store.folder(&created.global_id);
        let text = std::fs::read_to_string(folder.join("metadata.json")).expect("read");
        let swapped = text.replace(created.global_id.as_str(), "BBBBBBBBBBBBBBBBBBBBBB");
        std::fs::write(folder.join("metadata.json"), swapped).expect("write");

        let result = store.get(&created.global_id);
        assert!(matches!(result, Err(StoreError::Integrity { .. })));
    }

    // --- Update ---

    #[test]
    fn update_replaces_name_and_merges_psets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");

        let mut new_dims = DynMap::new();
        new_dims.insert("height_mm".to_owned(), DynValue::Float(3000.0));
        let mut acoustics = DynMap::new();
        acoustics.insert("stc".to_owned(), DynValue::Integer(50));
        let mut properties = Psets::new();
        properties.insert("Dimensions".to_owned(), new_dims);
        properties.insert("Acoustics".to_owned(), acoustics);

        let updated = store
            .update(
                &created.global_id,
                &ElementUpdate {
                    name: Some("Wall-renamed".to_owned()),
                    properties: Some(properties),
                    materials: None,
                },
            )
            .expect("update");

        assert_eq!(updated.name.as_deref(), Some("Wall-renamed"));
        // Existing pset keys survive the merge; new keys land beside them.
        let dims = updated.psets.get("Dimensions").expect("dims");
        assert_eq!(dims.get("thickness_mm").and_then(DynValue::as_f64), Some(200.0));
        assert_eq!(dims.get("height_mm").and_then(DynValue::as_f64), Some(3000.0));
        assert!(updated.psets.contains_key("Acoustics"));
        // Materials untouched.
        assert_eq!(updated.materials, created.materials);
    }

    #[test]
    fn update_replaces_materials_wholesale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");

        let updated = store
            .update(
                &created.global_id,
                &ElementUpdate {
                    materials: Some(vec![
                        MaterialLayer::new("Steel", None, "wall"),
                        MaterialLayer::new("Gypsum", Some(15.0), "wall"),
                    ]),
                    ..ElementUpdate::default()
                },
            )
            .expect("update");
        assert_eq!(updated.materials.len(), 2);
        assert_eq!(updated.materials[0].name, "Steel");
    }

    #[test]
    fn update_missing_element_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let id = GlobalId::try_from("AAAAAAAAAAAAAAAAAAAAAA").expect("valid");
        let result = store.update(&id, &ElementUpdate::default());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    // --- Delete ---

    #[test]
    fn delete_reports_prior_existence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let created = store.create(new_wall()).expect("create");
        assert!(store.delete(&created.global_id).expect("delete"));
        assert!(!store.delete(&created.global_id).expect("second delete"));
        assert!(store.get(&created.global_id).expect("get").is_none());
    }

    // --- List ---

    #[test]
    fn list_is_lexicographic_and_filtered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store
            .create(NewElement {
                ifc_class: "IfcWall".to_owned(),
                name: Some("North wall".to_owned()),
                materials: vec![MaterialLayer::new("Concrete", None, "wall")],
                global_id: Some(GlobalId::try_from("BBBBBBBBBBBBBBBBBBBBBB").expect("valid")),
                ..NewElement::default()
            })
            .expect("create");
        store
            .create(NewElement {
                ifc_class: "IfcDoor".to_owned(),
                name: Some("Entry door".to_owned()),
                materials: vec![MaterialLayer::new("Wood", None, "door")],
                global_id: Some(GlobalId::try_from("AAAAAAAAAAAAAAAAAAAAAA").expect("valid")),
                ..NewElement::default()
            })
            .expect("create");

        let all = store.list(&ElementFilter::default(), None).expect("list");
        let ids: Vec<&str> = all.iter().map(|e| e.global_id.as_str()).collect();
        assert_eq!(ids, vec!["AAAAAAAAAAAAAAAAAAAAAA", "BBBBBBBBBBBBBBBBBBBBBB"]);

        let walls = store
            .list(
                &ElementFilter {
                    ifc_class: Some("ifcwall".to_owned()),
                    ..ElementFilter::default()
                },
                None,
            )
            .expect("list");
        assert_eq!(walls.len(), 1);
        assert_eq!(walls[0].name.as_deref(), Some("North wall"));

        let concrete = store
            .list(
                &ElementFilter {
                    material: Some("CONC".to_owned()),
                    ..ElementFilter::default()
                },
                None,
            )
            .expect("list");
        assert_eq!(concrete.len(), 1);

        let named = store
            .list(
                &ElementFilter {
                    name: Some("door".to_owned()),
                    ..ElementFilter::default()
                },
                None,
            )
            .expect("list");
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn list_expired_deadline_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.create(new_wall()).expect("create");
        let expired = Instant::now() - std::time::Duration::from_secs(1);
        let result = store.list(&ElementFilter::default(), Some(expired));
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[test]
    fn list_ignores_foreign_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        std::fs::create_dir_all(dir.path().join("elements/not_an_element")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("elements/element_bad id")).expect("mkdir");
        let all = store.list(&ElementFilter::default(), None).expect("list");
        assert!(all.is_empty());
    }

    // --- Rewrite idempotence ---

    #[test]
    fn rewriting_an_unchanged_element_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let element = store.create(new_wall()).expect("create");
        let folder = store.folder(&element.global_id);
        let digest_before = crate::hasher::hash_folder(&folder).expect("hash");
        store.write_element(&element).expect("rewrite");
        let digest_after = crate::hasher::hash_folder(&folder).expect("hash");
        assert_eq!(digest_before, digest_after);
    }
}
