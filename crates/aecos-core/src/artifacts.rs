/// Derived Markdown artifact regeneration for element and template folders.
///
/// [`regenerate`] reads `metadata.json`, `properties/psets.json`,
/// `materials/materials.json`, and `relationships/spatial.json` (plus the
/// template manifest when present) and rewrites the Markdown surface. The
/// renderers are pure functions of that content and of the optionally
/// supplied reports, so regenerating twice over unchanged sources yields
/// byte-identical files. `VALIDATION.md` and `SCHEDULE.md` are written only
/// when the matching report is supplied.
use std::fmt;
use std::path::{Path, PathBuf};

use crate::canonical;
use crate::collaborators::{CostReport, ValidationReport};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::MaterialLayer;
use crate::rules::ComplianceReport;
use crate::templates::TemplateManifest;

/// Reports that enrich the regenerated surface when available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSet<'a> {
    pub compliance: Option<&'a ComplianceReport>,
    pub validation: Option<&'a ValidationReport>,
    pub cost: Option<&'a CostReport>,
}

/// Errors produced by artifact regeneration.
#[derive(Debug)]
pub enum ArtifactError {
    /// The folder does not exist or is not a directory.
    FolderMissing { folder: PathBuf },
    /// A rendered file could not be written.
    Write {
        path: PathBuf,
        detail: String,
    },
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderMissing { folder } => {
                write!(f, "element folder not found: {}", folder.display())
            }
            Self::Write { path, detail } => {
                write!(f, "could not write {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for ArtifactError {}

/// View of the source files a renderer consumes. Unreadable leaves load as
/// defaults; regeneration never fails on corrupt content, only on missing
/// folders and write errors.
struct Sources {
    metadata: DynMap,
    psets: DynMap,
    materials: Vec<MaterialLayer>,
    spatial: DynMap,
    manifest: Option<TemplateManifest>,
}

impl Sources {
    fn load(folder: &Path) -> Self {
        let metadata = read_map(&folder.join("metadata.json"));
        let psets = read_map(&folder.join("properties/psets.json"));
        let materials: Vec<MaterialLayer> =
            canonical::read_json(&folder.join("materials/materials.json")).unwrap_or_default();
        let spatial = read_map(&folder.join("relationships/spatial.json"));
        let manifest_path = folder.join("template_manifest.json");
        let manifest = if manifest_path.is_file() {
            canonical::read_json(&manifest_path).ok()
        } else {
            None
        };
        Self {
            metadata,
            psets,
            materials,
            spatial,
            manifest,
        }
    }

    fn display_name(&self) -> String {
        self.metadata
            .get("Name")
            .and_then(DynValue::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| self.metadata.get("GlobalId").and_then(DynValue::as_str))
            .unwrap_or("Unknown")
            .to_owned()
    }

    fn ifc_class(&self) -> String {
        self.metadata
            .get("IFCClass")
            .and_then(DynValue::as_str)
            .unwrap_or("Unknown")
            .to_owned()
    }

    fn global_id(&self) -> String {
        self.metadata
            .get("GlobalId")
            .and_then(DynValue::as_str)
            .unwrap_or("")
            .to_owned()
    }

    fn is_template(&self) -> bool {
        self.manifest.is_some()
    }
}

fn read_map(path: &Path) -> DynMap {
    match canonical::read_json::<DynValue>(path) {
        Ok(DynValue::Object(map)) => map,
        Ok(DynValue::Null)
        | Ok(DynValue::Bool(_))
        | Ok(DynValue::Integer(_))
        | Ok(DynValue::Float(_))
        | Ok(DynValue::String(_))
        | Ok(DynValue::Array(_)) => {
            tracing::warn!(path = %path.display(), "expected a JSON object; using defaults");
            DynMap::new()
        }
        Err(e) => {
            if path.is_file() {
                tracing::warn!(path = %path.display(), error = %e, "unreadable leaf; using defaults");
            }
            DynMap::new()
        }
    }
}

/// Regenerates the Markdown surface of an element or template folder.
///
/// Returns the paths written. Missing or corrupt source leaves degrade to
/// defaults (with a structured warning); only a missing folder or a failed
/// write is an error.
pub fn regenerate(folder: &Path, reports: &ReportSet<'_>) -> Result<Vec<PathBuf>, ArtifactError> {
    if !folder.is_dir() {
        return Err(ArtifactError::FolderMissing {
            folder: folder.to_path_buf(),
        });
    }
    let sources = Sources::load(folder);

    let mut written = Vec::new();
    let mut write = |name: &str, content: String| -> Result<(), ArtifactError> {
        let path = folder.join(name);
        canonical::write_text_atomic(&path, &content).map_err(|e| ArtifactError::Write {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        written.push(path);
        Ok(())
    };

    write("README.md", render_readme(&sources))?;
    write("COMPLIANCE.md", render_compliance(&sources, reports.compliance))?;
    write("COST.md", render_cost(&sources, reports.cost))?;
    write("USAGE.md", render_usage(&sources))?;
    if let Some(report) = reports.validation {
        write("VALIDATION.md", ensure_trailing_newline(report.to_markdown()))?;
    }
    if let Some(report) = reports.cost {
        write("SCHEDULE.md", ensure_trailing_newline(report.to_schedule_markdown()))?;
    }

    Ok(written)
}

fn ensure_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

fn render_readme(sources: &Sources) -> String {
    let name = sources.display_name();
    let mut lines: Vec<String> = Vec::new();

    if sources.is_template() {
        lines.push(format!("# Template: {name}"));
    } else {
        lines.push(format!("# {name}"));
    }
    lines.push(String::new());

    lines.push("| Field | Value |".to_owned());
    lines.push("|---|---|".to_owned());
    lines.push(format!("| IFC Class | `{}` |", sources.ifc_class()));
    lines.push(format!("| GlobalId | `{}` |", sources.global_id()));
    if let Some(object_type) = sources
        .metadata
        .get("ObjectType")
        .and_then(DynValue::as_str)
        .filter(|s| !s.is_empty())
    {
        lines.push(format!("| Object Type | {object_type} |"));
    }
    if let Some(manifest) = &sources.manifest {
        lines.push(format!("| Version | {} |", manifest.version));
        if !manifest.author.is_empty() {
            lines.push(format!("| Author | {} |", manifest.author));
        }
    }
    lines.push(String::new());

    if let Some(manifest) = &sources.manifest {
        if !manifest.description.is_empty() {
            lines.push("## Description".to_owned());
            lines.push(String::new());
            lines.push(manifest.description.clone());
            lines.push(String::new());
        }
    }

    if !sources.psets.is_empty() {
        lines.push("## Properties".to_owned());
        lines.push(String::new());
        for (pset_name, props) in &sources.psets {
            lines.push(format!("**{pset_name}**"));
            lines.push(String::new());
            if let Some(props) = props.as_object() {
                for (prop_name, value) in props {
                    lines.push(format!("- {prop_name}: `{}`", value.display_bare()));
                }
            }
            lines.push(String::new());
        }
    }

    if !sources.materials.is_empty() {
        lines.push("## Materials".to_owned());
        lines.push(String::new());
        lines.push("| Material | Thickness | Category |".to_owned());
        lines.push("|---|---|---|".to_owned());
        for layer in &sources.materials {
            let thickness = layer
                .thickness
                .map(|t| format!("{t}"))
                .unwrap_or_else(|| "—".to_owned());
            lines.push(format!(
                "| {} | {thickness} | {} |",
                layer.name,
                layer.category.as_deref().unwrap_or("")
            ));
        }
        lines.push(String::new());
    }

    push_spatial_section(&mut lines, &sources.spatial, "## Spatial Location");

    if let Some(manifest) = &sources.manifest {
        let tags = manifest.tags.all_strings();
        if !tags.is_empty() {
            lines.push("## Tags".to_owned());
            lines.push(String::new());
            lines.push(
                tags.iter()
                    .map(|t| format!("`{t}`"))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            lines.push(String::new());
        }
    }

    finish(lines)
}

fn render_compliance(sources: &Sources, report: Option<&ComplianceReport>) -> String {
    if let Some(report) = report {
        return ensure_trailing_newline(report.to_markdown());
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# Compliance — {}", sources.display_name()));
    lines.push(String::new());
    lines.push(format!("**IFC Class:** `{}`", sources.ifc_class()));
    lines.push(String::new());

    if let Some(manifest) = &sources.manifest {
        if !manifest.tags.compliance_codes.is_empty() {
            lines.push("## Applicable Codes".to_owned());
            lines.push(String::new());
            for code in &manifest.tags.compliance_codes {
                lines.push(format!("- {code}"));
            }
            lines.push(String::new());
        }
    }

    lines.push("## Property Sets".to_owned());
    lines.push(String::new());
    if sources.psets.is_empty() {
        lines.push("No property sets recorded.".to_owned());
        lines.push(String::new());
    } else {
        for (pset_name, props) in &sources.psets {
            lines.push(format!("### {pset_name}"));
            lines.push(String::new());
            if let Some(props) = props.as_object() {
                for (prop_name, value) in props {
                    lines.push(format!("- {prop_name}: `{}`", value.display_bare()));
                }
            }
            lines.push(String::new());
        }
    }

    lines.push("## Status".to_owned());
    lines.push(String::new());
    lines.push("> No compliance check has been recorded for this folder.".to_owned());
    lines.push("> Run a compliance check to populate this report.".to_owned());
    lines.push(String::new());

    finish(lines)
}

fn render_cost(sources: &Sources, report: Option<&CostReport>) -> String {
    if let Some(report) = report {
        return ensure_trailing_newline(report.to_markdown());
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# Cost Data — {}", sources.display_name()));
    lines.push(String::new());
    lines.push(format!("**IFC Class:** `{}`", sources.ifc_class()));
    lines.push(String::new());

    if !sources.materials.is_empty() {
        lines.push("## Materials".to_owned());
        lines.push(String::new());
        lines.push("| Material | Thickness |".to_owned());
        lines.push("|---|---|".to_owned());
        for layer in &sources.materials {
            let thickness = layer
                .thickness
                .map(|t| format!("{t}"))
                .unwrap_or_else(|| "—".to_owned());
            lines.push(format!("| {} | {thickness} |", layer.name));
        }
        lines.push(String::new());
    }

    lines.push("## Total Installed Cost".to_owned());
    lines.push(String::new());
    lines.push("> No cost estimate has been recorded for this folder.".to_owned());
    lines.push(String::new());

    finish(lines)
}

fn render_usage(sources: &Sources) -> String {
    let name = sources.display_name();
    let global_id = sources.global_id();
    let mut lines: Vec<String> = Vec::new();

    if sources.is_template() {
        lines.push(format!("# Usage — Template: {name}"));
    } else {
        lines.push(format!("# Usage — {name}"));
    }
    lines.push(String::new());
    lines.push(format!("**IFC Class:** `{}`", sources.ifc_class()));
    lines.push(String::new());

    lines.push("## Insertion".to_owned());
    lines.push(String::new());
    if sources.is_template() {
        lines.push("Resolve this template through the library:".to_owned());
        lines.push(String::new());
        lines.push("```rust".to_owned());
        lines.push("let library = TemplateLibrary::open(\"path/to/templates\")?;".to_owned());
        lines.push(format!("let folder = library.get(\"{global_id}\");"));
        lines.push("```".to_owned());
    } else {
        lines.push("Promote this element to a reusable template:".to_owned());
        lines.push(String::new());
        lines.push("```rust".to_owned());
        lines.push("let library = TemplateLibrary::open(\"path/to/templates\")?;".to_owned());
        lines.push(format!(
            "library.promote(Path::new(\"elements/element_{global_id}\"), None)?;"
        ));
        lines.push("```".to_owned());
    }
    lines.push(String::new());

    push_spatial_section(&mut lines, &sources.spatial, "## Original Location");

    if let Some(manifest) = &sources.manifest {
        if !manifest.tags.region.is_empty() {
            lines.push("## Region".to_owned());
            lines.push(String::new());
            lines.push(manifest.tags.region.join(", "));
            lines.push(String::new());
        }
    }

    lines.push("## Notes".to_owned());
    lines.push(String::new());
    lines.push("- Validate compliance before inserting into production models".to_owned());
    lines.push("- Check spatial coordination and clash detection after placement".to_owned());
    lines.push(String::new());

    finish(lines)
}

fn push_spatial_section(lines: &mut Vec<String>, spatial: &DynMap, heading: &str) {
    let get = |key: &str| {
        spatial
            .get(key)
            .and_then(DynValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };
    let site = get("site_name");
    let building = get("building_name");
    let storey = get("storey_name");
    if site.is_none() && building.is_none() && storey.is_none() {
        return;
    }
    lines.push(heading.to_owned());
    lines.push(String::new());
    if let Some(site) = site {
        lines.push(format!("- Site: {site}"));
    }
    if let Some(building) = building {
        lines.push(format!("- Building: {building}"));
    }
    if let Some(storey) = storey {
        lines.push(format!("- Storey: {storey}"));
    }
    lines.push(String::new());
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::canonical::write_json_atomic;
    use crate::element::{Element, GeometryInfo, MaterialLayer, SpatialReference};
    use crate::newtypes::GlobalId;
    use std::collections::BTreeMap;

    fn write_element_folder(dir: &Path) -> PathBuf {
        let global_id = GlobalId::try_from("AAAAAAAAAAAAAAAAAAAAAA").expect("valid");
        let mut common = BTreeMap::new();
        common.insert("FireRating".to_owned(), DynValue::from("2H"));
        let mut psets = BTreeMap::new();
        psets.insert("Pset_WallCommon".to_owned(), common);

        let element = Element {
            global_id: global_id.clone(),
            ifc_class: "IfcWall".to_owned(),
            name: Some("Fire Wall".to_owned()),
            object_type: None,
            tag: None,
            geometry: GeometryInfo::default(),
            psets,
            materials: vec![MaterialLayer::new("Concrete", Some(200.0), "wall")],
            spatial: SpatialReference {
                storey_name: Some("Level 2".to_owned()),
                ..SpatialReference::default()
            },
        };
        let folder = dir.join(global_id.folder_name());
        write_json_atomic(&folder.join("metadata.json"), &element.metadata()).expect("metadata");
        write_json_atomic(&folder.join("properties/psets.json"), &element.psets).expect("psets");
        write_json_atomic(&folder.join("materials/materials.json"), &element.materials)
            .expect("materials");
        write_json_atomic(&folder.join("relationships/spatial.json"), &element.spatial)
            .expect("spatial");
        folder
    }

    #[test]
    fn regenerate_writes_the_four_core_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = write_element_folder(dir.path());
        let written = regenerate(&folder, &ReportSet::default()).expect("regenerate");
        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["README.md", "COMPLIANCE.md", "COST.md", "USAGE.md"]);
        assert!(!folder.join("VALIDATION.md").exists());
        assert!(!folder.join("SCHEDULE.md").exists());
    }

    #[test]
    fn regenerate_is_byte_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = write_element_folder(dir.path());
        regenerate(&folder, &ReportSet::default()).expect("first");
        let first: Vec<String> = ["README.md", "COMPLIANCE.md", "COST.md", "USAGE.md"]
            .iter()
            .map(|n| std::fs::read_to_string(folder.join(n)).expect("read"))
            .collect();
        regenerate(&folder, &ReportSet::default()).expect("second");
        let second: Vec<String> = ["README.md", "COMPLIANCE.md", "COST.md", "USAGE.md"]
            .iter()
            .map(|n| std::fs::read_to_string(folder.join(n)).expect("read"))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn readme_lists_properties_and_materials() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = write_element_folder(dir.path());
        regenerate(&folder, &ReportSet::default()).expect("regenerate");
        let readme = std::fs::read_to_string(folder.join("README.md")).expect("read");
        assert!(readme.starts_with("# Fire Wall\n"));
        assert!(readme.contains("| IFC Class | `IfcWall` |"));
        assert!(readme.contains("- FireRating: `2H`"));
        assert!(readme.contains("| Concrete | 200 | wall |"));
        assert!(readme.contains("- Storey: Level 2"));
    }

    #[test]
    fn reports_enrich_the_surface() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = write_element_folder(dir.path());
        let validation = ValidationReport {
            element_id: "AAAAAAAAAAAAAAAAAAAAAA".to_owned(),
            ifc_class: "IfcWall".to_owned(),
            checks: Vec::new(),
            passed: true,
        };
        let cost = CostReport {
            element_id: "AAAAAAAAAAAAAAAAAAAAAA".to_owned(),
            ifc_class: "IfcWall".to_owned(),
            currency: "USD".to_owned(),
            lines: Vec::new(),
            total: 1234.5,
            duration_days: 2.0,
        };
        let written = regenerate(
            &folder,
            &ReportSet {
                compliance: None,
                validation: Some(&validation),
                cost: Some(&cost),
            },
        )
        .expect("regenerate");
        assert_eq!(written.len(), 6);
        let cost_md = std::fs::read_to_string(folder.join("COST.md")).expect("read");
        assert!(cost_md.contains("1234.50"));
        let schedule = std::fs::read_to_string(folder.join("SCHEDULE.md")).expect("read");
        assert!(schedule.contains("2.0 crew-days"));
        assert!(folder.join("VALIDATION.md").is_file());
    }

    #[test]
    fn corrupt_leaf_degrades_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = write_element_folder(dir.path());
        std::fs::write(folder.join("properties/psets.json"), "{broken").expect("corrupt");
        let result = regenerate(&folder, &ReportSet::default());
        assert!(result.is_ok());
        let compliance = std::fs::read_to_string(folder.join("COMPLIANCE.md")).expect("read");
        assert!(compliance.contains("No property sets recorded."));
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = regenerate(&dir.path().join("absent"), &ReportSet::default());
        assert!(matches!(result, Err(ArtifactError::FolderMissing { .. })));
    }
}
