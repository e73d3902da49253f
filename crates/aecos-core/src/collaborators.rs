/// Validator and cost-estimator seams with built-in defaults.
///
/// The pipeline only assumes the traits; the concrete impls here are the
/// defaults the facade wires in when no external collaborator is supplied.
/// Both built-ins read only the canonical JSON files of an element folder
/// and are deterministic given that content.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::element::{ElementMetadata, GeometryInfo, MaterialLayer};

/// Errors produced by validators and cost estimators.
#[derive(Debug)]
pub enum CollaboratorError {
    /// The collaborator could not run at all (missing binary, missing
    /// provider, unreadable folder).
    Unavailable { what: &'static str, detail: String },
    /// The collaborator ran and failed.
    Failed { what: &'static str, detail: String },
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { what, detail } => write!(f, "{what} unavailable: {detail}"),
            Self::Failed { what, detail } => write!(f, "{what} failed: {detail}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// One named validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Result of validating one element folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub element_id: String,
    pub ifc_class: String,
    pub checks: Vec<ValidationCheck>,
    pub passed: bool,
}

impl ValidationReport {
    /// Renders the report as the `VALIDATION.md` document.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# Validation — {}", self.element_id));
        lines.push(String::new());
        lines.push(format!("**IFC Class:** `{}`", self.ifc_class));
        lines.push(format!(
            "**Status:** {}",
            if self.passed { "PASSED" } else { "FAILED" }
        ));
        lines.push(String::new());
        lines.push("## Checks".to_owned());
        lines.push(String::new());
        lines.push("| Check | Result | Detail |".to_owned());
        lines.push("|---|---|---|".to_owned());
        for check in &self.checks {
            lines.push(format!(
                "| {} | {} | {} |",
                check.name,
                if check.passed { "PASS" } else { "FAIL" },
                check.detail.replace('|', "\\|")
            ));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Validates a durable element folder.
pub trait Validator {
    /// Validates `folder`, optionally against `context` element folders
    /// (used for bounding-box clash checks).
    fn validate(
        &self,
        folder: &Path,
        context: &[PathBuf],
    ) -> Result<ValidationReport, CollaboratorError>;
}

/// The built-in validator: folder integrity plus axis-aligned geometry
/// sanity. Clash detection is bounding-box overlap only.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryValidator;

impl Validator for GeometryValidator {
    fn validate(
        &self,
        folder: &Path,
        context: &[PathBuf],
    ) -> Result<ValidationReport, CollaboratorError> {
        let metadata: ElementMetadata =
            canonical::read_json(&folder.join("metadata.json")).map_err(|e| {
                CollaboratorError::Unavailable {
                    what: "validator",
                    detail: e.to_string(),
                }
            })?;

        let mut checks = Vec::new();

        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected = metadata.global_id.folder_name();
        let template_name = format!("template_{}", metadata.global_id.as_str());
        let name_matches = folder_name == expected || folder_name == template_name;
        checks.push(ValidationCheck {
            name: "folder-name".to_owned(),
            passed: name_matches,
            detail: if name_matches {
                format!("folder {folder_name} matches GlobalId")
            } else {
                format!("folder {folder_name} does not match GlobalId {}", metadata.global_id)
            },
        });

        let geometry: GeometryInfo = canonical::read_json(&folder.join("geometry/shape.json"))
            .unwrap_or_default();
        let bbox = geometry.bounding_box;
        checks.push(ValidationCheck {
            name: "bounding-box".to_owned(),
            passed: bbox.is_well_formed(),
            detail: if bbox.is_well_formed() {
                "axis-aligned extents are ordered".to_owned()
            } else {
                "min extent exceeds max extent".to_owned()
            },
        });

        let volume_ok = geometry.volume.is_none_or(|v| v >= 0.0);
        checks.push(ValidationCheck {
            name: "volume".to_owned(),
            passed: volume_ok,
            detail: if volume_ok {
                "volume is non-negative".to_owned()
            } else {
                "volume is negative".to_owned()
            },
        });

        for other in context {
            let other_geometry: GeometryInfo =
                match canonical::read_json(&other.join("geometry/shape.json")) {
                    Ok(g) => g,
                    Err(_) => continue,
                };
            let other_name = other
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let clash = bbox.overlaps(&other_geometry.bounding_box);
            checks.push(ValidationCheck {
                name: format!("clash:{other_name}"),
                passed: !clash,
                detail: if clash {
                    "bounding boxes overlap".to_owned()
                } else {
                    "no bounding-box overlap".to_owned()
                },
            });
        }

        let passed = checks.iter().all(|c| c.passed);
        Ok(ValidationReport {
            element_id: metadata.global_id.to_string(),
            ifc_class: metadata.ifc_class,
            checks,
            passed,
        })
    }
}

// ---------------------------------------------------------------------------
// Cost estimation
// ---------------------------------------------------------------------------

/// One line of a cost estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    pub item: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_rate: f64,
    pub total: f64,
}

/// Cost and schedule estimate for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub element_id: String,
    pub ifc_class: String,
    pub currency: String,
    pub lines: Vec<CostLine>,
    pub total: f64,
    pub duration_days: f64,
}

impl CostReport {
    /// Renders the report as the `COST.md` document.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# Cost Data — {}", self.element_id));
        lines.push(String::new());
        lines.push(format!("**IFC Class:** `{}`", self.ifc_class));
        lines.push(format!("**Currency:** {}", self.currency));
        lines.push(String::new());
        lines.push("## Lines".to_owned());
        lines.push(String::new());
        lines.push("| Item | Quantity | Unit | Rate | Total |".to_owned());
        lines.push("|---|---|---|---|---|".to_owned());
        for line in &self.lines {
            lines.push(format!(
                "| {} | {:.3} | {} | {:.2} | {:.2} |",
                line.item, line.quantity, line.unit, line.unit_rate, line.total
            ));
        }
        lines.push(String::new());
        lines.push(format!("**Total installed cost:** {:.2} {}", self.total, self.currency));
        lines.push(String::new());
        lines.join("\n")
    }

    /// Renders the schedule view as the `SCHEDULE.md` document.
    pub fn to_schedule_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# Schedule — {}", self.element_id));
        lines.push(String::new());
        lines.push(format!("**IFC Class:** `{}`", self.ifc_class));
        lines.push(String::new());
        lines.push("## Duration".to_owned());
        lines.push(String::new());
        lines.push(format!("Estimated installation: {:.1} crew-days", self.duration_days));
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Estimates cost and schedule for a durable element folder.
pub trait CostEstimator {
    fn estimate(
        &self,
        folder: &Path,
        region: Option<&str>,
    ) -> Result<CostReport, CollaboratorError>;
}

/// The built-in estimator: material unit rates times volume share, plus a
/// flat labour multiplier and a volume-driven duration model.
///
/// Pricing is owned by the caller (normally the facade's domain registry);
/// nothing here reads process-wide state.
#[derive(Debug, Clone)]
pub struct UnitRateEstimator {
    /// Lowercased material keyword → rate per cubic metre.
    pricing: BTreeMap<String, f64>,
    /// Region code → cost multiplier.
    regional_factors: BTreeMap<String, f64>,
}

/// Fallback rate for materials with no pricing entry.
const DEFAULT_RATE_PER_M3: f64 = 400.0;
/// Labour as a fraction of material cost.
const LABOUR_FRACTION: f64 = 0.45;
/// Crew-days per cubic metre of installed volume.
const DAYS_PER_M3: f64 = 0.12;

impl UnitRateEstimator {
    /// Builds an estimator over the given pricing table (material keyword →
    /// rate per m³) and regional multipliers.
    pub fn new(pricing: BTreeMap<String, f64>, regional_factors: BTreeMap<String, f64>) -> Self {
        Self {
            pricing: pricing
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            regional_factors,
        }
    }

    fn rate_for(&self, material: &str) -> f64 {
        let needle = material.to_ascii_lowercase();
        for (keyword, rate) in &self.pricing {
            if needle.contains(keyword.as_str()) {
                return *rate;
            }
        }
        DEFAULT_RATE_PER_M3
    }

    fn regional_factor(&self, region: Option<&str>) -> f64 {
        region
            .and_then(|r| self.regional_factors.get(r))
            .copied()
            .unwrap_or(1.0)
    }
}

impl CostEstimator for UnitRateEstimator {
    fn estimate(
        &self,
        folder: &Path,
        region: Option<&str>,
    ) -> Result<CostReport, CollaboratorError> {
        let metadata: ElementMetadata =
            canonical::read_json(&folder.join("metadata.json")).map_err(|e| {
                CollaboratorError::Unavailable {
                    what: "cost estimator",
                    detail: e.to_string(),
                }
            })?;
        let geometry: GeometryInfo =
            canonical::read_json(&folder.join("geometry/shape.json")).unwrap_or_default();
        let materials: Vec<MaterialLayer> =
            canonical::read_json(&folder.join("materials/materials.json")).unwrap_or_default();

        let volume = geometry.volume.unwrap_or(0.0).max(0.0);
        let factor = self.regional_factor(region);

        let mut lines = Vec::new();
        let mut material_total = 0.0;
        let shares = volume_shares(&materials);
        for (layer, share) in materials.iter().zip(shares) {
            let quantity = volume * share;
            let unit_rate = self.rate_for(&layer.name) * factor;
            let total = quantity * unit_rate;
            material_total += total;
            lines.push(CostLine {
                item: layer.name.clone(),
                quantity,
                unit: "m3".to_owned(),
                unit_rate,
                total,
            });
        }

        let labour = material_total * LABOUR_FRACTION;
        if !materials.is_empty() {
            lines.push(CostLine {
                item: "Labour".to_owned(),
                quantity: 1.0,
                unit: "lot".to_owned(),
                unit_rate: labour,
                total: labour,
            });
        }

        Ok(CostReport {
            element_id: metadata.global_id.to_string(),
            ifc_class: metadata.ifc_class,
            currency: "USD".to_owned(),
            lines,
            total: material_total + labour,
            duration_days: (volume * DAYS_PER_M3).max(0.5),
        })
    }
}

/// Splits unit volume across layers: declared fractions first, thickness
/// shares second, equal split otherwise.
fn volume_shares(materials: &[MaterialLayer]) -> Vec<f64> {
    if materials.is_empty() {
        return Vec::new();
    }
    let fraction_sum: f64 = materials.iter().filter_map(|m| m.fraction).sum();
    if fraction_sum > 0.0 {
        return materials
            .iter()
            .map(|m| m.fraction.unwrap_or(0.0) / fraction_sum)
            .collect();
    }
    let thickness_sum: f64 = materials.iter().filter_map(|m| m.thickness).sum();
    if thickness_sum > 0.0 {
        return materials
            .iter()
            .map(|m| m.thickness.unwrap_or(0.0) / thickness_sum)
            .collect();
    }
    let equal = 1.0 / materials.len() as f64;
    vec![equal; materials.len()]
}
