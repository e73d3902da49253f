/// The generate pipeline: Parse → Comply → Build → Persist → Validate →
/// Cost → Regenerate → Commit → Audit.
///
/// Failure semantics follow the stage order. The in-memory stages (parse,
/// comply, build) degrade with warnings and continue on defaults. The
/// persist stage is the only fatal one: without a durable folder there is
/// nothing to commit or audit. Everything after persist is best-effort — the
/// element stands even when validation, costing, regeneration, the commit,
/// or the audit append fail; those failures ride the warning channel.
use std::fmt;
use std::path::PathBuf;

use crate::artifacts::{self, ReportSet};
use crate::audit::AuditChain;
use crate::collaborators::{CostEstimator, CostReport, ValidationReport, Validator};
use crate::compliance::ComplianceEngine;
use crate::domain::DomainRegistry;
use crate::dynvalue::{DynMap, DynValue};
use crate::element::Element;
use crate::enums::{CheckType, RuleStatus, Verdict};
use crate::hasher;
use crate::outcome::{Mutation, Warning};
use crate::parametric::{Parser, ParametricSpec, StubParser};
use crate::rules::{ComplianceReport, Rule};
use crate::store::{ElementStore, NewElement, StoreError};
use crate::version::VersionLog;

/// Performance slots the auto-adjust step may write.
const PERFORMANCE_SLOTS: [&str; 4] = [
    "fire_rating",
    "acoustic_stc",
    "thermal_r_value",
    "thermal_u_value",
];

/// Everything the pipeline borrows from the facade.
pub struct PipelineContext<'a> {
    pub parser: &'a dyn Parser,
    pub compliance: &'a ComplianceEngine,
    pub registry: &'a DomainRegistry,
    pub store: &'a ElementStore,
    pub validator: &'a dyn Validator,
    pub estimator: &'a dyn CostEstimator,
    /// `None` disables the commit stage (auto-commit off).
    pub version: Option<&'a VersionLog>,
    pub audit: &'a AuditChain,
    pub user: &'a str,
}

/// Pipeline input: raw text for the parser, or a ready spec.
#[derive(Debug, Clone)]
pub enum GenerateInput {
    Text(String),
    Spec(ParametricSpec),
}

/// The durable result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub element: Element,
    pub folder: PathBuf,
    /// The post-adjustment compliance report.
    pub compliance: ComplianceReport,
    pub validation: Option<ValidationReport>,
    pub cost: Option<CostReport>,
}

/// The pipeline's only fatal failure: the persist stage.
#[derive(Debug)]
pub enum PipelineError {
    Persist(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persist(e) => write!(f, "element persistence failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persist(e) => Some(e),
        }
    }
}

/// Runs the full pipeline.
///
/// On success the returned [`Mutation`] carries the outcome, the commit
/// token (when the commit stage ran and produced one), the audit entry id,
/// and any stage warnings.
pub fn run(
    ctx: &PipelineContext<'_>,
    input: GenerateInput,
    parse_context: Option<&DynMap>,
    region: Option<&str>,
) -> Result<Mutation<GenerateOutcome>, PipelineError> {
    let mut warnings: Vec<Warning> = Vec::new();

    // Stage 1 — Parse. A failed parse falls back to the stub spec.
    let mut spec = match input {
        GenerateInput::Spec(spec) => spec,
        GenerateInput::Text(text) => match ctx.parser.parse(&text, parse_context) {
            Ok(spec) => spec,
            Err(e) => {
                warnings.push(Warning::degraded(format!(
                    "parse failed ({e}); continuing with stub spec"
                )));
                StubParser::stub_spec(&text)
            }
        },
    };

    // Stage 2 — Comply, with mechanical auto-adjustment of min_value
    // failures on known dimension and performance slots.
    let mut compliance_report = check_spec(ctx, &spec, region, &mut warnings);
    if compliance_report.status == Verdict::NonCompliant {
        let rules = ctx
            .compliance
            .applicable_rules(&spec.ifc_class, region)
            .unwrap_or_default();
        let adjusted = auto_adjust(&mut spec, &rules, &compliance_report);
        if !adjusted.is_empty() {
            warnings.push(Warning::auto_adjusted(format!(
                "adjusted {} to satisfy minimum-value rules",
                adjusted.join(", ")
            )));
            compliance_report = check_spec(ctx, &spec, region, &mut warnings);
        }
    }
    for result in &compliance_report.results {
        if result.status == RuleStatus::Fail {
            warnings.push(Warning::degraded(format!(
                "unresolved compliance failure: {} §{} — {}",
                result.code_name, result.section, result.message
            )));
        }
    }

    // Stage 3 — Build. Builders are pure; unknown classes use the generic
    // fallback.
    let builder = ctx.registry.builder_for(&spec.ifc_class);
    let ifc_class = if spec.ifc_class.is_empty() {
        builder.ifc_class().to_owned()
    } else {
        spec.ifc_class.clone()
    };
    let psets = builder.psets(&spec.properties, &spec.performance);
    let materials = builder.materials(&spec.materials, &spec.properties);
    let geometry = builder.geometry(&spec.properties);
    let spatial = builder.spatial();

    // Stage 4 — Persist. The only fatal stage.
    let element = ctx
        .store
        .create(NewElement {
            ifc_class,
            name: spec.name.clone(),
            properties: psets,
            materials,
            geometry,
            spatial,
            global_id: None,
        })
        .map_err(PipelineError::Persist)?;
    let folder = ctx.store.folder(&element.global_id);

    // Stage 5 — Validate.
    let validation = match ctx.validator.validate(&folder, &[]) {
        Ok(report) => Some(report),
        Err(e) => {
            warnings.push(Warning::degraded(format!("validation stage failed: {e}")));
            None
        }
    };

    // Stage 6 — Cost.
    let cost = match ctx.estimator.estimate(&folder, region) {
        Ok(report) => Some(report),
        Err(e) => {
            warnings.push(Warning::degraded(format!("cost stage failed: {e}")));
            None
        }
    };

    // Stage 7 — Regenerate the Markdown surface with the real reports.
    let reports = ReportSet {
        compliance: Some(&compliance_report),
        validation: validation.as_ref(),
        cost: cost.as_ref(),
    };
    if let Err(e) = artifacts::regenerate(&folder, &reports) {
        warnings.push(Warning::degraded(format!(
            "artifact regeneration failed: {e}"
        )));
    }

    let mut mutation = Mutation::new(GenerateOutcome {
        element,
        folder: folder.clone(),
        compliance: compliance_report,
        validation,
        cost,
    });
    mutation.warnings = warnings;

    // Stage 8 — Commit. Failure leaves the element durable but dirty.
    if let Some(version) = ctx.version {
        let message = format!(
            "feat: generate element {} ({})",
            mutation.value.element.ifc_class,
            mutation.value.element.global_id.folder_name()
        );
        match version.commit_scope(&[folder.clone()], &message) {
            Ok(token) if token.is_empty() => {}
            Ok(token) => mutation.commit = Some(token),
            Err(e) => mutation
                .warnings
                .push(Warning::partial_side_effect(format!("commit failed: {e}"))),
        }
    }

    // Stage 9 — Audit. Failure loses the record; the mutation stands.
    let after_hash = match hasher::hash_folder(&folder) {
        Ok(digest) => Some(digest),
        Err(e) => {
            mutation.warnings.push(Warning::degraded(format!(
                "folder hashing failed: {e}"
            )));
            None
        }
    };
    match ctx.audit.append(
        ctx.user,
        "generate",
        mutation.value.element.global_id.as_str(),
        None,
        after_hash.as_deref(),
    ) {
        Ok(entry) => mutation.audit_id = Some(entry.id),
        Err(e) => mutation
            .warnings
            .push(Warning::partial_side_effect(format!("audit append failed: {e}"))),
    }

    Ok(mutation)
}

fn check_spec(
    ctx: &PipelineContext<'_>,
    spec: &ParametricSpec,
    region: Option<&str>,
    warnings: &mut Vec<Warning>,
) -> ComplianceReport {
    match ctx.compliance.check_spec(spec, region) {
        Ok(report) => report,
        Err(e) => {
            warnings.push(Warning::degraded(format!(
                "compliance check failed ({e}); treating verdict as unknown"
            )));
            ComplianceReport::empty(spec.label(), &spec.ifc_class, "")
        }
    }
}

/// Applies every mechanical fix: failed `min_value` rules whose property
/// path addresses a known dimension (`properties.*_mm`, `properties.area_m2`)
/// or performance slot are satisfied by writing the expected value into the
/// spec. Returns the adjusted paths.
fn auto_adjust(spec: &mut ParametricSpec, rules: &[Rule], report: &ComplianceReport) -> Vec<String> {
    let mut adjusted = Vec::new();
    for result in &report.results {
        if result.status != RuleStatus::Fail {
            continue;
        }
        let Some(rule) = rules
            .iter()
            .find(|r| r.natural_key() == (result.code_name.as_str(), result.section.as_str()))
        else {
            continue;
        };
        if rule.check_type != CheckType::MinValue {
            continue;
        }

        let mut segments = rule.property_path.splitn(2, '.');
        let (Some(section), Some(field)) = (segments.next(), segments.next()) else {
            continue;
        };
        if field.contains('.') {
            continue;
        }

        match section {
            "properties" if is_dimension_slot(field) => {
                let value = rule
                    .check_value
                    .as_f64()
                    .map(DynValue::Float)
                    .unwrap_or_else(|| rule.check_value.clone());
                spec.properties.insert(field.to_owned(), value);
                adjusted.push(rule.property_path.clone());
            }
            "performance" if PERFORMANCE_SLOTS.contains(&field) => {
                spec.performance
                    .insert(field.to_owned(), rule.check_value.clone());
                adjusted.push(rule.property_path.clone());
            }
            _ => {}
        }
    }
    adjusted
}

fn is_dimension_slot(field: &str) -> bool {
    field.ends_with("_mm") || field == "area_m2"
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::collaborators::{CollaboratorError, GeometryValidator, UnitRateEstimator};
    use crate::rule_store::RuleStore;
    use crate::seed;
    use std::path::Path;

    struct FailingEstimator;

    impl CostEstimator for FailingEstimator {
        fn estimate(
            &self,
            _folder: &Path,
            _region: Option<&str>,
        ) -> Result<CostReport, CollaboratorError> {
            Err(CollaboratorError::Unavailable {
                what: "cost estimator",
                detail: "no pricing source".to_owned(),
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ElementStore,
        compliance: ComplianceEngine,
        registry: DomainRegistry,
        audit: AuditChain,
        version: VersionLog,
        estimator: UnitRateEstimator,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let version = VersionLog::init(dir.path()).expect("version log");
        let store = ElementStore::open(&dir.path().join("elements")).expect("store");
        let rule_store = RuleStore::open_in_memory().expect("rule store");
        rule_store.seed_if_empty(&seed::builtin_rules()).expect("seed");
        let registry = DomainRegistry::with_defaults();
        let estimator =
            UnitRateEstimator::new(registry.pricing().clone(), registry.regional_factors().clone());
        Fixture {
            _dir: dir,
            store,
            compliance: ComplianceEngine::new(rule_store),
            registry,
            audit: AuditChain::open_in_memory().expect("audit"),
            version,
            estimator,
        }
    }

    fn context<'a>(f: &'a Fixture, parser: &'a dyn Parser, estimator: &'a dyn CostEstimator) -> PipelineContext<'a> {
        PipelineContext {
            parser,
            compliance: &f.compliance,
            registry: &f.registry,
            store: &f.store,
            validator: &GeometryValidator,
            estimator,
            version: Some(&f.version),
            audit: &f.audit,
            user: "tester",
        }
    }

    fn wall_spec() -> ParametricSpec {
        serde_json::from_str(
            r#"{
                "ifc_class": "IfcWall",
                "name": "Fire wall",
                "properties": {"height_mm": 3657.6, "thickness_mm": 200},
                "performance": {"fire_rating": "2H"},
                "materials": ["concrete"]
            }"#,
        )
        .expect("valid spec")
    }

    #[test]
    fn happy_path_produces_committed_audited_element() {
        let f = fixture();
        let parser = StubParser;
        let ctx = context(&f, &parser, &f.estimator);

        let outcome = run(&ctx, GenerateInput::Spec(wall_spec()), None, Some("US"))
            .expect("pipeline");

        assert_ne!(outcome.value.compliance.status, Verdict::NonCompliant);
        assert!(outcome.value.folder.join("metadata.json").is_file());
        assert!(outcome.value.folder.join("VALIDATION.md").is_file());
        assert!(outcome.value.folder.join("SCHEDULE.md").is_file());
        assert!(outcome.commit.is_some());
        assert!(outcome.audit_id.is_some());
        assert!(f.version.is_clean().expect("clean"));

        let entries = f
            .audit
            .query(&crate::audit::AuditFilter {
                action: Some("generate".to_owned()),
                ..crate::audit::AuditFilter::default()
            })
            .expect("query");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource, outcome.value.element.global_id.as_str());
        assert!(!entries[0].after_hash.is_empty());
    }

    #[test]
    fn thin_wall_is_auto_adjusted_to_minimum() {
        let f = fixture();
        let parser = StubParser;
        let ctx = context(&f, &parser, &f.estimator);

        let mut spec = wall_spec();
        spec.properties
            .insert("thickness_mm".to_owned(), DynValue::Float(100.0));

        let outcome = run(&ctx, GenerateInput::Spec(spec), None, Some("US")).expect("pipeline");

        let thickness = outcome
            .value
            .element
            .psets
            .get("Dimensions")
            .and_then(|d| d.get("thickness_mm"))
            .and_then(DynValue::as_f64)
            .expect("thickness");
        assert!(thickness >= 152.0, "thickness {thickness} not adjusted");
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.kind == crate::outcome::WarningKind::AutoAdjusted));
        assert_ne!(outcome.value.compliance.status, Verdict::NonCompliant);
    }

    #[test]
    fn cost_stage_failure_is_a_warning_not_an_error() {
        let f = fixture();
        let parser = StubParser;
        let failing = FailingEstimator;
        let ctx = context(&f, &parser, &failing);

        let outcome = run(&ctx, GenerateInput::Spec(wall_spec()), None, Some("US"))
            .expect("pipeline");
        assert!(outcome.value.cost.is_none());
        assert!(!outcome.value.folder.join("SCHEDULE.md").exists());
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.detail.contains("cost stage failed")));
        // The element is durable and committed regardless.
        assert!(outcome.commit.is_some());
    }

    #[test]
    fn text_input_goes_through_the_parser() {
        let f = fixture();
        let parser = StubParser;
        let ctx = context(&f, &parser, &f.estimator);

        let outcome = run(
            &ctx,
            GenerateInput::Text("2-hour fire-rated concrete wall".to_owned()),
            None,
            None,
        )
        .expect("pipeline");
        // The stub parser yields a generic wall.
        assert_eq!(outcome.value.element.ifc_class, "IfcWall");
    }

    #[test]
    fn commit_stage_can_be_disabled() {
        let f = fixture();
        let parser = StubParser;
        let mut ctx = context(&f, &parser, &f.estimator);
        ctx.version = None;

        let outcome = run(&ctx, GenerateInput::Spec(wall_spec()), None, Some("US"))
            .expect("pipeline");
        assert!(outcome.commit.is_none());
        assert!(!f.version.is_clean().expect("clean"));
    }

    // --- auto_adjust unit behaviour ---

    #[test]
    fn auto_adjust_only_touches_known_slots() {
        let rules = vec![
            seed_rule("properties.thickness_mm", "152"),
            seed_rule("properties.unrelated", "7"),
            seed_rule("performance.fire_rating", "\"1H\""),
        ];
        let mut spec = ParametricSpec {
            ifc_class: "IfcWall".to_owned(),
            ..ParametricSpec::default()
        };
        let report = ComplianceReport {
            element_id: String::new(),
            ifc_class: "IfcWall".to_owned(),
            status: Verdict::NonCompliant,
            results: rules
                .iter()
                .map(|r| crate::rules::RuleResult {
                    rule_id: r.id,
                    code_name: r.code_name.clone(),
                    section: r.section.clone(),
                    title: r.title.clone(),
                    status: RuleStatus::Fail,
                    actual_value: DynValue::Null,
                    expected_value: r.check_value.clone(),
                    citation: String::new(),
                    message: String::new(),
                })
                .collect(),
            suggested_fixes: Vec::new(),
            checked_at: String::new(),
        };

        let adjusted = auto_adjust(&mut spec, &rules, &report);
        assert_eq!(
            adjusted,
            vec![
                "properties.thickness_mm".to_owned(),
                "performance.fire_rating".to_owned()
            ]
        );
        assert_eq!(
            spec.properties.get("thickness_mm").and_then(DynValue::as_f64),
            Some(152.0)
        );
        assert_eq!(
            spec.performance.get("fire_rating").and_then(DynValue::as_str),
            Some("1H")
        );
        assert!(spec.properties.get("unrelated").is_none());
    }

    fn seed_rule(path: &str, check_value: &str) -> Rule {
        serde_json::from_str(&format!(
            r#"{{
                "code_name": "T", "section": "{path}", "title": "t",
                "ifc_classes": ["IfcWall"], "check_type": "min_value",
                "property_path": "{path}", "check_value": {check_value}
            }}"#
        ))
        .expect("valid rule")
    }
}
