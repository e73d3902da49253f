/// The compliance engine: rule query plus pure evaluation, assembled into a
/// report.
///
/// The engine owns the rule store and nothing else. Evaluation itself lives
/// in [`crate::evaluate`]; this module selects the applicable rules
/// (class/region filtered), runs them over a subject's attribute bag, and
/// aggregates the verdict.
use chrono::{SecondsFormat, Utc};

use crate::dynvalue::DynMap;
use crate::element::Element;
use crate::evaluate;
use crate::parametric::ParametricSpec;
use crate::rule_store::{RuleFilter, RuleStore, RuleStoreError};
use crate::rules::{ComplianceReport, Rule};

/// Rule query + evaluation over elements and parametric specs.
#[derive(Debug)]
pub struct ComplianceEngine {
    store: RuleStore,
}

impl ComplianceEngine {
    /// Wraps an opened rule store.
    pub fn new(store: RuleStore) -> Self {
        Self { store }
    }

    /// Shared access to the underlying rule store.
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Checks a durable element.
    ///
    /// `region = None` applies rules from every region.
    pub fn check_element(
        &self,
        element: &Element,
        region: Option<&str>,
    ) -> Result<ComplianceReport, RuleStoreError> {
        self.check_data(
            &element.global_id.to_string(),
            &element.ifc_class,
            &element.attribute_map(),
            region,
        )
    }

    /// Checks a parametric spec before any element exists.
    pub fn check_spec(
        &self,
        spec: &ParametricSpec,
        region: Option<&str>,
    ) -> Result<ComplianceReport, RuleStoreError> {
        self.check_data(spec.label(), &spec.ifc_class, &spec.attribute_map(), region)
    }

    /// Checks a raw attribute bag against the applicable rules.
    pub fn check_data(
        &self,
        subject_id: &str,
        ifc_class: &str,
        data: &DynMap,
        region: Option<&str>,
    ) -> Result<ComplianceReport, RuleStoreError> {
        let checked_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let rules = self.applicable_rules(ifc_class, region)?;
        if rules.is_empty() {
            return Ok(ComplianceReport::empty(subject_id, ifc_class, &checked_at));
        }

        let (results, suggested_fixes) = evaluate::evaluate_element(&rules, data);
        let status = evaluate::verdict(&results);
        Ok(ComplianceReport {
            element_id: subject_id.to_owned(),
            ifc_class: ifc_class.to_owned(),
            status,
            results,
            suggested_fixes,
            checked_at,
        })
    }

    /// The rules applying to a class in a region (universal rules
    /// included).
    pub fn applicable_rules(
        &self,
        ifc_class: &str,
        region: Option<&str>,
    ) -> Result<Vec<Rule>, RuleStoreError> {
        let filter = RuleFilter {
            ifc_class: if ifc_class.is_empty() {
                None
            } else {
                Some(ifc_class.to_owned())
            },
            region: region.map(str::to_owned),
            code_name: None,
        };
        self.store.list(&filter)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::enums::Verdict;
    use crate::seed;

    fn engine() -> ComplianceEngine {
        let store = RuleStore::open_in_memory().expect("store");
        store.seed_if_empty(&seed::builtin_rules()).expect("seed");
        ComplianceEngine::new(store)
    }

    fn wall_spec(json: &str) -> ParametricSpec {
        serde_json::from_str(json).expect("valid spec JSON")
    }

    #[test]
    fn compliant_wall_spec() {
        let spec = wall_spec(
            r#"{
                "ifc_class": "IfcWall",
                "name": "Fire wall",
                "properties": {"thickness_mm": 200},
                "performance": {"fire_rating": "2H"},
                "materials": ["concrete"]
            }"#,
        );
        let report = engine().check_spec(&spec, Some("US")).expect("check");
        assert_eq!(report.status, Verdict::Compliant, "{report:?}");
        assert_eq!(report.element_id, "Fire wall");
        assert!(report.suggested_fixes.is_empty());
    }

    #[test]
    fn thin_wall_fails_minimum_thickness() {
        let spec = wall_spec(
            r#"{
                "ifc_class": "IfcWall",
                "properties": {"thickness_mm": 100},
                "performance": {"fire_rating": "2H"}
            }"#,
        );
        let report = engine().check_spec(&spec, Some("US")).expect("check");
        assert_eq!(report.status, Verdict::NonCompliant);
        assert!(report
            .suggested_fixes
            .iter()
            .any(|f| f.contains("properties.thickness_mm")));
    }

    #[test]
    fn no_applicable_rules_is_unknown() {
        let spec = wall_spec(r#"{"ifc_class": "IfcFlowSegment"}"#);
        let report = engine().check_spec(&spec, Some("US")).expect("check");
        assert_eq!(report.status, Verdict::Unknown);
        assert!(report.results.is_empty());
    }

    #[test]
    fn region_filter_excludes_foreign_rules() {
        // Title-24 (CA) window rules must not fire for a US check.
        let spec = wall_spec(
            r#"{
                "ifc_class": "IfcWindow",
                "properties": {"glazing_type": "single"}
            }"#,
        );
        let us = engine().check_spec(&spec, Some("US")).expect("check");
        assert!(us.results.is_empty() || us.status == Verdict::Unknown);

        let ca = engine().check_spec(&spec, Some("CA")).expect("check");
        assert_eq!(ca.status, Verdict::NonCompliant);
    }

    #[test]
    fn element_check_reads_flattened_psets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            crate::store::ElementStore::open(&dir.path().join("elements")).expect("store");
        let mut dims = crate::dynvalue::DynMap::new();
        dims.insert("thickness_mm".to_owned(), crate::dynvalue::DynValue::Float(200.0));
        let mut common = crate::dynvalue::DynMap::new();
        common.insert("FireRating".to_owned(), crate::dynvalue::DynValue::from("2H"));
        let mut psets = crate::element::Psets::new();
        psets.insert("Dimensions".to_owned(), dims);
        psets.insert("Pset_WallCommon".to_owned(), common);

        let element = store
            .create(crate::store::NewElement {
                ifc_class: "IfcWall".to_owned(),
                properties: psets,
                ..crate::store::NewElement::default()
            })
            .expect("create");

        let report = engine().check_element(&element, Some("US")).expect("check");
        assert_eq!(report.status, Verdict::Compliant, "{report:?}");
        assert_eq!(report.element_id, element.global_id.to_string());
    }
}
