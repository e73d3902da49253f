/// The pure rule evaluator.
///
/// Everything in this module is a function of its arguments: no I/O, no
/// clocks, no global state. [`evaluate`] dispatches on the rule's check type,
/// [`verdict`] aggregates results into the four-valued verdict, and
/// [`evaluate_element`] runs a rule set and collects prescriptive fixes for
/// failures.
use std::sync::LazyLock;

use regex::Regex;

use crate::dynvalue::{DynMap, DynValue};
use crate::enums::{CheckType, RuleStatus, Verdict};
use crate::rules::{Rule, RuleResult};

/// Permissive fire-rating grammar: `2`, `2H`, `1.5 H`, case-insensitive.
static FIRE_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(\.\d+)?)\s*H?$").unwrap_or_else(|_| {
        // Never reached: the pattern above is always valid.
        Regex::new("a^").unwrap_or_else(|_| never_matches())
    })
});

// Never reached: the literal above always parses.
#[allow(clippy::panic)]
fn never_matches() -> Regex {
    panic!("regex engine rejected a known-valid literal")
}

// ---------------------------------------------------------------------------
// Path resolution and coercion
// ---------------------------------------------------------------------------

/// Walks a dotted path into a nested attribute bag.
///
/// Returns `None` when any segment is missing or a non-object intermediate
/// is reached. A present `null` leaf resolves to `Some(&DynValue::Null)` —
/// missing and present-but-empty are distinct sentinels.
pub fn resolve_path<'a>(data: &'a DynMap, path: &str) -> Option<&'a DynValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Parses a fire rating to hours: `"2H"` → `2.0`, `"1.5"` → `1.5`.
///
/// Non-conforming strings return `None` and therefore compare unequal to
/// any bound.
pub fn parse_fire_rating_hours(value: &DynValue) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let s = value.as_str()?.trim().to_ascii_uppercase();
    let captures = FIRE_RATING_RE.captures(&s)?;
    captures.get(1)?.as_str().parse::<f64>().ok()
}

/// Coerces a value to f64: numbers directly, numeric strings via parse.
fn coerce_numeric(value: &DynValue) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    value.as_str()?.trim().parse::<f64>().ok()
}

/// Truthiness coercion for the `boolean` check: booleans as-is, numbers by
/// non-zero, strings and collections by non-emptiness.
fn coerce_bool(value: &DynValue) -> bool {
    match value {
        DynValue::Null => false,
        DynValue::Bool(b) => *b,
        DynValue::Integer(n) => *n != 0,
        DynValue::Float(f) => *f != 0.0,
        DynValue::String(s) => !s.is_empty(),
        DynValue::Array(a) => !a.is_empty(),
        DynValue::Object(m) => !m.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Single-rule evaluation
// ---------------------------------------------------------------------------

/// Evaluates one rule against one attribute bag.
///
/// | check type | passes when |
/// |---|---|
/// | `exists` | value present and not empty |
/// | `boolean` | value present and truthiness equals the expected boolean |
/// | `enum` | string form (case-insensitive) is in the allowed set |
/// | `min_value` | actual >= expected; missing actual fails |
/// | `max_value` | actual <= expected; missing actual is skipped |
///
/// Paths containing `fire_rating` compare in hours via the permissive
/// `<N>H` grammar on both sides.
pub fn evaluate(rule: &Rule, data: &DynMap) -> RuleResult {
    let actual = resolve_path(data, &rule.property_path).cloned();
    let mut result = RuleResult {
        rule_id: rule.id,
        code_name: rule.code_name.clone(),
        section: rule.section.clone(),
        title: rule.title.clone(),
        status: RuleStatus::Unknown,
        actual_value: actual.clone().unwrap_or(DynValue::Null),
        expected_value: rule.check_value.clone(),
        citation: rule.citation.clone(),
        message: String::new(),
    };
    let path = &rule.property_path;

    match rule.check_type {
        CheckType::Exists => {
            let present = actual.as_ref().is_some_and(|v| !v.is_empty_value());
            if present {
                result.status = RuleStatus::Pass;
                result.message = format!("{path} is present.");
            } else {
                result.status = RuleStatus::Fail;
                result.message = format!("{path} is required but missing.");
            }
        }

        CheckType::Boolean => {
            let expected = if rule.check_value.is_null() {
                true
            } else {
                coerce_bool(&rule.check_value)
            };
            match actual.as_ref().filter(|v| !v.is_null()) {
                Some(value) if coerce_bool(value) == expected => {
                    result.status = RuleStatus::Pass;
                    result.message =
                        format!("{path} = {} (expected {expected}).", value.display_bare());
                }
                Some(value) => {
                    result.status = RuleStatus::Fail;
                    result.message =
                        format!("{path} = {} (expected {expected}).", value.display_bare());
                }
                None => {
                    result.status = RuleStatus::Fail;
                    result.message = format!("{path} is not set (expected {expected}).");
                }
            }
        }

        CheckType::Enum => {
            let allowed: Vec<String> = match rule.check_value.as_array() {
                Some(values) => values.iter().map(DynValue::display_bare).collect(),
                None => vec![rule.check_value.display_bare()],
            };
            let allowed_upper: Vec<String> =
                allowed.iter().map(|a| a.to_ascii_uppercase()).collect();
            let matches = actual
                .as_ref()
                .filter(|v| !v.is_null())
                .is_some_and(|v| allowed_upper.contains(&v.display_bare().to_ascii_uppercase()));
            if matches {
                result.status = RuleStatus::Pass;
                result.message = format!(
                    "{path} = {} is in allowed set.",
                    result.actual_value.display_bare()
                );
            } else {
                result.status = RuleStatus::Fail;
                result.message = format!(
                    "{path} = {} not in allowed values [{}].",
                    result.actual_value.display_bare(),
                    allowed.join(", ")
                );
            }
        }

        CheckType::MinValue => {
            // Fire ratings compare in hours on both sides.
            let (actual_num, expected_num) = if path.contains("fire_rating") {
                let exp = parse_fire_rating_hours(&rule.check_value)
                    .or_else(|| coerce_numeric(&rule.check_value));
                let act = actual.as_ref().and_then(parse_fire_rating_hours);
                (act, exp)
            } else {
                (
                    actual.as_ref().and_then(coerce_numeric),
                    coerce_numeric(&rule.check_value),
                )
            };

            match (actual_num, expected_num) {
                (None, _) => {
                    result.status = RuleStatus::Fail;
                    result.message = format!(
                        "{path} is not set; minimum {} required.",
                        rule.check_value.display_bare()
                    );
                }
                (Some(act), Some(exp)) if act >= exp => {
                    result.status = RuleStatus::Pass;
                    result.message = format!(
                        "{path} = {} meets minimum {}.",
                        result.actual_value.display_bare(),
                        rule.check_value.display_bare()
                    );
                }
                (Some(_), _) => {
                    result.status = RuleStatus::Fail;
                    result.message = format!(
                        "{path} = {} below minimum {}.",
                        result.actual_value.display_bare(),
                        rule.check_value.display_bare()
                    );
                }
            }
        }

        CheckType::MaxValue => {
            let actual_num = actual.as_ref().and_then(coerce_numeric);
            let expected_num = coerce_numeric(&rule.check_value);
            match (actual_num, expected_num) {
                // An upper bound cannot be falsified against an absent reading.
                (None, _) => {
                    result.status = RuleStatus::Skip;
                    result.message = format!("{path} not set; cannot verify maximum.");
                }
                (Some(act), Some(exp)) if act <= exp => {
                    result.status = RuleStatus::Pass;
                    result.message = format!(
                        "{path} = {} within maximum {}.",
                        result.actual_value.display_bare(),
                        rule.check_value.display_bare()
                    );
                }
                (Some(_), _) => {
                    result.status = RuleStatus::Fail;
                    result.message = format!(
                        "{path} = {} exceeds maximum {}.",
                        result.actual_value.display_bare(),
                        rule.check_value.display_bare()
                    );
                }
            }
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregates rule results into the four-valued verdict.
///
/// The aggregation is a function of the result *multiset*: any permutation
/// of the same results yields the same verdict.
pub fn verdict(results: &[RuleResult]) -> Verdict {
    if results.is_empty() {
        return Verdict::Unknown;
    }
    let any_fail = results.iter().any(|r| r.status == RuleStatus::Fail);
    if any_fail {
        return Verdict::NonCompliant;
    }
    let all_pass = results.iter().all(|r| r.status == RuleStatus::Pass);
    if all_pass {
        return Verdict::Compliant;
    }
    let any_pass = results.iter().any(|r| r.status == RuleStatus::Pass);
    if any_pass {
        return Verdict::Partial;
    }
    Verdict::Unknown
}

/// Runs every rule against the attribute bag and collects one prescriptive
/// fix line per failure.
///
/// Fixes are guidance strings, not machine instructions.
pub fn evaluate_element(rules: &[Rule], data: &DynMap) -> (Vec<RuleResult>, Vec<String>) {
    let mut results = Vec::with_capacity(rules.len());
    let mut fixes = Vec::new();
    for rule in rules {
        let result = evaluate(rule, data);
        if result.status == RuleStatus::Fail {
            fixes.push(suggest_fix(rule));
        }
        results.push(result);
    }
    (results, fixes)
}

/// Generates an actionable one-line suggestion for a failed rule.
fn suggest_fix(rule: &Rule) -> String {
    let path = &rule.property_path;
    let value = rule.check_value.display_bare();
    let cite = format!("{} §{}", rule.code_name, rule.section);
    match rule.check_type {
        CheckType::MinValue => format!("Increase {path} to at least {value} per {cite}."),
        CheckType::MaxValue => format!("Reduce {path} to at most {value} per {cite}."),
        CheckType::Exists => format!("Provide a value for {path} per {cite}."),
        CheckType::Boolean => format!("Ensure {path} = {value} per {cite}."),
        CheckType::Enum => format!("Set {path} to one of {value} per {cite}."),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use proptest::prelude::*;

    fn bag(json: &str) -> DynMap {
        match serde_json::from_str::<DynValue>(json).expect("valid JSON") {
            DynValue::Object(m) => m,
            DynValue::Null
            | DynValue::Bool(_)
            | DynValue::Integer(_)
            | DynValue::Float(_)
            | DynValue::String(_)
            | DynValue::Array(_) => DynMap::new(),
        }
    }

    fn rule(check_type: &str, path: &str, check_value: &str) -> Rule {
        serde_json::from_str(&format!(
            r#"{{
                "id": 7,
                "code_name": "IBC2024",
                "section": "703.3",
                "title": "Test rule",
                "ifc_classes": ["IfcWall"],
                "check_type": "{check_type}",
                "property_path": "{path}",
                "check_value": {check_value},
                "region": "US",
                "citation": "IBC 2024 §703.3"
            }}"#
        ))
        .expect("valid rule")
    }

    // --- resolve_path ---

    #[test]
    fn resolve_path_walks_nesting() {
        let data = bag(r#"{"performance": {"fire_rating": "2H"}}"#);
        let value = resolve_path(&data, "performance.fire_rating");
        assert_eq!(value.and_then(DynValue::as_str), Some("2H"));
    }

    #[test]
    fn resolve_path_missing_is_none() {
        let data = bag(r#"{"performance": {}}"#);
        assert!(resolve_path(&data, "performance.fire_rating").is_none());
        assert!(resolve_path(&data, "absent.leaf").is_none());
    }

    #[test]
    fn resolve_path_null_leaf_is_present() {
        let data = bag(r#"{"properties": {"reference": null}}"#);
        let value = resolve_path(&data, "properties.reference");
        assert_eq!(value, Some(&DynValue::Null));
    }

    #[test]
    fn resolve_path_through_scalar_is_none() {
        let data = bag(r#"{"properties": 7}"#);
        assert!(resolve_path(&data, "properties.thickness_mm").is_none());
    }

    // --- fire rating grammar ---

    #[test]
    fn fire_rating_grammar() {
        assert_eq!(parse_fire_rating_hours(&DynValue::from("2H")), Some(2.0));
        assert_eq!(parse_fire_rating_hours(&DynValue::from("2h")), Some(2.0));
        assert_eq!(parse_fire_rating_hours(&DynValue::from("1.5 H")), Some(1.5));
        assert_eq!(parse_fire_rating_hours(&DynValue::from("2")), Some(2.0));
        assert_eq!(parse_fire_rating_hours(&DynValue::Float(2.0)), Some(2.0));
        assert_eq!(parse_fire_rating_hours(&DynValue::from("two hours")), None);
        assert_eq!(parse_fire_rating_hours(&DynValue::Null), None);
    }

    // --- exists ---

    #[test]
    fn exists_passes_on_present_value() {
        let r = rule("exists", "performance.fire_rating", "null");
        let result = evaluate(&r, &bag(r#"{"performance": {"fire_rating": "2H"}}"#));
        assert_eq!(result.status, RuleStatus::Pass);
    }

    #[test]
    fn exists_fails_on_missing_and_empty() {
        let r = rule("exists", "performance.fire_rating", "null");
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {}}"#)).status,
            RuleStatus::Fail
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {"fire_rating": ""}}"#)).status,
            RuleStatus::Fail
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {"fire_rating": []}}"#)).status,
            RuleStatus::Fail
        );
    }

    // --- boolean ---

    #[test]
    fn boolean_defaults_expected_to_true() {
        let r = rule("boolean", "properties.load_bearing", "null");
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"load_bearing": true}}"#)).status,
            RuleStatus::Pass
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"load_bearing": false}}"#)).status,
            RuleStatus::Fail
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {}}"#)).status,
            RuleStatus::Fail
        );
    }

    #[test]
    fn boolean_matches_explicit_expected() {
        let r = rule("boolean", "properties.is_external", "false");
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"is_external": false}}"#)).status,
            RuleStatus::Pass
        );
    }

    // --- enum ---

    #[test]
    fn enum_is_case_insensitive() {
        let r = rule("enum", "properties.glazing_type", r#"["Double", "Triple"]"#);
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"glazing_type": "double"}}"#)).status,
            RuleStatus::Pass
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"glazing_type": "single"}}"#)).status,
            RuleStatus::Fail
        );
    }

    #[test]
    fn enum_missing_value_fails() {
        let r = rule("enum", "properties.glazing_type", r#"["double"]"#);
        assert_eq!(evaluate(&r, &bag("{}")).status, RuleStatus::Fail);
    }

    #[test]
    fn enum_scalar_check_value_is_singleton_set() {
        let r = rule("enum", "properties.shape", r#""circular""#);
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"shape": "CIRCULAR"}}"#)).status,
            RuleStatus::Pass
        );
    }

    // --- min_value ---

    #[test]
    fn min_value_numeric_comparison() {
        let r = rule("min_value", "properties.thickness_mm", "152");
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"thickness_mm": 200}}"#)).status,
            RuleStatus::Pass
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"thickness_mm": 100}}"#)).status,
            RuleStatus::Fail
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"thickness_mm": 152}}"#)).status,
            RuleStatus::Pass
        );
    }

    #[test]
    fn min_value_missing_fails() {
        // A required minimum cannot be met by an absent reading.
        let r = rule("min_value", "properties.thickness_mm", "152");
        assert_eq!(evaluate(&r, &bag("{}")).status, RuleStatus::Fail);
    }

    #[test]
    fn min_value_parses_numeric_strings() {
        let r = rule("min_value", "properties.thickness_mm", r#""152""#);
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"thickness_mm": "200"}}"#)).status,
            RuleStatus::Pass
        );
    }

    #[test]
    fn min_value_fire_rating_compares_hours() {
        let r = rule("min_value", "performance.fire_rating", r#""1H""#);
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {"fire_rating": "2H"}}"#)).status,
            RuleStatus::Pass
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {"fire_rating": "0.5H"}}"#)).status,
            RuleStatus::Fail
        );
        // A non-conforming rating string compares unequal.
        assert_eq!(
            evaluate(&r, &bag(r#"{"performance": {"fire_rating": "lots"}}"#)).status,
            RuleStatus::Fail
        );
    }

    // --- max_value ---

    #[test]
    fn max_value_skips_when_missing() {
        let r = rule("max_value", "properties.riser_height_mm", "178");
        assert_eq!(evaluate(&r, &bag("{}")).status, RuleStatus::Skip);
    }

    #[test]
    fn max_value_numeric_comparison() {
        let r = rule("max_value", "properties.riser_height_mm", "178");
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"riser_height_mm": 170}}"#)).status,
            RuleStatus::Pass
        );
        assert_eq!(
            evaluate(&r, &bag(r#"{"properties": {"riser_height_mm": 190}}"#)).status,
            RuleStatus::Fail
        );
    }

    // --- verdict ---

    fn result_with(status: RuleStatus) -> RuleResult {
        RuleResult {
            rule_id: None,
            code_name: String::new(),
            section: String::new(),
            title: String::new(),
            status,
            actual_value: DynValue::Null,
            expected_value: DynValue::Null,
            citation: String::new(),
            message: String::new(),
        }
    }

    #[test]
    fn verdict_empty_is_unknown() {
        assert_eq!(verdict(&[]), Verdict::Unknown);
    }

    #[test]
    fn verdict_any_fail_is_non_compliant() {
        let results = vec![
            result_with(RuleStatus::Pass),
            result_with(RuleStatus::Fail),
            result_with(RuleStatus::Skip),
        ];
        assert_eq!(verdict(&results), Verdict::NonCompliant);
    }

    #[test]
    fn verdict_all_pass_is_compliant() {
        let results = vec![result_with(RuleStatus::Pass), result_with(RuleStatus::Pass)];
        assert_eq!(verdict(&results), Verdict::Compliant);
    }

    #[test]
    fn verdict_pass_and_skip_is_partial() {
        let results = vec![result_with(RuleStatus::Pass), result_with(RuleStatus::Skip)];
        assert_eq!(verdict(&results), Verdict::Partial);
    }

    #[test]
    fn verdict_only_skips_is_unknown() {
        let results = vec![result_with(RuleStatus::Skip), result_with(RuleStatus::Skip)];
        assert_eq!(verdict(&results), Verdict::Unknown);
    }

    // --- evaluate_element ---

    #[test]
    fn evaluate_element_collects_fixes_for_failures() {
        let rules = vec![
            rule("min_value", "properties.thickness_mm", "152"),
            rule("min_value", "performance.fire_rating", r#""1H""#),
        ];
        let data = bag(r#"{"properties": {"thickness_mm": 100}, "performance": {"fire_rating": "2H"}}"#);
        let (results, fixes) = evaluate_element(&rules, &data);
        assert_eq!(results.len(), 2);
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].contains("Increase properties.thickness_mm to at least 152"));
        assert!(fixes[0].contains("IBC2024 §703.3"));
    }

    // --- purity and permutation laws ---

    proptest! {
        #[test]
        fn evaluation_is_deterministic(thickness in -1000.0..10000.0f64) {
            let r = rule("min_value", "properties.thickness_mm", "152");
            let data = bag(&format!(r#"{{"properties": {{"thickness_mm": {thickness}}}}}"#));
            let first = evaluate(&r, &data);
            let second = evaluate(&r, &data);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn verdict_is_permutation_invariant(statuses in proptest::collection::vec(0u8..4, 0..12)) {
            let to_status = |n: u8| match n {
                0 => RuleStatus::Pass,
                1 => RuleStatus::Fail,
                2 => RuleStatus::Skip,
                _ => RuleStatus::Unknown,
            };
            let results: Vec<RuleResult> =
                statuses.iter().map(|&n| result_with(to_status(n))).collect();
            let mut reversed = results.clone();
            reversed.reverse();
            prop_assert_eq!(verdict(&results), verdict(&reversed));
        }
    }
}
