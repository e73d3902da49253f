/// Rule, rule-result, and compliance-report records.
///
/// [`Rule`] is the wire format of one building-code predicate; it round-trips
/// losslessly through JSON (heterogeneous `check_value`s included) and
/// through the rule store's JSON-encoded columns.
use serde::{Deserialize, Serialize};

use crate::dynvalue::DynValue;
use crate::enums::{CheckType, RuleStatus, Verdict};

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A single building-code rule.
///
/// The pair (`code_name`, `section`) is the natural key: it identifies the
/// rule across regulatory updates while the numeric `id` is only stable
/// within one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Store-assigned row id; `None` until inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Code identifier, e.g. `IBC2024`, `ADA2010`, `Title-24`.
    pub code_name: String,

    /// Section locator within the code, e.g. `703.3`.
    pub section: String,

    /// Human-readable rule name.
    pub title: String,

    /// IFC classes this rule applies to. An empty list or the `*` token
    /// means the rule applies to every class.
    #[serde(default)]
    pub ifc_classes: Vec<String>,

    /// Evaluation strategy.
    pub check_type: CheckType,

    /// Dot-notation path into the attribute bag,
    /// e.g. `performance.fire_rating`.
    pub property_path: String,

    /// Threshold or required value, interpreted per `check_type`.
    #[serde(default = "null_value")]
    pub check_value: DynValue,

    /// Region scope (`US`, `CA`, …) or `*` for universal.
    #[serde(default = "universal_region")]
    pub region: String,

    /// Full citation text for reports.
    #[serde(default)]
    pub citation: String,

    /// ISO date the rule takes effect.
    #[serde(default)]
    pub effective_date: String,
}

fn null_value() -> DynValue {
    DynValue::Null
}

fn universal_region() -> String {
    "*".to_owned()
}

impl Rule {
    /// The `(code_name, section)` natural key.
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.code_name, &self.section)
    }

    /// Returns `true` if this rule applies to `ifc_class`.
    ///
    /// An empty class list or a `*` entry applies universally.
    pub fn applies_to_class(&self, ifc_class: &str) -> bool {
        self.ifc_classes.is_empty()
            || self
                .ifc_classes
                .iter()
                .any(|c| c == "*" || c.eq_ignore_ascii_case(ifc_class))
    }

    /// Returns `true` if the two rules share a natural key but differ in any
    /// content field.
    pub fn content_differs(&self, other: &Rule) -> bool {
        self.title != other.title
            || self.check_type != other.check_type
            || self.property_path != other.property_path
            || self.check_value != other.check_value
            || self.ifc_classes != other.ifc_classes
            || self.region != other.region
            || self.citation != other.citation
    }
}

// ---------------------------------------------------------------------------
// RuleResult
// ---------------------------------------------------------------------------

/// The outcome of evaluating one rule against one attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i64>,
    pub code_name: String,
    pub section: String,
    pub title: String,
    pub status: RuleStatus,
    /// The value found at `property_path`; `null` when missing.
    pub actual_value: DynValue,
    /// The rule's `check_value`.
    pub expected_value: DynValue,
    pub citation: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// ComplianceReport
// ---------------------------------------------------------------------------

/// Full compliance-check report for a single element or spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// GlobalId of the checked element, or the spec name when no element
    /// exists yet.
    #[serde(default)]
    pub element_id: String,
    #[serde(default)]
    pub ifc_class: String,
    pub status: Verdict,
    #[serde(default)]
    pub results: Vec<RuleResult>,
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
    /// ISO timestamp of the check.
    #[serde(default)]
    pub checked_at: String,
}

impl ComplianceReport {
    /// An empty report with verdict `unknown` for subjects with no
    /// applicable rules.
    pub fn empty(element_id: &str, ifc_class: &str, checked_at: &str) -> Self {
        Self {
            element_id: element_id.to_owned(),
            ifc_class: ifc_class.to_owned(),
            status: Verdict::Unknown,
            results: Vec::new(),
            suggested_fixes: Vec::new(),
            checked_at: checked_at.to_owned(),
        }
    }

    /// Renders the report as the `COMPLIANCE.md` document.
    ///
    /// Rendering is a pure function of the report's fields; rendering the
    /// same report twice yields identical bytes.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        let subject = if self.element_id.is_empty() {
            "Unknown"
        } else {
            self.element_id.as_str()
        };
        lines.push(format!("# Compliance Report — {subject}"));
        lines.push(String::new());
        lines.push(format!("**IFC Class:** `{}`", self.ifc_class));
        lines.push(format!("**Status:** {}", self.status.badge()));
        if !self.checked_at.is_empty() {
            lines.push(format!("**Checked:** {}", self.checked_at));
        }
        lines.push(String::new());

        let passes = self.count(RuleStatus::Pass);
        let fails = self.count(RuleStatus::Fail);
        let skips = self.count(RuleStatus::Skip) + self.count(RuleStatus::Unknown);
        lines.push(format!(
            "**Results:** {passes} passed, {fails} failed, {skips} skipped"
        ));
        lines.push(String::new());

        if !self.results.is_empty() {
            lines.push("## Rule Results".to_owned());
            lines.push(String::new());
            lines.push("| Status | Code | Section | Title | Detail |".to_owned());
            lines.push("|--------|------|---------|-------|--------|".to_owned());
            for r in &self.results {
                let detail = r.message.replace('|', "\\|");
                lines.push(format!(
                    "| {} | {} | {} | {} | {detail} |",
                    status_icon(r.status),
                    r.code_name,
                    r.section,
                    r.title
                ));
            }
            lines.push(String::new());
        }

        let failures: Vec<&RuleResult> = self
            .results
            .iter()
            .filter(|r| r.status == RuleStatus::Fail)
            .collect();
        if !failures.is_empty() {
            lines.push("## Violations".to_owned());
            lines.push(String::new());
            for r in failures {
                lines.push(format!("- **{} {}** — {}", r.code_name, r.section, r.title));
                lines.push(format!("  {}", r.message));
                if !r.citation.is_empty() {
                    lines.push(format!("  *Citation:* {}", r.citation));
                }
                lines.push(String::new());
            }
        }

        if !self.suggested_fixes.is_empty() {
            lines.push("## Suggested Fixes".to_owned());
            lines.push(String::new());
            for fix in &self.suggested_fixes {
                lines.push(format!("- {fix}"));
            }
            lines.push(String::new());
        }

        let mut out = lines.join("\n");
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    fn count(&self, status: RuleStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

fn status_icon(status: RuleStatus) -> &'static str {
    match status {
        RuleStatus::Pass => "PASS",
        RuleStatus::Fail => "FAIL",
        RuleStatus::Skip => "SKIP",
        RuleStatus::Unknown => "?",
    }
}
