/// Closed-set domain enums shared across the crate.
///
/// Every enum serialises to its snake_case tag so the on-disk JSON matches
/// the wire formats in the rule and report records.
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CheckType
// ---------------------------------------------------------------------------

/// The evaluation strategy of a compliance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// Numeric lower bound: actual >= expected.
    MinValue,
    /// Numeric upper bound: actual <= expected; missing reading is skipped.
    MaxValue,
    /// The addressed property must be present and non-empty.
    Exists,
    /// The addressed property must coerce to the expected boolean.
    Boolean,
    /// The string form of the property must be in the allowed set
    /// (case-insensitive).
    Enum,
}

impl CheckType {
    /// Returns the canonical snake_case tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::MinValue => "min_value",
            Self::MaxValue => "max_value",
            Self::Exists => "exists",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
        }
    }

    /// Parses the snake_case tag, returning `None` for unknown strings.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "min_value" => Some(Self::MinValue),
            "max_value" => Some(Self::MaxValue),
            "exists" => Some(Self::Exists),
            "boolean" => Some(Self::Boolean),
            "enum" => Some(Self::Enum),
            _ => None,
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// RuleStatus
// ---------------------------------------------------------------------------

/// The outcome of evaluating one rule against one attribute bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// The rule's predicate held.
    Pass,
    /// The rule's predicate was violated.
    Fail,
    /// The rule could not be meaningfully evaluated (e.g. an upper bound
    /// against an absent reading) and was skipped.
    Skip,
    /// The rule's check type was not recognised.
    Unknown,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The four-valued aggregate over a set of rule results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every applicable rule passed.
    Compliant,
    /// At least one rule failed.
    NonCompliant,
    /// Some rules passed, none failed, and at least one was skipped.
    Partial,
    /// The applicable rule set was empty, or nothing passed or failed.
    Unknown,
}

impl Verdict {
    /// Human-readable badge used in rendered reports.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON-COMPLIANT",
            Self::Partial => "PARTIAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Action intent of a parsed parametric specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Create a new element.
    Create,
    /// Modify an existing element.
    Modify,
    /// Find matching elements or templates.
    Find,
    /// Validate an existing element.
    Validate,
}

impl Default for Intent {
    fn default() -> Self {
        Self::Create
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Find => "find",
            Self::Validate => "validate",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// The commit-message type prefix used by the version log
/// (`<type>: <noun> <identifier>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new element, template, or generated artifact.
    Feat,
    /// A correction to an existing object.
    Fix,
    /// Housekeeping: deletions, configuration, backups.
    Chore,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Chore => "chore",
        };
        f.write_str(s)
    }
}
