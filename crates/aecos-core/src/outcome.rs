/// Warning channel and mutation outcomes.
///
/// Mutating operations are fail-atomic with respect to their primary
/// subsystem; failures of *secondary* side effects (the audit append after a
/// durable write, the commit after a successful audit) do not undo the
/// mutation. They surface here instead, as warnings the caller may inspect.
use std::fmt;

use serde::Serialize;

/// Classification of a non-fatal degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The primary mutation is durable but a secondary side effect (audit
    /// append or version commit) failed.
    PartialSideEffect,
    /// The generate pipeline mechanically adjusted the spec to satisfy a
    /// minimum-value rule.
    AutoAdjusted,
    /// An optional stage degraded (parse fallback, failed validation or
    /// cost stage, failed artifact regeneration).
    Degraded,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PartialSideEffect => "partial_side_effect",
            Self::AutoAdjusted => "auto_adjusted",
            Self::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// One warning on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub detail: String,
}

impl Warning {
    pub fn new(kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn partial_side_effect(detail: impl Into<String>) -> Self {
        Self::new(WarningKind::PartialSideEffect, detail)
    }

    pub fn auto_adjusted(detail: impl Into<String>) -> Self {
        Self::new(WarningKind::AutoAdjusted, detail)
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self::new(WarningKind::Degraded, detail)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.detail)
    }
}

/// The outcome of a successful facade mutation.
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    /// The primary result.
    pub value: T,
    /// Short commit token, when auto-commit ran and produced a commit.
    pub commit: Option<String>,
    /// Audit entry id, when the audit append succeeded.
    pub audit_id: Option<i64>,
    /// Non-fatal degradations the caller may inspect.
    pub warnings: Vec<Warning>,
}

impl<T> Mutation<T> {
    /// A clean outcome with no side-effect records yet.
    pub fn new(value: T) -> Self {
        Self {
            value,
            commit: None,
            audit_id: None,
            warnings: Vec::new(),
        }
    }

    /// Maps the primary value, carrying the side-effect records along.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Mutation<U> {
        Mutation {
            value: f(self.value),
            commit: self.commit,
            audit_id: self.audit_id,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_display_includes_kind_tag() {
        let w = Warning::partial_side_effect("audit append failed");
        assert_eq!(w.to_string(), "[partial_side_effect] audit append failed");
    }

    #[test]
    fn warning_kind_serialises_snake_case() {
        #![allow(clippy::expect_used)]
        let json = serde_json::to_string(&WarningKind::PartialSideEffect).expect("serialize");
        assert_eq!(json, "\"partial_side_effect\"");
    }

    #[test]
    fn mutation_map_preserves_channel() {
        let mut m = Mutation::new(2);
        m.warnings.push(Warning::degraded("x"));
        m.commit = Some("abc1234".to_owned());
        let mapped = m.map(|n| n * 2);
        assert_eq!(mapped.value, 4);
        assert_eq!(mapped.commit.as_deref(), Some("abc1234"));
        assert_eq!(mapped.warnings.len(), 1);
    }
}
