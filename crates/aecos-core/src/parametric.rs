/// The parametric specification and the parser seam.
///
/// A [`ParametricSpec`] is the structured input of the generate pipeline.
/// How it is produced is a collaborator concern behind the [`Parser`] trait;
/// the core only assumes that parsing yields a spec and that a failed parse
/// can fall back to the lowest-confidence stub.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dynvalue::{DynMap, DynValue};
use crate::enums::Intent;

/// Structured specification driving element generation.
///
/// All dimensions are millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParametricSpec {
    pub intent: Intent,
    /// Mapped IFC entity type (e.g. `IfcWall`); empty routes to the
    /// fallback builder.
    pub ifc_class: String,
    pub name: Option<String>,
    /// Dimensional properties: `height_mm`, `width_mm`, `thickness_mm`,
    /// `length_mm`, `area_m2`, …
    pub properties: DynMap,
    /// Material keywords found in the input.
    pub materials: Vec<String>,
    /// Performance attributes: `fire_rating` (`"<N>H"`), `acoustic_stc`,
    /// `thermal_r_value`, `thermal_u_value`.
    pub performance: DynMap,
    /// Constraints: accessibility, energy code, structural, fire,
    /// placement.
    pub constraints: DynMap,
    /// Referenced building codes (e.g. `IBC2024`, `ADA2010`).
    pub compliance_codes: Vec<String>,
    /// Overall parse confidence, 0.0 to 1.0.
    pub confidence: f64,
    /// Ambiguities, assumptions, or missing information.
    pub warnings: Vec<String>,
}

impl ParametricSpec {
    /// Builds the attribute bag the rule evaluator consumes.
    pub fn attribute_map(&self) -> DynMap {
        let mut out = DynMap::new();
        out.insert("properties".to_owned(), DynValue::Object(self.properties.clone()));
        out.insert("performance".to_owned(), DynValue::Object(self.performance.clone()));
        out.insert("constraints".to_owned(), DynValue::Object(self.constraints.clone()));
        out.insert(
            "materials".to_owned(),
            DynValue::Array(
                self.materials
                    .iter()
                    .map(|m| DynValue::from(m.as_str()))
                    .collect(),
            ),
        );
        out
    }

    /// A display label for reports produced before the element exists.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            Some(_) | None => &self.ifc_class,
        }
    }
}

/// Errors produced by parser collaborators.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub detail: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse failed: {}", self.detail)
    }
}

impl std::error::Error for ParseError {}

/// Turns natural language into a [`ParametricSpec`].
pub trait Parser {
    /// Parses `text` with optional project context (`project_type`,
    /// `climate_zone`, `jurisdiction`, …).
    fn parse(&self, text: &str, context: Option<&DynMap>) -> Result<ParametricSpec, ParseError>;
}

/// The lowest-confidence fallback: produces a generic wall spec carrying
/// the raw text as a warning. Used when no real parser is wired in or when
/// the real parser fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubParser;

impl StubParser {
    /// The stub spec for `text`, independent of any parser instance.
    pub fn stub_spec(text: &str) -> ParametricSpec {
        ParametricSpec {
            intent: Intent::Create,
            ifc_class: "IfcWall".to_owned(),
            confidence: 0.0,
            warnings: vec![format!(
                "natural-language parsing unavailable; defaulted to a generic wall for: {text}"
            )],
            ..ParametricSpec::default()
        }
    }
}

impl Parser for StubParser {
    fn parse(&self, text: &str, _context: Option<&DynMap>) -> Result<ParametricSpec, ParseError> {
        Ok(Self::stub_spec(text))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn spec_deserialises_with_defaults() {
        let spec: ParametricSpec = serde_json::from_str(r#"{"ifc_class": "IfcDoor"}"#)
            .expect("parse");
        assert_eq!(spec.intent, Intent::Create);
        assert_eq!(spec.ifc_class, "IfcDoor");
        assert_eq!(spec.confidence, 0.0);
        assert!(spec.properties.is_empty());
    }

    #[test]
    fn attribute_map_mirrors_sections() {
        let spec: ParametricSpec = serde_json::from_str(
            r#"{
                "ifc_class": "IfcWall",
                "properties": {"thickness_mm": 150},
                "performance": {"fire_rating": "2H"},
                "materials": ["concrete"]
            }"#,
        )
        .expect("parse");
        let data = spec.attribute_map();
        assert_eq!(
            data.get("properties")
                .and_then(|p| p.get("thickness_mm"))
                .and_then(DynValue::as_f64),
            Some(150.0)
        );
        assert_eq!(
            data.get("performance")
                .and_then(|p| p.get("fire_rating"))
                .and_then(DynValue::as_str),
            Some("2H")
        );
        assert_eq!(
            data.get("materials").and_then(DynValue::as_array).map(<[DynValue]>::len),
            Some(1)
        );
    }

    #[test]
    fn stub_parser_is_lowest_confidence() {
        let spec = StubParser.parse("12 foot wall", None).expect("parse");
        assert_eq!(spec.confidence, 0.0);
        assert_eq!(spec.ifc_class, "IfcWall");
        assert_eq!(spec.warnings.len(), 1);
        assert!(spec.warnings[0].contains("12 foot wall"));
    }

    #[test]
    fn label_prefers_name() {
        let mut spec = ParametricSpec {
            ifc_class: "IfcWall".to_owned(),
            ..ParametricSpec::default()
        };
        assert_eq!(spec.label(), "IfcWall");
        spec.name = Some("North wall".to_owned());
        assert_eq!(spec.label(), "North wall");
    }
}
