#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod artifacts;
pub mod audit;
pub mod builders;
pub mod canonical;
pub mod collaborators;
pub mod compliance;
pub mod domain;
pub mod dynvalue;
pub mod element;
pub mod enums;
pub mod evaluate;
pub mod facade;
pub mod hasher;
pub mod newtypes;
pub mod outcome;
pub mod parametric;
pub mod pipeline;
pub mod project;
pub mod regulatory;
pub mod rule_store;
pub mod rules;
pub mod search;
pub mod seed;
pub mod store;
pub mod templates;
pub mod version;

pub use artifacts::{ArtifactError, ReportSet, regenerate};
pub use audit::{AuditChain, AuditEntry, AuditError, AuditFilter};
pub use builders::{
    BeamBuilder, ColumnBuilder, DoorBuilder, ElementBuilder, GenericBuilder, SlabBuilder,
    WallBuilder, WindowBuilder,
};
pub use canonical::{CanonicalError, read_json, to_canonical_json, write_json_atomic,
    write_text_atomic};
pub use collaborators::{
    CollaboratorError, CostEstimator, CostLine, CostReport, GeometryValidator, UnitRateEstimator,
    ValidationCheck, ValidationReport, Validator,
};
pub use compliance::ComplianceEngine;
pub use domain::DomainRegistry;
pub use dynvalue::{DynMap, DynValue};
pub use element::{
    BoundingBox, Element, ElementMetadata, GeometryInfo, MaterialLayer, Psets, SpatialReference,
    flatten_psets,
};
pub use enums::{ChangeKind, CheckType, Intent, RuleStatus, Verdict};
pub use evaluate::{evaluate, evaluate_element, parse_fire_rating_hours, resolve_path, verdict};
pub use facade::{AecError, AecOs, AecOsOptions, ErrorKind};
pub use hasher::{HashError, hash_file, hash_folder, hash_string};
pub use newtypes::{CalendarDate, GlobalId, NewtypeError, SemVer, TemplateId};
pub use outcome::{Mutation, Warning, WarningKind};
pub use parametric::{ParametricSpec, ParseError, Parser, StubParser};
pub use pipeline::{GenerateInput, GenerateOutcome, PipelineError};
pub use project::{ProjectConfig, ProjectError};
pub use regulatory::{
    ImpactReport, RegulatoryError, RuleSetDiff, UpdateOutcome, diff as diff_rules,
    impact as regulatory_impact,
};
pub use rule_store::{ApplyCounts, RuleFilter, RuleStore, RuleStoreError, RuleUpdate};
pub use rules::{ComplianceReport, Rule, RuleResult};
pub use search::{SearchQuery, SearchResults, unified_search};
pub use store::{ElementFilter, ElementStore, ElementUpdate, NewElement, StoreError};
pub use templates::{
    RegistryEntry, TemplateError, TemplateLibrary, TemplateManifest, TemplateMeta, TemplateQuery,
    TemplateTags, TemplateUpdate,
};
pub use version::{LogEntry, VersionError, VersionLog};

/// Returns the current version of the aecos-core library.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version_string();
        let parts: Vec<&str> = v.split('.').collect();
        assert_eq!(parts.len(), 3, "version should have 3 parts: {v}");
        for part in parts {
            part.parse::<u32>().expect("each part should be a number");
        }
    }
}
