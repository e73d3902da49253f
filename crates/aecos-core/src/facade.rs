/// `AecOs` — the single typed entry point.
///
/// The facade composes the element store, template library, compliance
/// engine, audit chain, version log, domain registry, and the collaborator
/// seams. Every mutating method follows the same discipline:
///
/// 1. validate inputs (`invalid_argument` on malformed arguments),
/// 2. perform the filesystem change through the owning subsystem,
/// 3. append one audit entry (action named after the method, `*_failed`
///    when the primary side effect failed),
/// 4. with auto-commit on, record one version commit scoped to exactly the
///    affected paths.
///
/// Secondary side-effect failures (audit after a durable write, commit
/// after a successful audit) never undo the mutation; they surface as
/// `partial_side_effect` warnings on the returned [`Mutation`].
///
/// The facade is not re-entrant; callers serialise access.
use std::fmt;
use std::path::{Path, PathBuf};

use crate::audit::{AuditChain, AuditEntry, AuditError, AuditFilter};
use crate::collaborators::{
    CollaboratorError, CostEstimator, CostReport, GeometryValidator, UnitRateEstimator,
    ValidationReport, Validator,
};
use crate::compliance::ComplianceEngine;
use crate::domain::DomainRegistry;
use crate::dynvalue::DynMap;
use crate::element::Element;
use crate::enums::ChangeKind;
use crate::hasher;
use crate::newtypes::{GlobalId, NewtypeError, TemplateId};
use crate::outcome::{Mutation, Warning};
use crate::parametric::{ParametricSpec, Parser, StubParser};
use crate::pipeline::{self, GenerateInput, GenerateOutcome, PipelineContext, PipelineError};
use crate::project::{ProjectConfig, ProjectError};
use crate::regulatory::{self, ImpactReport, RegulatoryError, RuleSetDiff, UpdateOutcome};
use crate::rule_store::{RuleStore, RuleStoreError};
use crate::rules::{ComplianceReport, Rule};
use crate::search::{SearchQuery, SearchResults, unified_search};
use crate::seed;
use crate::store::{ElementFilter, ElementStore, ElementUpdate, NewElement, StoreError};
use crate::templates::{
    RegistryEntry, REGISTRY_FILENAME, TemplateError, TemplateLibrary, TemplateMeta, TemplateQuery,
};
use crate::version::{LogEntry, VersionError, VersionLog};
use crate::{artifacts, canonical};

/// Subdirectory under the project root holding the SQLite databases.
const STATE_DIR: &str = ".aecos";

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// The facade-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed inputs: empty id, unknown check type, non-JSON rule.
    InvalidArgument,
    /// The addressed object does not exist.
    NotFound,
    /// A uniqueness violation or conflicting concurrent change.
    Conflict,
    /// Filesystem or database failure.
    Io,
    /// Audit chain verification failed, or on-disk state is inconsistent.
    Integrity,
    /// An optional collaborator is unavailable.
    Dependency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Io => "io",
            Self::Integrity => "integrity",
            Self::Dependency => "dependency",
        };
        f.write_str(s)
    }
}

/// A facade error: the kind, the subject (id or path), and a short message.
#[derive(Debug)]
pub struct AecError {
    kind: ErrorKind,
    subject: String,
    message: String,
}

impl AecError {
    pub fn new(kind: ErrorKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, subject, message)
    }

    pub fn not_found(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        let message = format!("{subject} does not exist");
        Self::new(ErrorKind::NotFound, subject, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Display for AecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subject.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{} ({}): {}", self.kind, self.subject, self.message)
        }
    }
}

impl std::error::Error for AecError {}

impl From<StoreError> for AecError {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::InvalidId(_) => ErrorKind::InvalidArgument,
            StoreError::Integrity { .. } => ErrorKind::Integrity,
            StoreError::Io { .. } | StoreError::Encoding { .. } | StoreError::Timeout => {
                ErrorKind::Io
            }
        };
        let subject = match &e {
            StoreError::NotFound { global_id } => global_id.clone(),
            StoreError::Integrity { folder, .. } => folder.display().to_string(),
            StoreError::Io { path, .. } | StoreError::Encoding { path, .. } => {
                path.display().to_string()
            }
            StoreError::InvalidId(_) | StoreError::Timeout => String::new(),
        };
        Self::new(kind, subject, e.to_string())
    }
}

impl From<RuleStoreError> for AecError {
    fn from(e: RuleStoreError) -> Self {
        let kind = match &e {
            RuleStoreError::Duplicate { .. } => ErrorKind::Conflict,
            RuleStoreError::Sqlite(_) | RuleStoreError::Encoding { .. } => ErrorKind::Io,
        };
        Self::new(kind, String::new(), e.to_string())
    }
}

impl From<AuditError> for AecError {
    fn from(e: AuditError) -> Self {
        Self::new(ErrorKind::Io, String::new(), e.to_string())
    }
}

impl From<VersionError> for AecError {
    fn from(e: VersionError) -> Self {
        let kind = match &e {
            VersionError::MergeConflict { .. } => ErrorKind::Conflict,
            VersionError::Git(_) | VersionError::Io { .. } => ErrorKind::Io,
        };
        Self::new(kind, String::new(), e.to_string())
    }
}

impl From<TemplateError> for AecError {
    fn from(e: TemplateError) -> Self {
        let kind = match &e {
            TemplateError::NotFound { .. } | TemplateError::SourceMissing { .. } => {
                ErrorKind::NotFound
            }
            TemplateError::InvalidId(_) => ErrorKind::InvalidArgument,
            TemplateError::Io { .. } | TemplateError::Encoding { .. } => ErrorKind::Io,
        };
        let subject = match &e {
            TemplateError::NotFound { template_id } => template_id.clone(),
            TemplateError::SourceMissing { path } => path.display().to_string(),
            TemplateError::InvalidId(_)
            | TemplateError::Io { .. }
            | TemplateError::Encoding { .. } => String::new(),
        };
        Self::new(kind, subject, e.to_string())
    }
}

impl From<RegulatoryError> for AecError {
    fn from(e: RegulatoryError) -> Self {
        match e {
            RegulatoryError::Store(inner) => inner.into(),
            RegulatoryError::Backup { .. } | RegulatoryError::RestoreFailed { .. } => {
                Self::new(ErrorKind::Io, String::new(), e.to_string())
            }
        }
    }
}

impl From<PipelineError> for AecError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Persist(inner) => inner.into(),
        }
    }
}

impl From<CollaboratorError> for AecError {
    fn from(e: CollaboratorError) -> Self {
        Self::new(ErrorKind::Dependency, String::new(), e.to_string())
    }
}

impl From<NewtypeError> for AecError {
    fn from(e: NewtypeError) -> Self {
        Self::new(ErrorKind::InvalidArgument, String::new(), e.to_string())
    }
}

impl From<ProjectError> for AecError {
    fn from(e: ProjectError) -> Self {
        Self::new(ErrorKind::Io, String::new(), e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for [`AecOs::open_with`].
#[derive(Debug, Clone)]
pub struct AecOsOptions {
    /// Record one version commit per successful mutation.
    pub auto_commit: bool,
    /// The `user` recorded on audit entries.
    pub user: String,
    /// Project name used when creating a fresh `aecos_project.json`.
    pub project_name: String,
}

impl Default for AecOsOptions {
    fn default() -> Self {
        Self {
            auto_commit: true,
            user: String::new(),
            project_name: "AEC OS Project".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// AecOs
// ---------------------------------------------------------------------------

/// The public interface of the system.
pub struct AecOs {
    project_root: PathBuf,
    config: ProjectConfig,
    auto_commit: bool,
    user: String,
    store: ElementStore,
    library: TemplateLibrary,
    compliance: ComplianceEngine,
    audit: AuditChain,
    version: VersionLog,
    registry: DomainRegistry,
    parser: Box<dyn Parser>,
    validator: Box<dyn Validator>,
    estimator: Box<dyn CostEstimator>,
}

impl fmt::Debug for AecOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AecOs")
            .field("project_root", &self.project_root)
            .field("auto_commit", &self.auto_commit)
            .field("user", &self.user)
            .finish()
    }
}

impl AecOs {
    /// Opens (or initialises) a project at `root` with default options.
    pub fn open(root: &Path) -> Result<Self, AecError> {
        Self::open_with(root, AecOsOptions::default())
    }

    /// Opens (or initialises) a project: git repository, project config,
    /// element and template directories, seeded rule database, and audit
    /// chain.
    pub fn open_with(root: &Path, options: AecOsOptions) -> Result<Self, AecError> {
        std::fs::create_dir_all(root).map_err(|source| {
            AecError::new(
                ErrorKind::Io,
                root.display().to_string(),
                format!("could not create project root: {source}"),
            )
        })?;
        // Resolve once so every derived path (and git pathspec) is absolute.
        let root = &root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let version = VersionLog::open_or_init(root)?;

        let config_existed = root.join(crate::project::CONFIG_FILENAME).is_file();
        let config = ProjectConfig::load_or_default(root, &options.project_name);
        if !config_existed {
            config.save(root)?;
            if options.auto_commit {
                // Best effort; a dirty config file is visible in status().
                if let Err(e) = version.commit_scope(
                    &[root.join(crate::project::CONFIG_FILENAME)],
                    "chore: add project config",
                ) {
                    tracing::warn!(error = %e, "could not commit project config");
                }
            }
        }

        let store = ElementStore::open(&config.elements_path(root))?;
        let library = TemplateLibrary::open(&config.templates_path(root))?;

        let state_dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir).map_err(|source| {
            AecError::new(
                ErrorKind::Io,
                state_dir.display().to_string(),
                format!("could not create state directory: {source}"),
            )
        })?;
        let rule_store = RuleStore::open(&state_dir.join("rules.db"))?;
        rule_store.seed_if_empty(&seed::builtin_rules())?;
        let audit = AuditChain::open(&state_dir.join("audit.db"))?;

        let registry = DomainRegistry::with_defaults();
        let estimator =
            UnitRateEstimator::new(registry.pricing().clone(), registry.regional_factors().clone());

        Ok(Self {
            project_root: root.to_path_buf(),
            config,
            auto_commit: options.auto_commit,
            user: options.user,
            store,
            library,
            compliance: ComplianceEngine::new(rule_store),
            audit,
            version,
            registry,
            parser: Box::new(StubParser),
            validator: Box::new(GeometryValidator),
            estimator: Box::new(estimator),
        })
    }

    // -- Wiring -------------------------------------------------------------

    /// Replaces the parser collaborator.
    pub fn set_parser(&mut self, parser: Box<dyn Parser>) {
        self.parser = parser;
    }

    /// Replaces the validator collaborator.
    pub fn set_validator(&mut self, validator: Box<dyn Validator>) {
        self.validator = validator;
    }

    /// Replaces the cost estimator collaborator.
    pub fn set_estimator(&mut self, estimator: Box<dyn CostEstimator>) {
        self.estimator = estimator;
    }

    /// The audit `user` recorded on subsequent mutations.
    pub fn set_user(&mut self, user: &str) {
        self.user = user.to_owned();
    }

    /// Mutable access for domain plugins registering builders and pricing.
    pub fn registry_mut(&mut self) -> &mut DomainRegistry {
        &mut self.registry
    }

    /// The project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Read access to the compliance engine and its rule store.
    pub fn compliance(&self) -> &ComplianceEngine {
        &self.compliance
    }

    // -- Element CRUD -------------------------------------------------------

    /// Creates a new element folder from scratch.
    pub fn create_element(&self, new: NewElement) -> Result<Mutation<Element>, AecError> {
        if new.ifc_class.trim().is_empty() {
            return Err(AecError::invalid_argument(
                "ifc_class",
                "ifc_class must not be empty",
            ));
        }

        let element = match self.store.create(new) {
            Ok(element) => element,
            Err(e) => {
                self.audit_failure("create_element", "");
                return Err(e.into());
            }
        };
        let folder = self.store.folder(&element.global_id);

        let mut mutation = Mutation::new(element);
        let after = self.hash_or_warn(&folder, &mut mutation.warnings);
        mutation.audit_id = self.audit_append(
            "create_element",
            mutation.value.global_id.as_str(),
            None,
            after.as_deref(),
            &mut mutation.warnings,
        );
        let message = format!(
            "{}: create element {} ({})",
            ChangeKind::Feat,
            mutation.value.name.as_deref().unwrap_or("unnamed"),
            mutation.value.ifc_class
        );
        mutation.commit = self.commit_paths(&[folder], &message, &mut mutation.warnings);
        Ok(mutation)
    }

    /// Loads an element by its GlobalId.
    pub fn get_element(&self, element_id: &str) -> Result<Option<Element>, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        Ok(self.store.get(&global_id)?)
    }

    /// Applies a typed update to an element.
    pub fn update_element(
        &self,
        element_id: &str,
        update: &ElementUpdate,
    ) -> Result<Mutation<Element>, AecError> {
        if update.is_empty() {
            return Err(AecError::invalid_argument(
                element_id,
                "update carries no changes",
            ));
        }
        let global_id = GlobalId::try_from(element_id)?;
        let folder = self.store.folder(&global_id);
        let before = hasher::hash_folder(&folder).ok();

        let element = match self.store.update(&global_id, update) {
            Ok(element) => element,
            Err(e) => {
                self.audit_failure("update_element", element_id);
                return Err(e.into());
            }
        };

        let mut mutation = Mutation::new(element);
        let after = self.hash_or_warn(&folder, &mut mutation.warnings);
        mutation.audit_id = self.audit_append(
            "update_element",
            global_id.as_str(),
            before.as_deref(),
            after.as_deref(),
            &mut mutation.warnings,
        );
        let message = format!("{}: update element {global_id}", ChangeKind::Fix);
        mutation.commit = self.commit_paths(&[folder], &message, &mut mutation.warnings);
        Ok(mutation)
    }

    /// Removes an element folder; `value` is `false` when it was absent
    /// (in which case nothing is audited or committed).
    pub fn delete_element(&self, element_id: &str) -> Result<Mutation<bool>, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        let folder = self.store.folder(&global_id);
        let before = hasher::hash_folder(&folder).ok();

        let deleted = match self.store.delete(&global_id) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.audit_failure("delete_element", element_id);
                return Err(e.into());
            }
        };
        if !deleted {
            return Ok(Mutation::new(false));
        }

        let mut mutation = Mutation::new(true);
        mutation.audit_id = self.audit_append(
            "delete_element",
            global_id.as_str(),
            before.as_deref(),
            None,
            &mut mutation.warnings,
        );
        let message = format!("{}: delete element {global_id}", ChangeKind::Chore);
        mutation.commit = self.commit_paths(&[folder], &message, &mut mutation.warnings);
        Ok(mutation)
    }

    /// Lists elements with optional filters.
    pub fn list_elements(&self, filter: &ElementFilter) -> Result<Vec<Element>, AecError> {
        Ok(self.store.list(filter, None)?)
    }

    // -- Templates ----------------------------------------------------------

    /// Adds a template to the library from an existing element folder.
    pub fn add_template(
        &mut self,
        template_id: &str,
        source_folder: &Path,
        meta: TemplateMeta,
    ) -> Result<Mutation<PathBuf>, AecError> {
        let template_id = TemplateId::try_from(template_id)?;
        let dest = match self.library.add(&template_id, source_folder, meta) {
            Ok(dest) => dest,
            Err(e) => {
                self.audit_failure("add_template", template_id.as_str());
                return Err(e.into());
            }
        };
        Ok(self.template_mutation(dest, "add_template", &template_id))
    }

    /// Resolves a template folder by id.
    pub fn get_template(&self, template_id: &str) -> Option<PathBuf> {
        self.library.get(template_id)
    }

    /// Removes a template; `value` is `false` when the id was unknown.
    pub fn remove_template(&mut self, template_id: &str) -> Result<Mutation<bool>, AecError> {
        let folder = self.library.get(template_id);
        let before = folder.as_deref().and_then(|f| hasher::hash_folder(f).ok());
        let removed = match self.library.remove(template_id) {
            Ok(removed) => removed,
            Err(e) => {
                self.audit_failure("remove_template", template_id);
                return Err(e.into());
            }
        };
        if !removed {
            return Ok(Mutation::new(false));
        }

        let mut mutation = Mutation::new(true);
        mutation.audit_id = self.audit_append(
            "remove_template",
            template_id,
            before.as_deref(),
            None,
            &mut mutation.warnings,
        );
        let mut paths = vec![self.library.root().join(REGISTRY_FILENAME)];
        if let Some(folder) = folder {
            paths.push(folder);
        }
        let message = format!("{}: remove template {template_id}", ChangeKind::Chore);
        mutation.commit = self.commit_paths(&paths, &message, &mut mutation.warnings);
        Ok(mutation)
    }

    /// Searches the template library.
    pub fn search_templates(&self, query: &TemplateQuery) -> Vec<RegistryEntry> {
        self.library.search(query)
    }

    /// Promotes an element to a library template.
    pub fn promote_to_template(
        &mut self,
        element_id: &str,
        template_id: Option<&str>,
        meta: TemplateMeta,
    ) -> Result<Mutation<PathBuf>, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        let folder = self.store.folder(&global_id);
        if !folder.is_dir() {
            return Err(AecError::not_found(element_id));
        }
        let template_id = match template_id {
            Some(id) => TemplateId::try_from(id)?,
            None => TemplateId::from(&global_id),
        };

        let dest = match self.library.promote(&folder, Some(template_id.clone()), meta) {
            Ok(dest) => dest,
            Err(e) => {
                self.audit_failure("promote_to_template", template_id.as_str());
                return Err(e.into());
            }
        };
        Ok(self.template_mutation(dest, "promote_to_template", &template_id))
    }

    /// Promotes several elements in one sweep; fails on the first error.
    pub fn bulk_promote(
        &mut self,
        element_ids: &[String],
        meta: &TemplateMeta,
    ) -> Result<Vec<Mutation<PathBuf>>, AecError> {
        let mut out = Vec::with_capacity(element_ids.len());
        for element_id in element_ids {
            out.push(self.promote_to_template(element_id, None, meta.clone())?);
        }
        Ok(out)
    }

    fn template_mutation(
        &self,
        dest: PathBuf,
        action: &str,
        template_id: &TemplateId,
    ) -> Mutation<PathBuf> {
        let mut mutation = Mutation::new(dest.clone());
        let after = self.hash_or_warn(&dest, &mut mutation.warnings);
        mutation.audit_id = self.audit_append(
            action,
            template_id.as_str(),
            None,
            after.as_deref(),
            &mut mutation.warnings,
        );
        let message = format!("{}: add template {template_id}", ChangeKind::Feat);
        let paths = vec![dest, self.library.root().join(REGISTRY_FILENAME)];
        mutation.commit = self.commit_paths(&paths, &message, &mut mutation.warnings);
        mutation
    }

    // -- Unified search -----------------------------------------------------

    /// Searches project elements and library templates with one query.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResults, AecError> {
        Ok(unified_search(&self.store, &self.library, query)?)
    }

    /// Full-text search over rule titles and citations.
    pub fn search_rules(&self, query: &str) -> Result<Vec<Rule>, AecError> {
        Ok(self.compliance.store().search(query)?)
    }

    // -- Parsing and compliance ---------------------------------------------

    /// Parses a natural-language description into a spec.
    ///
    /// Parser failures degrade to the lowest-confidence stub; parsing never
    /// crashes the caller.
    pub fn parse(&self, text: &str, context: Option<&DynMap>) -> ParametricSpec {
        match self.parser.parse(text, context) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(error = %e, "parser failed; using stub spec");
                StubParser::stub_spec(text)
            }
        }
    }

    /// Checks a durable element against the rule database.
    pub fn check_compliance(
        &self,
        element_id: &str,
        region: Option<&str>,
    ) -> Result<ComplianceReport, AecError> {
        let element = self
            .get_element(element_id)?
            .ok_or_else(|| AecError::not_found(element_id))?;
        Ok(self.compliance.check_element(&element, region)?)
    }

    /// Checks a spec (no element required yet).
    pub fn check_compliance_spec(
        &self,
        spec: &ParametricSpec,
        region: Option<&str>,
    ) -> Result<ComplianceReport, AecError> {
        Ok(self.compliance.check_spec(spec, region)?)
    }

    // -- Generate pipeline --------------------------------------------------

    /// Runs the full generate pipeline:
    /// parse → comply → build → persist → validate → cost → regenerate →
    /// commit → audit.
    pub fn generate(
        &self,
        input: GenerateInput,
        parse_context: Option<&DynMap>,
        region: Option<&str>,
    ) -> Result<Mutation<GenerateOutcome>, AecError> {
        let ctx = PipelineContext {
            parser: self.parser.as_ref(),
            compliance: &self.compliance,
            registry: &self.registry,
            store: &self.store,
            validator: self.validator.as_ref(),
            estimator: self.estimator.as_ref(),
            version: self.auto_commit.then_some(&self.version),
            audit: &self.audit,
            user: &self.user,
        };
        pipeline::run(&ctx, input, parse_context, region).map_err(|e| {
            self.audit_failure("generate", "");
            e.into()
        })
    }

    /// Generates a new element from a template with property overrides
    /// applied into the `Dimensions` pset.
    pub fn generate_from_template(
        &mut self,
        template_id: &str,
        overrides: &DynMap,
    ) -> Result<Mutation<GenerateOutcome>, AecError> {
        let template_folder = self
            .library
            .get(template_id)
            .ok_or_else(|| AecError::not_found(template_id))?;

        let metadata: crate::element::ElementMetadata =
            canonical::read_json(&template_folder.join("metadata.json")).map_err(|e| {
                AecError::new(ErrorKind::Io, template_id, e.to_string())
            })?;
        let mut psets: crate::element::Psets =
            canonical::read_json(&template_folder.join("properties/psets.json"))
                .unwrap_or_default();
        let materials: Vec<crate::element::MaterialLayer> =
            canonical::read_json(&template_folder.join("materials/materials.json"))
                .unwrap_or_default();

        if !overrides.is_empty() {
            let dims = psets.entry("Dimensions".to_owned()).or_default();
            for (key, value) in overrides {
                dims.insert(key.clone(), value.clone());
            }
        }

        // Rebuild geometry from the merged dimensional properties.
        let mut merged = DynMap::new();
        for props in psets.values() {
            for (key, value) in props {
                merged.insert(key.clone(), value.clone());
            }
        }
        let builder = self.registry.builder_for(&metadata.ifc_class);
        let geometry = builder.geometry(&merged);
        let spatial = builder.spatial();

        let name = format!(
            "{}_modified",
            metadata.name.as_deref().unwrap_or(&metadata.ifc_class)
        );
        let element = match self.store.create(NewElement {
            ifc_class: metadata.ifc_class.clone(),
            name: Some(name),
            properties: psets,
            materials,
            geometry,
            spatial,
            global_id: None,
        }) {
            Ok(element) => element,
            Err(e) => {
                self.audit_failure("generate_from_template", template_id);
                return Err(e.into());
            }
        };
        let folder = self.store.folder(&element.global_id);

        let mut mutation = Mutation::new(GenerateOutcome {
            element,
            folder: folder.clone(),
            compliance: ComplianceReport::empty("", &metadata.ifc_class, ""),
            validation: None,
            cost: None,
        });

        match self.validator.validate(&folder, &[]) {
            Ok(report) => mutation.value.validation = Some(report),
            Err(e) => mutation
                .warnings
                .push(Warning::degraded(format!("validation stage failed: {e}"))),
        }
        match self.estimator.estimate(&folder, None) {
            Ok(report) => mutation.value.cost = Some(report),
            Err(e) => mutation
                .warnings
                .push(Warning::degraded(format!("cost stage failed: {e}"))),
        }
        match self
            .compliance
            .check_element(&mutation.value.element, None)
        {
            Ok(report) => mutation.value.compliance = report,
            Err(e) => mutation
                .warnings
                .push(Warning::degraded(format!("compliance check failed: {e}"))),
        }

        let reports = artifacts::ReportSet {
            compliance: Some(&mutation.value.compliance),
            validation: mutation.value.validation.as_ref(),
            cost: mutation.value.cost.as_ref(),
        };
        if let Err(e) = artifacts::regenerate(&folder, &reports) {
            mutation
                .warnings
                .push(Warning::degraded(format!("artifact regeneration failed: {e}")));
        }

        let after = self.hash_or_warn(&folder, &mut mutation.warnings);
        mutation.audit_id = self.audit_append(
            "generate_from_template",
            mutation.value.element.global_id.as_str(),
            None,
            after.as_deref(),
            &mut mutation.warnings,
        );
        let message = format!(
            "{}: generate from template {template_id} ({})",
            ChangeKind::Feat,
            mutation.value.element.global_id.folder_name()
        );
        mutation.commit = self.commit_paths(&[folder], &message, &mut mutation.warnings);
        Ok(mutation)
    }

    // -- Validation and cost ------------------------------------------------

    /// Validates an element folder (optionally against context elements for
    /// bounding-box clash checks) and refreshes `VALIDATION.md`.
    pub fn validate(
        &self,
        element_id: &str,
        context_ids: &[String],
    ) -> Result<ValidationReport, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        let folder = self.store.folder(&global_id);
        if !folder.is_dir() {
            return Err(AecError::not_found(element_id));
        }
        let mut context = Vec::with_capacity(context_ids.len());
        for id in context_ids {
            context.push(self.store.folder(&GlobalId::try_from(id.as_str())?));
        }

        let report = self.validator.validate(&folder, &context)?;
        let reports = artifacts::ReportSet {
            compliance: None,
            validation: Some(&report),
            cost: None,
        };
        if let Err(e) = artifacts::regenerate(&folder, &reports) {
            tracing::warn!(error = %e, "could not refresh VALIDATION.md");
        }
        Ok(report)
    }

    /// Estimates cost and schedule for an element and refreshes `COST.md`
    /// and `SCHEDULE.md`.
    pub fn estimate_cost(
        &self,
        element_id: &str,
        region: Option<&str>,
    ) -> Result<CostReport, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        let folder = self.store.folder(&global_id);
        if !folder.is_dir() {
            return Err(AecError::not_found(element_id));
        }

        let report = self.estimator.estimate(&folder, region)?;
        let reports = artifacts::ReportSet {
            compliance: None,
            validation: None,
            cost: Some(&report),
        };
        if let Err(e) = artifacts::regenerate(&folder, &reports) {
            tracing::warn!(error = %e, "could not refresh COST.md");
        }
        Ok(report)
    }

    // -- Version log --------------------------------------------------------

    /// Manually commits every pending change; returns the short token, or
    /// an empty string when clean.
    pub fn commit(&self, message: &str) -> Result<String, AecError> {
        Ok(self.version.commit_all(message)?)
    }

    /// Porcelain-style status of the working tree.
    pub fn status(&self) -> Result<String, AecError> {
        Ok(self.version.status()?)
    }

    /// Whether the working tree equals HEAD.
    pub fn is_clean(&self) -> Result<bool, AecError> {
        Ok(self.version.is_clean()?)
    }

    /// The scoped commit history of an element folder, newest first.
    pub fn history(&self, element_id: &str, limit: usize) -> Result<Vec<LogEntry>, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        Ok(self.version.history(&self.store.folder(&global_id), limit)?)
    }

    /// Textual diff of an element folder between two revisions.
    pub fn diff_element(
        &self,
        element_id: &str,
        from: &str,
        to: &str,
    ) -> Result<String, AecError> {
        let global_id = GlobalId::try_from(element_id)?;
        Ok(self.version.diff(&self.store.folder(&global_id), from, to)?)
    }

    /// Creates a branch and switches to it. Branch names are opaque.
    pub fn create_branch(&self, name: &str, base: Option<&str>) -> Result<(), AecError> {
        Ok(self.version.branch(name, base)?)
    }

    /// Switches to an existing branch.
    pub fn switch_branch(&self, name: &str) -> Result<(), AecError> {
        Ok(self.version.switch(name)?)
    }

    /// Merges `source` into `target` (or the current branch).
    pub fn merge_branch(
        &self,
        source: &str,
        target: Option<&str>,
        message: Option<&str>,
    ) -> Result<String, AecError> {
        Ok(self.version.merge(source, target, message)?)
    }

    /// Local branch names.
    pub fn list_branches(&self) -> Result<Vec<String>, AecError> {
        Ok(self.version.list_branches()?)
    }

    /// Deletes a local branch.
    pub fn delete_branch(&self, name: &str) -> Result<(), AecError> {
        Ok(self.version.delete_branch(name)?)
    }

    // -- Audit --------------------------------------------------------------

    /// Queries the audit log with optional filters.
    pub fn get_audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AecError> {
        Ok(self.audit.query(filter)?)
    }

    /// Verifies the audit hash chain.
    pub fn verify_audit_chain(&self) -> Result<bool, AecError> {
        Ok(self.audit.verify_chain()?)
    }

    /// Exports the audit trail as an offline-verifiable JSON array.
    pub fn export_audit_log(&self) -> Result<String, AecError> {
        Ok(self.audit.export_json()?)
    }

    // -- Regulatory updates -------------------------------------------------

    /// Diffs the current rule set against a proposed one.
    pub fn regulatory_diff(&self, proposed: &[Rule]) -> Result<RuleSetDiff, AecError> {
        let current = self.compliance.store().all()?;
        Ok(regulatory::diff(&current, proposed))
    }

    /// Atomically applies a regulatory change set (backup, batch, tag) and
    /// audits the application.
    pub fn apply_regulatory_update(
        &self,
        diff: &RuleSetDiff,
        code_name: &str,
        version: &str,
    ) -> Result<Mutation<UpdateOutcome>, AecError> {
        if code_name.trim().is_empty() || version.trim().is_empty() {
            return Err(AecError::invalid_argument(
                code_name,
                "code_name and version must not be empty",
            ));
        }

        let outcome = match regulatory::apply(
            self.compliance.store(),
            diff,
            code_name,
            version,
            &self.project_root,
            Some(&self.version),
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.audit_failure("apply_regulatory_update", code_name);
                return Err(e.into());
            }
        };

        let mut mutation = Mutation::new(outcome);
        mutation.warnings = mutation.value.warnings.clone();
        mutation.audit_id = self.audit_append(
            "apply_regulatory_update",
            code_name,
            None,
            None,
            &mut mutation.warnings,
        );
        Ok(mutation)
    }

    /// Computes which elements and templates a change set touches.
    pub fn regulatory_impact(&self, diff: &RuleSetDiff) -> Result<ImpactReport, AecError> {
        Ok(regulatory::impact(
            diff,
            self.store.elements_dir(),
            Some(self.library.root()),
            None,
        )?)
    }

    // -- Internals ----------------------------------------------------------

    fn hash_or_warn(&self, folder: &Path, warnings: &mut Vec<Warning>) -> Option<String> {
        match hasher::hash_folder(folder) {
            Ok(digest) => Some(digest),
            Err(e) => {
                warnings.push(Warning::degraded(format!("folder hashing failed: {e}")));
                None
            }
        }
    }

    /// Appends the audit record for a successful mutation; failure is a
    /// `partial_side_effect` warning, never an error.
    fn audit_append(
        &self,
        action: &str,
        resource: &str,
        before: Option<&str>,
        after: Option<&str>,
        warnings: &mut Vec<Warning>,
    ) -> Option<i64> {
        match self.audit.append(&self.user, action, resource, before, after) {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                tracing::warn!(action, resource, error = %e, "audit append failed");
                warnings.push(Warning::partial_side_effect(format!(
                    "audit append failed for {action}: {e}"
                )));
                None
            }
        }
    }

    /// Best-effort record of a failed primary mutation.
    fn audit_failure(&self, action: &str, resource: &str) {
        let failed = format!("{action}_failed");
        if let Err(e) = self.audit.append(&self.user, &failed, resource, None, None) {
            tracing::warn!(action = %failed, error = %e, "could not record failure audit entry");
        }
    }

    /// Commits exactly `paths` when auto-commit is on; failure is a
    /// `partial_side_effect` warning.
    fn commit_paths(
        &self,
        paths: &[PathBuf],
        message: &str,
        warnings: &mut Vec<Warning>,
    ) -> Option<String> {
        if !self.auto_commit {
            return None;
        }
        match self.version.commit_scope(paths, message) {
            Ok(token) if token.is_empty() => None,
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(message, error = %e, "auto-commit failed");
                warnings.push(Warning::partial_side_effect(format!(
                    "commit failed: {e}"
                )));
                None
            }
        }
    }
}
