/// Argument definitions for the `aecos` binary.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A file-system-backed design object manager for AEC projects.
#[derive(Debug, Parser)]
#[command(name = "aecos", version, about)]
pub struct Cli {
    /// Project root directory.
    #[arg(long, global = true, default_value = ".", env = "AECOS_PROJECT")]
    pub project: PathBuf,

    /// Audit user recorded on mutating operations.
    #[arg(long, global = true, default_value = "", env = "AECOS_USER")]
    pub user: String,

    /// Disable automatic per-operation commits.
    #[arg(long, global = true)]
    pub no_commit: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialise a project (git repository, config, directories).
    Init {
        /// Project name written to the config.
        #[arg(long, default_value = "AEC OS Project")]
        name: String,
    },

    /// Create an element from explicit attributes.
    Create {
        /// IFC class, e.g. IfcWall.
        #[arg(long = "class")]
        ifc_class: String,
        /// Display name.
        #[arg(long)]
        name: Option<String>,
        /// Material names (repeatable).
        #[arg(long = "material")]
        materials: Vec<String>,
    },

    /// Print one element as JSON.
    Get {
        element_id: String,
    },

    /// List elements, optionally filtered.
    List {
        #[arg(long = "class")]
        ifc_class: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        material: Option<String>,
    },

    /// Update an element's name and/or materials.
    Update {
        element_id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replacement material names (repeatable; replaces the whole list).
        #[arg(long = "material")]
        materials: Vec<String>,
    },

    /// Delete an element folder.
    Delete {
        element_id: String,
    },

    /// Run the generate pipeline from text or a spec file.
    Generate {
        /// Natural-language description (handed to the parser).
        #[arg(long, conflicts_with = "spec_file")]
        text: Option<String>,
        /// Path to a ParametricSpec JSON file.
        #[arg(long = "spec")]
        spec_file: Option<PathBuf>,
        /// Region code for rule filtering.
        #[arg(long)]
        region: Option<String>,
    },

    /// Check an element against the rule database.
    Check {
        element_id: String,
        #[arg(long)]
        region: Option<String>,
        /// Print the Markdown report instead of JSON.
        #[arg(long)]
        markdown: bool,
    },

    /// Search elements and templates with one query.
    Search {
        #[arg(long = "class")]
        ifc_class: Option<String>,
        #[arg(long)]
        material: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        keyword: Option<String>,
    },

    /// Template library operations.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Audit chain operations.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Regulatory update operations.
    Regulatory {
        #[command(subcommand)]
        action: RegulatoryAction,
    },

    /// Scoped commit history for one element.
    History {
        element_id: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Working-tree status (porcelain style).
    Status,
}

#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    /// Promote an element to a library template.
    Promote {
        element_id: String,
        /// Explicit template id (defaults to the element's GlobalId).
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List registered templates.
    List,
    /// Remove a template.
    Remove {
        template_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuditAction {
    /// Print audit entries, optionally filtered.
    Log {
        #[arg(long)]
        resource: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        action: Option<String>,
    },
    /// Verify the hash chain; exits 1 when broken.
    Verify,
    /// Export the full trail as JSON.
    Export,
}

#[derive(Debug, Subcommand)]
pub enum RegulatoryAction {
    /// Diff the current rule set against a proposed JSON rule file.
    Diff {
        /// Path to a JSON array of rules.
        file: PathBuf,
    },
    /// Apply a proposed rule file (backup, batch, tag).
    Apply {
        file: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        version: String,
    },
    /// Report which elements/templates a proposed rule file touches.
    Impact {
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests;
