/// Project configuration (`aecos_project.json`) and project initialisation.
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canonical;

/// The project config file name at the project root.
pub const CONFIG_FILENAME: &str = "aecos_project.json";

/// `aecos_project.json`: names the project and its element/template
/// directories (relative to the project root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,
    #[serde(default = "default_elements_dir")]
    pub elements_dir: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

fn default_elements_dir() -> String {
    "elements".to_owned()
}

fn default_templates_dir() -> String {
    "templates".to_owned()
}

impl ProjectConfig {
    /// A fresh config for a new project.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: "0.1.0".to_owned(),
            elements_dir: default_elements_dir(),
            templates_dir: default_templates_dir(),
        }
    }

    /// Loads the config from `<root>/aecos_project.json`.
    pub fn load(root: &Path) -> Result<Self, ProjectError> {
        canonical::read_json(&root.join(CONFIG_FILENAME)).map_err(|e| ProjectError::Config {
            path: root.join(CONFIG_FILENAME),
            detail: e.to_string(),
        })
    }

    /// Loads the config, falling back to defaults (with a warning) when the
    /// file is absent or unreadable.
    pub fn load_or_default(root: &Path, default_name: &str) -> Self {
        match Self::load(root) {
            Ok(config) => config,
            Err(e) => {
                if root.join(CONFIG_FILENAME).exists() {
                    tracing::warn!(error = %e, "unreadable project config; using defaults");
                }
                Self::new(default_name)
            }
        }
    }

    /// Atomically writes the config to `<root>/aecos_project.json`.
    pub fn save(&self, root: &Path) -> Result<(), ProjectError> {
        canonical::write_json_atomic(&root.join(CONFIG_FILENAME), self).map_err(|e| {
            ProjectError::Config {
                path: root.join(CONFIG_FILENAME),
                detail: e.to_string(),
            }
        })
    }

    /// Absolute elements directory for a project root.
    pub fn elements_path(&self, root: &Path) -> PathBuf {
        root.join(&self.elements_dir)
    }

    /// Absolute templates directory for a project root.
    pub fn templates_path(&self, root: &Path) -> PathBuf {
        root.join(&self.templates_dir)
    }
}

/// Errors produced by project configuration handling.
#[derive(Debug)]
pub enum ProjectError {
    Config { path: PathBuf, detail: String },
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { path, detail } => {
                write!(f, "project config error at {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for ProjectError {}
