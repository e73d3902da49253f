//! Implementation of `aecos init`.
//!
//! Initialises the project (git repository, `aecos_project.json`, element
//! and template directories, seeded rule database) and prints the config.
//!
//! Exit codes: 0 on success, 1 when the directory cannot be initialised.
use std::path::Path;

use aecos_core::facade::{AecOs, AecOsOptions};

use crate::error::CliError;
use crate::format::print_json;

pub fn run(project: &Path, name: &str, user: &str, no_commit: bool) -> Result<(), CliError> {
    let os = AecOs::open_with(
        project,
        AecOsOptions {
            auto_commit: !no_commit,
            user: user.to_owned(),
            project_name: name.to_owned(),
        },
    )?;
    print_json(os.config())
}
