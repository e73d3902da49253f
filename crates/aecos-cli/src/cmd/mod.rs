/// One module per command, mirroring the subcommand tree.
pub mod audit;
pub mod check;
pub mod element;
pub mod generate;
pub mod history;
pub mod init;
pub mod regulatory;
pub mod search;
pub mod status;
pub mod template;

use std::path::Path;

use aecos_core::facade::{AecOs, AecOsOptions};

use crate::error::CliError;

/// Opens the facade for a project directory with the global flags applied.
pub fn open_facade(project: &Path, user: &str, no_commit: bool) -> Result<AecOs, CliError> {
    let os = AecOs::open_with(
        project,
        AecOsOptions {
            auto_commit: !no_commit,
            user: user.to_owned(),
            ..AecOsOptions::default()
        },
    )?;
    Ok(os)
}
