//! Implementation of `aecos regulatory` subcommands.
use std::path::Path;

use aecos_core::facade::AecOs;
use aecos_core::rules::Rule;

use crate::error::CliError;
use crate::format::print_json;

fn read_rules(path: &Path) -> Result<Vec<Rule>, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::BadInputFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| CliError::BadInputFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

pub fn diff(os: &AecOs, file: &Path) -> Result<(), CliError> {
    let proposed = read_rules(file)?;
    let diff = os.regulatory_diff(&proposed)?;
    print_json(&serde_json::json!({
        "summary": diff.summary(),
        "added": diff.added,
        "modified": diff.modified.iter().map(|(_, new)| new).collect::<Vec<_>>(),
        "removed": diff.removed,
        "unchanged": diff.unchanged.len(),
    }))
}

pub fn apply(os: &AecOs, file: &Path, code: &str, version: &str) -> Result<(), CliError> {
    let proposed = read_rules(file)?;
    let diff = os.regulatory_diff(&proposed)?;
    let mutation = os.apply_regulatory_update(&diff, code, version)?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&mutation.value)
}

pub fn impact(os: &AecOs, file: &Path) -> Result<(), CliError> {
    let proposed = read_rules(file)?;
    let diff = os.regulatory_diff(&proposed)?;
    let report = os.regulatory_impact(&diff)?;
    print_json(&report)
}
