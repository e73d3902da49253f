//! Implementation of `aecos check`.
use aecos_core::facade::AecOs;

use crate::error::CliError;
use crate::format::{print_json, print_text};

pub fn run(
    os: &AecOs,
    element_id: &str,
    region: Option<&str>,
    markdown: bool,
) -> Result<(), CliError> {
    let report = os.check_compliance(element_id, region)?;
    if markdown {
        print_text(&report.to_markdown());
        return Ok(());
    }
    print_json(&report)
}
