//! Implementation of `aecos history`.
use aecos_core::facade::AecOs;

use crate::error::CliError;
use crate::format::print_json;

pub fn run(os: &AecOs, element_id: &str, limit: usize) -> Result<(), CliError> {
    let entries = os.history(element_id, limit)?;
    print_json(&entries)
}
