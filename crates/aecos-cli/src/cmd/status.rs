//! Implementation of `aecos status`.
use aecos_core::facade::AecOs;

use crate::error::CliError;
use crate::format::print_text;

pub fn run(os: &AecOs) -> Result<(), CliError> {
    let status = os.status()?;
    if status.is_empty() {
        print_text("clean");
    } else {
        print_text(&status);
    }
    Ok(())
}
