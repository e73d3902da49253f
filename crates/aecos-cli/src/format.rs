/// Output helpers shared by the command modules.
use serde::Serialize;

use crate::error::CliError;

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::OutputError {
        detail: e.to_string(),
    })?;
    println!("{text}");
    Ok(())
}

/// Prints a block of preformatted text, trimming one trailing newline so
/// `println!` does not double it.
pub fn print_text(text: &str) {
    println!("{}", text.trim_end_matches('\n'));
}
