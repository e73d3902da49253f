/// CLI error types with associated exit codes.
///
/// Every variant maps to a stable exit code via [`CliError::exit_code`]:
///
/// - Exit code **2** — input failure: malformed arguments or unreadable
///   input files; the tool stops before any domain logic runs.
/// - Exit code **1** — logical failure: the facade ran and reported a
///   well-defined error (not found, conflict, I/O, integrity).
use std::fmt;
use std::path::PathBuf;

use aecos_core::facade::{AecError, ErrorKind};

/// All error conditions the `aecos` binary can produce.
#[derive(Debug)]
pub enum CliError {
    // --- Exit code 2: input failures ---
    /// An argument failed validation before reaching the facade.
    BadArgument {
        /// What was wrong.
        detail: String,
    },

    /// An input file could not be read or parsed.
    BadInputFile {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        detail: String,
    },

    // --- Exit code 1: logical failures ---
    /// The facade reported an error.
    Facade(AecError),

    /// Output could not be written to stdout.
    OutputError {
        /// The underlying error message.
        detail: String,
    },
}

impl CliError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadArgument { .. } | Self::BadInputFile { .. } => 2,
            Self::Facade(e) => match e.kind() {
                ErrorKind::InvalidArgument => 2,
                ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::Io
                | ErrorKind::Integrity
                | ErrorKind::Dependency => 1,
            },
            Self::OutputError { .. } => 1,
        }
    }

    /// The human-readable message printed to stderr.
    pub fn message(&self) -> String {
        match self {
            Self::BadArgument { detail } => format!("error: {detail}"),
            Self::BadInputFile { path, detail } => {
                format!("error: cannot read {}: {detail}", path.display())
            }
            Self::Facade(e) => format!("error: {e}"),
            Self::OutputError { detail } => format!("error: could not write output: {detail}"),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

impl From<AecError> for CliError {
    fn from(e: AecError) -> Self {
        Self::Facade(e)
    }
}
