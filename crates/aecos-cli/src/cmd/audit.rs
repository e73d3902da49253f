//! Implementation of `aecos audit` subcommands.
//!
//! `verify` exits 1 (integrity) when the chain is broken, so scripts can
//! gate on tamper detection.
use aecos_core::audit::AuditFilter;
use aecos_core::facade::{AecError, AecOs, ErrorKind};

use crate::error::CliError;
use crate::format::{print_json, print_text};

pub fn log(
    os: &AecOs,
    resource: Option<&str>,
    user: Option<&str>,
    action: Option<&str>,
) -> Result<(), CliError> {
    let entries = os.get_audit_log(&AuditFilter {
        resource: resource.map(str::to_owned),
        user: user.map(str::to_owned),
        action: action.map(str::to_owned),
        since: None,
    })?;
    print_json(&entries)
}

pub fn verify(os: &AecOs) -> Result<(), CliError> {
    if os.verify_audit_chain()? {
        print_json(&serde_json::json!({ "chain": "intact" }))
    } else {
        Err(CliError::Facade(AecError::new(
            ErrorKind::Integrity,
            "audit chain",
            "hash chain verification failed",
        )))
    }
}

pub fn export(os: &AecOs) -> Result<(), CliError> {
    print_text(&os.export_audit_log()?);
    Ok(())
}
