//! Implementation of `aecos generate`.
//!
//! Runs the full pipeline from natural-language text or a spec file and
//! prints the generated element with its verdict and commit token.
use std::path::Path;

use aecos_core::facade::AecOs;
use aecos_core::parametric::ParametricSpec;
use aecos_core::pipeline::GenerateInput;

use crate::error::CliError;
use crate::format::print_json;

pub fn run(
    os: &AecOs,
    text: Option<&str>,
    spec_file: Option<&Path>,
    region: Option<&str>,
) -> Result<(), CliError> {
    let input = match (text, spec_file) {
        (Some(text), None) => GenerateInput::Text(text.to_owned()),
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path).map_err(|e| CliError::BadInputFile {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            let spec: ParametricSpec =
                serde_json::from_str(&raw).map_err(|e| CliError::BadInputFile {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            GenerateInput::Spec(spec)
        }
        (None, None) | (Some(_), Some(_)) => {
            return Err(CliError::BadArgument {
                detail: "generate requires exactly one of --text or --spec".to_owned(),
            });
        }
    };

    let mutation = os.generate(input, None, region)?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&serde_json::json!({
        "element": mutation.value.element,
        "folder": mutation.value.folder,
        "verdict": mutation.value.compliance.status,
        "commit": mutation.commit,
        "audit_id": mutation.audit_id,
    }))
}
