//! Implementation of `aecos template` subcommands.
use aecos_core::facade::AecOs;
use aecos_core::templates::TemplateMeta;

use crate::error::CliError;
use crate::format::print_json;

pub fn promote(
    os: &mut AecOs,
    element_id: &str,
    template_id: Option<&str>,
    author: &str,
    description: &str,
) -> Result<(), CliError> {
    let mutation = os.promote_to_template(
        element_id,
        template_id,
        TemplateMeta {
            tags: None,
            version: None,
            author: author.to_owned(),
            description: description.to_owned(),
        },
    )?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&serde_json::json!({
        "folder": mutation.value,
        "commit": mutation.commit,
    }))
}

pub fn list(os: &AecOs) -> Result<(), CliError> {
    print_json(&os.search_templates(&aecos_core::templates::TemplateQuery::default()))
}

pub fn remove(os: &mut AecOs, template_id: &str) -> Result<(), CliError> {
    let mutation = os.remove_template(template_id)?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&serde_json::json!({ "removed": mutation.value }))
}
