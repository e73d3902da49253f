//! Element CRUD commands: `create`, `get`, `list`, `update`, `delete`.
use aecos_core::element::MaterialLayer;
use aecos_core::facade::AecOs;
use aecos_core::store::{ElementFilter, ElementUpdate, NewElement};

use crate::error::CliError;
use crate::format::print_json;

pub fn create(
    os: &AecOs,
    ifc_class: &str,
    name: Option<&str>,
    materials: &[String],
) -> Result<(), CliError> {
    let layers: Vec<MaterialLayer> = materials
        .iter()
        .map(|m| MaterialLayer {
            name: m.clone(),
            thickness: None,
            category: None,
            fraction: None,
        })
        .collect();
    let mutation = os.create_element(NewElement {
        ifc_class: ifc_class.to_owned(),
        name: name.map(str::to_owned),
        materials: layers,
        ..NewElement::default()
    })?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&mutation.value)
}

pub fn get(os: &AecOs, element_id: &str) -> Result<(), CliError> {
    match os.get_element(element_id)? {
        Some(element) => print_json(&element),
        None => Err(CliError::Facade(
            aecos_core::facade::AecError::not_found(element_id),
        )),
    }
}

pub fn list(
    os: &AecOs,
    ifc_class: Option<&str>,
    name: Option<&str>,
    material: Option<&str>,
) -> Result<(), CliError> {
    let elements = os.list_elements(&ElementFilter {
        ifc_class: ifc_class.map(str::to_owned),
        name: name.map(str::to_owned),
        material: material.map(str::to_owned),
    })?;
    print_json(&elements)
}

pub fn update(
    os: &AecOs,
    element_id: &str,
    name: Option<&str>,
    materials: &[String],
) -> Result<(), CliError> {
    if name.is_none() && materials.is_empty() {
        return Err(CliError::BadArgument {
            detail: "update requires --name and/or --material".to_owned(),
        });
    }
    let replacement = if materials.is_empty() {
        None
    } else {
        Some(
            materials
                .iter()
                .map(|m| MaterialLayer {
                    name: m.clone(),
                    thickness: None,
                    category: None,
                    fraction: None,
                })
                .collect(),
        )
    };
    let mutation = os.update_element(
        element_id,
        &ElementUpdate {
            name: name.map(str::to_owned),
            properties: None,
            materials: replacement,
        },
    )?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&mutation.value)
}

pub fn delete(os: &AecOs, element_id: &str) -> Result<(), CliError> {
    let mutation = os.delete_element(element_id)?;
    for warning in &mutation.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&serde_json::json!({ "deleted": mutation.value }))
}
