//! Implementation of `aecos search`.
use aecos_core::facade::AecOs;
use aecos_core::search::SearchQuery;

use crate::error::CliError;
use crate::format::print_json;

#[allow(clippy::too_many_arguments)]
pub fn run(
    os: &AecOs,
    ifc_class: Option<&str>,
    material: Option<&str>,
    name: Option<&str>,
    region: Option<&str>,
    keyword: Option<&str>,
) -> Result<(), CliError> {
    let results = os.search(&SearchQuery {
        ifc_class: ifc_class.map(str::to_owned),
        material: material.map(str::to_owned),
        name: name.map(str::to_owned),
        region: region.map(str::to_owned),
        keyword: keyword.map(str::to_owned),
    })?;
    print_json(&results)
}
