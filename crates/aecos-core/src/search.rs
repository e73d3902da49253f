/// Unified search across project elements and the template library.
use serde::Serialize;

use crate::element::Element;
use crate::store::{ElementFilter, ElementStore, StoreError};
use crate::templates::{RegistryEntry, TemplateLibrary, TemplateQuery};

/// One query fanned out to both stores.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub ifc_class: Option<String>,
    pub material: Option<String>,
    pub name: Option<String>,
    /// Template-only: region tag filter.
    pub region: Option<String>,
    /// Template-only: substring over all tag strings.
    pub keyword: Option<String>,
}

/// Combined results from element and template searches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub elements: Vec<Element>,
    pub templates: Vec<RegistryEntry>,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.elements.len() + self.templates.len()
    }
}

/// Runs one query against both the element store and the template library.
///
/// Element-side filters are class/name/material; template-side filters add
/// region and keyword. Region and keyword silently skip the element side
/// (elements carry no tags).
pub fn unified_search(
    store: &ElementStore,
    library: &TemplateLibrary,
    query: &SearchQuery,
) -> Result<SearchResults, StoreError> {
    let element_filter = ElementFilter {
        ifc_class: query.ifc_class.clone(),
        name: query.name.clone(),
        material: query.material.clone(),
    };
    let elements = store.list(&element_filter, None)?;

    let template_query = TemplateQuery {
        ifc_class: query.ifc_class.clone(),
        material: query.material.clone().into_iter().collect(),
        region: query.region.clone().into_iter().collect(),
        keyword: query.keyword.clone(),
        ..TemplateQuery::default()
    };
    let templates = library.search(&template_query);

    Ok(SearchResults {
        elements,
        templates,
    })
}
