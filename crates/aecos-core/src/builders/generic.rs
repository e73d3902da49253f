/// Fallback builder for unknown IFC classes.
///
/// Emits a generic skeleton: a common pset with whatever performance data is
/// available, a single-layer material, and a one-metre-cube-shaped box
/// scaled by any recognised dimensions.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_EXTENT_MM: f64 = 1000.0;

/// Handles any class without a dedicated builder.
#[derive(Debug, Clone)]
pub struct GenericBuilder {
    ifc_class: &'static str,
}

impl GenericBuilder {
    /// A fallback builder labelled with `ifc_class`.
    pub fn new(ifc_class: &'static str) -> Self {
        Self { ifc_class }
    }
}

impl Default for GenericBuilder {
    fn default() -> Self {
        Self::new("IfcBuildingElementProxy")
    }
}

impl ElementBuilder for GenericBuilder {
    fn ifc_class(&self) -> &'static str {
        self.ifc_class
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let mut common = DynMap::new();
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        common.insert(
            "IsExternal".to_owned(),
            DynValue::Bool(prop_bool(props, "is_external", false)),
        );
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        for key in ["length_mm", "width_mm", "height_mm", "thickness_mm"] {
            if let Some(value) = props.get(key) {
                dims.insert(key.to_owned(), value.clone());
            }
        }

        let mut psets = Psets::new();
        psets.insert("Pset_Common".to_owned(), common);
        if !dims.is_empty() {
            psets.insert("Dimensions".to_owned(), dims);
        }
        psets
    }

    fn materials(&self, names: &[String], _props: &DynMap) -> Vec<MaterialLayer> {
        if names.is_empty() {
            return vec![MaterialLayer::new("Unspecified", None, "generic")];
        }
        names
            .iter()
            .map(|name| MaterialLayer::new(name, None, "generic"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let l = mm_to_m(prop_or(props, "length_mm", DEFAULT_EXTENT_MM));
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_EXTENT_MM));
        let h = mm_to_m(prop_or(props, "height_mm", DEFAULT_EXTENT_MM));
        box_geometry(l, w, h)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn generic_skeleton_is_a_unit_cube() {
        let builder = GenericBuilder::default();
        assert_eq!(builder.ifc_class(), "IfcBuildingElementProxy");
        let geometry = builder.geometry(&DynMap::new());
        assert_eq!(geometry.volume, Some(1.0));
    }

    #[test]
    fn known_dimensions_are_echoed() {
        let mut props = DynMap::new();
        props.insert("height_mm".to_owned(), DynValue::Float(2500.0));
        props.insert("colour".to_owned(), DynValue::from("red"));
        let psets = GenericBuilder::default().psets(&props, &DynMap::new());
        let dims = psets.get("Dimensions").expect("dims");
        assert_eq!(dims.get("height_mm").and_then(DynValue::as_f64), Some(2500.0));
        assert!(dims.get("colour").is_none());
    }

    #[test]
    fn unspecified_material_fallback() {
        let layers = GenericBuilder::default().materials(&[], &DynMap::new());
        assert_eq!(layers[0].name, "Unspecified");
    }
}
