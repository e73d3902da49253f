/// Builder for `IfcSlab`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_THICKNESS_MM: f64 = 200.0;
const DEFAULT_LENGTH_MM: f64 = 6000.0;
const DEFAULT_WIDTH_MM: f64 = 6000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct SlabBuilder;

impl ElementBuilder for SlabBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcSlab"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let mut common = DynMap::new();
        common.insert(
            "IsExternal".to_owned(),
            DynValue::Bool(prop_bool(props, "is_external", false)),
        );
        common.insert(
            "LoadBearing".to_owned(),
            DynValue::Bool(prop_bool(props, "load_bearing", true)),
        );
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        dims.insert(
            "thickness_mm".to_owned(),
            DynValue::Float(prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM)),
        );
        dims.insert(
            "length_mm".to_owned(),
            DynValue::Float(prop_or(props, "length_mm", DEFAULT_LENGTH_MM)),
        );
        dims.insert(
            "width_mm".to_owned(),
            DynValue::Float(prop_or(props, "width_mm", DEFAULT_WIDTH_MM)),
        );
        dims.insert(
            "slope".to_owned(),
            DynValue::Float(prop_or(props, "slope", 0.0)),
        );

        let mut rebar = DynMap::new();
        rebar.insert(
            "reinforcement".to_owned(),
            DynValue::from(prop_str(props, "reinforcement", "standard")),
        );

        let mut psets = Psets::new();
        psets.insert("Pset_SlabCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets.insert("Reinforcement".to_owned(), rebar);
        psets
    }

    fn materials(&self, names: &[String], props: &DynMap) -> Vec<MaterialLayer> {
        let thickness_mm = prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM);
        if names.is_empty() {
            return vec![MaterialLayer::new("Concrete", Some(thickness_mm), "slab")];
        }
        let layer = thickness_mm / names.len() as f64;
        names
            .iter()
            .map(|name| MaterialLayer::new(name, Some(layer), "slab"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let t = mm_to_m(prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM));
        let l = mm_to_m(prop_or(props, "length_mm", DEFAULT_LENGTH_MM));
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_WIDTH_MM));
        box_geometry(l, w, t)
    }
}
