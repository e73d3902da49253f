/// Builder for `IfcWall` / `IfcWallStandardCase`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str, round_to};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_THICKNESS_MM: f64 = 200.0;
const DEFAULT_HEIGHT_MM: f64 = 3000.0;
const DEFAULT_LENGTH_MM: f64 = 5000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct WallBuilder;

impl ElementBuilder for WallBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcWall"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let thickness_mm = prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM);
        let height_mm = prop_or(props, "height_mm", DEFAULT_HEIGHT_MM);
        let length_mm = prop_or(props, "length_mm", DEFAULT_LENGTH_MM);

        let mut common = DynMap::new();
        common.insert(
            "IsExternal".to_owned(),
            DynValue::Bool(prop_bool(props, "is_external", true)),
        );
        common.insert(
            "LoadBearing".to_owned(),
            DynValue::Bool(prop_bool(props, "load_bearing", false)),
        );
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        dims.insert("thickness_mm".to_owned(), DynValue::Float(thickness_mm));
        dims.insert("height_mm".to_owned(), DynValue::Float(height_mm));
        dims.insert("length_mm".to_owned(), DynValue::Float(length_mm));

        let mut psets = Psets::new();
        psets.insert("Pset_WallCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets
    }

    fn materials(&self, names: &[String], props: &DynMap) -> Vec<MaterialLayer> {
        let thickness_mm = prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM);
        if names.is_empty() {
            return vec![MaterialLayer::new("Concrete", Some(thickness_mm), "wall")];
        }
        if names.len() == 1 {
            return vec![MaterialLayer::new(&names[0], Some(thickness_mm), "wall")];
        }
        // Multi-layer walls split the thickness evenly.
        let layer = round_to(thickness_mm / names.len() as f64, 1);
        names
            .iter()
            .map(|name| MaterialLayer::new(name, Some(layer), "wall"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let t = mm_to_m(prop_or(props, "thickness_mm", DEFAULT_THICKNESS_MM));
        let h = mm_to_m(prop_or(props, "height_mm", DEFAULT_HEIGHT_MM));
        let l = mm_to_m(prop_or(props, "length_mm", DEFAULT_LENGTH_MM));
        box_geometry(l, t, h)
    }
}
