/// Builder for `IfcDoor`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_WIDTH_MM: f64 = 914.0;
const DEFAULT_HEIGHT_MM: f64 = 2134.0;
/// Standard leaf thickness in metres.
const LEAF_THICKNESS_M: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default)]
pub struct DoorBuilder;

impl ElementBuilder for DoorBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcDoor"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let width_mm = prop_or(props, "width_mm", DEFAULT_WIDTH_MM);
        let height_mm = prop_or(props, "height_mm", DEFAULT_HEIGHT_MM);

        let mut common = DynMap::new();
        common.insert(
            "IsExternal".to_owned(),
            DynValue::Bool(prop_bool(props, "is_external", false)),
        );
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        common.insert(
            "HandicapAccessible".to_owned(),
            DynValue::Bool(prop_bool(props, "handicap_accessible", false)),
        );
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        dims.insert("width_mm".to_owned(), DynValue::Float(width_mm));
        dims.insert("height_mm".to_owned(), DynValue::Float(height_mm));
        dims.insert(
            "swing_direction".to_owned(),
            DynValue::from(prop_str(props, "swing_direction", "left")),
        );

        let mut hardware = DynMap::new();
        hardware.insert(
            "hardware_type".to_owned(),
            DynValue::from(prop_str(props, "hardware_type", "lever")),
        );
        hardware.insert(
            "closer".to_owned(),
            DynValue::Bool(prop_bool(props, "closer", false)),
        );

        let mut psets = Psets::new();
        psets.insert("Pset_DoorCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets.insert("Hardware".to_owned(), hardware);
        psets
    }

    fn materials(&self, names: &[String], _props: &DynMap) -> Vec<MaterialLayer> {
        if names.is_empty() {
            return vec![MaterialLayer::new("Wood", None, "door")];
        }
        names
            .iter()
            .map(|name| MaterialLayer::new(name, None, "door"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_WIDTH_MM));
        let h = mm_to_m(prop_or(props, "height_mm", DEFAULT_HEIGHT_MM));
        box_geometry(w, LEAF_THICKNESS_M, h)
    }
}
