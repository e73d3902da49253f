/// Builder for `IfcWindow`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_WIDTH_MM: f64 = 1200.0;
const DEFAULT_HEIGHT_MM: f64 = 1500.0;
const DEFAULT_SILL_HEIGHT_MM: f64 = 900.0;
/// Standard assembly depth in metres.
const FRAME_DEPTH_M: f64 = 0.03;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowBuilder;

impl ElementBuilder for WindowBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcWindow"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let width_mm = prop_or(props, "width_mm", DEFAULT_WIDTH_MM);
        let height_mm = prop_or(props, "height_mm", DEFAULT_HEIGHT_MM);

        let mut common = DynMap::new();
        common.insert(
            "IsExternal".to_owned(),
            DynValue::Bool(prop_bool(props, "is_external", true)),
        );
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        common.insert(
            "GlazingType".to_owned(),
            DynValue::from(prop_str(props, "glazing_type", "double")),
        );
        if let Some(shgc) = perf.get("shgc") {
            if !shgc.is_empty_value() {
                common.insert("SolarHeatGainCoefficient".to_owned(), shgc.clone());
            }
        }
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        dims.insert("width_mm".to_owned(), DynValue::Float(width_mm));
        dims.insert("height_mm".to_owned(), DynValue::Float(height_mm));
        dims.insert(
            "sill_height_mm".to_owned(),
            DynValue::Float(prop_or(props, "sill_height_mm", DEFAULT_SILL_HEIGHT_MM)),
        );

        let mut psets = Psets::new();
        psets.insert("Pset_WindowCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets
    }

    fn materials(&self, names: &[String], _props: &DynMap) -> Vec<MaterialLayer> {
        if names.is_empty() {
            return vec![MaterialLayer::new("Glass", None, "window")];
        }
        names
            .iter()
            .map(|name| MaterialLayer::new(name, None, "window"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_WIDTH_MM));
        let h = mm_to_m(prop_or(props, "height_mm", DEFAULT_HEIGHT_MM));
        box_geometry(w, FRAME_DEPTH_M, h)
    }
}
