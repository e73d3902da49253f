/// Builder for `IfcBeam`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets};

const DEFAULT_DEPTH_MM: f64 = 500.0;
const DEFAULT_WIDTH_MM: f64 = 300.0;
const DEFAULT_SPAN_MM: f64 = 6000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct BeamBuilder;

impl ElementBuilder for BeamBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcBeam"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let depth_mm = prop_or(props, "depth_mm", DEFAULT_DEPTH_MM);
        let width_mm = prop_or(props, "width_mm", DEFAULT_WIDTH_MM);
        let span_mm = prop_or(props, "length_mm", DEFAULT_SPAN_MM);

        let mut common = DynMap::new();
        common.insert(
            "LoadBearing".to_owned(),
            DynValue::Bool(prop_bool(props, "load_bearing", true)),
        );
        common.insert(
            "Reference".to_owned(),
            DynValue::from(prop_str(props, "reference", "")),
        );
        common.insert("Span".to_owned(), DynValue::Float(span_mm));
        apply_performance(&mut common, perf);

        let mut dims = DynMap::new();
        dims.insert("depth_mm".to_owned(), DynValue::Float(depth_mm));
        dims.insert("width_mm".to_owned(), DynValue::Float(width_mm));
        dims.insert("length_mm".to_owned(), DynValue::Float(span_mm));
        dims.insert(
            "profile_type".to_owned(),
            DynValue::from(prop_str(props, "profile_type", "W")),
        );

        let mut psets = Psets::new();
        psets.insert("Pset_BeamCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets
    }

    fn materials(&self, names: &[String], _props: &DynMap) -> Vec<MaterialLayer> {
        if names.is_empty() {
            return vec![MaterialLayer::new("Steel", None, "beam")];
        }
        names
            .iter()
            .map(|name| MaterialLayer::new(name, None, "beam"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let d = mm_to_m(prop_or(props, "depth_mm", DEFAULT_DEPTH_MM));
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_WIDTH_MM));
        let l = mm_to_m(prop_or(props, "length_mm", DEFAULT_SPAN_MM));
        box_geometry(l, w, d)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn beam_defaults_to_steel_w_profile() {
        let psets = BeamBuilder.psets(&DynMap::new(), &DynMap::new());
        let dims = psets.get("Dimensions").expect("dims");
        assert_eq!(dims.get("profile_type").and_then(DynValue::as_str), Some("W"));
        let layers = BeamBuilder.materials(&[], &DynMap::new());
        assert_eq!(layers[0].name, "Steel");
    }

    #[test]
    fn span_appears_in_common_pset() {
        let psets = BeamBuilder.psets(&DynMap::new(), &DynMap::new());
        let common = psets.get("Pset_BeamCommon").expect("common pset");
        assert_eq!(common.get("Span").and_then(DynValue::as_f64), Some(DEFAULT_SPAN_MM));
    }

    #[test]
    fn geometry_spans_the_x_axis() {
        let geometry = BeamBuilder.geometry(&DynMap::new());
        assert_eq!(geometry.bounding_box.max_x, 6.0);
        assert_eq!(geometry.bounding_box.max_y, 0.3);
        assert_eq!(geometry.bounding_box.max_z, 0.5);
    }
}
