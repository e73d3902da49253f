/// Builder for `IfcColumn`.
use super::{ElementBuilder, apply_performance, box_geometry, mm_to_m, prop_bool, prop_or, prop_str, round_to};
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{BoundingBox, GeometryInfo, MaterialLayer, Psets};

const DEFAULT_WIDTH_MM: f64 = 400.0;
const DEFAULT_HEIGHT_MM: f64 = 3600.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnBuilder;

impl ElementBuilder for ColumnBuilder {
    fn ifc_class(&self) -> &'static str {
        "IfcColumn"
    }

    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets {
        let width_mm = prop_or(props, "width_mm", DEFAULT_WIDTH_MM);
        let shape = prop_str(props, "shape", "rectangular").to_owned();

        let mut common = DynMap::new();
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
        dims.insert("width_mm".to_owned(), DynValue::Float(width_mm));
        dims.insert(
            "height_mm".to_owned(),
            DynValue::Float(prop_or(props, "height_mm", DEFAULT_HEIGHT_MM)),
        );
        dims.insert("shape".to_owned(), DynValue::from(shape.as_str()));
        if shape == "circular" {
            dims.insert(
                "diameter_mm".to_owned(),
                DynValue::Float(prop_or(props, "diameter_mm", width_mm)),
            );
        } else {
            dims.insert(
                "depth_mm".to_owned(),
                DynValue::Float(prop_or(props, "depth_mm", width_mm)),
            );
        }

        let mut rebar = DynMap::new();
        rebar.insert(
            "reinforcement".to_owned(),
            DynValue::from(prop_str(props, "reinforcement", "standard")),
        );

        let mut psets = Psets::new();
        psets.insert("Pset_ColumnCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);
        psets.insert("Reinforcement".to_owned(), rebar);
        psets
    }

    fn materials(&self, names: &[String], _props: &DynMap) -> Vec<MaterialLayer> {
        if names.is_empty() {
            return vec![MaterialLayer::new("Concrete", None, "column")];
        }
        names
            .iter()
            .map(|name| MaterialLayer::new(name, None, "column"))
            .collect()
    }

    fn geometry(&self, props: &DynMap) -> GeometryInfo {
        let w = mm_to_m(prop_or(props, "width_mm", DEFAULT_WIDTH_MM));
        let h = mm_to_m(prop_or(props, "height_mm", DEFAULT_HEIGHT_MM));
        if prop_str(props, "shape", "rectangular") == "circular" {
            let d = mm_to_m(prop_or(props, "diameter_mm", w * 1000.0));
            let r = d / 2.0;
            // The bounding box encloses the circular section; the volume is
            // the true cylinder volume.
            GeometryInfo {
                bounding_box: BoundingBox {
                    min_x: 0.0,
                    min_y: 0.0,
                    min_z: 0.0,
                    max_x: d,
                    max_y: d,
                    max_z: h,
                },
                volume: Some(round_to(std::f64::consts::PI * r * r * h, 6)),
                centroid: Some([round_to(r, 4), round_to(r, 4), round_to(h / 2.0, 4)]),
            }
        } else {
            let depth = mm_to_m(prop_or(props, "depth_mm", w * 1000.0));
            box_geometry(w, depth, h)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn bag(json: &str) -> DynMap {
        match serde_json::from_str::<DynValue>(json).expect("valid JSON") {
            DynValue::Object(m) => m,
            DynValue::Null
            | DynValue::Bool(_)
            | DynValue::Integer(_)
            | DynValue::Float(_)
            | DynValue::String(_)
            | DynValue::Array(_) => DynMap::new(),
        }
    }

    #[test]
    fn rectangular_column_uses_depth() {
        let psets = ColumnBuilder.psets(&bag(r#"{"width_mm": 400}"#), &DynMap::new());
        let dims = psets.get("Dimensions").expect("dims");
        assert_eq!(dims.get("depth_mm").and_then(DynValue::as_f64), Some(400.0));
        assert!(dims.get("diameter_mm").is_none());
    }

    #[test]
    fn circular_column_volume_is_cylindrical() {
        let geometry = ColumnBuilder.geometry(&bag(
            r#"{"shape": "circular", "diameter_mm": 400, "height_mm": 3000}"#,
        ));
        let volume = geometry.volume.expect("volume");
        let expected = std::f64::consts::PI * 0.2 * 0.2 * 3.0;
        assert!((volume - expected).abs() < 1e-4);
        // Bounding box still encloses the section.
        assert_eq!(geometry.bounding_box.max_x, 0.4);
        assert_eq!(geometry.bounding_box.max_y, 0.4);
    }

    #[test]
    fn columns_are_load_bearing_by_default() {
        let psets = ColumnBuilder.psets(&DynMap::new(), &DynMap::new());
        let common = psets.get("Pset_ColumnCommon").expect("common pset");
        assert_eq!(common.get("LoadBearing").and_then(DynValue::as_bool), Some(true));
    }
}
