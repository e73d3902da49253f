/// Per-class element builders.
///
/// A builder is a pure function family from a parametric spec's property and
/// performance bags to the canonical JSON artifacts of one IFC class. One
/// builder exists per supported class plus the generic fallback; routing
/// lives in the domain registry, not here.
use crate::dynvalue::{DynMap, DynValue};
use crate::element::{GeometryInfo, MaterialLayer, Psets, SpatialReference};

pub mod beam;
pub mod column;
pub mod door;
pub mod generic;
pub mod slab;
pub mod wall;
pub mod window;

pub use beam::BeamBuilder;
pub use column::ColumnBuilder;
pub use door::DoorBuilder;
pub use generic::GenericBuilder;
pub use slab::SlabBuilder;
pub use wall::WallBuilder;
pub use window::WindowBuilder;

/// Emits the canonical JSON artifacts for one IFC class.
///
/// Builders are pure: the same inputs always produce the same psets,
/// materials, geometry, and spatial reference.
pub trait ElementBuilder {
    /// The canonical IFC class this builder produces.
    fn ifc_class(&self) -> &'static str;

    /// Nested property sets for `properties/psets.json`.
    fn psets(&self, props: &DynMap, perf: &DynMap) -> Psets;

    /// Material layers for `materials/materials.json`.
    fn materials(&self, names: &[String], props: &DynMap) -> Vec<MaterialLayer>;

    /// Geometry summary for `geometry/shape.json`.
    fn geometry(&self, props: &DynMap) -> GeometryInfo;

    /// Spatial reference for `relationships/spatial.json`. Builders emit an
    /// unplaced element by default.
    fn spatial(&self) -> SpatialReference {
        SpatialReference::default()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Numeric property lookup with a default: accepts numbers and numeric
/// strings.
pub(crate) fn prop_or(props: &DynMap, key: &str, default: f64) -> f64 {
    match props.get(key) {
        Some(value) => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(default),
        None => default,
    }
}

/// String property lookup.
pub(crate) fn prop_str<'a>(props: &'a DynMap, key: &str, default: &'a str) -> &'a str {
    props.get(key).and_then(DynValue::as_str).unwrap_or(default)
}

/// Boolean property lookup with a default.
pub(crate) fn prop_bool(props: &DynMap, key: &str, default: bool) -> bool {
    props.get(key).and_then(DynValue::as_bool).unwrap_or(default)
}

pub(crate) fn mm_to_m(mm: f64) -> f64 {
    mm / 1000.0
}

/// Decimal rounding used to keep serialised geometry stable.
pub(crate) fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// A box with one corner at the origin, the standard builder footprint.
pub(crate) fn box_geometry(x: f64, y: f64, z: f64) -> GeometryInfo {
    GeometryInfo {
        bounding_box: crate::element::BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            min_z: 0.0,
            max_x: x,
            max_y: y,
            max_z: z,
        },
        volume: Some(round_to(x * y * z, 6)),
        centroid: Some([
            round_to(x / 2.0, 4),
            round_to(y / 2.0, 4),
            round_to(z / 2.0, 4),
        ]),
    }
}

/// Copies the well-known performance slots into a common pset.
pub(crate) fn apply_performance(pset: &mut DynMap, perf: &DynMap) {
    if let Some(rating) = perf.get("fire_rating") {
        if !rating.is_empty_value() {
            pset.insert("FireRating".to_owned(), rating.clone());
        }
    }
    if let Some(stc) = perf.get("acoustic_stc") {
        if !stc.is_empty_value() {
            pset.insert("AcousticRating".to_owned(), stc.clone());
        }
    }
    if let Some(u_value) = perf.get("thermal_u_value") {
        if !u_value.is_empty_value() {
            pset.insert("ThermalTransmittance".to_owned(), u_value.clone());
        }
    } else if let Some(r_value) = perf.get("thermal_r_value") {
        if !r_value.is_empty_value() {
            pset.insert("ThermalTransmittance".to_owned(), r_value.clone());
        }
    }
}
