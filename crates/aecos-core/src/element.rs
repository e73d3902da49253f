/// The element model — the in-memory view of an element folder.
///
/// An element's canonical representation is its folder (see the element
/// store); these types are the parsed view. Serialised field names match the
/// on-disk contract exactly: `metadata.json` uses the extraction-era
/// PascalCase keys (`GlobalId`, `IFCClass`, `Psets`), the leaf files use
/// snake_case.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dynvalue::{DynMap, DynValue};
use crate::newtypes::GlobalId;

/// Nested property sets: pset name → (property name → scalar).
pub type Psets = BTreeMap<String, DynMap>;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl BoundingBox {
    /// Returns `true` if every max extent is at least the matching min.
    pub fn is_well_formed(&self) -> bool {
        self.max_x >= self.min_x && self.max_y >= self.min_y && self.max_z >= self.min_z
    }

    /// Returns `true` if the two boxes overlap in all three axes.
    ///
    /// Touching faces do not count as overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
            && self.min_z < other.max_z
            && other.min_z < self.max_z
    }
}

/// Lightweight geometric summary of an element (`geometry/shape.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeometryInfo {
    pub bounding_box: BoundingBox,
    pub volume: Option<f64>,
    pub centroid: Option<[f64; 3]>,
}

// ---------------------------------------------------------------------------
// Materials and spatial reference
// ---------------------------------------------------------------------------

/// A single material layer or constituent (`materials/materials.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MaterialLayer {
    pub name: String,
    pub thickness: Option<f64>,
    pub category: Option<String>,
    pub fraction: Option<f64>,
}

impl MaterialLayer {
    /// Convenience constructor for a named layer with a category.
    pub fn new(name: &str, thickness: Option<f64>, category: &str) -> Self {
        Self {
            name: name.to_owned(),
            thickness,
            category: Some(category.to_owned()),
            fraction: None,
        }
    }
}

/// Where an element lives in the spatial hierarchy
/// (`relationships/spatial.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpatialReference {
    pub site_name: Option<String>,
    pub site_id: Option<String>,
    pub building_name: Option<String>,
    pub building_id: Option<String>,
    pub storey_name: Option<String>,
    pub storey_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Metadata file
// ---------------------------------------------------------------------------

/// The shape of `metadata.json`.
///
/// Field names are the extraction-era PascalCase keys; `Psets` holds the
/// flattened `"<PsetName>.<PropertyName>"` view of the nested property sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(rename = "GlobalId")]
    pub global_id: GlobalId,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "IFCClass")]
    pub ifc_class: String,
    #[serde(rename = "ObjectType")]
    pub object_type: Option<String>,
    #[serde(rename = "Tag")]
    pub tag: Option<String>,
    #[serde(rename = "Psets", default)]
    pub psets: DynMap,
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// The atomic unit of the system: one design object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub global_id: GlobalId,
    pub ifc_class: String,
    pub name: Option<String>,
    pub object_type: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub geometry: GeometryInfo,
    #[serde(default)]
    pub psets: Psets,
    #[serde(default)]
    pub materials: Vec<MaterialLayer>,
    #[serde(default)]
    pub spatial: SpatialReference,
}

impl Element {
    /// Builds the `metadata.json` view of this element.
    pub fn metadata(&self) -> ElementMetadata {
        ElementMetadata {
            global_id: self.global_id.clone(),
            name: self.name.clone(),
            ifc_class: self.ifc_class.clone(),
            object_type: self.object_type.clone(),
            tag: self.tag.clone(),
            psets: flatten_psets(&self.psets),
        }
    }

    /// Builds the attribute bag the rule evaluator consumes.
    ///
    /// Property-set contents are merged (un-prefixed) under `properties`;
    /// the well-known performance keys are mirrored under `performance`;
    /// material layer names are listed under `materials`.
    pub fn attribute_map(&self) -> DynMap {
        let mut properties = DynMap::new();
        for props in self.psets.values() {
            for (key, value) in props {
                properties.insert(key.clone(), value.clone());
            }
        }

        let mut performance = DynMap::new();
        for key in [
            "fire_rating",
            "FireRating",
            "acoustic_stc",
            "AcousticRating",
            "thermal_r_value",
            "thermal_u_value",
            "ThermalTransmittance",
        ] {
            if let Some(value) = properties.get(key) {
                performance.insert(canonical_performance_key(key).to_owned(), value.clone());
            }
        }

        let materials: Vec<DynValue> = self
            .materials
            .iter()
            .map(|m| DynValue::from(m.name.as_str()))
            .collect();

        let mut out = DynMap::new();
        out.insert("properties".to_owned(), DynValue::Object(properties));
        out.insert("performance".to_owned(), DynValue::Object(performance));
        out.insert("constraints".to_owned(), DynValue::Object(DynMap::new()));
        out.insert("materials".to_owned(), DynValue::Array(materials));
        out
    }
}

/// Maps a pset property key to the snake_case performance slot name.
fn canonical_performance_key(key: &str) -> &str {
    match key {
        "FireRating" => "fire_rating",
        "AcousticRating" => "acoustic_stc",
        "ThermalTransmittance" => "thermal_u_value",
        other => other,
    }
}

/// Flattens nested property sets into `"<PsetName>.<PropertyName>"` keys.
pub fn flatten_psets(psets: &Psets) -> DynMap {
    let mut flat = DynMap::new();
    for (pset_name, props) in psets {
        for (prop_name, value) in props {
            flat.insert(format!("{pset_name}.{prop_name}"), value.clone());
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn sample_element() -> Element {
        let mut common = DynMap::new();
        common.insert("FireRating".to_owned(), DynValue::from("2H"));
        common.insert("IsExternal".to_owned(), DynValue::Bool(true));
        let mut dims = DynMap::new();
        dims.insert("thickness_mm".to_owned(), DynValue::Float(200.0));
        let mut psets = Psets::new();
        psets.insert("Pset_WallCommon".to_owned(), common);
        psets.insert("Dimensions".to_owned(), dims);

        Element {
            global_id: GlobalId::try_from("0123456789ABCDEFGHIJKL").expect("valid"),
            ifc_class: "IfcWall".to_owned(),
            name: Some("Wall-01".to_owned()),
            object_type: None,
            tag: None,
            geometry: GeometryInfo::default(),
            psets,
            materials: vec![MaterialLayer::new("Concrete", Some(200.0), "wall")],
            spatial: SpatialReference::default(),
        }
    }

    // --- BoundingBox ---

    #[test]
    fn bounding_box_well_formedness() {
        let ok = BoundingBox {
            max_x: 1.0,
            max_y: 1.0,
            max_z: 1.0,
            ..BoundingBox::default()
        };
        assert!(ok.is_well_formed());

        let bad = BoundingBox {
            min_x: 2.0,
            max_x: 1.0,
            ..BoundingBox::default()
        };
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn bounding_box_overlap() {
        let a = BoundingBox {
            max_x: 2.0,
            max_y: 2.0,
            max_z: 2.0,
            ..BoundingBox::default()
        };
        let b = BoundingBox {
            min_x: 1.0,
            min_y: 1.0,
            min_z: 1.0,
            max_x: 3.0,
            max_y: 3.0,
            max_z: 3.0,
        };
        let c = BoundingBox {
            min_x: 5.0,
            min_y: 5.0,
            min_z: 5.0,
            max_x: 6.0,
            max_y: 6.0,
            max_z: 6.0,
        };
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn touching_faces_do_not_overlap() {
        let a = BoundingBox {
            max_x: 1.0,
            max_y: 1.0,
            max_z: 1.0,
            ..BoundingBox::default()
        };
        let b = BoundingBox {
            min_x: 1.0,
            max_x: 2.0,
            max_y: 1.0,
            max_z: 1.0,
            ..BoundingBox::default()
        };
        assert!(!a.overlaps(&b));
    }

    // --- Metadata flattening ---

    #[test]
    fn flatten_uses_dotted_keys() {
        let element = sample_element();
        let flat = flatten_psets(&element.psets);
        assert_eq!(
            flat.get("Pset_WallCommon.FireRating").and_then(DynValue::as_str),
            Some("2H")
        );
        assert_eq!(
            flat.get("Dimensions.thickness_mm").and_then(|v| v.as_f64()),
            Some(200.0)
        );
    }

    #[test]
    fn metadata_serialises_pascal_case_keys() {
        let meta = sample_element().metadata();
        let json = serde_json::to_string(&meta).expect("serialize");
        assert!(json.contains("\"GlobalId\""));
        assert!(json.contains("\"IFCClass\""));
        assert!(json.contains("\"Psets\""));
        assert!(json.contains("\"Pset_WallCommon.FireRating\""));
    }

    #[test]
    fn metadata_round_trips() {
        let meta = sample_element().metadata();
        let json = serde_json::to_string(&meta).expect("serialize");
        let back: ElementMetadata = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, meta);
    }

    // --- Attribute map ---

    #[test]
    fn attribute_map_merges_psets_unprefixed() {
        let data = sample_element().attribute_map();
        let properties = data.get("properties").expect("properties");
        assert_eq!(
            properties.get("thickness_mm").and_then(DynValue::as_f64),
            Some(200.0)
        );
        assert_eq!(
            properties.get("FireRating").and_then(DynValue::as_str),
            Some("2H")
        );
    }

    #[test]
    fn attribute_map_mirrors_performance_slots() {
        let data = sample_element().attribute_map();
        let performance = data.get("performance").expect("performance");
        assert_eq!(
            performance.get("fire_rating").and_then(DynValue::as_str),
            Some("2H")
        );
    }

    #[test]
    fn attribute_map_lists_material_names() {
        let data = sample_element().attribute_map();
        let materials = data.get("materials").and_then(DynValue::as_array).expect("materials");
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].as_str(), Some("Concrete"));
    }
}
