/// The built-in rule catalog used to seed an empty rule store.
///
/// The catalog is intentionally small: a working cross-section of IBC, ADA,
/// and Title 24 requirements that exercises every check type. Projects with
/// their own corpora load them through regulatory updates instead.
use crate::dynvalue::DynValue;
use crate::enums::CheckType;
use crate::rules::Rule;

fn rule(
    code_name: &str,
    section: &str,
    title: &str,
    ifc_classes: &[&str],
    check_type: CheckType,
    property_path: &str,
    check_value: DynValue,
    region: &str,
    citation: &str,
    effective_date: &str,
) -> Rule {
    Rule {
        id: None,
        code_name: code_name.to_owned(),
        section: section.to_owned(),
        title: title.to_owned(),
        ifc_classes: ifc_classes.iter().map(|c| (*c).to_owned()).collect(),
        check_type,
        property_path: property_path.to_owned(),
        check_value,
        region: region.to_owned(),
        citation: citation.to_owned(),
        effective_date: effective_date.to_owned(),
    }
}

/// Returns the built-in seed catalog.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        rule(
            "IBC2024",
            "703.3",
            "Fire barrier rating",
            &["IfcWall", "IfcWallStandardCase"],
            CheckType::MinValue,
            "performance.fire_rating",
            DynValue::from("1H"),
            "US",
            "IBC 2024 §703.3 — Fire barriers shall have a fire-resistance rating of not less than 1 hour.",
            "2024-01-01",
        ),
        rule(
            "IBC2024",
            "2109.1.1",
            "Minimum wall thickness",
            &["IfcWall", "IfcWallStandardCase"],
            CheckType::MinValue,
            "properties.thickness_mm",
            DynValue::Integer(152),
            "US",
            "IBC 2024 §2109.1.1 — Masonry walls shall be at least 6 inches (152 mm) thick.",
            "2024-01-01",
        ),
        rule(
            "IBC2024",
            "1011.5.2",
            "Maximum stair riser height",
            &["IfcStair", "IfcStairFlight"],
            CheckType::MaxValue,
            "properties.riser_height_mm",
            DynValue::Integer(178),
            "US",
            "IBC 2024 §1011.5.2 — Stair riser heights shall be 7 inches (178 mm) maximum.",
            "2024-01-01",
        ),
        rule(
            "IBC2024",
            "1011.5.2b",
            "Minimum stair tread depth",
            &["IfcStair", "IfcStairFlight"],
            CheckType::MinValue,
            "properties.tread_depth_mm",
            DynValue::Integer(279),
            "US",
            "IBC 2024 §1011.5.2 — Stair tread depths shall be 11 inches (279 mm) minimum.",
            "2024-01-01",
        ),
        rule(
            "ADA2010",
            "404.2.3",
            "Door clear width",
            &["IfcDoor"],
            CheckType::MinValue,
            "properties.width_mm",
            DynValue::Integer(815),
            "US",
            "ADA 2010 §404.2.3 — Door openings shall provide a clear width of 32 inches (815 mm) minimum.",
            "2010-09-15",
        ),
        rule(
            "ADA2010",
            "404.2.5",
            "Door threshold height",
            &["IfcDoor"],
            CheckType::MaxValue,
            "properties.threshold_mm",
            DynValue::Integer(13),
            "US",
            "ADA 2010 §404.2.5 — Thresholds shall be 1/2 inch (13 mm) high maximum.",
            "2010-09-15",
        ),
        rule(
            "Title-24",
            "140.3",
            "Fenestration U-factor",
            &["IfcWindow"],
            CheckType::MaxValue,
            "performance.thermal_u_value",
            DynValue::Float(0.36),
            "CA",
            "Title 24 §140.3 — Fenestration shall have a U-factor no greater than 0.36.",
            "2023-01-01",
        ),
        rule(
            "IBC2024",
            "1607.1",
            "Load-bearing declaration",
            &["IfcColumn", "IfcBeam"],
            CheckType::Boolean,
            "properties.load_bearing",
            DynValue::Bool(true),
            "US",
            "IBC 2024 §1607.1 — Structural members shall be identified as load bearing.",
            "2024-01-01",
        ),
        rule(
            "IBC2024",
            "2304.10",
            "Slab reinforcement specified",
            &["IfcSlab"],
            CheckType::Exists,
            "properties.reinforcement",
            DynValue::Null,
            "US",
            "IBC 2024 §2304.10 — Reinforcement shall be specified for structural slabs.",
            "2024-01-01",
        ),
        rule(
            "Title-24",
            "110.6",
            "Window glazing type",
            &["IfcWindow"],
            CheckType::Enum,
            "properties.glazing_type",
            DynValue::Array(vec![DynValue::from("double"), DynValue::from("triple")]),
            "CA",
            "Title 24 §110.6 — Fenestration shall use double or triple glazing.",
            "2023-01-01",
        ),
    ]
}
