/// The domain registry: owned routing and pricing state.
///
/// Class-to-builder routing and material pricing are values held by the
/// facade, never process-wide statics. Domain plugins extend the registry by
/// calling [`DomainRegistry::register_builder`] and
/// [`DomainRegistry::register_price`] on the instance they are handed.
use std::collections::BTreeMap;
use std::fmt;

use crate::builders::{
    BeamBuilder, ColumnBuilder, DoorBuilder, ElementBuilder, GenericBuilder, SlabBuilder,
    WallBuilder, WindowBuilder,
};

/// Owned registry mapping IFC class strings to builders and material
/// keywords to unit rates.
pub struct DomainRegistry {
    builders: BTreeMap<String, Box<dyn ElementBuilder>>,
    fallback: GenericBuilder,
    /// Lowercased material keyword → rate per cubic metre (USD).
    pricing: BTreeMap<String, f64>,
    /// Region code → cost multiplier.
    regional_factors: BTreeMap<String, f64>,
}

impl fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .field("pricing", &self.pricing)
            .finish()
    }
}

impl DomainRegistry {
    /// An empty registry with only the generic fallback.
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
            fallback: GenericBuilder::default(),
            pricing: BTreeMap::new(),
            regional_factors: BTreeMap::new(),
        }
    }

    /// The standard registry: the built-in builders plus baseline pricing.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register_builder("IfcWall", Box::new(WallBuilder));
        registry.register_builder("IfcWallStandardCase", Box::new(WallBuilder));
        registry.register_builder("IfcDoor", Box::new(DoorBuilder));
        registry.register_builder("IfcWindow", Box::new(WindowBuilder));
        registry.register_builder("IfcSlab", Box::new(SlabBuilder));
        registry.register_builder("IfcColumn", Box::new(ColumnBuilder));
        registry.register_builder("IfcBeam", Box::new(BeamBuilder));

        // Baseline installed rates per m³.
        registry.register_price("concrete", 150.0);
        registry.register_price("steel", 2400.0);
        registry.register_price("wood", 520.0);
        registry.register_price("timber", 520.0);
        registry.register_price("glass", 1800.0);
        registry.register_price("gypsum", 220.0);
        registry.register_price("masonry", 310.0);
        registry.register_price("brick", 310.0);
        registry.register_price("insulation", 95.0);
        registry.register_price("aluminium", 3100.0);

        registry.register_regional_factor("US", 1.0);
        registry.register_regional_factor("CA", 1.25);
        registry.register_regional_factor("LA", 0.92);

        registry
    }

    /// Registers (or replaces) the builder for an IFC class.
    pub fn register_builder(&mut self, ifc_class: &str, builder: Box<dyn ElementBuilder>) {
        self.builders.insert(ifc_class.to_owned(), builder);
    }

    /// Resolves the builder for `ifc_class`, falling back to the generic
    /// skeleton builder for unknown classes.
    ///
    /// Matching is string equality on the opaque taxonomy string (classes
    /// registered by exact name), case-insensitively.
    pub fn builder_for(&self, ifc_class: &str) -> &dyn ElementBuilder {
        if let Some(builder) = self.builders.get(ifc_class) {
            return builder.as_ref();
        }
        for (name, builder) in &self.builders {
            if name.eq_ignore_ascii_case(ifc_class) {
                return builder.as_ref();
            }
        }
        &self.fallback
    }

    /// Whether a dedicated (non-fallback) builder exists for the class.
    pub fn has_builder(&self, ifc_class: &str) -> bool {
        self.builders.contains_key(ifc_class)
            || self
                .builders
                .keys()
                .any(|name| name.eq_ignore_ascii_case(ifc_class))
    }

    /// Registers (or replaces) a material unit rate.
    pub fn register_price(&mut self, material_keyword: &str, rate_per_m3: f64) {
        self.pricing
            .insert(material_keyword.to_ascii_lowercase(), rate_per_m3);
    }

    /// Registers (or replaces) a regional cost multiplier.
    pub fn register_regional_factor(&mut self, region: &str, factor: f64) {
        self.regional_factors.insert(region.to_owned(), factor);
    }

    /// The pricing table (material keyword → rate per m³).
    pub fn pricing(&self) -> &BTreeMap<String, f64> {
        &self.pricing
    }

    /// The regional multiplier table.
    pub fn regional_factors(&self) -> &BTreeMap<String, f64> {
        &self.regional_factors
    }
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
