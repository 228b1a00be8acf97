//! Compile-time embedded catalog of BC regional districts.
//!
//! The catalog maps each regional district name to one of the five
//! [`RegionLabel`]s, and gives every label a display color and a centroid
//! used for map centering and geocode fallback. Districts missing from the
//! catalog are not an error: lookups return `None` and callers exclude
//! them.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use climate_map_region_models::{LatLng, RegionLabel, RgbHex};
use serde::Deserialize;

use crate::RegionError;

/// Number of districts in the embedded BC catalog. Enforced by a test.
#[cfg(test)]
const EXPECTED_DISTRICT_COUNT: usize = 28;

const BC_CATALOG_TOML: &str = include_str!("../catalog/bc_regional_districts.toml");

static BC_CATALOG: LazyLock<RegionCatalog> = LazyLock::new(|| {
    RegionCatalog::from_toml_str(BC_CATALOG_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded BC region catalog: {e}"))
});

/// One high-level region and the districts it covers.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionDefinition {
    /// The region this entry defines.
    pub label: RegionLabel,
    /// Display color for overlays and legends.
    pub color: RgbHex,
    /// Representative point for centering and centroid fallback.
    pub centroid: LatLng,
    /// Exact district names as they appear in the boundary dataset.
    pub districts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    regions: Vec<RegionDefinition>,
}

/// District → region lookup table plus per-region display metadata.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: BTreeMap<RegionLabel, RegionDefinition>,
    districts: BTreeMap<String, RegionLabel>,
}

impl RegionCatalog {
    /// Returns the embedded British Columbia catalog.
    ///
    /// # Panics
    ///
    /// Panics on first use if the embedded TOML is malformed. The file is
    /// a compile-time constant, so this indicates a development error and
    /// is caught by the test suite.
    #[must_use]
    pub fn bc() -> &'static Self {
        &BC_CATALOG
    }

    /// Parses a catalog from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError`] if the TOML is malformed, a region label is
    /// defined twice, or a district is assigned to more than one region.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RegionError> {
        let file: CatalogFile = toml::de::from_str(toml_str)?;
        Self::from_definitions(file.regions)
    }

    /// Builds a catalog from region definitions.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Catalog`] if a label is defined twice or a
    /// district appears under more than one region.
    pub fn from_definitions(definitions: Vec<RegionDefinition>) -> Result<Self, RegionError> {
        let mut regions = BTreeMap::new();
        let mut districts = BTreeMap::new();

        for definition in definitions {
            for district in &definition.districts {
                let name = district.trim().to_string();
                if let Some(existing) = districts.insert(name.clone(), definition.label) {
                    return Err(RegionError::Catalog {
                        message: format!(
                            "district {name:?} is assigned to both {existing} and {}",
                            definition.label
                        ),
                    });
                }
            }

            let label = definition.label;
            if regions.insert(label, definition).is_some() {
                return Err(RegionError::Catalog {
                    message: format!("region {label} is defined more than once"),
                });
            }
        }

        Ok(Self { regions, districts })
    }

    /// Returns the region a district belongs to, or `None` if the district
    /// is not catalogued.
    #[must_use]
    pub fn region_of(&self, district_name: &str) -> Option<RegionLabel> {
        self.districts.get(district_name.trim()).copied()
    }

    /// Returns the display color for a region.
    #[must_use]
    pub fn color_of(&self, label: RegionLabel) -> Option<&RgbHex> {
        self.regions.get(&label).map(|r| &r.color)
    }

    /// Returns the centroid for a region.
    #[must_use]
    pub fn centroid_of(&self, label: RegionLabel) -> Option<LatLng> {
        self.regions.get(&label).map(|r| r.centroid)
    }

    /// Returns the districts grouped under a region, in catalog order.
    #[must_use]
    pub fn districts_of(&self, label: RegionLabel) -> &[String] {
        self.regions
            .get(&label)
            .map(|r| r.districts.as_slice())
            .unwrap_or_default()
    }

    /// Returns the labels defined by this catalog in canonical order.
    pub fn labels(&self) -> impl Iterator<Item = RegionLabel> + '_ {
        self.regions.keys().copied()
    }

    /// Returns every region definition in canonical order.
    pub fn definitions(&self) -> impl Iterator<Item = &RegionDefinition> {
        self.regions.values()
    }

    /// Total number of catalogued districts.
    #[must_use]
    pub fn district_count(&self) -> usize {
        self.districts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_catalog() {
        let catalog = RegionCatalog::bc();
        assert_eq!(
            catalog.district_count(),
            EXPECTED_DISTRICT_COUNT,
            "Expected {EXPECTED_DISTRICT_COUNT} districts, found {}. \
             Update EXPECTED_DISTRICT_COUNT after editing the catalog.",
            catalog.district_count()
        );
        assert_eq!(catalog.labels().collect::<Vec<_>>(), RegionLabel::ALL);
    }

    #[test]
    fn every_region_has_color_and_centroid() {
        let catalog = RegionCatalog::bc();
        for label in RegionLabel::ALL {
            assert!(catalog.color_of(label).is_some(), "{label} has no color");
            assert!(
                catalog.centroid_of(label).is_some(),
                "{label} has no centroid"
            );
            assert!(
                !catalog.districts_of(label).is_empty(),
                "{label} has no districts"
            );
        }
    }

    #[test]
    fn looks_up_districts() {
        let catalog = RegionCatalog::bc();
        assert_eq!(
            catalog.region_of("Metro Vancouver Regional District"),
            Some(RegionLabel::LowerMainland)
        );
        assert_eq!(
            catalog.region_of("qathet Regional District"),
            Some(RegionLabel::VancouverIslandCoast)
        );
        assert_eq!(catalog.region_of("Yukon Territory"), None);
        assert_eq!(
            catalog.centroid_of(RegionLabel::NorthernBc),
            Some(LatLng::new(57.0, -125.0))
        );
        assert_eq!(
            catalog.color_of(RegionLabel::KootenayColumbia).unwrap().as_str(),
            "#9b59b6"
        );
    }

    #[test]
    fn rejects_district_in_two_regions() {
        let toml_str = r##"
            [[regions]]
            label = "Northern BC"
            color = "#3498db"
            centroid = { lat = 57.0, lng = -125.0 }
            districts = ["Shared District"]

            [[regions]]
            label = "Lower Mainland"
            color = "#2ecc71"
            centroid = { lat = 49.2, lng = -123.0 }
            districts = ["Shared District"]
        "##;

        let err = RegionCatalog::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, RegionError::Catalog { .. }));
    }

    #[test]
    fn rejects_duplicate_region() {
        let toml_str = r##"
            [[regions]]
            label = "Northern BC"
            color = "#3498db"
            centroid = { lat = 57.0, lng = -125.0 }
            districts = ["A"]

            [[regions]]
            label = "Northern BC"
            color = "#3498db"
            centroid = { lat = 57.0, lng = -125.0 }
            districts = ["B"]
        "##;

        assert!(RegionCatalog::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rejects_bad_color() {
        let toml_str = r#"
            [[regions]]
            label = "Northern BC"
            color = "blue"
            centroid = { lat = 57.0, lng = -125.0 }
            districts = ["A"]
        "#;

        assert!(matches!(
            RegionCatalog::from_toml_str(toml_str),
            Err(RegionError::Toml(_))
        ));
    }
}
