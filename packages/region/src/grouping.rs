//! Partitions boundary features into high-level region groups.
//!
//! Each feature is looked up by its district name in the
//! [`RegionCatalog`]. Catalogued features are appended to their region's
//! `FeatureCollection`; anything else is left out. Every feature belongs
//! to at most one region, so the output doesn't depend on input order
//! beyond the order of features within a group.

use std::collections::BTreeMap;

use climate_map_region_models::RegionLabel;
use geojson::{Feature, FeatureCollection, GeoJson};

use crate::{RegionCatalog, RegionError, matching::district_name};

/// Placeholder recorded in [`GroupingReport::unmapped`] for features with
/// no district-name property.
pub const UNNAMED_DISTRICT: &str = "<unnamed>";

/// All boundary features belonging to one high-level region.
#[derive(Debug, Clone)]
pub struct RegionGroup {
    /// The region.
    pub label: RegionLabel,
    /// The district features grouped under it.
    pub features: FeatureCollection,
}

impl RegionGroup {
    /// Serializes the group as a `GeoJSON` `FeatureCollection` string.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Json`] if serialization fails.
    pub fn to_geojson_string(&self) -> Result<String, RegionError> {
        Ok(serde_json::to_string(&GeoJson::FeatureCollection(
            self.features.clone(),
        ))?)
    }
}

/// Grouping output plus the district names that were left out.
#[derive(Debug, Clone, Default)]
pub struct GroupingReport {
    /// One collection per region that received at least one feature.
    pub groups: BTreeMap<RegionLabel, FeatureCollection>,
    /// District names (or [`UNNAMED_DISTRICT`]) of skipped features.
    pub unmapped: Vec<String>,
}

impl GroupingReport {
    /// Total features placed into a group.
    #[must_use]
    pub fn grouped_count(&self) -> usize {
        self.groups.values().map(|fc| fc.features.len()).sum()
    }

    /// Converts the grouped collections into [`RegionGroup`]s in canonical
    /// region order.
    #[must_use]
    pub fn into_groups(self) -> Vec<RegionGroup> {
        self.groups
            .into_iter()
            .map(|(label, features)| RegionGroup { label, features })
            .collect()
    }
}

/// Groups features by high-level region, skipping uncatalogued districts.
#[must_use]
pub fn group(
    catalog: &RegionCatalog,
    features: &[Feature],
) -> BTreeMap<RegionLabel, FeatureCollection> {
    group_with_report(catalog, features).groups
}

/// Groups features by high-level region and reports what was skipped.
#[must_use]
pub fn group_with_report(catalog: &RegionCatalog, features: &[Feature]) -> GroupingReport {
    let mut report = GroupingReport::default();

    for feature in features {
        let name = district_name(feature);
        let Some(label) = name.and_then(|n| catalog.region_of(n)) else {
            let name = name.unwrap_or(UNNAMED_DISTRICT);
            log::debug!("Skipping uncatalogued district {name:?}");
            report.unmapped.push(name.to_string());
            continue;
        };

        report
            .groups
            .entry(label)
            .or_insert_with(empty_collection)
            .features
            .push(feature.clone());
    }

    if !report.unmapped.is_empty() {
        log::info!(
            "Grouped {} features into {} regions; {} uncatalogued",
            report.grouped_count(),
            report.groups.len(),
            report.unmapped.len()
        );
    }

    report
}

const fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn district(name: &str) -> Feature {
        Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: serde_json::json!({ "ADMIN_AREA_NAME": name })
                .as_object()
                .cloned(),
            foreign_members: None,
        }
    }

    fn all_catalogued() -> Vec<Feature> {
        let catalog = RegionCatalog::bc();
        catalog
            .labels()
            .flat_map(|label| catalog.districts_of(label).iter())
            .map(|name| district(name))
            .collect()
    }

    #[test]
    fn full_dataset_yields_five_groups_and_no_leftovers() {
        let features = all_catalogued();
        let report = group_with_report(RegionCatalog::bc(), &features);

        assert_eq!(report.groups.len(), 5);
        assert!(report.groups.values().all(|fc| !fc.features.is_empty()));
        assert!(report.unmapped.is_empty());
        assert_eq!(report.grouped_count(), features.len());
    }

    #[test]
    fn each_catalogued_district_lands_in_exactly_one_group() {
        let catalog = RegionCatalog::bc();
        let groups = group(catalog, &all_catalogued());

        for label in catalog.labels() {
            for name in catalog.districts_of(label) {
                let holders: Vec<RegionLabel> = groups
                    .iter()
                    .filter(|(_, fc)| {
                        fc.features
                            .iter()
                            .any(|f| district_name(f) == Some(name.as_str()))
                    })
                    .map(|(l, _)| *l)
                    .collect();
                assert_eq!(holders, vec![label], "district {name}");
            }
        }
    }

    #[test]
    fn uncatalogued_districts_are_excluded_everywhere() {
        let mut features = all_catalogued();
        features.push(district("Regional District of Atlantis"));
        features.push(Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: None,
            foreign_members: None,
        });

        let report = group_with_report(RegionCatalog::bc(), &features);
        assert_eq!(
            report.unmapped,
            vec!["Regional District of Atlantis", UNNAMED_DISTRICT]
        );
        assert!(report.groups.values().all(|fc| {
            fc.features
                .iter()
                .all(|f| district_name(f) != Some("Regional District of Atlantis"))
        }));
    }

    #[test]
    fn partial_dataset_only_creates_touched_regions() {
        let features = vec![
            district("Capital Regional District"),
            district("Regional District of Nanaimo"),
        ];
        let groups = group(RegionCatalog::bc(), &features);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&RegionLabel::VancouverIslandCoast].features.len(), 2);
    }

    #[test]
    fn grouping_ignores_input_order() {
        let features = all_catalogued();
        let mut reversed = features.clone();
        reversed.reverse();
        let mut rotated = features.clone();
        rotated.rotate_left(features.len() / 3);

        let members = |input: &[Feature]| -> Vec<(RegionLabel, Vec<String>)> {
            group_with_report(RegionCatalog::bc(), input)
                .into_groups()
                .iter()
                .map(|g| {
                    let mut names: Vec<String> = g
                        .features
                        .features
                        .iter()
                        .filter_map(district_name)
                        .map(str::to_string)
                        .collect();
                    names.sort();
                    (g.label, names)
                })
                .collect()
        };

        let expected = members(&features);
        assert!(!expected.is_empty());
        assert_eq!(members(&reversed), expected);
        assert_eq!(members(&rotated), expected);
    }

    #[test]
    fn group_survives_geojson_round_trip() {
        let features = all_catalogued();
        let groups = group_with_report(RegionCatalog::bc(), &features).into_groups();

        for region in &groups {
            let json = region.to_geojson_string().unwrap();
            let parsed: GeoJson = json.parse().unwrap();
            let GeoJson::FeatureCollection(fc) = parsed else {
                panic!("expected a FeatureCollection for {}", region.label);
            };

            let before: Vec<Option<&str>> =
                region.features.features.iter().map(district_name).collect();
            let after: Vec<Option<&str>> = fc.features.iter().map(district_name).collect();
            assert_eq!(fc.features.len(), region.features.features.len());
            assert_eq!(before, after);
        }
    }
}
