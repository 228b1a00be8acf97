//! In-memory spatial index over grouped district boundaries.
//!
//! Built from the output of [`crate::group`], the index stores every
//! district polygon in an R-tree tagged with its region, and answers
//! point-in-region queries for event pins.

use std::collections::BTreeMap;

use climate_map_region_models::{LatLng, RegionLabel};
use geo::{BoundingRect, Contains, MultiPolygon};
use geojson::{Feature, FeatureCollection};
use rstar::{AABB, RTree, RTreeObject};

use crate::matching::district_name;

/// A district polygon stored in the R-tree with its region.
struct DistrictEntry {
    label: RegionLabel,
    district: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for DistrictEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of district polygons keyed by high-level region.
///
/// Districts tile the province without overlap, so the first containing
/// polygon decides the region.
pub struct RegionIndex {
    districts: RTree<DistrictEntry>,
}

impl RegionIndex {
    /// Builds the index from grouped boundary collections.
    ///
    /// Features without a polygonal geometry are skipped with a warning.
    #[must_use]
    pub fn build(groups: &BTreeMap<RegionLabel, FeatureCollection>) -> Self {
        let mut entries = Vec::new();

        for (label, collection) in groups {
            for feature in &collection.features {
                let district = district_name(feature).unwrap_or_default().to_string();
                let Some(polygon) = feature_to_multipolygon(feature) else {
                    log::warn!("No polygon geometry for district {district:?} in {label}");
                    continue;
                };

                entries.push(DistrictEntry {
                    label: *label,
                    district,
                    envelope: compute_envelope(&polygon),
                    polygon,
                });
            }
        }

        log::debug!("Built region index with {} district polygons", entries.len());

        Self {
            districts: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed district polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.size()
    }

    /// Whether the index holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the region whose boundary contains the point.
    #[must_use]
    pub fn region_at(&self, point: LatLng) -> Option<RegionLabel> {
        self.entry_at(point).map(|e| e.label)
    }

    /// Returns the district name whose boundary contains the point.
    #[must_use]
    pub fn district_at(&self, point: LatLng) -> Option<&str> {
        self.entry_at(point).map(|e| e.district.as_str())
    }

    /// Whether the point falls inside any district of `label`.
    #[must_use]
    pub fn contains(&self, label: RegionLabel, point: LatLng) -> bool {
        let geo_point = geo::Point::new(point.lng, point.lat);
        let query_env = AABB::from_point([point.lng, point.lat]);

        self.districts
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| entry.label == label && entry.polygon.contains(&geo_point))
    }

    fn entry_at(&self, point: LatLng) -> Option<&DistrictEntry> {
        let geo_point = geo::Point::new(point.lng, point.lat);
        let query_env = AABB::from_point([point.lng, point.lat]);

        self.districts
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&geo_point))
    }
}

/// Converts a feature's `Polygon` or `MultiPolygon` geometry to a
/// [`MultiPolygon`].
fn feature_to_multipolygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
