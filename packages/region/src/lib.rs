#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region catalog and boundary grouping for the BC climate map.
//!
//! BC's regional districts are tiled into five high-level regions. This
//! crate owns that mapping and everything derived from it:
//!
//! - [`catalog`]: the compile-time embedded district → region catalog,
//!   with per-region display colors and centroids.
//! - [`matching`]: district-name extraction and the prioritized fuzzy
//!   lookup used to find a boundary feature by name.
//! - [`grouping`]: partitions boundary features into one
//!   `FeatureCollection` per region.
//! - [`spatial`]: an R-tree over the grouped polygons for
//!   point-in-region lookups.

pub mod catalog;
pub mod grouping;
pub mod matching;
pub mod spatial;

pub use catalog::RegionCatalog;
pub use climate_map_region_models::{LatLng, RegionLabel, RegionRef, RgbHex};
pub use grouping::{GroupingReport, RegionGroup, group, group_with_report};
pub use matching::{FeatureMatch, MatchStrategy, district_name, find_feature};
pub use spatial::RegionIndex;

use thiserror::Error;

/// Errors from building or loading region data.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The catalog TOML could not be parsed.
    #[error("Catalog parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The catalog parsed but violates an invariant.
    #[error("Invalid catalog: {message}")]
    Catalog {
        /// Description of the violated invariant.
        message: String,
    },

    /// A region group could not be serialized.
    #[error("GeoJSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
