#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Regional-district boundary loading.
//!
//! The boundary dataset is a single `GeoJSON` `FeatureCollection` fetched
//! from a URL or read from disk. [`BoundaryLoader`] fetches it once,
//! shares the in-flight fetch between concurrent callers, and keeps the
//! parsed collection in memory until it is invalidated or torn down.

pub mod loader;
pub mod source;

pub use loader::{BoundaryLoader, LoadResult};
pub use source::{BoundarySource, FetchBoundaries, SourceFetcher};

use thiserror::Error;

/// Errors from fetching or parsing the boundary dataset.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Boundary request to {url} failed with status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Reading a local dataset failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The body was not valid `GeoJSON`.
    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The dataset parsed but is not a `FeatureCollection`.
    #[error("Boundary dataset is not a FeatureCollection")]
    NotFeatureCollection,

    /// The loader was torn down and no longer serves data.
    #[error("Boundary loader has been torn down")]
    TornDown,
}
