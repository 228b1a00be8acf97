#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client-side event processing for the climate map.
//!
//! Events arrive from the backend with optional coordinates and a region
//! field that may hold a backend ID or a label. This crate:
//!
//! - fills in missing coordinates through a [`Geocoder`] ([`reconcile`]),
//! - classifies and resolves region references once ([`RegionResolver`]),
//! - filters events by region and category ([`filter`]),
//! - summarizes them for the analytics view ([`analytics`]).

pub mod analytics;
pub mod filter;
pub mod progress;
pub mod reconcile;
pub mod resolve;

pub use filter::{CategoryIndex, EventFilter, MapEvent, filter_events, prepare};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use reconcile::{
    CentroidFallback, DEFAULT_CONCURRENCY, Geocoder, reconcile, reconcile_batch,
};
pub use resolve::RegionResolver;
