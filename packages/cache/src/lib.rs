#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Keyed query cache with stale-while-revalidate semantics.
//!
//! Every remote read in the client goes through a [`QueryCache`]. Entries
//! are keyed by a [`QueryKey`] (an ordered tuple of strings) and carry a
//! [`QueryPolicy`] that decides when the data goes stale and when an
//! unused entry is dropped. Stale data is served immediately while a
//! single background fetch refreshes it.
//!
//! [`PollingTask`] runs a periodic job (air-quality refresh, cache
//! janitor) and stops when dropped.

pub mod polling;
pub mod policy;
pub mod query;

pub use polling::PollingTask;
pub use policy::QueryPolicy;
pub use query::{QueryCache, QueryKey, QueryResult};

use thiserror::Error;

/// Failure recorded against a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The fetcher returned an error. The message is kept as text because
    /// every waiter on the same fetch receives a copy.
    #[error("{0}")]
    Fetch(String),

    /// The key already holds data of a different type.
    #[error("Cached value for {key} has an unexpected type")]
    TypeMismatch {
        /// The offending key, rendered with `/` separators.
        key: String,
    },
}
