#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the climate-map REST backend.
//!
//! [`ApiClient`] maps each backend endpoint to a typed async method.
//! [`CachedApi`] layers the shared query cache on top so that repeated
//! reads are served from memory and mutations invalidate the affected
//! queries.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod queries;
mod retry;

pub use client::ApiClient;
pub use config::{ApiConfig, RetryPolicy};
pub use endpoints::Endpoints;
pub use queries::{CachedApi, keys};

use std::future::Future;

use climate_map_api_models::ApiResponse;
use thiserror::Error;

/// Errors from talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status. `message` is the
    /// backend's `detail` when it sent one.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Backend detail or a generic description of the status.
        message: String,
    },

    /// The body was not the JSON shape expected.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured base URL is unusable.
    #[error("Invalid base URL {url:?}: {message}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// An environment setting could not be parsed.
    #[error("Invalid configuration {name}: {message}")]
    Config {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl ApiError {
    /// The HTTP status, if the backend answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

/// Awaits a client call and folds it into the uniform
/// `{ success, data, error }` shape.
pub async fn call<T>(request: impl Future<Output = Result<T, ApiError>>) -> ApiResponse<T> {
    let result = request.await;
    if let Err(e) = &result {
        log::error!("API call failed: {e}");
    }
    ApiResponse::from_result(result)
}
