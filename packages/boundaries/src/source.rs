//! Where the boundary dataset comes from and how it is fetched.

use std::path::PathBuf;

use async_trait::async_trait;
use geojson::{FeatureCollection, GeoJson};

use crate::BoundaryError;

/// Environment variable overriding the boundary dataset location.
pub const BOUNDARIES_ENV: &str = "CLIMATE_MAP_BOUNDARIES";

/// Default dataset path, relative to the working directory.
pub const DEFAULT_BOUNDARIES_PATH: &str = "data/ABMS_REGIONAL_DISTRICTS_SP.geojson";

/// Location of a boundary `GeoJSON` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySource {
    /// Fetched over HTTP(S).
    Url(String),
    /// Read from the local filesystem.
    File(PathBuf),
}

impl BoundarySource {
    /// Classifies a location string: `http://` and `https://` prefixes are
    /// URLs, anything else is a file path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }

    /// Reads the location from `CLIMATE_MAP_BOUNDARIES`, falling back to
    /// [`DEFAULT_BOUNDARIES_PATH`].
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(BOUNDARIES_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(
                || Self::File(PathBuf::from(DEFAULT_BOUNDARIES_PATH)),
                |raw| Self::parse(&raw),
            )
    }
}

impl std::fmt::Display for BoundarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Something that can produce the boundary `FeatureCollection`.
///
/// [`SourceFetcher`] is the production implementation; tests substitute
/// their own to count or fail fetches.
#[async_trait]
pub trait FetchBoundaries: Send + Sync {
    /// Fetches and parses the dataset. Called at most once per successful
    /// load by [`crate::BoundaryLoader`].
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the dataset cannot be fetched or parsed.
    async fn fetch(&self) -> Result<FeatureCollection, BoundaryError>;

    /// Human-readable description of where the data comes from.
    fn describe(&self) -> String;
}

/// Fetches boundaries from a [`BoundarySource`].
pub struct SourceFetcher {
    client: reqwest::Client,
    source: BoundarySource,
}

impl SourceFetcher {
    #[must_use]
    pub const fn new(client: reqwest::Client, source: BoundarySource) -> Self {
        Self { client, source }
    }

    async fn read_body(&self) -> Result<String, BoundaryError> {
        match &self.source {
            BoundarySource::Url(url) => {
                let resp = self.client.get(url).send().await?;
                if !resp.status().is_success() {
                    return Err(BoundaryError::Status {
                        url: url.clone(),
                        status: resp.status().as_u16(),
                    });
                }
                Ok(resp.text().await?)
            }
            BoundarySource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
        }
    }
}

#[async_trait]
impl FetchBoundaries for SourceFetcher {
    async fn fetch(&self) -> Result<FeatureCollection, BoundaryError> {
        let body = self.read_body().await?;
        parse_feature_collection(&body)
    }

    fn describe(&self) -> String {
        self.source.to_string()
    }
}

/// Parses a `GeoJSON` document that must be a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the text is not `GeoJSON` or holds a
/// single feature or geometry instead of a collection.
pub fn parse_feature_collection(body: &str) -> Result<FeatureCollection, BoundaryError> {
    match body.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        GeoJson::Feature(_) | GeoJson::Geometry(_) => Err(BoundaryError::NotFeatureCollection),
    }
}
