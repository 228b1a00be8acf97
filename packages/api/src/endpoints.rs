//! URL construction for every backend route.

use climate_map_api_models::{EventPageQuery, EventStatus};
use reqwest::Url;

use crate::ApiError;

/// Builds endpoint URLs under a validated base URL.
///
/// Path segments are percent-encoded, so IDs and region names can be
/// passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `base_url` does not parse or
    /// cannot carry a path (e.g. `mailto:`).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let invalid = |message: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            message,
        };
        let base = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot have a path".to_string()));
        }
        Ok(Self { base })
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn url_with_query(&self, segments: &[&str], pairs: &[(&str, Option<&str>)]) -> Url {
        let mut url = self.url(segments);
        let present: Vec<(&str, &str)> = pairs
            .iter()
            .filter_map(|(k, v)| v.map(|v| (*k, v)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        url
    }

    #[must_use]
    pub fn categories(&self) -> Url {
        self.url(&["category"])
    }

    #[must_use]
    pub fn category(&self, id: &str) -> Url {
        self.url(&["category", id])
    }

    /// `GET /event/all[?status=]`.
    #[must_use]
    pub fn events_all(&self, status: Option<EventStatus>) -> Url {
        let status = status.map(|s| s.0.to_string());
        self.url_with_query(&["event", "all"], &[("status", status.as_deref())])
    }

    /// `GET /event/?page=&page_size=[&category_id=][&status=]`.
    #[must_use]
    pub fn events_page(&self, query: &EventPageQuery) -> Url {
        let page = query.page.to_string();
        let page_size = query.page_size.to_string();
        let status = query.status.map(|s| s.0.to_string());
        self.url_with_query(
            &["event", ""],
            &[
                ("page", Some(page.as_str())),
                ("page_size", Some(page_size.as_str())),
                ("category_id", query.category_id.as_deref()),
                ("status", status.as_deref()),
            ],
        )
    }

    /// Collection root for creating events: `/event/`.
    #[must_use]
    pub fn events(&self) -> Url {
        self.url(&["event", ""])
    }

    #[must_use]
    pub fn event(&self, id: &str) -> Url {
        self.url(&["event", id])
    }

    #[must_use]
    pub fn approve_event(&self, id: &str) -> Url {
        self.url(&["event", id, "approve"])
    }

    #[must_use]
    pub fn feature_event(&self, id: &str) -> Url {
        self.url(&["event", id, "feature"])
    }

    #[must_use]
    pub fn regions(&self) -> Url {
        self.url(&["region"])
    }

    /// `GET /geocoding/?location=[&region=]`.
    #[must_use]
    pub fn geocode(&self, location: &str, region: Option<&str>) -> Url {
        self.url_with_query(
            &["geocoding", ""],
            &[("location", Some(location)), ("region", region)],
        )
    }

    #[must_use]
    pub fn regional_climate(&self, region: &str) -> Url {
        self.url_with_query(&["climate", "region"], &[("region", Some(region))])
    }

    #[must_use]
    pub fn projections(&self, region: &str, model: &str, scenario: &str) -> Url {
        self.url_with_query(
            &["climate", "projections"],
            &[
                ("region", Some(region)),
                ("model", Some(model)),
                ("scenario", Some(scenario)),
            ],
        )
    }

    #[must_use]
    pub fn air_quality(&self, region: &str) -> Url {
        self.url_with_query(&["climate", "air-quality"], &[("region", Some(region))])
    }
}
