//! Typed methods for each backend endpoint.

use climate_map_api_models::{
    AirQuality, Category, ClimateEvent, ClimateProjections, EventPageQuery, EventStatus,
    FeatureToggle, GeocodeResult, Listing, NewCategory, NewEvent, Page, RegionRecord,
    RegionalClimate,
};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::retry::{send_json, send_value};
use crate::{ApiConfig, ApiError, Endpoints, RetryPolicy};

/// Client for the climate-map backend.
///
/// Reads are retried on transient failures; writes are sent once so a
/// timed-out `POST` is never duplicated.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError`] if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("climate-map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http(http, config)
    }

    /// Uses an existing `reqwest` client (shared connection pool).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if the base URL is invalid.
    pub fn with_http(http: reqwest::Client, config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http,
            endpoints: Endpoints::new(&config.base_url)?,
            token: config.token.clone(),
            retry: config.retry,
        })
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        log::debug!("GET {url}");
        send_json(|| self.request(Method::GET, url.clone()), self.retry).await
    }

    async fn get_value(&self, url: Url) -> Result<Value, ApiError> {
        log::debug!("GET {url}");
        send_value(|| self.request(Method::GET, url.clone()), self.retry).await
    }

    async fn write_json<B: serde::Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Value, ApiError> {
        log::debug!("{method} {url}");
        send_value(
            || self.request(method.clone(), url.clone()).json(body),
            RetryPolicy::NONE,
        )
        .await
    }

    async fn write_form<B: serde::Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Value, ApiError> {
        log::debug!("{method} {url} (form)");
        send_value(
            || self.request(method.clone(), url.clone()).form(body),
            RetryPolicy::NONE,
        )
        .await
    }

    async fn write_empty(&self, method: Method, url: Url) -> Result<Value, ApiError> {
        log::debug!("{method} {url}");
        send_value(
            || self.request(method.clone(), url.clone()),
            RetryPolicy::NONE,
        )
        .await
    }

    // Categories

    /// All categories. The backend may return a bare array or a page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let listing: Listing<Category> = self.get(self.endpoints.categories()).await?;
        Ok(listing.into_vec())
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn create_category(&self, category: &NewCategory) -> Result<Value, ApiError> {
        self.write_json(Method::POST, self.endpoints.categories(), category)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn update_category(
        &self,
        id: &str,
        category: &NewCategory,
    ) -> Result<Value, ApiError> {
        self.write_json(Method::PUT, self.endpoints.category(id), category)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn delete_category(&self, id: &str) -> Result<Value, ApiError> {
        self.write_empty(Method::DELETE, self.endpoints.category(id))
            .await
    }

    // Events

    /// Every event, optionally restricted to one status. Anything other
    /// than a JSON array is treated as no events.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn events_all(
        &self,
        status: Option<EventStatus>,
    ) -> Result<Vec<ClimateEvent>, ApiError> {
        let value = self.get_value(self.endpoints.events_all(status)).await?;
        events_from_value(value)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn events_page(
        &self,
        query: &EventPageQuery,
    ) -> Result<Page<ClimateEvent>, ApiError> {
        let mut page: Page<ClimateEvent> = self.get(self.endpoints.events_page(query)).await?;
        if page.page_size == 0 {
            page.page_size = query.page_size;
        }
        Ok(page)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure; a
    /// missing event is [`ApiError::Status`] with 404.
    pub async fn event(&self, id: &str) -> Result<ClimateEvent, ApiError> {
        self.get(self.endpoints.event(id)).await
    }

    /// Submits a new event as a form. The year is derived from the date.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn create_event(&self, event: &NewEvent) -> Result<Value, ApiError> {
        let event = event.clone().with_year();
        self.write_form(Method::POST, self.endpoints.events(), &event)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn update_event(&self, id: &str, event: &NewEvent) -> Result<Value, ApiError> {
        let event = event.clone().with_year();
        self.write_form(Method::PUT, self.endpoints.event(id), &event)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn delete_event(&self, id: &str) -> Result<Value, ApiError> {
        self.write_empty(Method::DELETE, self.endpoints.event(id))
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn approve_event(&self, id: &str) -> Result<Value, ApiError> {
        self.write_empty(Method::PATCH, self.endpoints.approve_event(id))
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn set_featured(&self, id: &str, is_featured: bool) -> Result<Value, ApiError> {
        self.write_json(
            Method::PATCH,
            self.endpoints.feature_event(id),
            &FeatureToggle { is_featured },
        )
        .await
    }

    // Regions

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn regions(&self) -> Result<Vec<RegionRecord>, ApiError> {
        let listing: Listing<RegionRecord> = self.get(self.endpoints.regions()).await?;
        Ok(listing.into_vec())
    }

    // Geocoding

    /// Resolves a place name, scoped by an optional region hint.
    ///
    /// `Ok(None)` means the geocoder found nothing (404 or a body without
    /// coordinates).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or any other error status.
    pub async fn geocode(
        &self,
        location: &str,
        region: Option<&str>,
    ) -> Result<Option<GeocodeResult>, ApiError> {
        match self.get_value(self.endpoints.geocode(location, region)).await {
            Ok(value) => Ok(geocode_from_value(&value)),
            Err(e) if e.is_not_found() => {
                log::debug!("No geocode match for {location:?}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // Climate statistics

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn regional_climate(&self, region: &str) -> Result<RegionalClimate, ApiError> {
        self.get(self.endpoints.regional_climate(region)).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn projections(
        &self,
        region: &str,
        model: &str,
        scenario: &str,
    ) -> Result<ClimateProjections, ApiError> {
        self.get(self.endpoints.projections(region, model, scenario))
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn air_quality(&self, region: &str) -> Result<AirQuality, ApiError> {
        self.get(self.endpoints.air_quality(region)).await
    }
}

fn events_from_value(value: Value) -> Result<Vec<ClimateEvent>, ApiError> {
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        log::warn!("Expected an event array, got {}", json_kind(&value));
        Ok(Vec::new())
    }
}

/// Reads `lat`/`lng` (and `adjusted`) from a geocode body. Missing or
/// non-numeric coordinates mean no match.
fn geocode_from_value(value: &Value) -> Option<GeocodeResult> {
    let lat = value.get("lat")?.as_f64()?;
    let lng = value.get("lng")?.as_f64()?;
    let adjusted = value
        .get("adjusted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(GeocodeResult { lat, lng, adjusted })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn geocode_body_parsing() {
        assert_eq!(
            geocode_from_value(&json!({"lat": 49.28, "lng": -123.12, "adjusted": true})),
            Some(GeocodeResult {
                lat: 49.28,
                lng: -123.12,
                adjusted: true
            })
        );
        assert_eq!(
            geocode_from_value(&json!({"lat": 49.28, "lng": -123.12})).map(|g| g.adjusted),
            Some(false)
        );
        assert_eq!(geocode_from_value(&json!({"lat": null, "lng": null})), None);
        assert_eq!(geocode_from_value(&json!({"detail": "not found"})), None);
    }

    #[test]
    fn events_all_requires_an_array() {
        let events = events_from_value(json!([
            {"event_id": 1, "title": "Flood", "lat": 49.1, "lng": -122.3},
            {"event_id": 2, "title": "Heatwave"}
        ]))
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, "1");

        assert!(events_from_value(json!({"items": []})).unwrap().is_empty());
        assert!(events_from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn client_uses_configured_base() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "https://climate.example.org/api/climate".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoints().regions().as_str(),
            "https://climate.example.org/api/climate/region"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        let err = ApiClient::new(&ApiConfig {
            base_url: "::".to_string(),
            ..ApiConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }
}
