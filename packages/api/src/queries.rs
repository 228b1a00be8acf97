//! Cached reads and invalidating writes over [`ApiClient`].
//!
//! Each read has a fixed [`QueryKey`] shape (see [`keys`]) and
//! [`QueryPolicy`]. Writes go straight to the backend and then invalidate
//! the keys whose data they change; nothing is invalidated implicitly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use climate_map_api_models::{
    AirQuality, Category, ClimateEvent, ClimateProjections, EventPageQuery, EventStatus,
    NewCategory, NewEvent, Page, RegionRecord, RegionalClimate,
};
use climate_map_cache::{PollingTask, QueryCache, QueryKey, QueryPolicy, QueryResult};
use serde_json::Value;

use crate::{ApiClient, ApiError};

/// Query key builders. Keys that share a prefix are invalidated together.
pub mod keys {
    use climate_map_api_models::{EventPageQuery, EventStatus};
    use climate_map_cache::QueryKey;

    const ANY: &str = "any";

    #[must_use]
    pub fn categories() -> QueryKey {
        QueryKey::from(["categories"])
    }

    /// Prefix of every event listing.
    #[must_use]
    pub fn events() -> QueryKey {
        QueryKey::from(["events"])
    }

    #[must_use]
    pub fn events_all(status: Option<EventStatus>) -> QueryKey {
        events()
            .with("all")
            .with(status.map_or_else(|| ANY.to_string(), |s| s.0.to_string()))
    }

    #[must_use]
    pub fn events_page(query: &EventPageQuery) -> QueryKey {
        events()
            .with("paginated")
            .with(query.page)
            .with(query.page_size)
            .with(query.category_id.as_deref().unwrap_or(ANY))
            .with(query.status.map_or_else(|| ANY.to_string(), |s| s.0.to_string()))
    }

    #[must_use]
    pub fn event(id: &str) -> QueryKey {
        QueryKey::from(["event", id])
    }

    #[must_use]
    pub fn regions() -> QueryKey {
        QueryKey::from(["regions"])
    }

    #[must_use]
    pub fn regional_climate(region: &str) -> QueryKey {
        QueryKey::from(["climate", "region", region])
    }

    #[must_use]
    pub fn projections(region: &str, model: &str, scenario: &str) -> QueryKey {
        QueryKey::from(["climate", "projections", region, model, scenario])
    }

    #[must_use]
    pub fn air_quality(region: &str) -> QueryKey {
        QueryKey::from(["climate", "air-quality", region])
    }
}

/// How often [`CachedApi`] sweeps unused queries out of its cache.
pub const JANITOR_PERIOD: Duration = Duration::from_secs(60);

/// [`ApiClient`] reads served through a shared [`QueryCache`].
///
/// Clones share the cache and its eviction task, which stops when the
/// last clone is dropped.
#[derive(Clone)]
pub struct CachedApi {
    client: Arc<ApiClient>,
    cache: QueryCache,
    janitor: Arc<PollingTask>,
}

impl CachedApi {
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self::with_cache(Arc::new(client), QueryCache::new())
    }

    /// Starts evicting unused entries from `cache` every
    /// [`JANITOR_PERIOD`]. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_cache(client: Arc<ApiClient>, cache: QueryCache) -> Self {
        let janitor = Arc::new(cache.spawn_janitor(JANITOR_PERIOD));
        Self {
            client,
            cache,
            janitor,
        }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub fn is_evicting(&self) -> bool {
        self.janitor.is_running()
    }

    async fn cached<T, F, Fut>(&self, key: QueryKey, policy: QueryPolicy, f: F) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(Arc<ApiClient>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        self.cache.query(&key, policy, move || f(client)).await
    }

    pub async fn categories(&self) -> QueryResult<Vec<Category>> {
        self.cached(keys::categories(), QueryPolicy::CATEGORIES, |c| async move {
            c.categories().await
        })
        .await
    }

    pub async fn events_all(&self, status: Option<EventStatus>) -> QueryResult<Vec<ClimateEvent>> {
        self.cached(
            keys::events_all(status),
            QueryPolicy::EVENTS_ALL,
            move |c| async move { c.events_all(status).await },
        )
        .await
    }

    pub async fn events_page(&self, query: &EventPageQuery) -> QueryResult<Page<ClimateEvent>> {
        let owned = query.clone();
        self.cached(
            keys::events_page(query),
            QueryPolicy::EVENTS_PAGINATED,
            move |c| async move { c.events_page(&owned).await },
        )
        .await
    }

    pub async fn event(&self, id: &str) -> QueryResult<ClimateEvent> {
        let id_owned = id.to_string();
        self.cached(keys::event(id), QueryPolicy::EVENT, move |c| async move {
            c.event(&id_owned).await
        })
        .await
    }

    pub async fn regions(&self) -> QueryResult<Vec<RegionRecord>> {
        self.cached(keys::regions(), QueryPolicy::REGIONS, |c| async move {
            c.regions().await
        })
        .await
    }

    pub async fn regional_climate(&self, region: &str) -> QueryResult<RegionalClimate> {
        let region_owned = region.to_string();
        self.cached(
            keys::regional_climate(region),
            QueryPolicy::CLIMATE,
            move |c| async move { c.regional_climate(&region_owned).await },
        )
        .await
    }

    pub async fn projections(
        &self,
        region: &str,
        model: &str,
        scenario: &str,
    ) -> QueryResult<ClimateProjections> {
        let (r, m, s) = (region.to_string(), model.to_string(), scenario.to_string());
        self.cached(
            keys::projections(region, model, scenario),
            QueryPolicy::CLIMATE,
            move |c| async move { c.projections(&r, &m, &s).await },
        )
        .await
    }

    pub async fn air_quality(&self, region: &str) -> QueryResult<AirQuality> {
        let region_owned = region.to_string();
        self.cached(
            keys::air_quality(region),
            QueryPolicy::AIR_QUALITY,
            move |c| async move { c.air_quality(&region_owned).await },
        )
        .await
    }

    /// Forces a fresh air-quality reading.
    pub async fn refetch_air_quality(&self, region: &str) -> QueryResult<AirQuality> {
        let client = Arc::clone(&self.client);
        let region_owned = region.to_string();
        self.cache
            .refetch(&keys::air_quality(region), QueryPolicy::AIR_QUALITY, move || {
                async move { client.air_quality(&region_owned).await }
            })
            .await
    }

    /// Re-fetches air quality for `region` every `interval` and hands each
    /// result to `on_update`. Stops when the returned task is dropped.
    #[must_use]
    pub fn poll_air_quality<F>(&self, region: &str, interval: Duration, on_update: F) -> PollingTask
    where
        F: Fn(QueryResult<AirQuality>) + Send + Sync + 'static,
    {
        let api = self.clone();
        let region = region.to_string();
        let on_update = Arc::new(on_update);
        PollingTask::spawn(format!("air-quality:{region}"), interval, move || {
            let api = api.clone();
            let region = region.clone();
            let on_update = Arc::clone(&on_update);
            async move {
                on_update(api.refetch_air_quality(&region).await);
            }
        })
    }

    // Writes

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the event.
    pub async fn create_event(&self, event: &NewEvent) -> Result<Value, ApiError> {
        let result = self.client.create_event(event).await?;
        self.events_changed();
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the update.
    pub async fn update_event(&self, id: &str, event: &NewEvent) -> Result<Value, ApiError> {
        let result = self.client.update_event(id, event).await?;
        self.event_changed(id);
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the deletion.
    pub async fn delete_event(&self, id: &str) -> Result<Value, ApiError> {
        let result = self.client.delete_event(id).await?;
        self.event_removed(id);
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the approval.
    pub async fn approve_event(&self, id: &str) -> Result<Value, ApiError> {
        let result = self.client.approve_event(id).await?;
        self.event_changed(id);
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the change.
    pub async fn set_featured(&self, id: &str, is_featured: bool) -> Result<Value, ApiError> {
        let result = self.client.set_featured(id, is_featured).await?;
        self.event_changed(id);
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the category.
    pub async fn create_category(&self, category: &NewCategory) -> Result<Value, ApiError> {
        let result = self.client.create_category(category).await?;
        self.categories_changed();
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the update.
    pub async fn update_category(
        &self,
        id: &str,
        category: &NewCategory,
    ) -> Result<Value, ApiError> {
        let result = self.client.update_category(id, category).await?;
        self.categories_changed();
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend rejects the deletion.
    pub async fn delete_category(&self, id: &str) -> Result<Value, ApiError> {
        let result = self.client.delete_category(id).await?;
        self.categories_changed();
        Ok(result)
    }

    fn events_changed(&self) {
        self.cache.invalidate(&keys::events());
    }

    fn event_changed(&self, id: &str) {
        self.cache.invalidate(&keys::event(id));
        self.events_changed();
    }

    fn event_removed(&self, id: &str) {
        self.cache.remove(&keys::event(id));
        self.events_changed();
    }

    fn categories_changed(&self) {
        self.cache.invalidate(&keys::categories());
    }
}
