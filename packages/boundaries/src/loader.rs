//! Boundary loading service with a shared in-flight fetch.
//!
//! The loader is an explicit object with a lifecycle rather than a
//! module-level singleton: construct it with a fetcher, call
//! [`BoundaryLoader::load`] from any number of consumers, and
//! [`invalidate`](BoundaryLoader::invalidate) or
//! [`teardown`](BoundaryLoader::teardown) it when done. Tests build a
//! fresh loader per case.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use climate_map_region::{GroupingReport, RegionCatalog, find_feature, group_with_report};
use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use geojson::{Feature, FeatureCollection};

use crate::{BoundaryError, FetchBoundaries};

/// Result of a load. The error is shared because every caller waiting on
/// the same in-flight fetch observes the same failure.
pub type LoadResult = Result<Arc<FeatureCollection>, Arc<BoundaryError>>;

type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

enum LoadState {
    Idle,
    Loading { generation: u64, fetch: SharedLoad },
    Ready(Arc<FeatureCollection>),
    TornDown,
}

struct Inner {
    state: LoadState,
    next_generation: u64,
}

/// Loads the boundary dataset once and serves it from memory.
///
/// - Concurrent [`load`](Self::load) calls made before the first fetch
///   resolves all await the same fetch.
/// - A successful fetch is cached until [`invalidate`](Self::invalidate).
/// - A failed fetch clears the in-flight slot so the next call retries.
///   Nothing is retried automatically.
pub struct BoundaryLoader {
    fetcher: Arc<dyn FetchBoundaries>,
    inner: Mutex<Inner>,
}

impl BoundaryLoader {
    /// Creates an idle loader. Nothing is fetched until the first
    /// [`load`](Self::load).
    #[must_use]
    pub fn new(fetcher: Arc<dyn FetchBoundaries>) -> Self {
        Self {
            fetcher,
            inner: Mutex::new(Inner {
                state: LoadState::Idle,
                next_generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the boundary collection, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns the shared [`BoundaryError`] if the fetch fails or the
    /// loader has been torn down.
    pub async fn load(&self) -> LoadResult {
        let (generation, fetch) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match &inner.state {
                LoadState::Ready(collection) => return Ok(Arc::clone(collection)),
                LoadState::TornDown => return Err(Arc::new(BoundaryError::TornDown)),
                LoadState::Loading { generation, fetch } => (*generation, fetch.clone()),
                LoadState::Idle => {
                    let generation = inner.next_generation;
                    inner.next_generation += 1;

                    let fetcher = Arc::clone(&self.fetcher);
                    log::info!("Loading boundaries from {}", fetcher.describe());
                    let fetch = async move {
                        fetcher
                            .fetch()
                            .await
                            .map(Arc::new)
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared();

                    inner.state = LoadState::Loading {
                        generation,
                        fetch: fetch.clone(),
                    };
                    (generation, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut inner = self.lock();
        // Only the load that is still current may settle the state; an
        // invalidate or teardown in the meantime wins.
        if matches!(&inner.state, LoadState::Loading { generation: g, .. } if *g == generation) {
            inner.state = match &result {
                Ok(collection) => {
                    log::info!("Loaded {} boundary features", collection.features.len());
                    LoadState::Ready(Arc::clone(collection))
                }
                Err(e) => {
                    log::error!("Failed to load boundaries: {e}");
                    LoadState::Idle
                }
            };
        }

        result
    }

    /// Returns the cached collection without fetching.
    #[must_use]
    pub fn get(&self) -> Option<Arc<FeatureCollection>> {
        match &self.lock().state {
            LoadState::Ready(collection) => Some(Arc::clone(collection)),
            _ => None,
        }
    }

    /// Whether a fetch is currently in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.lock().state, LoadState::Loading { .. })
    }

    /// Drops the cached collection (or abandons an in-flight fetch) so the
    /// next [`load`](Self::load) fetches again.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        if !matches!(inner.state, LoadState::TornDown) {
            inner.state = LoadState::Idle;
        }
    }

    /// Releases cached data permanently. Later loads fail with
    /// [`BoundaryError::TornDown`].
    pub fn teardown(&self) {
        self.lock().state = LoadState::TornDown;
    }

    /// Finds a boundary feature by name in the cached collection.
    ///
    /// Returns `None` if nothing is loaded yet or no strategy matches.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Feature> {
        let collection = self.get()?;
        find_feature(&collection.features, name).map(|hit| hit.feature.clone())
    }

    /// Loads the collection and groups it by high-level region.
    ///
    /// # Errors
    ///
    /// Returns the shared [`BoundaryError`] if loading fails.
    pub async fn load_grouped(
        &self,
        catalog: &RegionCatalog,
    ) -> Result<GroupingReport, Arc<BoundaryError>> {
        let collection = self.load().await?;
        Ok(group_with_report(catalog, &collection.features))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use climate_map_region::{RegionLabel, district_name};

    use super::*;

    fn district(name: &str) -> Feature {
        Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: serde_json::json!({ "ADMIN_AREA_NAME": name })
                .as_object()
                .cloned(),
            foreign_members: None,
        }
    }

    /// Counts fetches; fails the first `failures` of them.
    struct CountingFetcher {
        calls: AtomicUsize,
        failures: usize,
        features: Vec<Feature>,
    }

    impl CountingFetcher {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
                features: vec![
                    district("Capital Regional District"),
                    district("Regional District of North Okanagan"),
                    district("Thompson-Nicola Regional District"),
                ],
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchBoundaries for CountingFetcher {
        async fn fetch(&self) -> Result<FeatureCollection, BoundaryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield a few times so concurrent callers overlap with this fetch.
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            if call < self.failures {
                return Err(BoundaryError::Status {
                    url: "test://boundaries".to_string(),
                    status: 503,
                });
            }
            Ok(FeatureCollection {
                bbox: None,
                features: self.features.clone(),
                foreign_members: None,
            })
        }

        fn describe(&self) -> String {
            "test fetcher".to_string()
        }
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let fetcher = CountingFetcher::new(0);
        let loader = BoundaryLoader::new(fetcher.clone());

        let (a, b, c) = tokio::join!(loader.load(), loader.load(), loader.load());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn loaded_data_is_cached() {
        let fetcher = CountingFetcher::new(0);
        let loader = BoundaryLoader::new(fetcher.clone());

        assert!(loader.get().is_none());
        loader.load().await.unwrap();
        loader.load().await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(loader.get().unwrap().features.len(), 3);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn failure_clears_in_flight_fetch_so_next_call_retries() {
        let fetcher = CountingFetcher::new(1);
        let loader = BoundaryLoader::new(fetcher.clone());

        let (a, b) = tokio::join!(loader.load(), loader.load());
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(fetcher.calls(), 1);
        assert!(loader.get().is_none());

        loader.load().await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let fetcher = CountingFetcher::new(0);
        let loader = BoundaryLoader::new(fetcher.clone());

        loader.load().await.unwrap();
        loader.invalidate();
        assert!(loader.get().is_none());
        loader.load().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn teardown_rejects_further_loads() {
        let loader = BoundaryLoader::new(CountingFetcher::new(0));
        loader.load().await.unwrap();
        loader.teardown();

        assert!(loader.get().is_none());
        let err = loader.load().await.unwrap_err();
        assert!(matches!(*err, BoundaryError::TornDown));
    }

    #[tokio::test]
    async fn find_by_name_uses_cached_collection() {
        let loader = BoundaryLoader::new(CountingFetcher::new(0));
        assert!(loader.find_by_name("Capital").is_none());

        loader.load().await.unwrap();
        let feature = loader.find_by_name("north okanagan").unwrap();
        assert_eq!(
            district_name(&feature),
            Some("Regional District of North Okanagan")
        );
    }

    #[tokio::test]
    async fn load_grouped_partitions_by_region() {
        let loader = BoundaryLoader::new(CountingFetcher::new(0));
        let report = loader.load_grouped(RegionCatalog::bc()).await.unwrap();

        assert_eq!(report.groups.len(), 2);
        assert_eq!(
            report.groups[&RegionLabel::ThompsonOkanagan].features.len(),
            2
        );
        assert!(report.unmapped.is_empty());
    }
}
