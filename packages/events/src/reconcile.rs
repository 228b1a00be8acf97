//! Fills in missing event coordinates through a geocoder.
//!
//! Events that already carry both coordinates pass through untouched with
//! no network call. Others are geocoded by their `location`, using their
//! `region` as a scoping hint. A transport failure or a miss drops the
//! event from the result; neither aborts a batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use climate_map_api::{ApiClient, ApiError};
use climate_map_api_models::{ClimateEvent, GeocodeResult};
use climate_map_region::RegionCatalog;
use climate_map_region_models::{LatLng, RegionLabel};
use futures::StreamExt as _;

use crate::{ProgressCallback, RegionResolver};

/// Default number of geocoding requests in flight during a batch.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Resolves a free-text location to a coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the location was not found.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the lookup itself failed.
    async fn geocode(
        &self,
        location: &str,
        region_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, ApiError>;
}

#[async_trait]
impl Geocoder for ApiClient {
    async fn geocode(
        &self,
        location: &str,
        region_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, ApiError> {
        Self::geocode(self, location, region_hint).await
    }
}

#[async_trait]
impl<G: Geocoder + ?Sized> Geocoder for Arc<G> {
    async fn geocode(
        &self,
        location: &str,
        region_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, ApiError> {
        (**self).geocode(location, region_hint).await
    }
}

/// Falls back to the hinted region's centroid when the inner geocoder
/// finds nothing. The result is flagged `adjusted`.
///
/// Errors from the inner geocoder are passed through, not replaced by a
/// centroid.
pub struct CentroidFallback<G> {
    inner: G,
    resolver: RegionResolver,
    centroids: BTreeMap<RegionLabel, LatLng>,
}

impl<G: Geocoder> CentroidFallback<G> {
    #[must_use]
    pub fn new(inner: G, resolver: RegionResolver, catalog: &RegionCatalog) -> Self {
        let centroids = catalog
            .definitions()
            .map(|d| (d.label, d.centroid))
            .collect();
        Self {
            inner,
            resolver,
            centroids,
        }
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CentroidFallback<G> {
    async fn geocode(
        &self,
        location: &str,
        region_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, ApiError> {
        if let Some(hit) = self.inner.geocode(location, region_hint).await? {
            return Ok(Some(hit));
        }

        let Some(label) = region_hint.and_then(|hint| self.resolver.resolve(hint)) else {
            return Ok(None);
        };
        let Some(centroid) = self.centroids.get(&label) else {
            return Ok(None);
        };

        log::debug!("No match for {location:?}; using the {label} centroid");
        Ok(Some(GeocodeResult {
            lat: centroid.lat,
            lng: centroid.lng,
            adjusted: true,
        }))
    }
}

/// Ensures `event` has coordinates.
///
/// Returns the event unchanged if it already has both coordinates,
/// otherwise a copy with `lat`, `lng` and `coordinates_adjusted` set from
/// the geocoder. Returns `None` (and logs) if geocoding fails or finds
/// nothing.
pub async fn reconcile<G: Geocoder + ?Sized>(
    geocoder: &G,
    event: ClimateEvent,
) -> Option<ClimateEvent> {
    if event.coordinates().is_some() {
        return Some(event);
    }

    let location = event.location.trim();
    if location.is_empty() {
        log::warn!("Event {} has no location to geocode", event.event_id);
        return None;
    }

    match geocoder.geocode(location, event.region.as_deref()).await {
        Ok(Some(hit)) => {
            let point = LatLng::new(hit.lat, hit.lng);
            Some(event.with_coordinates(point, hit.adjusted))
        }
        Ok(None) => {
            log::warn!(
                "No geocode match for event {} ({location:?})",
                event.event_id
            );
            None
        }
        Err(e) => {
            log::error!("Geocoding event {} failed: {e}", event.event_id);
            None
        }
    }
}

/// Reconciles many events with at most `concurrency` geocode requests in
/// flight.
///
/// Requests complete in any order; the output keeps the input order of
/// the events that survived. Results are placed by input position, so two
/// events sharing an ID are both kept.
pub async fn reconcile_batch<G: Geocoder + ?Sized>(
    geocoder: &G,
    events: Vec<ClimateEvent>,
    concurrency: usize,
    progress: &dyn ProgressCallback,
) -> Vec<ClimateEvent> {
    let total = events.len();
    progress.set_total(total as u64);
    progress.set_message("Geocoding events".to_string());

    let mut slots: Vec<Option<ClimateEvent>> = vec![None; total];
    let mut completed = futures::stream::iter(events.into_iter().enumerate())
        .map(|(position, event)| async move {
            let result = reconcile(geocoder, event).await;
            progress.inc(1);
            (position, result)
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((position, result)) = completed.next().await {
        slots[position] = result;
    }

    let reconciled: Vec<ClimateEvent> = slots.into_iter().flatten().collect();
    progress.finish(format!(
        "Placed {} of {total} events ({} dropped)",
        reconciled.len(),
        total - reconciled.len()
    ));
    reconciled
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::NullProgress;

    /// Canned answers by location. Unknown locations are misses;
    /// `"unreachable"` is a transport failure. Later locations in the map
    /// answer sooner so completion order differs from input order.
    struct FakeGeocoder {
        answers: HashMap<&'static str, (f64, f64, bool)>,
        delays: HashMap<&'static str, u64>,
        calls: AtomicUsize,
        hints: Mutex<Vec<Option<String>>>,
    }

    impl FakeGeocoder {
        fn new(answers: &[(&'static str, (f64, f64, bool), u64)]) -> Self {
            Self {
                answers: answers.iter().map(|(k, v, _)| (*k, *v)).collect(),
                delays: answers.iter().map(|(k, _, d)| (*k, *d)).collect(),
                calls: AtomicUsize::new(0),
                hints: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(
            &self,
            location: &str,
            region_hint: Option<&str>,
        ) -> Result<Option<GeocodeResult>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hints
                .lock()
                .unwrap()
                .push(region_hint.map(str::to_string));
            let delay = self.delays.get(location).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if location == "unreachable" {
                return Err(ApiError::Status {
                    status: 503,
                    message: "geocoder down".to_string(),
                });
            }
            Ok(self
                .answers
                .get(location)
                .map(|&(lat, lng, adjusted)| GeocodeResult { lat, lng, adjusted }))
        }
    }

    fn event(id: &str, location: &str, coords: Option<(f64, f64)>) -> ClimateEvent {
        let mut event: ClimateEvent = serde_json::from_value(serde_json::json!({
            "event_id": id,
            "title": format!("event {id}"),
            "location": location,
            "region": "Thompson-Okanagan",
        }))
        .unwrap();
        if let Some((lat, lng)) = coords {
            event.lat = Some(lat);
            event.lng = Some(lng);
        }
        event
    }

    #[tokio::test]
    async fn located_events_skip_the_geocoder() {
        let geocoder = FakeGeocoder::new(&[]);
        let original = event("1", "Kelowna", Some((49.88, -119.49)));

        let result = reconcile(&geocoder, original.clone()).await;

        assert_eq!(result, Some(original));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn geocoded_events_carry_the_adjusted_flag() {
        let geocoder = FakeGeocoder::new(&[("Lytton", (50.23, -121.58, true), 0)]);

        let result = reconcile(&geocoder, event("1", "Lytton", None)).await.unwrap();

        assert_eq!(result.coordinates(), Some(LatLng::new(50.23, -121.58)));
        assert_eq!(result.coordinates_adjusted, Some(true));
        assert_eq!(
            geocoder.hints.lock().unwrap().as_slice(),
            &[Some("Thompson-Okanagan".to_string())]
        );
    }

    #[tokio::test]
    async fn misses_and_failures_yield_none() {
        let geocoder = FakeGeocoder::new(&[]);
        assert!(reconcile(&geocoder, event("1", "Nowhere", None)).await.is_none());
        assert!(reconcile(&geocoder, event("2", "unreachable", None)).await.is_none());
        assert!(reconcile(&geocoder, event("3", "  ", None)).await.is_none());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_keeps_input_order_and_drops_failures() {
        let geocoder = FakeGeocoder::new(&[
            ("Kamloops", (50.67, -120.33, false), 300),
            ("Vernon", (50.27, -119.27, false), 200),
            ("Penticton", (49.49, -119.59, false), 10),
        ]);
        let events = vec![
            event("a", "Kamloops", None),
            event("b", "unreachable", None),
            event("c", "Salmon Arm", Some((50.70, -119.27))),
            event("d", "Vernon", None),
            event("e", "Nowhere", None),
            event("f", "Penticton", None),
        ];

        let result = reconcile_batch(&geocoder, events, 3, &NullProgress).await;

        let ids: Vec<&str> = result.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d", "f"]);
        assert!(result.iter().all(|e| e.coordinates().is_some()));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_keeps_events_sharing_an_id() {
        let geocoder = FakeGeocoder::new(&[
            ("Kamloops", (50.67, -120.33, false), 200),
            ("Vernon", (50.27, -119.27, true), 10),
        ]);
        let events = vec![
            event("dup", "Kamloops", None),
            event("dup", "Vernon", None),
        ];

        let result = reconcile_batch(&geocoder, events, 2, &NullProgress).await;

        let placed: Vec<(&str, &str)> = result
            .iter()
            .map(|e| (e.event_id.as_str(), e.location.as_str()))
            .collect();
        assert_eq!(placed, vec![("dup", "Kamloops"), ("dup", "Vernon")]);
        assert_eq!(result[0].coordinates(), Some(LatLng::new(50.67, -120.33)));
        assert_eq!(result[1].coordinates_adjusted, Some(true));
    }

    #[tokio::test]
    async fn reconcile_places_unmatched_event_at_region_centroid() {
        let fallback = CentroidFallback::new(
            FakeGeocoder::new(&[]),
            RegionResolver::from_catalog(RegionCatalog::bc()),
            RegionCatalog::bc(),
        );

        let placed = reconcile(&fallback, event("x", "Somewhere rural", None))
            .await
            .unwrap();

        assert_eq!(placed.coordinates(), Some(LatLng::new(50.5, -119.0)));
        assert_eq!(placed.coordinates_adjusted, Some(true));
        assert!(reconcile(&fallback, event("y", "unreachable", None)).await.is_none());
    }

    #[tokio::test]
    async fn centroid_fallback_only_on_miss_with_resolvable_hint() {
        let fallback = CentroidFallback::new(
            FakeGeocoder::new(&[("Kelowna", (49.88, -119.49, false), 0)]),
            RegionResolver::from_catalog(RegionCatalog::bc()),
            RegionCatalog::bc(),
        );

        let hit = fallback.geocode("Kelowna", Some("Thompson-Okanagan")).await;
        assert_eq!(hit.unwrap().map(|g| g.adjusted), Some(false));

        let centroid = fallback
            .geocode("Somewhere rural", Some("Thompson-Okanagan"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((centroid.lat, centroid.lng), (50.5, -119.0));
        assert!(centroid.adjusted);

        assert_eq!(fallback.geocode("Somewhere rural", None).await.unwrap(), None);
        assert_eq!(
            fallback
                .geocode("Somewhere rural", Some("Atlantis"))
                .await
                .unwrap(),
            None
        );
        assert!(fallback.geocode("unreachable", Some("Thompson-Okanagan")).await.is_err());
    }
}
