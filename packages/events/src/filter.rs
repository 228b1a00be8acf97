//! Region and category filtering of map events.
//!
//! Events are prepared once ([`prepare`]): the raw `region` field is
//! classified and resolved to a [`RegionLabel`], and the category ID is
//! resolved to a title. Filtering is then a pure function of the prepared
//! events, the [`EventFilter`] and an optional [`RegionIndex`].

use std::collections::HashMap;

use climate_map_api_models::{Category, ClimateEvent};
use climate_map_region::RegionIndex;
use climate_map_region_models::{RegionLabel, RegionRef};

use crate::RegionResolver;

/// Category ID to title lookup.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    titles: HashMap<String, String>,
}

impl CategoryIndex {
    #[must_use]
    pub fn new(categories: &[Category]) -> Self {
        Self {
            titles: categories
                .iter()
                .map(|c| (c.id.trim().to_string(), c.title.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn title_of(&self, id: &str) -> Option<&str> {
        self.titles.get(id.trim()).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// An event with its region and category resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent {
    pub event: ClimateEvent,
    /// How the raw `region` field was classified.
    pub region_ref: Option<RegionRef>,
    /// The canonical region, if the reference resolved.
    pub region: Option<RegionLabel>,
    /// Category title, from the category list or the event's own name.
    pub category: Option<String>,
}

impl MapEvent {
    #[must_use]
    pub fn new(event: ClimateEvent, resolver: &RegionResolver, categories: &CategoryIndex) -> Self {
        let region_ref = event
            .region
            .as_deref()
            .and_then(|raw| resolver.classify(raw));
        let region = region_ref.as_ref().and_then(|r| resolver.resolve_ref(r));
        let category = event
            .category_id
            .as_deref()
            .and_then(|id| categories.title_of(id))
            .map(str::to_string)
            .or_else(|| {
                event
                    .category_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            });

        Self {
            event,
            region_ref,
            region,
            category,
        }
    }
}

/// Resolves region and category for every event.
#[must_use]
pub fn prepare(
    events: Vec<ClimateEvent>,
    resolver: &RegionResolver,
    categories: &CategoryIndex,
) -> Vec<MapEvent> {
    let prepared: Vec<MapEvent> = events
        .into_iter()
        .map(|event| MapEvent::new(event, resolver, categories))
        .collect();

    let unresolved = prepared
        .iter()
        .filter(|e| e.region_ref.is_some() && e.region.is_none())
        .count();
    if unresolved > 0 {
        log::debug!("{unresolved} events reference an unknown region");
    }

    prepared
}

/// Selected region and category. `None` means no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub region: Option<RegionLabel>,
    pub category: Option<String>,
}

impl EventFilter {
    /// A blank category or `"all"` means no category filter.
    #[must_use]
    pub fn new(region: Option<RegionLabel>, category: Option<&str>) -> Self {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
            .map(str::to_string);
        Self { region, category }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.region.is_none() && self.category.is_none()
    }

    /// Whether `event` is shown under this filter.
    ///
    /// Events without coordinates never match. With a region selected, an
    /// event matches if its resolved region is that region or, when
    /// `index` is given, its coordinates fall inside that region.
    #[must_use]
    pub fn matches(&self, event: &MapEvent, index: Option<&RegionIndex>) -> bool {
        let Some(point) = event.event.coordinates() else {
            return false;
        };

        if let Some(label) = self.region {
            let in_region = event.region == Some(label)
                || index.is_some_and(|index| index.contains(label, point));
            if !in_region {
                return false;
            }
        }

        self.category.as_ref().is_none_or(|wanted| {
            event
                .category
                .as_ref()
                .is_some_and(|title| title.to_lowercase() == wanted.to_lowercase())
        })
    }
}

/// Returns the events shown under `filter`, in input order.
#[must_use]
pub fn filter_events(
    events: &[MapEvent],
    filter: &EventFilter,
    index: Option<&RegionIndex>,
) -> Vec<ClimateEvent> {
    events
        .iter()
        .filter(|e| filter.matches(e, index))
        .map(|e| e.event.clone())
        .collect()
}
