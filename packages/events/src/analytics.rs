//! Aggregate views over prepared events.
//!
//! Counts are keyed by ordered maps so printed summaries are stable.

use std::collections::BTreeMap;

use chrono::Datelike as _;
use climate_map_api_models::ClimateEvent;
use climate_map_region_models::RegionLabel;

use crate::MapEvent;

/// Bucket for events whose category did not resolve.
pub const OTHER_CATEGORY: &str = "Other";

/// Events per category title. Unresolved categories count as
/// [`OTHER_CATEGORY`].
#[must_use]
pub fn category_counts(events: &[MapEvent]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        let title = event.category.as_deref().unwrap_or(OTHER_CATEGORY);
        *counts.entry(title.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Events per resolved region. Events with no resolved region are left
/// out.
#[must_use]
pub fn region_counts(events: &[MapEvent]) -> BTreeMap<RegionLabel, usize> {
    let mut counts = BTreeMap::new();
    for label in events.iter().filter_map(|e| e.region) {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Events per moderation state, with unknown codes under `"unknown"`.
#[must_use]
pub fn status_counts(events: &[MapEvent]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        let key = event
            .event
            .status
            .kind()
            .map_or_else(|| "unknown".to_string(), |kind| kind.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Featured events, in input order.
#[must_use]
pub fn featured(events: &[MapEvent]) -> Vec<&ClimateEvent> {
    events
        .iter()
        .map(|e| &e.event)
        .filter(|e| e.is_featured)
        .collect()
}

/// Events grouped by year, each year in date order. Undated events are
/// left out.
#[must_use]
pub fn timeline(events: &[MapEvent]) -> BTreeMap<i32, Vec<&ClimateEvent>> {
    let mut dated: Vec<_> = events
        .iter()
        .filter_map(|e| e.event.parsed_date().map(|date| (date, &e.event)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    let mut years: BTreeMap<i32, Vec<&ClimateEvent>> = BTreeMap::new();
    for (date, event) in dated {
        years.entry(date.year()).or_default().push(event);
    }
    years
}

/// Headline numbers for the stats view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub located: usize,
    pub featured: usize,
    pub unresolved_region: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_region: BTreeMap<RegionLabel, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
}

impl Summary {
    #[must_use]
    pub fn from_events(events: &[MapEvent]) -> Self {
        Self {
            total: events.len(),
            located: events
                .iter()
                .filter(|e| e.event.coordinates().is_some())
                .count(),
            featured: featured(events).len(),
            unresolved_region: events.iter().filter(|e| e.region.is_none()).count(),
            by_category: category_counts(events),
            by_region: region_counts(events),
            by_status: status_counts(events),
            by_year: timeline(events)
                .into_iter()
                .map(|(year, events)| (year, events.len()))
                .collect(),
        }
    }
}
