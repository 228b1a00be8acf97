//! Climate events and their request bodies.

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};
use climate_map_region_models::LatLng;
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{id_string, opt_id_string};

/// Raw moderation status as sent by the backend.
///
/// Both 0 and 1 mean approved; older records use 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventStatus(pub u8);

impl EventStatus {
    pub const LEGACY_APPROVED: Self = Self(0);
    pub const APPROVED: Self = Self(1);
    pub const DELETED: Self = Self(2);
    pub const PENDING: Self = Self(3);

    /// Classifies the raw code. Unknown codes are `None`.
    #[must_use]
    pub const fn kind(self) -> Option<StatusKind> {
        match self.0 {
            0 | 1 => Some(StatusKind::Approved),
            2 => Some(StatusKind::Deleted),
            3 => Some(StatusKind::Pending),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self.kind(), Some(StatusKind::Approved))
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::APPROVED
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{kind}"),
            None => write!(f, "unknown ({})", self.0),
        }
    }
}

/// Moderation state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusKind {
    Approved,
    Deleted,
    Pending,
}

impl StatusKind {
    /// The code sent when filtering or setting this status.
    #[must_use]
    pub const fn code(self) -> EventStatus {
        match self {
            Self::Approved => EventStatus::APPROVED,
            Self::Deleted => EventStatus::DELETED,
            Self::Pending => EventStatus::PENDING,
        }
    }
}

/// A user-reported climate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateEvent {
    #[serde(alias = "_id", deserialize_with = "id_string")]
    pub event_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// As submitted, usually `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Free-text place name used for geocoding.
    #[serde(default)]
    pub location: String,
    /// Region ID or region label, depending on who created the event.
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub region: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Set when the geocoder moved the point; absent until reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates_adjusted: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: EventStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Fields this client does not model (images, audit timestamps).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClimateEvent {
    /// Both coordinates, if present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(LatLng::new(lat, lng))
            }
            _ => None,
        }
    }

    /// Returns a copy placed at `point`.
    #[must_use]
    pub fn with_coordinates(mut self, point: LatLng, adjusted: bool) -> Self {
        self.lat = Some(point.lat);
        self.lng = Some(point.lng);
        self.coordinates_adjusted = Some(adjusted);
        self
    }

    /// The calendar date of the event, if [`date`](Self::date) parses.
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_event_date(&self.date)
    }

    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.parsed_date().map(|d| d.year())
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive ISO timestamps.
#[must_use]
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Form body for creating or replacing an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub date: String,
    /// Derived from `date` by [`NewEvent::with_year`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewEvent {
    /// Fills [`year`](Self::year) from the date if it parses.
    #[must_use]
    pub fn with_year(mut self) -> Self {
        self.year = parse_event_date(&self.date).map(|d| d.year());
        self
    }
}

/// Body of `PATCH /event/{id}/feature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggle {
    pub is_featured: bool,
}

/// Query for `GET /event/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventPageQuery {
    pub page: u32,
    pub page_size: u32,
    pub category_id: Option<String>,
    pub status: Option<EventStatus>,
}

impl Default for EventPageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            category_id: None,
            status: None,
        }
    }
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "event_id": 42,
        "title": "Okanagan wildfire",
        "description": "Evacuation alert",
        "date": "2023-08-17",
        "location": "West Kelowna",
        "region": "Thompson-Okanagan",
        "category_id": "c-fire",
        "status": 1,
        "is_featured": true,
        "images": ["a.jpg"]
    }"#;

    #[test]
    fn parses_backend_event() {
        let event: ClimateEvent = serde_json::from_str(EVENT).unwrap();
        assert_eq!(event.event_id, "42");
        assert_eq!(event.region.as_deref(), Some("Thompson-Okanagan"));
        assert_eq!(event.coordinates(), None);
        assert_eq!(event.coordinates_adjusted, None);
        assert!(event.status.is_approved());
        assert_eq!(event.year(), Some(2023));
        assert!(event.extra.contains_key("images"));
    }

    #[test]
    fn null_status_and_featured_fall_back_to_defaults() {
        let event: ClimateEvent = serde_json::from_str(
            r#"{"event_id": 1, "title": "x", "status": null, "is_featured": null}"#,
        )
        .unwrap();
        assert_eq!(event.status, EventStatus::default());
        assert!(event.status.is_approved());
        assert!(!event.is_featured);
    }

    #[test]
    fn blank_region_is_absent() {
        let event: ClimateEvent =
            serde_json::from_str(r#"{"_id": "e1", "title": "Flood", "region": " "}"#).unwrap();
        assert_eq!(event.event_id, "e1");
        assert_eq!(event.region, None);
    }

    #[test]
    fn coordinates_require_both_values() {
        let mut event: ClimateEvent = serde_json::from_str(EVENT).unwrap();
        event.lat = Some(49.86);
        assert_eq!(event.coordinates(), None);

        let placed = event.with_coordinates(LatLng::new(49.86, -119.58), true);
        assert_eq!(placed.coordinates(), Some(LatLng::new(49.86, -119.58)));
        assert_eq!(placed.coordinates_adjusted, Some(true));
    }

    #[test]
    fn status_codes() {
        assert!(EventStatus(0).is_approved());
        assert_eq!(EventStatus(3).kind(), Some(StatusKind::Pending));
        assert_eq!(EventStatus(9).kind(), None);
        assert_eq!("PENDING".parse::<StatusKind>().unwrap().code(), EventStatus::PENDING);
        assert_eq!(EventStatus::DELETED.to_string(), "deleted");
    }

    #[test]
    fn event_dates() {
        assert_eq!(parse_event_date("2021-06-29").map(|d| d.year()), Some(2021));
        assert_eq!(
            parse_event_date("2021-06-29T14:00:00Z").map(|d| d.year()),
            Some(2021)
        );
        assert_eq!(
            parse_event_date("2021-06-29T14:00:00").map(|d| d.year()),
            Some(2021)
        );
        assert_eq!(parse_event_date("last summer"), None);
        assert_eq!(parse_event_date(""), None);
    }

    #[test]
    fn new_event_derives_year() {
        let event = NewEvent {
            title: "Heat dome".to_string(),
            date: "2021-06-25".to_string(),
            ..NewEvent::default()
        }
        .with_year();
        assert_eq!(event.year, Some(2021));
    }
}
