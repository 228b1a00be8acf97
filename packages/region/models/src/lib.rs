#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! High-level region types for British Columbia.
//!
//! BC's regional districts are grouped into five coarse regions that the
//! map, statistics and filtering code all key on. This crate defines those
//! labels along with the small coordinate and color types the region
//! catalog attaches to them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One of the five high-level regions of British Columbia.
///
/// Variant order is the canonical display order, so ordered collections
/// keyed by [`RegionLabel`] iterate north to south-east consistently.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum RegionLabel {
    /// Bulkley-Nechako, Cariboo, Peace River, the north coast and Stikine.
    #[serde(rename = "Northern BC")]
    #[strum(to_string = "Northern BC")]
    NorthernBc,
    /// Okanagan valley and Thompson-Nicola.
    #[serde(rename = "Thompson-Okanagan")]
    #[strum(to_string = "Thompson-Okanagan")]
    ThompsonOkanagan,
    /// Metro Vancouver, Fraser Valley and Squamish-Lillooet.
    #[serde(rename = "Lower Mainland")]
    #[strum(to_string = "Lower Mainland")]
    LowerMainland,
    /// Vancouver Island plus the central and sunshine coasts.
    #[serde(rename = "Vancouver Island & Coast")]
    #[strum(to_string = "Vancouver Island & Coast")]
    VancouverIslandCoast,
    /// Kootenays and Columbia-Shuswap.
    #[serde(rename = "Kootenay/Columbia")]
    #[strum(to_string = "Kootenay/Columbia")]
    KootenayColumbia,
}

impl RegionLabel {
    /// All region labels in canonical order.
    pub const ALL: [Self; 5] = [
        Self::NorthernBc,
        Self::ThompsonOkanagan,
        Self::LowerMainland,
        Self::VancouverIslandCoast,
        Self::KootenayColumbia,
    ];

    /// Parses a human-readable label, ignoring surrounding whitespace and
    /// ASCII case.
    #[must_use]
    pub fn parse_label(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A `#rrggbb` display color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbHex(String);

impl RgbHex {
    /// Validates and wraps a `#rrggbb` color string. The stored value is
    /// lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidColorError`] if the string is not a `#` followed
    /// by exactly six hex digits.
    pub fn parse(raw: &str) -> Result<Self, InvalidColorError> {
        let trimmed = raw.trim();
        let valid = trimmed.len() == 7
            && trimmed.starts_with('#')
            && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());

        if valid {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(InvalidColorError {
                value: raw.to_string(),
            })
        }
    }

    /// Returns the color as a `#rrggbb` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RgbHex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RgbHex {
    type Error = InvalidColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RgbHex> for String {
    fn from(value: RgbHex) -> Self {
        value.0
    }
}

/// Error returned when a string is not a valid `#rrggbb` color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidColorError {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidColorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid color {:?}: expected #rrggbb", self.value)
    }
}

impl std::error::Error for InvalidColorError {}

/// How an event refers to its region.
///
/// Backend records carry either a region ID or a human-readable label in
/// the same `region` field. The reference is classified once when the
/// event is ingested and then resolved to a [`RegionLabel`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RegionRef {
    /// A backend region identifier.
    Id(String),
    /// A human-readable region name.
    Label(String),
}

impl RegionRef {
    /// Returns the raw string carried by either variant.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Id(value) | Self::Label(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(
            RegionLabel::parse_label("  northern bc "),
            Some(RegionLabel::NorthernBc)
        );
        assert_eq!(
            RegionLabel::parse_label("Vancouver Island & Coast"),
            Some(RegionLabel::VancouverIslandCoast)
        );
        assert_eq!(RegionLabel::parse_label("Yukon"), None);
    }

    #[test]
    fn labels_display_their_human_names() {
        let names: Vec<String> = RegionLabel::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Northern BC",
                "Thompson-Okanagan",
                "Lower Mainland",
                "Vancouver Island & Coast",
                "Kootenay/Columbia",
            ]
        );
    }

    #[test]
    fn labels_serialize_as_human_names() {
        let json = serde_json::to_string(&RegionLabel::KootenayColumbia).unwrap();
        assert_eq!(json, "\"Kootenay/Columbia\"");
        let back: RegionLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RegionLabel::KootenayColumbia);
    }

    #[test]
    fn color_validation() {
        assert_eq!(RgbHex::parse("#3498DB").unwrap().as_str(), "#3498db");
        assert!(RgbHex::parse("3498db").is_err());
        assert!(RgbHex::parse("#3498d").is_err());
        assert!(RgbHex::parse("#zz98db").is_err());
    }

    #[test]
    fn region_ref_is_tagged() {
        let json = serde_json::to_value(RegionRef::Id("7".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "id", "value": "7"}));
    }
}
