//! District-name extraction and fuzzy boundary lookup.
//!
//! Boundary datasets don't agree on which property holds the district
//! name, so [`district_name`] checks a fixed list of candidates. Lookup
//! by name runs an ordered list of [`MatchStrategy`]s over the whole
//! collection, moving to the next strategy only when the previous one
//! found nothing. A looser substring hit on an early feature can never
//! shadow an exact match further down.

use std::collections::BTreeSet;

use geojson::Feature;

/// Properties checked, in order, for a feature's district name.
pub const NAME_PROPERTIES: &[&str] = &[
    "ADMIN_AREA_NAME",
    "REGIONAL_DISTRICT",
    "NAME",
    "REGION_NAME",
    "ADMIN_AREA_ABBREVIATION",
];

/// Returns the district name of a boundary feature, if any candidate
/// property holds a non-empty string.
#[must_use]
pub fn district_name(feature: &Feature) -> Option<&str> {
    NAME_PROPERTIES.iter().find_map(|key| {
        feature
            .property(*key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

/// Returns the sorted, de-duplicated district names in a collection.
#[must_use]
pub fn all_district_names(features: &[Feature]) -> Vec<String> {
    features
        .iter()
        .filter_map(district_name)
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One way of comparing a search term against a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// District name equals the search term (case-insensitive).
    Exact,
    /// District name contains the search term or vice versa.
    Containment,
    /// Any string property contains the search term.
    PropertyScan,
}

impl MatchStrategy {
    /// Strategies in precedence order, most precise first.
    pub const PRIORITY: [Self; 3] = [Self::Exact, Self::Containment, Self::PropertyScan];

    /// Tests a feature against an already-normalized (trimmed, lowercased)
    /// search term.
    #[must_use]
    pub fn matches(self, feature: &Feature, needle: &str) -> bool {
        match self {
            Self::Exact => {
                district_name(feature).is_some_and(|name| name.to_lowercase() == needle)
            }
            Self::Containment => district_name(feature).is_some_and(|name| {
                let name = name.to_lowercase();
                name.contains(needle) || needle.contains(&name)
            }),
            Self::PropertyScan => feature.properties.as_ref().is_some_and(|props| {
                props
                    .values()
                    .filter_map(serde_json::Value::as_str)
                    .any(|value| value.to_lowercase().contains(needle))
            }),
        }
    }
}

/// A feature found by [`find_feature`], with the strategy that found it.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMatch<'a> {
    /// The matched feature.
    pub feature: &'a Feature,
    /// The strategy that produced the match.
    pub strategy: MatchStrategy,
}

/// Finds a boundary feature by name using [`MatchStrategy::PRIORITY`].
///
/// Returns `None` for a blank search term or when no strategy matches.
#[must_use]
pub fn find_feature<'a>(features: &'a [Feature], name: &str) -> Option<FeatureMatch<'a>> {
    find_feature_with(features, name, &MatchStrategy::PRIORITY)
}

/// Finds a boundary feature by name, trying `strategies` in order.
///
/// Each strategy scans the full collection before the next one is tried;
/// within a strategy the first matching feature wins.
#[must_use]
pub fn find_feature_with<'a>(
    features: &'a [Feature],
    name: &str,
    strategies: &[MatchStrategy],
) -> Option<FeatureMatch<'a>> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    strategies.iter().find_map(|&strategy| {
        features
            .iter()
            .find(|feature| strategy.matches(feature, &needle))
            .map(|feature| FeatureMatch { feature, strategy })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(props: serde_json::Value) -> Feature {
        Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: props.as_object().cloned(),
            foreign_members: None,
        }
    }

    #[test]
    fn extracts_name_from_first_present_property() {
        let f = feature(serde_json::json!({
            "NAME": "Fallback",
            "ADMIN_AREA_NAME": "Capital Regional District",
        }));
        assert_eq!(district_name(&f), Some("Capital Regional District"));

        let f = feature(serde_json::json!({ "ADMIN_AREA_NAME": "  ", "NAME": "Other" }));
        assert_eq!(district_name(&f), Some("Other"));

        let f = feature(serde_json::json!({ "AREA": 12.5 }));
        assert_eq!(district_name(&f), None);
    }

    #[test]
    fn exact_match_is_not_shadowed_by_earlier_substring() {
        let features = vec![
            feature(serde_json::json!({ "ADMIN_AREA_NAME": "Regional District of North Okanagan" })),
            feature(serde_json::json!({ "ADMIN_AREA_NAME": "North Okanagan" })),
        ];

        let hit = find_feature(&features, "north okanagan").unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Exact);
        assert_eq!(district_name(hit.feature), Some("North Okanagan"));
    }

    #[test]
    fn falls_back_to_containment_then_property_scan() {
        let features = vec![
            feature(serde_json::json!({
                "ADMIN_AREA_NAME": "Capital Regional District",
                "ADMIN_AREA_GROUP_NAME": "Greater Victoria",
            })),
            feature(serde_json::json!({ "ADMIN_AREA_NAME": "Regional District of Nanaimo" })),
        ];

        let hit = find_feature(&features, "Nanaimo").unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Containment);
        assert_eq!(
            district_name(hit.feature),
            Some("Regional District of Nanaimo")
        );

        let hit = find_feature(&features, "victoria").unwrap();
        assert_eq!(hit.strategy, MatchStrategy::PropertyScan);
        assert_eq!(district_name(hit.feature), Some("Capital Regional District"));
    }

    #[test]
    fn search_term_containing_name_matches() {
        let features = vec![feature(serde_json::json!({ "NAME": "Cariboo" }))];
        let hit = find_feature(&features, "Cariboo Regional District").unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Containment);
    }

    #[test]
    fn blank_and_unknown_terms_find_nothing() {
        let features = vec![feature(serde_json::json!({ "NAME": "Cariboo" }))];
        assert!(find_feature(&features, "   ").is_none());
        assert!(find_feature(&features, "Yukon").is_none());
    }

    #[test]
    fn restricted_strategy_list_is_honoured() {
        let features = vec![feature(serde_json::json!({ "NAME": "Cariboo Regional District" }))];
        assert!(find_feature_with(&features, "cariboo", &[MatchStrategy::Exact]).is_none());
    }

    #[test]
    fn district_names_are_sorted_and_unique() {
        let features = vec![
            feature(serde_json::json!({ "NAME": "b" })),
            feature(serde_json::json!({ "NAME": "a" })),
            feature(serde_json::json!({ "NAME": "b" })),
            feature(serde_json::json!({})),
        ];
        assert_eq!(all_district_names(&features), vec!["a", "b"]);
    }
}
