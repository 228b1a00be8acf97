//! Region reference classification and resolution.
//!
//! The backend's `region` field holds either a region record ID or a
//! human-readable name. [`RegionResolver::classify`] decides which, once,
//! when an event is ingested; [`RegionResolver::resolve_ref`] then maps the
//! reference to a canonical [`RegionLabel`].

use std::collections::HashMap;

use climate_map_api_models::RegionRecord;
use climate_map_region::RegionCatalog;
use climate_map_region_models::{RegionLabel, RegionRef};

/// Maps backend region IDs and region or district names to labels.
#[derive(Debug, Clone, Default)]
pub struct RegionResolver {
    ids: HashMap<String, RegionLabel>,
    names: HashMap<String, RegionLabel>,
}

impl RegionResolver {
    /// Resolves names only: region labels and catalogued district names,
    /// both case-insensitive.
    #[must_use]
    pub fn from_catalog(catalog: &RegionCatalog) -> Self {
        let mut names = HashMap::new();
        for definition in catalog.definitions() {
            names.insert(definition.label.to_string().to_lowercase(), definition.label);
            for district in &definition.districts {
                names.insert(district.to_lowercase(), definition.label);
            }
        }
        Self {
            ids: HashMap::new(),
            names,
        }
    }

    /// Also resolves backend region IDs through each record's name.
    /// Records whose name maps to no label are skipped.
    #[must_use]
    pub fn new(catalog: &RegionCatalog, records: &[RegionRecord]) -> Self {
        let mut resolver = Self::from_catalog(catalog);
        for record in records {
            match resolver.resolve_name(&record.name) {
                Some(label) => {
                    resolver
                        .ids
                        .insert(record.region_id.trim().to_string(), label);
                }
                None => log::debug!(
                    "Backend region {} ({:?}) has no catalog label",
                    record.region_id,
                    record.name
                ),
            }
        }
        resolver
    }

    /// Number of backend IDs this resolver knows.
    #[must_use]
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    /// Classifies a raw `region` value. Known backend IDs and all-digit
    /// strings are IDs; anything else non-blank is a label.
    #[must_use]
    pub fn classify(&self, raw: &str) -> Option<RegionRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if self.ids.contains_key(raw) || raw.chars().all(|c| c.is_ascii_digit()) {
            Some(RegionRef::Id(raw.to_string()))
        } else {
            Some(RegionRef::Label(raw.to_string()))
        }
    }

    #[must_use]
    pub fn resolve_ref(&self, region: &RegionRef) -> Option<RegionLabel> {
        match region {
            RegionRef::Id(id) => self.ids.get(id.trim()).copied(),
            RegionRef::Label(name) => self.resolve_name(name),
        }
    }

    /// Classifies and resolves in one step.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<RegionLabel> {
        self.resolve_ref(&self.classify(raw)?)
    }

    fn resolve_name(&self, name: &str) -> Option<RegionLabel> {
        RegionLabel::parse_label(name)
            .or_else(|| self.names.get(&name.trim().to_lowercase()).copied())
    }
}
