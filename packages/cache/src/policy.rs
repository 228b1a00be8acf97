//! Freshness and eviction windows for each kind of query.

use std::time::Duration;

const MINUTE: u64 = 60;

/// How long cached data stays fresh and how long an unused entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Age after which data is served stale and refreshed in the
    /// background.
    pub stale_after: Duration,
    /// Time since the last access after which the entry is dropped.
    pub evict_after: Duration,
}

impl QueryPolicy {
    #[must_use]
    pub const fn new(stale_after: Duration, evict_after: Duration) -> Self {
        Self {
            stale_after,
            evict_after,
        }
    }

    const fn minutes(stale: u64, evict: u64) -> Self {
        Self::new(
            Duration::from_secs(stale * MINUTE),
            Duration::from_secs(evict * MINUTE),
        )
    }

    /// Event categories.
    pub const CATEGORIES: Self = Self::minutes(10, 30);
    /// The full event list.
    pub const EVENTS_ALL: Self = Self::minutes(2, 5);
    /// One page of events.
    pub const EVENTS_PAGINATED: Self = Self::minutes(1, 3);
    /// A single event.
    pub const EVENT: Self = Self::minutes(5, 10);
    /// Region records.
    pub const REGIONS: Self = Self::minutes(10, 30);
    /// Per-region climate statistics and projections.
    pub const CLIMATE: Self = Self::minutes(10, 30);
    /// Air quality, which is also re-polled every [`AIR_QUALITY_POLL`].
    ///
    /// [`AIR_QUALITY_POLL`]: Self::AIR_QUALITY_POLL
    pub const AIR_QUALITY: Self = Self::minutes(5, 10);

    /// Interval at which air-quality readings are re-fetched while shown.
    pub const AIR_QUALITY_POLL: Duration = Duration::from_secs(5 * MINUTE);

    /// Whether data fetched `age` ago is still fresh.
    #[must_use]
    pub fn is_fresh(&self, age: Duration) -> bool {
        age < self.stale_after
    }
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self::minutes(5, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_policies_evict_after_they_go_stale() {
        for policy in [
            QueryPolicy::CATEGORIES,
            QueryPolicy::EVENTS_ALL,
            QueryPolicy::EVENTS_PAGINATED,
            QueryPolicy::EVENT,
            QueryPolicy::REGIONS,
            QueryPolicy::CLIMATE,
            QueryPolicy::AIR_QUALITY,
        ] {
            assert!(policy.evict_after > policy.stale_after, "{policy:?}");
        }
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let policy = QueryPolicy::EVENTS_ALL;
        assert!(policy.is_fresh(Duration::from_secs(119)));
        assert!(!policy.is_fresh(Duration::from_secs(120)));
    }
}
