//! Client configuration from the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::ApiError;

pub const API_URL_ENV: &str = "CLIMATE_MAP_API_URL";
pub const API_TOKEN_ENV: &str = "CLIMATE_MAP_API_TOKEN";
pub const GEOCODE_CONCURRENCY_ENV: &str = "CLIMATE_MAP_GEOCODE_CONCURRENCY";
pub const HTTP_TIMEOUT_ENV: &str = "CLIMATE_MAP_HTTP_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/climate";
pub const DEFAULT_GEOCODE_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry schedule for transient failures (connect errors, timeouts, 429
/// and 5xx). Delays double from `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Send once, never retry.
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL all endpoint paths hang off.
    pub base_url: String,
    /// Bearer token sent with every request when set.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum geocoding requests in flight during batch reconciliation.
    pub geocode_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            geocode_concurrency: DEFAULT_GEOCODE_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl ApiConfig {
    /// Reads the `CLIMATE_MAP_*` environment variables, using defaults for
    /// anything unset or blank.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if a numeric setting does not parse or
    /// is zero.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if a numeric setting does not parse or
    /// is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let timeout = parse_positive::<u64>(HTTP_TIMEOUT_ENV, get(HTTP_TIMEOUT_ENV))?
            .map_or(defaults.timeout, Duration::from_secs);
        let geocode_concurrency =
            parse_positive::<usize>(GEOCODE_CONCURRENCY_ENV, get(GEOCODE_CONCURRENCY_ENV))?
                .unwrap_or(defaults.geocode_concurrency);

        Ok(Self {
            base_url: get(API_URL_ENV).unwrap_or(defaults.base_url),
            token: get(API_TOKEN_ENV),
            timeout,
            geocode_concurrency,
            retry: defaults.retry,
        })
    }
}

fn parse_positive<T>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ApiError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw.parse::<T>().map_err(|e| ApiError::Config {
        name,
        message: format!("{raw:?}: {e}"),
    })?;
    if value == T::default() {
        return Err(ApiError::Config {
            name,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.geocode_concurrency, 8);
    }

    #[test]
    fn reads_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://climate.example.org/api/climate"),
            (API_TOKEN_ENV, " secret "),
            (GEOCODE_CONCURRENCY_ENV, "2"),
            (HTTP_TIMEOUT_ENV, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://climate.example.org/api/climate");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.geocode_concurrency, 2);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[(API_TOKEN_ENV, "  ")])).unwrap();
        assert_eq!(config.token, None);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = ApiConfig::from_lookup(lookup(&[(GEOCODE_CONCURRENCY_ENV, "many")]));
        assert!(matches!(
            err,
            Err(ApiError::Config {
                name: GEOCODE_CONCURRENCY_ENV,
                ..
            })
        ));

        let zero = ApiConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_ENV, "0")]));
        assert!(matches!(zero, Err(ApiError::Config { .. })));
    }

    #[test]
    fn retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
    }
}
