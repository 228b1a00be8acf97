//! Regional climate statistics, projections and air quality.
//!
//! These payloads come from third-party data providers behind the backend
//! and vary in shape, so every struct keeps the fields it does not model
//! in `extra`.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

type Extra = serde_json::Map<String, serde_json::Value>;

/// One year of historical observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub year: i32,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub snowfall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: String,
    pub end: String,
}

/// Response of `GET /climate/region`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalClimate {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub historical: Vec<HistoricalPoint>,
    #[serde(default)]
    pub avg_temperature: Option<f64>,
    #[serde(default)]
    pub total_precipitation: Option<f64>,
    #[serde(default)]
    pub avg_snowfall: Option<f64>,
    #[serde(default)]
    pub event_count: Option<u64>,
    #[serde(default)]
    pub data_range: Option<DataRange>,
    /// `open_meteo_api` or `fallback_data`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl RegionalClimate {
    /// Whether the backend served canned data instead of live provider data.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source.as_deref() == Some("fallback_data")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub year: i32,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `GET /climate/projections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateProjections {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub projections: Vec<ProjectionPoint>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ClimateProjections {
    #[must_use]
    pub fn at_year(&self, year: i32) -> Option<&ProjectionPoint> {
        self.projections.iter().find(|p| p.year == year)
    }

    /// First and last projected year.
    #[must_use]
    pub fn span(&self) -> Option<(i32, i32)> {
        Some((self.projections.first()?.year, self.projections.last()?.year))
    }
}

/// Latest pollutant reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    #[serde(default)]
    pub time: Option<String>,
    /// Index as displayed; some providers send a label, some a number.
    #[serde(default)]
    pub aqi: Option<serde_json::Value>,
    /// Numeric index used for color scales.
    #[serde(default)]
    pub aqi_value: Option<f64>,
    #[serde(default)]
    pub pm2_5: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub carbon_monoxide: Option<f64>,
    #[serde(default)]
    pub nitrogen_dioxide: Option<f64>,
    #[serde(default)]
    pub ozone: Option<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl AirQualityReading {
    #[must_use]
    pub fn aqi_label(&self) -> Option<String> {
        match self.aqi.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Smoke classification from PM2.5, if measured.
    #[must_use]
    pub fn smoke_level(&self) -> Option<SmokeLevel> {
        self.pm2_5.map(SmokeLevel::from_pm2_5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityAverages {
    #[serde(default)]
    pub pm2_5_24h_avg: Option<f64>,
    #[serde(default)]
    pub pm10_24h_avg: Option<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `GET /climate/air-quality`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub current: Option<AirQualityReading>,
    #[serde(default)]
    pub averages_24h: Option<AirQualityAverages>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// PM2.5 band, in µg/m³. Above 55 usually means wildfire smoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
pub enum SmokeLevel {
    Good,
    Moderate,
    #[strum(to_string = "High (possible wildfire smoke)")]
    High,
}

impl SmokeLevel {
    #[must_use]
    pub fn from_pm2_5(pm2_5: f64) -> Self {
        if pm2_5 > 55.0 {
            Self::High
        } else if pm2_5 > 35.0 {
            Self::Moderate
        } else {
            Self::Good
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_climate_keeps_unknown_fields() {
        let climate: RegionalClimate = serde_json::from_str(
            r#"{
                "region": "Lower Mainland",
                "historical": [{"year": 2020, "temperature": 11.2, "precipitation": 1450.0}],
                "avg_temperature": 11.2,
                "source": "fallback_data",
                "insights": ["Warmer than the 1990s"],
                "cities": ["Vancouver"]
            }"#,
        )
        .unwrap();

        assert!(climate.is_fallback());
        assert_eq!(climate.historical[0].snowfall, None);
        assert!(climate.extra.contains_key("insights"));
        assert!(climate.extra.contains_key("cities"));
    }

    #[test]
    fn projections_lookup() {
        let projections: ClimateProjections = serde_json::from_str(
            r#"{
                "model": "CMCC_CM2_VHR4",
                "scenario": "ssp245",
                "projections": [
                    {"year": 2030, "temperature": 12.0},
                    {"year": 2040, "temperature": 12.6},
                    {"year": 2050, "temperature": 13.1}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(projections.span(), Some((2030, 2050)));
        assert_eq!(projections.at_year(2040).unwrap().temperature, Some(12.6));
        assert!(projections.at_year(2100).is_none());
    }

    #[test]
    fn air_quality_reading() {
        let aq: AirQuality = serde_json::from_str(
            r#"{
                "current": {"time": "2023-08-18T10:00", "aqi": "Poor", "aqi_value": 4, "pm2_5": 61.3},
                "averages_24h": {"pm2_5_24h_avg": 48.0, "pm10_24h_avg": null}
            }"#,
        )
        .unwrap();

        let current = aq.current.unwrap();
        assert_eq!(current.aqi_label().as_deref(), Some("Poor"));
        assert_eq!(current.smoke_level(), Some(SmokeLevel::High));
        assert_eq!(aq.averages_24h.unwrap().pm10_24h_avg, None);
    }

    #[test]
    fn smoke_bands() {
        assert_eq!(SmokeLevel::from_pm2_5(12.0), SmokeLevel::Good);
        assert_eq!(SmokeLevel::from_pm2_5(35.0), SmokeLevel::Good);
        assert_eq!(SmokeLevel::from_pm2_5(40.0), SmokeLevel::Moderate);
        assert_eq!(SmokeLevel::from_pm2_5(55.1), SmokeLevel::High);
    }
}
