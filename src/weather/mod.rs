//! Weather inputs: the hourly sample type, the source capability and its adapters.

pub mod cache;
pub mod csv_source;
pub mod open_meteo;
/// Hour-aligned UTC ranges.
pub mod range;
/// Deterministic clear-sky weather with AR(1) clouds.
pub mod synthetic;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

pub use cache::CachedWeatherSource;
pub use csv_source::CsvWeatherSource;
pub use open_meteo::{OpenMeteoClient, RetryPolicy};
pub use range::HourRange;
pub use synthetic::SyntheticWeather;

/// Plausible bounds for near-surface air temperature (°C).
const AMBIENT_TEMP_RANGE: std::ops::RangeInclusive<f64> = -90.0..=70.0;

/// One hour of measured or forecast weather at a site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    /// Hour-aligned UTC timestamp.
    pub timestamp: DateTime<Utc>,
    /// Global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Direct normal irradiance (W/m²).
    pub dni: f64,
    /// Diffuse horizontal irradiance (W/m²).
    pub dhi: f64,
    /// Ambient air temperature (°C).
    pub ambient_temp: f64,
}

impl WeatherSample {
    /// Basic range check: finite, non-negative irradiance and a plausible temperature.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` describing the offending field.
    pub fn check(&self) -> Result<()> {
        for (name, value) in [("ghi", self.ghi), ("dni", self.dni), ("dhi", self.dhi)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::upstream(format!(
                    "invalid {name} {value} at {}",
                    self.timestamp
                )));
            }
        }
        if !self.ambient_temp.is_finite() || !AMBIENT_TEMP_RANGE.contains(&self.ambient_temp) {
            return Err(ForecastError::upstream(format!(
                "invalid ambient temperature {} at {}",
                self.ambient_temp, self.timestamp
            )));
        }
        Ok(())
    }
}

/// What instant a sample's irradiance describes, relative to its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleAveraging {
    /// Value at the timestamp itself.
    #[default]
    Instant,
    /// Mean over the hour ending at the timestamp.
    PrecedingHour,
}

impl SampleAveraging {
    /// Instant at which the sun position stands for the whole sample.
    pub fn solar_instant(self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Instant => timestamp,
            Self::PrecedingHour => timestamp - TimeDelta::minutes(30),
        }
    }
}

/// Capability to fetch hourly weather for a site.
///
/// Implementations return exactly one sample per hour of `range`, in
/// chronological order, or fail. Partial coverage is a failure.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetches samples covering the whole of `range`.
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>>;

    /// Source name for logging.
    fn name(&self) -> &str;

    /// Averaging convention of the returned irradiance values.
    fn averaging(&self) -> SampleAveraging {
        SampleAveraging::Instant
    }
}

#[async_trait]
impl<T: WeatherSource + ?Sized> WeatherSource for Box<T> {
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        (**self).fetch(latitude, longitude, range).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn averaging(&self) -> SampleAveraging {
        (**self).averaging()
    }
}

/// Keeps only the samples whose timestamps fall inside `range`.
pub fn select_range(samples: impl IntoIterator<Item = WeatherSample>, range: &HourRange) -> Vec<WeatherSample> {
    samples
        .into_iter()
        .filter(|s| range.contains(s.timestamp))
        .collect()
}

/// Verifies that `samples` cover `range` hour by hour with valid values.
///
/// # Errors
///
/// Returns `UpstreamUnavailable` on the first missing, duplicated,
/// out-of-order or out-of-range sample.
pub fn validate_coverage(samples: &[WeatherSample], range: &HourRange) -> Result<()> {
    let mut actual = samples.iter();
    for expected in range.timestamps() {
        match actual.next() {
            Some(sample) if sample.timestamp == expected => sample.check()?,
            Some(sample) => {
                return Err(ForecastError::upstream(format!(
                    "incomplete weather coverage: expected sample for {expected}, found {}",
                    sample.timestamp
                )));
            }
            None => {
                return Err(ForecastError::upstream(format!(
                    "incomplete weather coverage: {} of {} hours, first missing {expected}",
                    samples.len(),
                    range.hours()
                )));
            }
        }
    }
    if samples.len() > range.hours() {
        return Err(ForecastError::upstream(format!(
            "weather source returned {} samples for {} hours",
            samples.len(),
            range.hours()
        )));
    }
    Ok(())
}
