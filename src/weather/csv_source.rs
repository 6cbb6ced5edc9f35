//! Recorded hourly weather loaded from a CSV file.
//!
//! Expected header: `timestamp,ghi,dni,dhi,temp_air`. Timestamps are UTC,
//! either RFC 3339 or `YYYY-MM-DDTHH:MM`.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{HourRange, WeatherSample, WeatherSource, select_range, validate_coverage};
use crate::error::{ForecastError, Result};

#[derive(Debug, Deserialize)]
struct Row {
    timestamp: String,
    ghi: f64,
    dni: f64,
    dhi: f64,
    temp_air: f64,
}

/// Weather source backed by an in-memory table read from CSV.
///
/// The table is site-agnostic: every request is served from the same rows
/// regardless of coordinates.
#[derive(Debug, Clone)]
pub struct CsvWeatherSource {
    samples: Vec<WeatherSample>,
}

impl CsvWeatherSource {
    /// Reads and sorts all rows from `path`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` if the file cannot be read or a row is malformed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| ForecastError::upstream(format!("cannot open {}: {e}", path.display())))?;
        Self::from_csv(reader)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut samples = Vec::new();
        for row in reader.deserialize() {
            let row: Row = row?;
            samples.push(WeatherSample {
                timestamp: parse_timestamp(&row.timestamp)?,
                ghi: row.ghi,
                dni: row.dni,
                dhi: row.dhi,
                ambient_temp: row.temp_air,
            });
        }
        samples.sort_by_key(|s| s.timestamp);
        debug!("loaded {} weather rows from csv", samples.len());
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|ts| ts.and_utc())
        .map_err(|e| ForecastError::upstream(format!("invalid timestamp `{raw}`: {e}")))
}

#[async_trait]
impl WeatherSource for CsvWeatherSource {
    async fn fetch(&self, _latitude: f64, _longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        let samples = select_range(self.samples.iter().copied(), &range);
        validate_coverage(&samples, &range)?;
        Ok(samples)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
