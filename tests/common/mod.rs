//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use pv_forecast::Result;
use pv_forecast::catalog::InMemoryCatalog;
use pv_forecast::config::{DeviceConfig, ForecastConfig, ServiceConfig, SystemConfig};
use pv_forecast::forecast::ForecastPoint;
use pv_forecast::service::ForecastService;
use pv_forecast::solar::{ArrayConfig, ModelParameters};
use pv_forecast::weather::{HourRange, SyntheticWeather, WeatherSample, WeatherSource};

/// Reference instant used by every integration test (mid-morning, early summer).
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 20, 9, 41, 0).unwrap()
}

/// Default array (Vienna, 5 kWp, 35° tilt, south-facing).
pub fn vienna_array() -> ArrayConfig {
    ArrayConfig::new(48.2082, 16.3738, 5.0, 35.0, 180.0).unwrap()
}

/// Service on the offline preset (synthetic weather, Vienna rooftop).
pub fn offline_service() -> ForecastService {
    ForecastService::from_config(&ServiceConfig::offline()).unwrap()
}

/// Service over `weather` with the given devices and the baseline system.
pub fn service_with(weather: Arc<dyn WeatherSource>, devices: Vec<DeviceConfig>) -> ForecastService {
    let systems: Vec<SystemConfig> = ServiceConfig::baseline().systems;
    ForecastService::new(
        weather,
        Arc::new(InMemoryCatalog::new(systems, devices)),
        ModelParameters::default(),
        ForecastConfig::default(),
    )
}

pub fn device(id: &str, power_kw: f64, total_energy_kwh: f64) -> DeviceConfig {
    DeviceConfig {
        id: id.to_string(),
        name: String::new(),
        power_kw,
        total_energy_kwh,
    }
}

/// Hourly points starting at midnight UTC of `fixed_now`.
pub fn points(powers: &[f64]) -> Vec<ForecastPoint> {
    let start = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
    powers
        .iter()
        .enumerate()
        .map(|(h, &power_kw)| ForecastPoint {
            timestamp: start + TimeDelta::hours(h as i64),
            power_kw,
        })
        .collect()
}

/// Weather that is dark every hour, at a mild temperature.
pub struct NightOnly;

#[async_trait]
impl WeatherSource for NightOnly {
    async fn fetch(&self, _latitude: f64, _longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        Ok(range
            .timestamps()
            .map(|timestamp| WeatherSample {
                timestamp,
                ghi: 0.0,
                dni: 0.0,
                dhi: 0.0,
                ambient_temp: 12.0,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "night-only"
    }
}

/// Synthetic weather that silently drops one hour of every fetch.
pub struct Gappy(pub SyntheticWeather);

#[async_trait]
impl WeatherSource for Gappy {
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        let mut samples = self.0.fetch(latitude, longitude, range).await?;
        if samples.len() > 5 {
            samples.remove(5);
        }
        Ok(samples)
    }

    fn name(&self) -> &str {
        "gappy"
    }
}
