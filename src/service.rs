//! Request orchestration: validate, fetch weather once, run the pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{InMemoryCatalog, SystemCatalog};
use crate::config::{ForecastConfig, ServiceConfig};
use crate::error::{ForecastError, InfeasibleReason, Result};
use crate::forecast::{ForecastAggregator, ForecastEngine, ForecastPoint, ForecastResult};
use crate::schedule::{ExcessSummary, OptimalWindowSearch, OptimizationResult, excess_hours};
use crate::solar::{ArrayConfig, ModelParameters};
use crate::weather::{
    CachedWeatherSource, CsvWeatherSource, HourRange, OpenMeteoClient, RetryPolicy, SyntheticWeather,
    WeatherSource, validate_coverage,
};

/// Entry point for forecast, window and excess requests.
///
/// Each request resolves its records from the catalog, validates its
/// parameters, then issues exactly one weather fetch and computes the answer
/// from that immutable sample set.
#[derive(Clone)]
pub struct ForecastService {
    weather: Arc<dyn WeatherSource>,
    catalog: Arc<dyn SystemCatalog>,
    model: ModelParameters,
    limits: ForecastConfig,
}

impl ForecastService {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        catalog: Arc<dyn SystemCatalog>,
        model: ModelParameters,
        limits: ForecastConfig,
    ) -> Self {
        Self {
            weather,
            catalog,
            model,
            limits,
        }
    }

    /// Builds the weather source, cache and catalog described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` if the config does not validate, and
    /// `UpstreamUnavailable` if a CSV weather file cannot be loaded.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(ForecastError::invalid(joined.join("; ")));
        }

        let w = &config.weather;
        let ttl = Duration::from_secs(w.cache_ttl_secs);
        let weather: Arc<dyn WeatherSource> = match w.source.as_str() {
            "open_meteo" => {
                let retry = RetryPolicy {
                    max_retries: w.max_retries,
                    backoff: Duration::from_millis(w.backoff_ms),
                };
                let client = OpenMeteoClient::new(&w.base_url, Duration::from_secs(w.timeout_secs), retry)?;
                Arc::new(CachedWeatherSource::new(client, ttl))
            }
            "csv" => {
                let path = w
                    .csv_path
                    .as_deref()
                    .ok_or_else(|| ForecastError::invalid("weather.csv_path is required"))?;
                Arc::new(CachedWeatherSource::new(CsvWeatherSource::from_path(path)?, ttl))
            }
            "synthetic" => Arc::new(CachedWeatherSource::new(SyntheticWeather::new(w.seed), ttl)),
            other => return Err(ForecastError::invalid(format!("unknown weather source \"{other}\""))),
        };
        info!(
            "weather source {} (cache ttl {} s), {} systems, {} devices",
            weather.name(),
            w.cache_ttl_secs,
            config.systems.len(),
            config.devices.len()
        );

        Ok(Self::new(
            weather,
            Arc::new(InMemoryCatalog::from_config(config)),
            config.model,
            config.forecast.clone(),
        ))
    }

    pub fn catalog(&self) -> &dyn SystemCatalog {
        self.catalog.as_ref()
    }

    pub fn limits(&self) -> &ForecastConfig {
        &self.limits
    }

    pub fn weather_source(&self) -> &str {
        self.weather.name()
    }

    /// Hourly forecast for `days` whole UTC days starting at midnight of `now`.
    ///
    /// # Arguments
    ///
    /// * `system_id` - Catalog id of the PV system
    /// * `days` - Number of days, `None` for the configured default
    /// * `now` - Reference instant
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown system
    /// * `InputValidation` if `days` is outside `[1, max_days]`
    /// * `UpstreamUnavailable` if weather cannot be fetched in full
    pub async fn forecast(&self, system_id: &str, days: Option<usize>, now: DateTime<Utc>) -> Result<ForecastResult> {
        let days = days.unwrap_or(self.limits.default_days);
        info!("forecast request: system={system_id} days={days}");
        check_days("days", days, self.limits.max_days)?;

        let array = self.catalog.array(system_id)?;
        let range = HourRange::days_from_midnight(now, days);
        let points = self.points(&array, range).await?;

        let result = ForecastAggregator.aggregate(&points)?;
        debug!(
            "forecast for {system_id}: {} h, {:.2} kWh",
            result.forecast_hours, result.total_energy_kwh
        );
        Ok(result)
    }

    /// Best run window for a device within `days_lookahead` days from the current hour.
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown system or device
    /// * `InputValidation` for an out-of-range lookahead or an invalid profile
    /// * `InfeasibleWindow` for a degenerate profile or too short a lookahead,
    ///   reported before any weather is fetched
    /// * `UpstreamUnavailable` if weather cannot be fetched in full
    pub async fn optimal_window(
        &self,
        system_id: &str,
        device_id: &str,
        days_lookahead: usize,
        now: DateTime<Utc>,
    ) -> Result<OptimizationResult> {
        info!("optimal window request: system={system_id} device={device_id} days_lookahead={days_lookahead}");
        check_days("days_lookahead", days_lookahead, self.limits.max_lookahead_days)?;

        let array = self.catalog.array(system_id)?;
        let device = self.catalog.device(device_id)?;
        device.validate()?;

        let range = HourRange::days_from_hour(now, days_lookahead);
        let required_hours = device.required_hours();
        if required_hours > range.hours() {
            return Err(ForecastError::InfeasibleWindow(InfeasibleReason::HorizonTooShort {
                required_hours,
                horizon_hours: range.hours(),
            }));
        }

        let points = self.points(&array, range).await?;
        let result = OptimalWindowSearch.search(&points, &device, range.hours())?;
        debug!(
            "window for {device_id} on {system_id}: {} solar {:.2} kWh",
            result.start_time, result.solar_power_used_kwh
        );
        Ok(result)
    }

    /// Hours over the forecast period in which solar output exceeds `consumption_kw`.
    ///
    /// # Errors
    ///
    /// Same as [`forecast`](Self::forecast), plus `InputValidation` for a
    /// negative or non-finite consumption.
    pub async fn excess(
        &self,
        system_id: &str,
        consumption_kw: f64,
        days: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<ExcessSummary> {
        let days = days.unwrap_or(self.limits.default_days);
        info!("excess request: system={system_id} consumption_kw={consumption_kw} days={days}");
        check_days("days", days, self.limits.max_days)?;
        let array = self.catalog.array(system_id)?;
        // validate before fetching
        excess_hours(&[], consumption_kw)?;

        let points = self.points(&array, HourRange::days_from_midnight(now, days)).await?;
        excess_hours(&points, consumption_kw)
    }

    async fn points(&self, array: &ArrayConfig, range: HourRange) -> Result<Vec<ForecastPoint>> {
        let engine = ForecastEngine::new(*array, self.model)?.with_averaging(self.weather.averaging());
        let samples = self
            .weather
            .fetch(array.latitude, array.longitude, range)
            .await
            .inspect_err(|e| {
                warn!(
                    "weather fetch from {} failed for ({}, {}) {} h from {}: {e}",
                    self.weather.name(),
                    array.latitude,
                    array.longitude,
                    range.hours(),
                    range.start()
                )
            })?;
        validate_coverage(&samples, &range)?;
        Ok(engine.points(&samples))
    }
}

fn check_days(field: &str, days: usize, max: usize) -> Result<()> {
    if (1..=max).contains(&days) {
        Ok(())
    } else {
        Err(ForecastError::invalid(format!("{field} must be in [1, {max}], got {days}")))
    }
}
