//! Hourly irradiance and temperature from the Open-Meteo forecast API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{HourRange, SampleAveraging, WeatherSample, WeatherSource, select_range, validate_coverage};
use crate::error::{ForecastError, Result};

const HOURLY_VARIABLES: &str =
    "temperature_2m,shortwave_radiation,direct_normal_irradiance,diffuse_radiation";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Retry behaviour for transient upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay, doubled on every retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before retry number `attempt` (0-based) plus up to 50% jitter.
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }
}

enum Failure {
    Transient(String),
    Fatal(String),
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    shortwave_radiation: Vec<Option<f64>>,
    direct_normal_irradiance: Vec<Option<f64>>,
    diffuse_radiation: Vec<Option<f64>>,
}

/// Open-Meteo client
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenMeteoClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.open-meteo.com/v1/forecast";

    /// Returns a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Forecast endpoint URL
    /// * `timeout` - Per-request timeout
    /// * `retry` - Retry policy for transient failures
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            retry,
        })
    }

    async fn fetch_once(&self, latitude: f64, longitude: f64, range: &HourRange) -> std::result::Result<Vec<WeatherSample>, Failure> {
        let start_date = range.start().format("%Y-%m-%d").to_string();
        let end_date = range.last().format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("timezone", "GMT".to_string()),
                ("start_date", start_date),
                ("end_date", end_date),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    Failure::Transient(format!("request failed: {e}"))
                } else {
                    Failure::Fatal(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Failure::Transient(format!("upstream status {status}")));
        }
        if !status.is_success() {
            return Err(Failure::Fatal(format!("upstream status {status}")));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| Failure::Fatal(format!("failed to parse response: {e}")))?;

        let hourly = body
            .hourly
            .ok_or_else(|| Failure::Fatal("response has no hourly block".to_string()))?;

        parse_hourly(hourly, range).map_err(Failure::Fatal)
    }
}

/// Turns the column-oriented hourly block into samples inside `range`.
///
/// Hours with any null value are dropped here and reported as missing
/// by the coverage check.
fn parse_hourly(hourly: HourlyBlock, range: &HourRange) -> std::result::Result<Vec<WeatherSample>, String> {
    let n = hourly.time.len();
    if hourly.temperature_2m.len() != n
        || hourly.shortwave_radiation.len() != n
        || hourly.direct_normal_irradiance.len() != n
        || hourly.diffuse_radiation.len() != n
    {
        return Err("hourly columns have different lengths".to_string());
    }

    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let timestamp = NaiveDateTime::parse_from_str(&hourly.time[i], TIME_FORMAT)
            .map_err(|e| format!("invalid time `{}`: {e}", hourly.time[i]))?
            .and_utc();
        let (Some(ambient_temp), Some(ghi), Some(dni), Some(dhi)) = (
            hourly.temperature_2m[i],
            hourly.shortwave_radiation[i],
            hourly.direct_normal_irradiance[i],
            hourly.diffuse_radiation[i],
        ) else {
            continue;
        };
        samples.push(WeatherSample {
            timestamp,
            ghi,
            dni,
            dhi,
            ambient_temp,
        });
    }

    Ok(select_range(samples, range))
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        let mut attempt = 0;
        let samples = loop {
            match self.fetch_once(latitude, longitude, &range).await {
                Ok(samples) => break samples,
                Err(Failure::Fatal(msg)) => return Err(ForecastError::UpstreamUnavailable(msg)),
                Err(Failure::Transient(msg)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "weather fetch attempt {} failed ({msg}), retrying in {} ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Failure::Transient(msg)) => {
                    return Err(ForecastError::UpstreamUnavailable(format!(
                        "{msg} (gave up after {} attempts)",
                        attempt + 1
                    )));
                }
            }
        };

        debug!("open-meteo returned {} samples for {} hours", samples.len(), range.hours());
        validate_coverage(&samples, &range)?;
        Ok(samples)
    }

    fn name(&self) -> &str {
        "open-meteo"
    }

    /// Open-Meteo radiation is the mean over the hour before each timestamp.
    fn averaging(&self) -> SampleAveraging {
        SampleAveraging::PrecedingHour
    }
}
