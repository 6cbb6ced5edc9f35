use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// AC output of the array for one hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    /// Start of the hour (UTC).
    pub timestamp: DateTime<Utc>,
    /// Mean power over the hour (kW), in `[0, kwp]`.
    pub power_kw: f64,
}

impl ForecastPoint {
    /// Energy of the hour (kWh), `power_kw × 1 h`.
    pub fn energy_kwh(&self) -> f64 {
        self.power_kw
    }
}

/// All points of one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub day: NaiveDate,
    pub daily_energy_kwh: f64,
    /// Chronological hourly points; fewer than 24 only at range boundaries.
    #[serde(rename = "forecast")]
    pub points: Vec<ForecastPoint>,
}

/// Hourly forecast grouped into days, with period totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub total_energy_kwh: f64,
    /// First hour of the forecast (inclusive).
    pub forecast_from: DateTime<Utc>,
    /// Last hour of the forecast (inclusive).
    pub forecast_to: DateTime<Utc>,
    pub forecast_hours: usize,
    pub days: Vec<DailyForecast>,
}

impl ForecastResult {
    /// Iterates every hourly point across all days in order.
    pub fn points(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.days.iter().flat_map(|d| d.points.iter())
    }

    /// Largest hourly power of the period (kW).
    pub fn peak_kw(&self) -> f64 {
        self.points().map(|p| p.power_kw).fold(0.0, f64::max)
    }
}

impl fmt::Display for ForecastResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- PV Forecast ---")?;
        writeln!(
            f,
            "Period:        {} .. {} ({} h)",
            self.forecast_from.format("%Y-%m-%d %H:%M"),
            self.forecast_to.format("%Y-%m-%d %H:%M"),
            self.forecast_hours
        )?;
        for day in &self.days {
            writeln!(f, "  {}     {:>8.2} kWh", day.day, day.daily_energy_kwh)?;
        }
        writeln!(f, "Peak power:    {:.2} kW", self.peak_kw())?;
        write!(f, "Total energy:  {:.2} kWh", self.total_energy_kwh)
    }
}
