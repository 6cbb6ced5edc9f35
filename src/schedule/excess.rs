use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::forecast::ForecastPoint;

/// Hours in which solar output exceeds a constant household consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExcessSummary {
    pub consumption_kw: f64,
    /// Number of hours with `power_kw > consumption_kw`.
    pub excess_hours: usize,
    /// Energy above consumption summed over those hours (kWh).
    pub excess_energy_kwh: f64,
}

/// Counts forecast hours whose power strictly exceeds `consumption_kw`.
///
/// # Errors
///
/// Returns `InputValidation` if `consumption_kw` is negative or not finite.
pub fn excess_hours(points: &[ForecastPoint], consumption_kw: f64) -> Result<ExcessSummary> {
    if !consumption_kw.is_finite() || consumption_kw < 0.0 {
        return Err(ForecastError::invalid(format!(
            "consumption_kw must be a finite, non-negative number, got {consumption_kw}"
        )));
    }

    let (excess_hours, excess_energy_kwh) = points
        .iter()
        .filter(|p| p.power_kw > consumption_kw)
        .fold((0, 0.0), |(n, e), p| (n + 1, e + (p.power_kw - consumption_kw)));

    Ok(ExcessSummary {
        consumption_kw,
        excess_hours,
        excess_energy_kwh,
    })
}
