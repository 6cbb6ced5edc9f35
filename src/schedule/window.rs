//! Best contiguous run window for a flexible, bounded-energy load.
//!
//! Energies are summed as integer micro-kWh so that the prefix-sum search and
//! the direct sliding sum agree exactly, not just within a tolerance.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, InfeasibleReason, Result};
use crate::forecast::ForecastPoint;

/// Slack applied before rounding `energy / power` up, so that float noise
/// such as `4.000000000001 / 2.0` does not add an hour.
const HOURS_EPSILON: f64 = 1e-9;
const MICRO_PER_KWH: f64 = 1_000_000.0;

/// Power draw and energy need of a flexible load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Constant draw while running (kW).
    pub power_kw: f64,
    /// Energy needed per run (kWh).
    pub total_energy_kwh: f64,
}

impl DeviceProfile {
    /// Creates a validated profile.
    ///
    /// # Errors
    ///
    /// * `InputValidation` if a field is negative or not finite
    /// * `InfeasibleWindow(DegenerateDevice)` if a field is zero
    pub fn new(power_kw: f64, total_energy_kwh: f64) -> Result<Self> {
        let profile = Self {
            power_kw,
            total_energy_kwh,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// See [`DeviceProfile::new`] for the error cases.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("power_kw", self.power_kw), ("total_energy_kwh", self.total_energy_kwh)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::invalid(format!(
                    "{name} must be a finite, non-negative number, got {value}"
                )));
            }
        }
        if self.power_kw == 0.0 || self.total_energy_kwh == 0.0 {
            return Err(ForecastError::InfeasibleWindow(InfeasibleReason::DegenerateDevice));
        }
        Ok(())
    }

    /// Whole hours needed to deliver the energy at full power, at least 1.
    pub fn required_hours(&self) -> usize {
        let hours = (self.total_energy_kwh / self.power_kw - HOURS_EPSILON).ceil();
        if hours.is_nan() || hours < 1.0 {
            1
        } else {
            // saturates for absurd ratios, which then exceed any horizon
            hours as usize
        }
    }
}

/// Chosen run window and its energy split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub start_time: DateTime<Utc>,
    /// Exclusive end, `start_time + required_hours`.
    pub end_time: DateTime<Utc>,
    pub solar_power_used_kwh: f64,
    pub grid_power_needed_kwh: f64,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Optimal Window ---")?;
        writeln!(
            f,
            "Run:           {} .. {}",
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.end_time.format("%Y-%m-%d %H:%M")
        )?;
        writeln!(f, "Solar energy:  {:.2} kWh", self.solar_power_used_kwh)?;
        write!(f, "Grid energy:   {:.2} kWh", self.grid_power_needed_kwh)
    }
}

/// Window search over an hourly forecast.
///
/// The device runs at `power_kw` every hour except the last, where it only
/// draws what is still missing. Each hour it takes `min(draw, forecast)` from
/// solar, so total solar use never exceeds the energy need. Surplus in one
/// hour cannot make up for the short last hour, which keeps grid need
/// non-decreasing as the energy need grows.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimalWindowSearch;

/// Integer inputs shared by both search variants.
struct Prepared {
    /// Forecast energy per hour (µkWh), truncated to the horizon.
    forecast: Vec<i64>,
    hours: usize,
    /// Draw of every hour but the last (µkWh).
    full_draw: i64,
    /// Draw of the last hour (µkWh), in `(0, full_draw]`.
    last_draw: i64,
    total: i64,
}

impl OptimalWindowSearch {
    /// Finds the window maximising solar use in `O(horizon)`.
    ///
    /// # Arguments
    ///
    /// * `points` - Consecutive hourly forecast points
    /// * `device` - Load to schedule
    /// * `lookahead_hours` - Only the first `lookahead_hours` points are searched
    ///
    /// # Returns
    ///
    /// The earliest window among those with the highest solar use.
    ///
    /// # Errors
    ///
    /// * `InputValidation` for an invalid profile or a non-hourly forecast
    /// * `InfeasibleWindow` for a degenerate profile or a horizon shorter than
    ///   the run length
    pub fn search(
        &self,
        points: &[ForecastPoint],
        device: &DeviceProfile,
        lookahead_hours: usize,
    ) -> Result<OptimizationResult> {
        let prep = prepare(points, device, lookahead_hours)?;
        let n = prep.hours;
        let horizon = prep.forecast.len();

        // prefix[j] = Σ_{k<j} min(full_draw, f_k)
        let mut prefix = Vec::with_capacity(horizon + 1);
        prefix.push(0i64);
        for &f in &prep.forecast {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + f.min(prep.full_draw));
        }

        let solar_at = |i: usize| prefix[i + n - 1] - prefix[i] + prep.forecast[i + n - 1].min(prep.last_draw);
        let best = best_start(horizon - n + 1, solar_at);
        Ok(build_result(points, device, &prep, best))
    }

    /// Same result as [`search`](Self::search) by summing every window directly,
    /// in `O(horizon × required_hours)`.
    ///
    /// # Errors
    ///
    /// Same as [`search`](Self::search).
    pub fn search_naive(
        &self,
        points: &[ForecastPoint],
        device: &DeviceProfile,
        lookahead_hours: usize,
    ) -> Result<OptimizationResult> {
        let prep = prepare(points, device, lookahead_hours)?;
        let n = prep.hours;
        let horizon = prep.forecast.len();

        let solar_at = |i: usize| {
            prep.forecast[i..i + n]
                .iter()
                .enumerate()
                .map(|(k, &f)| {
                    let draw = if k + 1 == n { prep.last_draw } else { prep.full_draw };
                    f.min(draw)
                })
                .sum::<i64>()
        };
        let best = best_start(horizon - n + 1, solar_at);
        Ok(build_result(points, device, &prep, best))
    }
}

fn to_micro(kwh: f64) -> i64 {
    (kwh * MICRO_PER_KWH).round() as i64
}

/// Converts a device quantity to µkWh, rejecting values above `limit`.
fn device_micro(name: &str, kwh: f64, limit: i64) -> Result<i64> {
    let micro = (kwh * MICRO_PER_KWH).round();
    if micro > limit as f64 {
        return Err(ForecastError::invalid(format!(
            "{name} {kwh} is too large to schedule"
        )));
    }
    Ok((micro as i64).max(1))
}

fn prepare(points: &[ForecastPoint], device: &DeviceProfile, lookahead_hours: usize) -> Result<Prepared> {
    device.validate()?;
    let hours = device.required_hours();
    let horizon = points.len().min(lookahead_hours);
    if hours > horizon {
        return Err(ForecastError::InfeasibleWindow(InfeasibleReason::HorizonTooShort {
            required_hours: hours,
            horizon_hours: horizon,
        }));
    }

    let points = &points[..horizon];
    if let Some(p) = points.iter().find(|p| !p.power_kw.is_finite()) {
        return Err(ForecastError::invalid(format!(
            "forecast power at {} is not finite",
            p.timestamp
        )));
    }
    if let Some(pair) = points
        .windows(2)
        .find(|w| w[1].timestamp - w[0].timestamp != TimeDelta::hours(1))
    {
        return Err(ForecastError::invalid(format!(
            "forecast is not consecutive hours at {}",
            pair[1].timestamp
        )));
    }

    // keeps every window sum and prefix sum below i64::MAX
    let limit = i64::MAX / (horizon as i64 + 1);
    let total = device_micro("total_energy_kwh", device.total_energy_kwh, limit)?;
    let full_draw = device_micro("power_kw", device.power_kw, limit)?;
    let last_draw = (total - full_draw * (hours as i64 - 1)).clamp(1, full_draw);

    Ok(Prepared {
        forecast: points
            .iter()
            .map(|p| to_micro(p.power_kw.clamp(0.0, device.power_kw)))
            .collect(),
        hours,
        full_draw,
        last_draw,
        total,
    })
}

/// Returns `(start, solar)` of the first candidate with the highest solar sum.
fn best_start(candidates: usize, solar_at: impl Fn(usize) -> i64) -> (usize, i64) {
    let mut best = (0, solar_at(0));
    for i in 1..candidates {
        let solar = solar_at(i);
        if solar > best.1 {
            best = (i, solar);
        }
    }
    best
}

fn build_result(
    points: &[ForecastPoint],
    device: &DeviceProfile,
    prep: &Prepared,
    (start, solar): (usize, i64),
) -> OptimizationResult {
    let start_time = points[start].timestamp;
    let solar_power_used_kwh = (solar.min(prep.total) as f64 / MICRO_PER_KWH).min(device.total_energy_kwh);
    OptimizationResult {
        start_time,
        end_time: start_time + TimeDelta::hours(prep.hours as i64),
        solar_power_used_kwh,
        grid_power_needed_kwh: (device.total_energy_kwh - solar_power_used_kwh).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap()
    }

    fn forecast(powers: &[f64]) -> Vec<ForecastPoint> {
        powers
            .iter()
            .enumerate()
            .map(|(h, &power_kw)| ForecastPoint {
                timestamp: day_start() + TimeDelta::hours(h as i64),
                power_kw,
            })
            .collect()
    }

    /// Bell-shaped day: zero at night, peaking at 6 kW around noon.
    fn bell() -> Vec<f64> {
        (0..24)
            .map(|h| {
                let x = (h as f64 - 12.0) / 3.0;
                if (6..=18).contains(&h) { 6.0 * (-x * x).exp() } else { 0.0 }
            })
            .collect()
    }

    fn both(points: &[ForecastPoint], device: &DeviceProfile, lookahead: usize) -> OptimizationResult {
        let fast = OptimalWindowSearch.search(points, device, lookahead).unwrap();
        let naive = OptimalWindowSearch.search_naive(points, device, lookahead).unwrap();
        assert_eq!(fast, naive);
        fast
    }

    #[test]
    fn required_hours_rounds_up() {
        assert_eq!(DeviceProfile::new(2.0, 4.0).unwrap().required_hours(), 2);
        assert_eq!(DeviceProfile::new(2.0, 4.5).unwrap().required_hours(), 3);
        assert_eq!(DeviceProfile::new(11.0, 0.5).unwrap().required_hours(), 1);
        assert_eq!(DeviceProfile::new(0.1, 0.3).unwrap().required_hours(), 3);
    }

    #[test]
    fn oversized_device_is_rejected_not_overflowed() {
        let points = forecast(&[1.0; 24]);
        let device = DeviceProfile::new(5e12, 1.5e13).unwrap();
        assert_eq!(device.required_hours(), 3);
        for result in [
            OptimalWindowSearch.search(&points, &device, 24),
            OptimalWindowSearch.search_naive(&points, &device, 24),
        ] {
            assert!(matches!(result.unwrap_err(), ForecastError::InputValidation(_)));
        }
    }

    #[test]
    fn large_but_representable_device_still_schedules() {
        let points = forecast(&[1.0; 24]);
        let device = DeviceProfile::new(1e9, 3e9).unwrap();
        let r = both(&points, &device, 24);
        assert!((r.solar_power_used_kwh - 3.0).abs() < 1e-9);
        assert!((r.solar_power_used_kwh + r.grid_power_needed_kwh - 3e9).abs() < 1e-3);
    }

    #[test]
    fn unbounded_run_length_is_infeasible() {
        let device = DeviceProfile::new(1e-300, 1e300).unwrap();
        assert_eq!(device.required_hours(), usize::MAX);
        assert!(matches!(
            OptimalWindowSearch.search(&forecast(&[1.0; 24]), &device, 24).unwrap_err(),
            ForecastError::InfeasibleWindow(InfeasibleReason::HorizonTooShort { .. })
        ));
    }

    #[test]
    fn zero_power_or_energy_is_degenerate() {
        for (p, e) in [(0.0, 4.0), (2.0, 0.0)] {
            let err = DeviceProfile::new(p, e).unwrap_err();
            assert!(matches!(
                err,
                ForecastError::InfeasibleWindow(InfeasibleReason::DegenerateDevice)
            ));
        }
    }

    #[test]
    fn negative_or_nan_is_invalid_input() {
        assert!(matches!(
            DeviceProfile::new(-1.0, 4.0).unwrap_err(),
            ForecastError::InputValidation(_)
        ));
        assert!(matches!(
            DeviceProfile::new(2.0, f64::NAN).unwrap_err(),
            ForecastError::InputValidation(_)
        ));
    }

    #[test]
    fn night_only_forecast_uses_grid() {
        let points = forecast(&[0.0; 24]);
        let device = DeviceProfile::new(2.0, 4.0).unwrap();
        let result = both(&points, &device, 24);

        assert_eq!(result.solar_power_used_kwh, 0.0);
        assert!((result.grid_power_needed_kwh - 4.0).abs() < 1e-9);
        assert_eq!(result.start_time, day_start());
        assert_eq!(result.end_time - result.start_time, TimeDelta::hours(2));
    }

    #[test]
    fn peak_block_covers_device_fully() {
        let powers: Vec<f64> = (0..24).map(|h| if (11..=14).contains(&h) { 5.0 } else { 0.05 }).collect();
        let device = DeviceProfile::new(2.0, 4.0).unwrap();
        let result = both(&forecast(&powers), &device, 24);

        assert_eq!(result.start_time, day_start() + TimeDelta::hours(11));
        assert!(result.end_time <= day_start() + TimeDelta::hours(15));
        assert!((result.solar_power_used_kwh - 4.0).abs() < 1e-9);
        assert!(result.grid_power_needed_kwh.abs() < 1e-9);
    }

    #[test]
    fn horizon_shorter_than_run_is_infeasible() {
        let points = forecast(&[3.0; 48]);
        let device = DeviceProfile::new(1.0, 30.0).unwrap();
        let err = OptimalWindowSearch.search(&points, &device, 24).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InfeasibleWindow(InfeasibleReason::HorizonTooShort {
                required_hours: 30,
                horizon_hours: 24
            })
        ));
        assert!(OptimalWindowSearch.search_naive(&points, &device, 24).is_err());
    }

    #[test]
    fn empty_forecast_is_infeasible() {
        let device = DeviceProfile::new(1.0, 1.0).unwrap();
        let err = OptimalWindowSearch.search(&[], &device, 24).unwrap_err();
        assert!(matches!(err, ForecastError::InfeasibleWindow(_)));
    }

    #[test]
    fn gaps_in_forecast_are_rejected() {
        let mut points = forecast(&[1.0; 5]);
        points.remove(2);
        let device = DeviceProfile::new(1.0, 1.0).unwrap();
        assert!(matches!(
            OptimalWindowSearch.search(&points, &device, 24).unwrap_err(),
            ForecastError::InputValidation(_)
        ));
    }

    #[test]
    fn ties_go_to_the_earliest_start() {
        let powers = [0.0, 3.0, 3.0, 0.0, 3.0, 3.0, 0.0];
        let device = DeviceProfile::new(2.0, 4.0).unwrap();
        let result = both(&forecast(&powers), &device, 24);
        assert_eq!(result.start_time, day_start() + TimeDelta::hours(1));
    }

    #[test]
    fn repeated_search_is_deterministic() {
        let points = forecast(&bell());
        let device = DeviceProfile::new(3.7, 11.0).unwrap();
        let first = OptimalWindowSearch.search(&points, &device, 24).unwrap();
        for _ in 0..5 {
            assert_eq!(OptimalWindowSearch.search(&points, &device, 24).unwrap(), first);
        }
    }

    #[test]
    fn lookahead_limits_the_search() {
        let powers: Vec<f64> = (0..48).map(|h| if h >= 30 { 5.0 } else { 0.0 }).collect();
        let device = DeviceProfile::new(2.0, 2.0).unwrap();
        let short = both(&forecast(&powers), &device, 24);
        assert_eq!(short.solar_power_used_kwh, 0.0);
        let long = both(&forecast(&powers), &device, 48);
        assert_eq!(long.start_time, day_start() + TimeDelta::hours(30));
    }

    #[test]
    fn partial_last_hour_only_draws_remaining_energy() {
        // 5 kWh at 2 kW: two full hours and a 1 kWh tail
        let powers = [2.0, 2.0, 0.6, 0.0];
        let device = DeviceProfile::new(2.0, 5.0).unwrap();
        let result = both(&forecast(&powers), &device, 24);
        assert_eq!(result.start_time, day_start());
        assert!((result.solar_power_used_kwh - 4.6).abs() < 1e-9);
        assert!((result.grid_power_needed_kwh - 0.4).abs() < 1e-9);
    }

    #[test]
    fn energy_balance_holds() {
        let points = forecast(&bell());
        for (p, e) in [(1.0, 1.0), (2.0, 4.5), (3.3, 7.1), (7.4, 22.0), (0.5, 6.0)] {
            let device = DeviceProfile::new(p, e).unwrap();
            let r = both(&points, &device, 24);
            assert!((r.solar_power_used_kwh + r.grid_power_needed_kwh - e).abs() < 1e-9);
            assert!(r.solar_power_used_kwh <= e + 1e-12);
            assert!(r.grid_power_needed_kwh >= 0.0);
        }
    }

    #[test]
    fn grid_need_never_drops_as_energy_grows() {
        let points = forecast(&bell());
        for power in [1.0, 2.0, 2.5, 4.0] {
            let mut previous = 0.0;
            for step in 1..=60 {
                let energy = step as f64 * 0.25;
                let device = DeviceProfile::new(power, energy).unwrap();
                let r = both(&points, &device, 24);
                assert!(
                    r.grid_power_needed_kwh + 1e-9 >= previous,
                    "power {power}, energy {energy}: {} < {previous}",
                    r.grid_power_needed_kwh
                );
                previous = r.grid_power_needed_kwh;
            }
        }
    }

    #[test]
    fn short_last_hour_is_capped_by_its_own_draw() {
        // the last hour only draws 1 kWh, so a strong final hour is worth no
        // more than 1 kWh even though the window total is 5 kWh
        let points = forecast(&[0.6, 2.0, 2.0, 0.0]);
        let device = DeviceProfile::new(2.0, 5.0).unwrap();
        let r = both(&points, &device, 4);
        assert_eq!(r.start_time, points[1].timestamp);
        assert!((r.solar_power_used_kwh - 4.0).abs() < 1e-9);
        assert!((r.grid_power_needed_kwh - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_forecast_fractional_energy_is_monotone() {
        let points = forecast(&[1.0; 24]);
        let a = both(&points, &DeviceProfile::new(2.0, 2.0).unwrap(), 24);
        let b = both(&points, &DeviceProfile::new(2.0, 2.5).unwrap(), 24);
        assert!((a.grid_power_needed_kwh - 1.0).abs() < 1e-9);
        assert!(b.grid_power_needed_kwh >= a.grid_power_needed_kwh);

        // a third, short hour adds 0.1 kWh of need and 0.1 kWh of solar
        let c = both(&points, &DeviceProfile::new(2.0, 4.0).unwrap(), 24);
        let d = both(&points, &DeviceProfile::new(2.0, 4.1).unwrap(), 24);
        assert!((c.grid_power_needed_kwh - 2.0).abs() < 1e-9);
        assert!((d.grid_power_needed_kwh - 2.0).abs() < 1e-9);
    }

    #[test]
    fn prefix_and_naive_agree_on_noisy_series() {
        let powers: Vec<f64> = (0..72)
            .map(|h| {
                let base = bell()[h % 24];
                base * (0.6 + 0.4 * ((h * 7919) % 13) as f64 / 12.0)
            })
            .collect();
        let points = forecast(&powers);
        for (p, e) in [(1.1, 3.3), (2.0, 9.9), (4.2, 4.2), (0.7, 13.0)] {
            let device = DeviceProfile::new(p, e).unwrap();
            both(&points, &device, 72);
        }
    }

    #[test]
    fn report_shows_window() {
        let r = both(&forecast(&bell()), &DeviceProfile::new(2.0, 4.0).unwrap(), 24);
        let s = r.to_string();
        assert!(s.contains("Optimal Window"));
        assert!(s.contains("2024-06-21"));
    }
}
