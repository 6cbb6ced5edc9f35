use tracing::debug;

use super::types::{DailyForecast, ForecastPoint, ForecastResult};
use crate::error::{ForecastError, Result};

/// Rolls an hourly power series up into daily and period energy totals.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForecastAggregator;

impl ForecastAggregator {
    /// Groups `points` by UTC calendar day.
    ///
    /// Partial days at the edges are kept as they are, never padded or dropped.
    ///
    /// # Arguments
    ///
    /// * `points` - Hourly points in strictly increasing timestamp order
    ///
    /// # Returns
    ///
    /// A [`ForecastResult`] whose total equals both the sum of daily totals
    /// and the hour-weighted sum of all points.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` if `points` is empty or out of order.
    pub fn aggregate(&self, points: &[ForecastPoint]) -> Result<ForecastResult> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(ForecastError::invalid("cannot aggregate an empty forecast"));
        };
        if let Some(pair) = points.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(ForecastError::invalid(format!(
                "forecast points out of order at {}",
                pair[1].timestamp
            )));
        }

        let mut days: Vec<DailyForecast> = Vec::new();
        for point in points {
            let day = point.timestamp.date_naive();
            match days.last_mut() {
                Some(current) if current.day == day => {
                    current.daily_energy_kwh += point.energy_kwh();
                    current.points.push(*point);
                }
                _ => days.push(DailyForecast {
                    day,
                    daily_energy_kwh: point.energy_kwh(),
                    points: vec![*point],
                }),
            }
        }

        let total_energy_kwh = days.iter().map(|d| d.daily_energy_kwh).sum();
        debug!("aggregated {} points into {} days", points.len(), days.len());

        Ok(ForecastResult {
            total_energy_kwh,
            forecast_from: first.timestamp,
            forecast_to: last.timestamp,
            forecast_hours: points.len(),
            days,
        })
    }
}
