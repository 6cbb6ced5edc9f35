use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::ForecastAggregator;
use super::types::{ForecastPoint, ForecastResult};
use crate::error::Result;
use crate::solar::power::convert;
use crate::solar::transposition::transpose;
use crate::solar::{ArrayConfig, ModelParameters, PoaIrradiance, PowerOutput, SolarPosition};
use crate::weather::{SampleAveraging, WeatherSample};

/// Every intermediate value computed for one weather sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyStep {
    /// Timestamp of the weather sample.
    pub timestamp: DateTime<Utc>,
    /// Sun position at the instant the sample stands for.
    pub position: SolarPosition,
    pub poa: PoaIrradiance,
    pub power: PowerOutput,
}

impl HourlyStep {
    pub fn point(&self) -> ForecastPoint {
        ForecastPoint {
            timestamp: self.timestamp,
            power_kw: self.power.ac_kw,
        }
    }
}

/// Runs weather samples through geometry, transposition and power conversion
/// for one array.
#[derive(Debug, Clone, Copy)]
pub struct ForecastEngine {
    array: ArrayConfig,
    model: ModelParameters,
    averaging: SampleAveraging,
}

impl ForecastEngine {
    /// # Errors
    ///
    /// Returns `InputValidation` if `array` is out of range.
    pub fn new(array: ArrayConfig, model: ModelParameters) -> Result<Self> {
        array.validate()?;
        Ok(Self {
            array,
            model,
            averaging: SampleAveraging::Instant,
        })
    }

    /// Evaluates the sun position according to how the samples were averaged.
    pub fn with_averaging(mut self, averaging: SampleAveraging) -> Self {
        self.averaging = averaging;
        self
    }

    pub fn array(&self) -> &ArrayConfig {
        &self.array
    }

    /// Computes one [`HourlyStep`] for `sample`.
    ///
    /// Never fails: night and overcast hours simply produce zero or low power.
    pub fn step(&self, sample: &WeatherSample) -> HourlyStep {
        let position = SolarPosition::for_array(&self.array, self.averaging.solar_instant(sample.timestamp));
        let poa = transpose(sample, &position, self.array.tilt, &self.model);
        let power = convert(poa.total(), sample.ambient_temp, &self.array, &self.model);
        HourlyStep {
            timestamp: sample.timestamp,
            position,
            poa,
            power,
        }
    }

    pub fn steps(&self, samples: &[WeatherSample]) -> Vec<HourlyStep> {
        samples.iter().map(|s| self.step(s)).collect()
    }

    /// Hourly power series, one point per sample, in input order.
    pub fn points(&self, samples: &[WeatherSample]) -> Vec<ForecastPoint> {
        samples.iter().map(|s| self.step(s).point()).collect()
    }

    /// Full pipeline from samples to the aggregated forecast.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` if `samples` is empty or not chronological.
    pub fn forecast(&self, samples: &[WeatherSample]) -> Result<ForecastResult> {
        ForecastAggregator.aggregate(&self.points(samples))
    }
}
