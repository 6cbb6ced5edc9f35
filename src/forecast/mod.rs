//! Hourly PV power forecast: per-sample pipeline and daily aggregation.

pub mod aggregate;
pub mod engine;
pub mod types;

pub use aggregate::ForecastAggregator;
pub use engine::{ForecastEngine, HourlyStep};
pub use types::{DailyForecast, ForecastPoint, ForecastResult};
