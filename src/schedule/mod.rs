//! Scheduling of flexible loads against the solar forecast.

pub mod excess;
pub mod window;

pub use excess::{ExcessSummary, excess_hours};
pub use window::{DeviceProfile, OptimalWindowSearch, OptimizationResult};
