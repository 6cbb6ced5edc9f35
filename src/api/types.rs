//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::config::{DeviceConfig, SystemConfig};
use crate::forecast::ForecastResult;
use crate::schedule::{ExcessSummary, OptimizationResult};

/// Error body returned with every non-2xx status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable code, e.g. `"no_feasible_window"`.
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub weather_source: String,
}

#[derive(Debug, Serialize)]
pub struct SystemsResponse {
    pub systems: Vec<SystemConfig>,
    pub devices: Vec<DeviceConfig>,
}

/// Query parameters for `GET /systems/{id}/forecast`.
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// Number of days, server default when absent.
    pub days: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub system_id: String,
    #[serde(flatten)]
    pub forecast: ForecastResult,
}

/// Query parameters for `GET /systems/{id}/optimal-window`.
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// Device id.
    pub device: String,
    /// Lookahead in days, 1 when absent.
    pub days_lookahead: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub system_id: String,
    pub device_id: String,
    #[serde(flatten)]
    pub window: OptimizationResult,
}

/// Query parameters for `GET /systems/{id}/excess`.
#[derive(Debug, Deserialize)]
pub struct ExcessQuery {
    /// Constant household consumption (kW).
    pub consumption_kw: f64,
    pub days: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ExcessResponse {
    pub system_id: String,
    #[serde(flatten)]
    pub excess: ExcessSummary,
}
