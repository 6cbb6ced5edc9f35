//! Error taxonomy shared by the forecast pipeline, the window search and the service layer.

use std::fmt;

use thiserror::Error;

/// Why no run window could be produced for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasibleReason {
    /// Power or energy of the device profile is zero.
    DegenerateDevice,
    /// The device needs more contiguous hours than the horizon offers.
    HorizonTooShort {
        required_hours: usize,
        horizon_hours: usize,
    },
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateDevice => write!(f, "device profile has zero power or zero energy"),
            Self::HorizonTooShort {
                required_hours,
                horizon_hours,
            } => write!(
                f,
                "device needs {required_hours} contiguous hours but only {horizon_hours} are available"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed or out-of-range request/config fields. Never retried.
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    /// Weather fetch failed or returned incomplete coverage after retries.
    #[error("weather source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("no feasible window: {0}")]
    InfeasibleWindow(InfeasibleReason),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ForecastError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InfeasibleWindow(_) => "no_feasible_window",
            Self::Unexpected(_) => "unexpected",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    pub(crate) fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(e.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(e: csv::Error) -> Self {
        Self::UpstreamUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
