//! Photovoltaic power forecasting and solar-aware load scheduling.

/// REST API (requires the `api` feature).
#[cfg(feature = "api")]
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod forecast;
pub mod io;
pub mod schedule;
pub mod service;
pub mod solar;
pub mod weather;

pub use error::{ForecastError, Result};
