//! Array description and physical model constants.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Geometry and nameplate rating of one PV array.
///
/// Azimuth is measured clockwise from north (180° = south-facing).
/// Treated as immutable for the duration of a forecast run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Site latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Site longitude in degrees, [-180, 180].
    pub longitude: f64,
    /// Nameplate DC capacity (kWp, > 0).
    pub kwp: f64,
    /// Panel tilt from horizontal in degrees, [0, 90].
    pub tilt: f64,
    /// Panel azimuth in degrees, [0, 360).
    pub azimuth: f64,
}

impl ArrayConfig {
    /// Creates a validated array configuration.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` if any field is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64, kwp: f64, tilt: f64, azimuth: f64) -> Result<Self> {
        let cfg = Self {
            latitude,
            longitude,
            kwp,
            tilt,
            azimuth,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every field against its physical range.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        check_range("tilt", self.tilt, 0.0, 90.0)?;
        if !self.kwp.is_finite() || self.kwp <= 0.0 {
            return Err(ForecastError::invalid(format!(
                "kwp must be > 0, got {}",
                self.kwp
            )));
        }
        if !self.azimuth.is_finite() || !(0.0..360.0).contains(&self.azimuth) {
            return Err(ForecastError::invalid(format!(
                "azimuth must be in [0, 360), got {}",
                self.azimuth
            )));
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ForecastError::invalid(format!(
            "{field} must be in [{min}, {max}], got {value}"
        )))
    }
}

/// Installation-dependent constants of the irradiance and power models.
///
/// Defaults are typical for a roof-mounted crystalline-silicon array
/// with a string inverter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelParameters {
    /// Ground reflectance used for the reflected POA component.
    pub albedo: f64,
    /// Module temperature rise above ambient per W/m² of POA irradiance (°C·m²/W).
    pub thermal_coefficient_c_per_w_m2: f64,
    /// Power temperature coefficient in percent per °C (negative for c-Si).
    pub temperature_coefficient_pct_per_c: f64,
    /// DC→AC conversion efficiency (0, 1].
    pub inverter_efficiency: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            albedo: 0.2,
            thermal_coefficient_c_per_w_m2: 0.03,
            temperature_coefficient_pct_per_c: -0.4,
            inverter_efficiency: 0.96,
        }
    }
}

impl ModelParameters {
    /// Temperature coefficient as a fraction per °C (γ).
    pub fn gamma_per_c(&self) -> f64 {
        self.temperature_coefficient_pct_per_c / 100.0
    }
}
