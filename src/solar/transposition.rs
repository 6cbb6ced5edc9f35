//! Plane-of-array irradiance from horizontal components (isotropic sky).

use serde::Serialize;

use super::geometry::SolarPosition;
use super::types::ModelParameters;
use crate::weather::WeatherSample;

/// Irradiance components on the array plane (W/m²).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoaIrradiance {
    pub beam: f64,
    pub sky_diffuse: f64,
    pub ground_reflected: f64,
}

impl PoaIrradiance {
    /// Total plane-of-array irradiance, never negative.
    pub fn total(&self) -> f64 {
        (self.beam + self.sky_diffuse + self.ground_reflected).max(0.0)
    }
}

/// Transposes one weather sample onto a plane tilted by `tilt` degrees.
///
/// The measured DNI/DHI split is used directly rather than re-derived from
/// GHI. While the sun is at or below the horizon the result is all zeros.
///
/// # Arguments
///
/// * `sample` - Horizontal irradiance for the hour
/// * `position` - Sun position for the same timestamp
/// * `tilt` - Plane tilt in degrees
/// * `model` - Model constants (albedo)
pub fn transpose(
    sample: &WeatherSample,
    position: &SolarPosition,
    tilt: f64,
    model: &ModelParameters,
) -> PoaIrradiance {
    let Some(aoi) = position.aoi else {
        return PoaIrradiance::default();
    };

    let cos_tilt = tilt.to_radians().cos();
    let beam = (sample.dni * aoi.to_radians().cos()).max(0.0);
    let sky_diffuse = (sample.dhi * (1.0 + cos_tilt) / 2.0).max(0.0);
    let ground_reflected = (sample.ghi * model.albedo * (1.0 - cos_tilt) / 2.0).max(0.0);

    PoaIrradiance {
        beam,
        sky_diffuse,
        ground_reflected,
    }
}
