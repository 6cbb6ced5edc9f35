//! Temperature-corrected conversion from POA irradiance to AC power.

use serde::Serialize;

use super::types::{ArrayConfig, ModelParameters};

/// Irradiance at standard test conditions (W/m²).
const STC_IRRADIANCE: f64 = 1000.0;
/// Cell temperature at standard test conditions (°C).
const STC_TEMPERATURE: f64 = 25.0;

/// Intermediate and final values of one power conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerOutput {
    /// Estimated module temperature (°C).
    pub module_temp_c: f64,
    /// Multiplicative temperature derating, `1 + γ·(T_module − 25)`.
    pub derating: f64,
    /// DC power before the inverter (kW).
    pub dc_kw: f64,
    /// AC power after inverter losses and clipping (kW), in `[0, kwp]`.
    pub ac_kw: f64,
}

/// Linear thermal model: the module heats above ambient in proportion to irradiance.
pub fn module_temperature(ambient_c: f64, poa_w_m2: f64, model: &ModelParameters) -> f64 {
    ambient_c + model.thermal_coefficient_c_per_w_m2 * poa_w_m2.max(0.0)
}

/// Converts POA irradiance and ambient temperature into AC output of `array`.
///
/// # Arguments
///
/// * `poa_w_m2` - Total plane-of-array irradiance (W/m²)
/// * `ambient_c` - Ambient air temperature (°C)
/// * `array` - Array rating (kWp)
/// * `model` - Thermal coefficient, temperature coefficient and inverter efficiency
pub fn convert(poa_w_m2: f64, ambient_c: f64, array: &ArrayConfig, model: &ModelParameters) -> PowerOutput {
    let poa = poa_w_m2.max(0.0);
    let module_temp_c = module_temperature(ambient_c, poa, model);
    let derating = (1.0 + model.gamma_per_c() * (module_temp_c - STC_TEMPERATURE)).max(0.0);
    let dc_kw = array.kwp * (poa / STC_IRRADIANCE) * derating;
    // inverter clipping at nameplate
    let ac_kw = (dc_kw * model.inverter_efficiency).clamp(0.0, array.kwp);

    PowerOutput {
        module_temp_c,
        derating,
        dc_kw,
        ac_kw,
    }
}
