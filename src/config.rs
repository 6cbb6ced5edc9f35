//! TOML-based service configuration and preset definitions.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::schedule::DeviceProfile;
use crate::solar::{ArrayConfig, ModelParameters};

/// Top-level service configuration parsed from TOML.
///
/// All sections have defaults matching the baseline preset apart from the
/// system and device lists, which are empty unless given. Load from TOML with
/// [`ServiceConfig::from_toml_file`] or use [`ServiceConfig::baseline`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Physical model constants.
    #[serde(default)]
    pub model: ModelParameters,
    /// Weather source selection and fetch behaviour.
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Request limits.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// HTTP listener.
    #[serde(default)]
    pub api: ApiConfig,
    /// Registered PV systems.
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
    /// Registered flexible loads.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Weather source selection and fetch behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// Source: `"open_meteo"`, `"csv"` or `"synthetic"`.
    pub source: String,
    /// Open-Meteo forecast endpoint.
    pub base_url: String,
    /// Per-request timeout (s, must be > 0).
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Base backoff between retries (ms).
    pub backoff_ms: u64,
    /// Lifetime of cached weather (s, 0 disables the cache).
    pub cache_ttl_secs: u64,
    /// Input file for the `csv` source.
    pub csv_path: Option<PathBuf>,
    /// Seed for the `synthetic` source.
    pub seed: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            source: "open_meteo".to_string(),
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            backoff_ms: 250,
            cache_ttl_secs: 900,
            csv_path: None,
            seed: 42,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Days returned when a request does not say.
    pub default_days: usize,
    /// Largest accepted `days`.
    pub max_days: usize,
    /// Largest accepted `days_lookahead` for window searches.
    pub max_lookahead_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_days: 7,
            max_days: 7,
            max_lookahead_days: 7,
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Bind address, e.g. `"127.0.0.1:3000"`.
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// One PV installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kwp: f64,
    pub tilt: f64,
    pub azimuth: f64,
}

impl SystemConfig {
    pub fn array(&self) -> ArrayConfig {
        ArrayConfig {
            latitude: self.latitude,
            longitude: self.longitude,
            kwp: self.kwp,
            tilt: self.tilt,
            azimuth: self.azimuth,
        }
    }
}

/// One flexible load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub power_kw: f64,
    pub total_energy_kwh: f64,
}

impl DeviceConfig {
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile {
            power_kw: self.power_kw,
            total_energy_kwh: self.total_energy_kwh,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"weather.timeout_secs"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Weather sources accepted in `weather.source`.
pub const WEATHER_SOURCES: &[&str] = &["open_meteo", "csv", "synthetic"];

impl ServiceConfig {
    /// Vienna rooftop array with a few household loads, live weather.
    pub fn baseline() -> Self {
        Self {
            model: ModelParameters::default(),
            weather: WeatherConfig::default(),
            forecast: ForecastConfig::default(),
            api: ApiConfig::default(),
            systems: vec![SystemConfig {
                id: "vienna-roof".to_string(),
                name: "Vienna rooftop".to_string(),
                latitude: 48.2082,
                longitude: 16.3738,
                kwp: 5.0,
                tilt: 35.0,
                azimuth: 180.0,
            }],
            devices: vec![
                DeviceConfig {
                    id: "ev".to_string(),
                    name: "EV charger".to_string(),
                    power_kw: 7.4,
                    total_energy_kwh: 22.0,
                },
                DeviceConfig {
                    id: "washer".to_string(),
                    name: "Washing machine".to_string(),
                    power_kw: 2.0,
                    total_energy_kwh: 1.5,
                },
                DeviceConfig {
                    id: "dishwasher".to_string(),
                    name: "Dishwasher".to_string(),
                    power_kw: 1.8,
                    total_energy_kwh: 1.2,
                },
            ],
        }
    }

    /// Baseline systems and devices on synthetic weather, no network needed.
    pub fn offline() -> Self {
        Self {
            weather: WeatherConfig {
                source: "synthetic".to_string(),
                cache_ttl_secs: 0,
                ..WeatherConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "offline"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "offline" => Ok(Self::offline()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Looks up a system by id.
    pub fn system(&self, id: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.id == id)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let m = &self.model;
        if !(0.0..=1.0).contains(&m.albedo) {
            errors.push(ConfigError::new("model.albedo", "must be in [0.0, 1.0]"));
        }
        if !m.thermal_coefficient_c_per_w_m2.is_finite() || m.thermal_coefficient_c_per_w_m2 < 0.0 {
            errors.push(ConfigError::new("model.thermal_coefficient_c_per_w_m2", "must be >= 0"));
        }
        if !m.temperature_coefficient_pct_per_c.is_finite() || m.temperature_coefficient_pct_per_c > 0.0 {
            errors.push(ConfigError::new("model.temperature_coefficient_pct_per_c", "must be <= 0"));
        }
        if !(m.inverter_efficiency > 0.0 && m.inverter_efficiency <= 1.0) {
            errors.push(ConfigError::new("model.inverter_efficiency", "must be in (0.0, 1.0]"));
        }

        let w = &self.weather;
        if !WEATHER_SOURCES.contains(&w.source.as_str()) {
            errors.push(ConfigError::new(
                "weather.source",
                format!(
                    "must be one of {}, got \"{}\"",
                    WEATHER_SOURCES.join(", "),
                    w.source
                ),
            ));
        }
        if w.timeout_secs == 0 {
            errors.push(ConfigError::new("weather.timeout_secs", "must be > 0"));
        }
        if w.source == "csv" && w.csv_path.is_none() {
            errors.push(ConfigError::new("weather.csv_path", "required when weather.source = \"csv\""));
        }
        if w.source == "open_meteo" && !w.base_url.starts_with("http") {
            errors.push(ConfigError::new("weather.base_url", "must be an http(s) URL"));
        }

        let f = &self.forecast;
        if f.max_days == 0 {
            errors.push(ConfigError::new("forecast.max_days", "must be > 0"));
        }
        if f.default_days == 0 || f.default_days > f.max_days {
            errors.push(ConfigError::new("forecast.default_days", "must be in [1, forecast.max_days]"));
        }
        if f.max_lookahead_days == 0 {
            errors.push(ConfigError::new("forecast.max_lookahead_days", "must be > 0"));
        }

        if self.api.bind.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::new(
                "api.bind",
                format!("\"{}\" is not a socket address", self.api.bind),
            ));
        }

        let mut ids = HashSet::new();
        for (i, s) in self.systems.iter().enumerate() {
            if s.id.trim().is_empty() {
                errors.push(ConfigError::new(format!("systems[{i}].id"), "must not be empty"));
            } else if !ids.insert(s.id.as_str()) {
                errors.push(ConfigError::new(format!("systems[{i}].id"), format!("duplicate id \"{}\"", s.id)));
            }
            if let Err(e) = s.array().validate() {
                errors.push(ConfigError::new(format!("systems[{i}]"), e.to_string()));
            }
        }

        let mut ids = HashSet::new();
        for (i, d) in self.devices.iter().enumerate() {
            if d.id.trim().is_empty() {
                errors.push(ConfigError::new(format!("devices[{i}].id"), "must not be empty"));
            } else if !ids.insert(d.id.as_str()) {
                errors.push(ConfigError::new(format!("devices[{i}].id"), format!("duplicate id \"{}\"", d.id)));
            }
            if let Err(e) = d.profile().validate() {
                errors.push(ConfigError::new(format!("devices[{i}]"), e.to_string()));
            }
        }

        errors
    }
}
