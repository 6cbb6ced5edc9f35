//! Read-only lookup of PV systems and device profiles by identifier.

use std::collections::BTreeMap;

use crate::config::{DeviceConfig, ServiceConfig, SystemConfig};
use crate::error::{ForecastError, Result};
use crate::schedule::DeviceProfile;
use crate::solar::ArrayConfig;

/// Store of array and device records. The forecast core only ever reads it.
pub trait SystemCatalog: Send + Sync {
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    fn array(&self, system_id: &str) -> Result<ArrayConfig>;

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    fn device(&self, device_id: &str) -> Result<DeviceProfile>;

    /// All systems, ordered by id.
    fn systems(&self) -> Vec<SystemConfig>;

    /// All devices, ordered by id.
    fn devices(&self) -> Vec<DeviceConfig>;
}

/// Catalog held entirely in memory, typically built from the service config.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    systems: BTreeMap<String, SystemConfig>,
    devices: BTreeMap<String, DeviceConfig>,
}

impl InMemoryCatalog {
    pub fn new(systems: Vec<SystemConfig>, devices: Vec<DeviceConfig>) -> Self {
        Self {
            systems: systems.into_iter().map(|s| (s.id.clone(), s)).collect(),
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.systems.clone(), config.devices.clone())
    }
}

impl SystemCatalog for InMemoryCatalog {
    fn array(&self, system_id: &str) -> Result<ArrayConfig> {
        self.systems
            .get(system_id)
            .map(SystemConfig::array)
            .ok_or_else(|| ForecastError::NotFound {
                kind: "system",
                id: system_id.to_string(),
            })
    }

    fn device(&self, device_id: &str) -> Result<DeviceProfile> {
        self.devices
            .get(device_id)
            .map(DeviceConfig::profile)
            .ok_or_else(|| ForecastError::NotFound {
                kind: "device",
                id: device_id.to_string(),
            })
    }

    fn systems(&self) -> Vec<SystemConfig> {
        self.systems.values().cloned().collect()
    }

    fn devices(&self) -> Vec<DeviceConfig> {
        self.devices.values().cloned().collect()
    }
}
