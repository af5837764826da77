//! Device Registry
//!
//! Boundary to the transport layer's device registry. The pipeline only needs
//! lookups; discovery and liveness tracking live elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::info;

use crate::commands::ParamValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Sensor,
    Actuator,
}

/// Allowed range or enumerated values for one command parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterConstraint {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub allowed: Option<Vec<ParamValue>>,
}

impl ParameterConstraint {
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            allowed: None,
        }
    }

    pub fn one_of(values: impl IntoIterator<Item = ParamValue>) -> Self {
        Self {
            min: None,
            max: None,
            allowed: Some(values.into_iter().collect()),
        }
    }

    /// `Err` carries a human-readable violation
    pub fn check(&self, value: &ParamValue) -> Result<(), String> {
        if self.min.is_some() || self.max.is_some() {
            let Some(x) = value.as_f64() else {
                return Err(format!("expected a number, got '{}'", value));
            };
            if let Some(min) = self.min {
                if x < min {
                    return Err(format!("{} is below minimum {}", x, min));
                }
            }
            if let Some(max) = self.max {
                if x > max {
                    return Err(format!("{} is above maximum {}", x, max));
                }
            }
        }

        if let Some(allowed) = &self.allowed {
            let permitted = allowed.iter().any(|candidate| match (candidate.as_f64(), value.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => candidate == value,
            });
            if !permitted {
                let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                return Err(format!("'{}' is not one of [{}]", value, options.join(", ")));
            }
        }
        Ok(())
    }
}

/// Registry view of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub constraints: HashMap<String, ParameterConstraint>,
}

impl DeviceInfo {
    pub fn actuator(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::Actuator,
            name: None,
            capabilities: BTreeSet::new(),
            constraints: HashMap::new(),
        }
    }

    pub fn sensor(device_id: impl Into<String>) -> Self {
        Self {
            kind: DeviceKind::Sensor,
            ..Self::actuator(device_id)
        }
    }

    pub fn with_capability(mut self, command: impl Into<String>) -> Self {
        self.capabilities.insert(command.into());
        self
    }

    pub fn with_constraint(mut self, parameter: impl Into<String>, constraint: ParameterConstraint) -> Self {
        self.constraints.insert(parameter.into(), constraint);
        self
    }

    pub fn is_actuator(&self) -> bool {
        self.kind == DeviceKind::Actuator
    }

    pub fn supports(&self, command: &str) -> bool {
        self.capabilities.contains(command)
    }
}

/// Read access to known devices
pub trait DeviceRegistry: Send + Sync {
    fn get_device(&self, device_id: &str) -> Option<DeviceInfo>;

    fn list_devices(&self) -> Vec<DeviceInfo>;
}

/// Registry held in memory, populated from configuration or tests
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<String, DeviceInfo>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: impl IntoIterator<Item = DeviceInfo>) -> Self {
        let registry = Self::new();
        for device in devices {
            registry.register(device);
        }
        registry
    }

    /// Insert or replace a device
    pub fn register(&self, device: DeviceInfo) {
        info!(
            "Registered {:?} '{}' ({} capabilities)",
            device.kind,
            device.device_id,
            device.capabilities.len()
        );
        self.devices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(device.device_id.clone(), device);
    }

    pub fn unregister(&self, device_id: &str) -> Option<DeviceInfo> {
        self.devices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeviceRegistry for InMemoryDeviceRegistry {
    fn get_device(&self, device_id: &str) -> Option<DeviceInfo> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(device_id)
            .cloned()
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self
            .devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_constraint() {
        let c = ParameterConstraint::range(16.0, 30.0);
        assert!(c.check(&ParamValue::Int(22)).is_ok());
        assert!(c.check(&ParamValue::Float(16.0)).is_ok());
        assert!(c.check(&ParamValue::Int(40)).is_err());
        assert!(c.check(&ParamValue::Int(10)).is_err());
        assert!(c.check(&ParamValue::Text("warm".into())).is_err());
    }

    #[test]
    fn test_allowed_values() {
        let c = ParameterConstraint::one_of(["cool".into(), "heat".into(), ParamValue::Int(1)]);
        assert!(c.check(&ParamValue::Text("cool".into())).is_ok());
        assert!(c.check(&ParamValue::Float(1.0)).is_ok());
        assert!(c.check(&ParamValue::Text("dry".into())).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = InMemoryDeviceRegistry::from_devices([
            DeviceInfo::actuator("ac_1").with_capability("turn_on"),
            DeviceInfo::sensor("temp_1"),
        ]);
        assert_eq!(registry.len(), 2);
        let ac = registry.get_device("ac_1").unwrap();
        assert!(ac.is_actuator());
        assert!(ac.supports("turn_on"));
        assert!(!registry.get_device("temp_1").unwrap().is_actuator());
        assert!(registry.get_device("nope").is_none());

        registry.unregister("ac_1");
        assert_eq!(registry.list_devices().len(), 1);
    }
}
