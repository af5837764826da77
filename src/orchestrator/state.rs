//! Sensor State
//!
//! Latest linguistic description per sensor id. Each reading replaces the
//! previous entry for its sensor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::fuzzy::LinguisticDescription;

/// One raw value arriving from the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

impl SensorReading {
    pub fn new(sensor_id: impl Into<String>, sensor_type: impl Into<String>, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type: sensor_type.into(),
            value,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Default)]
pub struct SensorStateCache {
    states: RwLock<HashMap<String, LinguisticDescription>>,
}

impl SensorStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, description: LinguisticDescription) {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(description.sensor_id.clone(), description);
    }

    pub fn get(&self, sensor_id: &str) -> Option<LinguisticDescription> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(sensor_id)
            .cloned()
    }

    /// Copy of the whole state, detached from later updates
    pub fn snapshot(&self) -> HashMap<String, LinguisticDescription> {
        self.states.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remove(&self, sensor_id: &str) -> Option<LinguisticDescription> {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(sensor_id)
    }

    pub fn clear(&self) {
        self.states.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
