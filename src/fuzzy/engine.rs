//! Fuzzy Engine
//!
//! Holds one configuration per sensor type and fuzzifies raw readings into
//! ranked (term, degree) pairs. Results are shared through an LRU+TTL cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::{CacheKey, CacheStats, FuzzyCache};
use super::membership::MembershipFunction;
use crate::error::FuzzyError;

/// One linguistic term and its curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticVariable {
    pub term: String,
    pub function: MembershipFunction,
}

impl LinguisticVariable {
    pub fn new(term: impl Into<String>, function: MembershipFunction) -> Self {
        Self {
            term: term.into(),
            function,
        }
    }
}

fn default_threshold() -> f64 {
    0.1
}

/// Linguistic variables for a single sensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTypeConfig {
    pub sensor_type: String,
    #[serde(default)]
    pub unit: Option<String>,
    /// Universe of discourse as `[min, max]`
    pub universe: (f64, f64),
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    pub variables: Vec<LinguisticVariable>,
}

impl SensorTypeConfig {
    pub fn new(sensor_type: impl Into<String>, universe: (f64, f64)) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            unit: None,
            universe,
            confidence_threshold: default_threshold(),
            variables: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_variable(mut self, term: impl Into<String>, function: MembershipFunction) -> Self {
        self.variables.push(LinguisticVariable::new(term, function));
        self
    }

    pub fn validate(&self) -> Result<(), FuzzyError> {
        let invalid = |reason: String| FuzzyError::InvalidSensorConfig {
            sensor_type: self.sensor_type.clone(),
            reason,
        };

        if self.sensor_type.trim().is_empty() {
            return Err(invalid("sensor type name is empty".to_string()));
        }
        let (min, max) = self.universe;
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(invalid(format!("universe [{}, {}] is not a valid range", min, max)));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.variables.is_empty() {
            return Err(invalid("no linguistic variables defined".to_string()));
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if variable.term.trim().is_empty() {
                return Err(invalid("linguistic term name is empty".to_string()));
            }
            if !seen.insert(variable.term.as_str()) {
                return Err(invalid(format!("duplicate term '{}'", variable.term)));
            }
        }
        Ok(())
    }
}

/// A term and its membership degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMembership {
    pub term: String,
    pub degree: f64,
}

/// Ranked memberships for one raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzificationResult {
    pub sensor_type: String,
    pub value: f64,
    /// Terms at or above the threshold, highest degree first
    pub memberships: Vec<TermMembership>,
    pub timestamp: DateTime<Utc>,
}

impl FuzzificationResult {
    pub fn dominant(&self) -> Option<&TermMembership> {
        self.memberships.first()
    }

    pub fn degree_of(&self, term: &str) -> Option<f64> {
        self.memberships
            .iter()
            .find(|m| m.term == term)
            .map(|m| m.degree)
    }
}

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyEngineConfig {
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for FuzzyEngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

pub struct FuzzyEngine {
    configs: RwLock<HashMap<String, SensorTypeConfig>>,
    cache: Mutex<FuzzyCache>,
}

impl FuzzyEngine {
    pub fn new(config: FuzzyEngineConfig) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            cache: Mutex::new(FuzzyCache::new(config.cache_capacity, config.cache_ttl)),
        }
    }

    /// Load or replace a sensor type; cached results for that type are dropped
    pub fn load_config(&self, config: SensorTypeConfig) -> Result<(), FuzzyError> {
        config.validate()?;
        let sensor_type = config.sensor_type.clone();
        let variable_count = config.variables.len();

        // lock order: configs, then cache
        let mut configs = self.configs.write().unwrap_or_else(|e| e.into_inner());
        let replaced = configs.insert(sensor_type.clone(), config).is_some();
        let invalidated = self.lock_cache().invalidate_type(&sensor_type);
        drop(configs);

        if replaced {
            info!(
                "Reloaded sensor type '{}' ({} terms), invalidated {} cached results",
                sensor_type, variable_count, invalidated
            );
        } else {
            info!("Loaded sensor type '{}' ({} terms)", sensor_type, variable_count);
        }
        Ok(())
    }

    pub fn load_configs(&self, configs: impl IntoIterator<Item = SensorTypeConfig>) -> Result<(), FuzzyError> {
        for config in configs {
            self.load_config(config)?;
        }
        Ok(())
    }

    pub fn remove_config(&self, sensor_type: &str) -> Option<SensorTypeConfig> {
        let mut configs = self.configs.write().unwrap_or_else(|e| e.into_inner());
        let removed = configs.remove(sensor_type);
        if removed.is_some() {
            self.lock_cache().invalidate_type(sensor_type);
        }
        removed
    }

    pub fn config(&self, sensor_type: &str) -> Option<SensorTypeConfig> {
        self.configs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(sensor_type)
            .cloned()
    }

    pub fn sensor_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .configs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn fuzzify(&self, sensor_type: &str, value: f64) -> Result<Arc<FuzzificationResult>, FuzzyError> {
        self.fuzzify_with(sensor_type, value, true)
    }

    /// Fuzzify with optional cache lookup. A bypassed lookup still stores its result.
    pub fn fuzzify_with(
        &self,
        sensor_type: &str,
        value: f64,
        use_cache: bool,
    ) -> Result<Arc<FuzzificationResult>, FuzzyError> {
        let key = CacheKey::new(sensor_type, value);

        if use_cache {
            if let Some(hit) = self.lock_cache().get(&key) {
                debug!("Fuzzy cache hit for {}={}", sensor_type, value);
                return Ok(hit);
            }
        }

        // configs read guard is held across the cache insert
        let configs = self.configs.read().unwrap_or_else(|e| e.into_inner());
        let config = configs
            .get(sensor_type)
            .ok_or_else(|| FuzzyError::UnknownSensorType(sensor_type.to_string()))?;
        let result = Arc::new(Self::compute(config, value));
        self.lock_cache().insert(key, result.clone());
        Ok(result)
    }

    /// Sequential convenience over `fuzzify`
    pub fn fuzzify_batch(&self, readings: &[(&str, f64)]) -> Vec<Result<Arc<FuzzificationResult>, FuzzyError>> {
        readings
            .iter()
            .map(|(sensor_type, value)| self.fuzzify(sensor_type, *value))
            .collect()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    fn compute(config: &SensorTypeConfig, value: f64) -> FuzzificationResult {
        let (min, max) = config.universe;
        let x = if value.is_finite() {
            value.clamp(min, max)
        } else {
            value
        };
        if x != value && value.is_finite() {
            debug!(
                "Value {} outside universe [{}, {}] for '{}', clamped",
                value, min, max, config.sensor_type
            );
        }

        let mut memberships: Vec<TermMembership> = config
            .variables
            .iter()
            .map(|variable| TermMembership {
                term: variable.term.clone(),
                degree: variable.function.degree(x),
            })
            .filter(|m| m.degree >= config.confidence_threshold)
            .collect();

        // stable sort keeps configuration order on ties
        memberships.sort_by(|a, b| b.degree.total_cmp(&a.degree));

        if memberships.is_empty() {
            warn!(
                "No term of '{}' reached threshold {} for value {}",
                config.sensor_type, config.confidence_threshold, value
            );
        }

        FuzzificationResult {
            sensor_type: config.sensor_type.clone(),
            value,
            memberships,
            timestamp: Utc::now(),
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, FuzzyCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FuzzyEngine {
    fn default() -> Self {
        Self::new(FuzzyEngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_config() -> SensorTypeConfig {
        SensorTypeConfig::new("temperature", (-10.0, 50.0))
            .with_unit("°C")
            .with_threshold(0.1)
            .with_variable("cold", MembershipFunction::trapezoidal(-10.0, -10.0, 5.0, 15.0).unwrap())
            .with_variable("comfortable", MembershipFunction::triangular(15.0, 22.0, 28.0).unwrap())
            .with_variable("hot", MembershipFunction::trapezoidal(25.0, 32.0, 50.0, 50.0).unwrap())
    }

    fn engine() -> FuzzyEngine {
        let engine = FuzzyEngine::default();
        engine.load_config(temperature_config()).unwrap();
        engine
    }

    #[test]
    fn test_fuzzify_ranks_terms() {
        let engine = engine();
        let result = engine.fuzzify("temperature", 26.5).unwrap();
        let terms: Vec<&str> = result.memberships.iter().map(|m| m.term.as_str()).collect();
        assert_eq!(terms, vec!["comfortable", "hot"]);
        assert!(result.memberships[0].degree >= result.memberships[1].degree);
    }

    #[test]
    fn test_threshold_filters_low_degrees() {
        let engine = FuzzyEngine::default();
        engine
            .load_config(temperature_config().with_threshold(0.5))
            .unwrap();
        let result = engine.fuzzify("temperature", 26.0).unwrap();
        assert!(result.memberships.iter().all(|m| m.degree >= 0.5));
    }

    #[test]
    fn test_unknown_sensor_type() {
        let engine = engine();
        assert_eq!(
            engine.fuzzify("pressure", 1.0).unwrap_err(),
            FuzzyError::UnknownSensorType("pressure".to_string())
        );
    }

    #[test]
    fn test_cache_hit_keeps_timestamp() {
        let engine = engine();
        let first = engine.fuzzify("temperature", 35.0).unwrap();
        let second = engine.fuzzify("temperature", 35.0).unwrap();
        assert_eq!(first.timestamp, second.timestamp);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cache_stats().hits, 1);
    }

    #[test]
    fn test_bypass_still_records_result() {
        let engine = engine();
        let first = engine.fuzzify("temperature", 35.0).unwrap();
        let fresh = engine.fuzzify_with("temperature", 35.0, false).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));

        let cached = engine.fuzzify("temperature", 35.0).unwrap();
        assert!(Arc::ptr_eq(&fresh, &cached));
    }

    #[test]
    fn test_reload_invalidates_only_that_type() {
        let engine = engine();
        engine
            .load_config(
                SensorTypeConfig::new("humidity", (0.0, 100.0))
                    .with_variable("dry", MembershipFunction::trapezoidal(0.0, 0.0, 20.0, 40.0).unwrap())
                    .with_variable("humid", MembershipFunction::trapezoidal(60.0, 80.0, 100.0, 100.0).unwrap()),
            )
            .unwrap();

        let temp = engine.fuzzify("temperature", 35.0).unwrap();
        let hum = engine.fuzzify("humidity", 10.0).unwrap();

        engine.load_config(temperature_config()).unwrap();

        let temp_again = engine.fuzzify("temperature", 35.0).unwrap();
        let hum_again = engine.fuzzify("humidity", 10.0).unwrap();
        assert!(!Arc::ptr_eq(&temp, &temp_again));
        assert!(Arc::ptr_eq(&hum, &hum_again));
    }

    #[test]
    fn test_value_outside_universe_is_clamped() {
        let engine = engine();
        let result = engine.fuzzify("temperature", 80.0).unwrap();
        assert_eq!(result.value, 80.0);
        assert_eq!(result.dominant().unwrap().term, "hot");
        assert_eq!(result.degree_of("hot"), Some(1.0));
    }

    #[test]
    fn test_batch_matches_single_calls() {
        let engine = engine();
        let results = engine.fuzzify_batch(&[("temperature", 0.0), ("pressure", 1.0)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().dominant().unwrap().term, "cold");
        assert!(results[1].is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let engine = FuzzyEngine::default();
        let bad = SensorTypeConfig::new("temperature", (10.0, 0.0))
            .with_variable("hot", MembershipFunction::gaussian(5.0, 1.0).unwrap());
        assert!(engine.load_config(bad).is_err());

        let duplicate = SensorTypeConfig::new("temperature", (0.0, 10.0))
            .with_variable("hot", MembershipFunction::gaussian(5.0, 1.0).unwrap())
            .with_variable("hot", MembershipFunction::gaussian(7.0, 1.0).unwrap());
        assert!(engine.load_config(duplicate).is_err());
    }

    #[test]
    fn test_reload_during_concurrent_fuzzify_leaves_no_stale_entry() {
        let config = |peak: f64| {
            SensorTypeConfig::new("t", (0.0, 100.0))
                .with_variable("mid", MembershipFunction::triangular(0.0, peak, 100.0).unwrap())
        };
        let engine = FuzzyEngine::default();

        for _ in 0..50 {
            engine.load_config(config(50.0)).unwrap();
            std::thread::scope(|scope| {
                let worker = scope.spawn(|| {
                    for _ in 0..200 {
                        engine.fuzzify_with("t", 50.0, false).unwrap();
                    }
                });
                engine.load_config(config(90.0)).unwrap();
                worker.join().unwrap();
            });

            let degree = engine.fuzzify("t", 50.0).unwrap().degree_of("mid").unwrap();
            assert!((degree - 50.0 / 90.0).abs() < 1e-9, "stale degree {}", degree);
        }
    }
}
