//! Configuration
//!
//! One YAML document describes sensor types, rules, devices, safety policy and
//! inference settings. Everything is validated at load time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::commands::{ConflictResolver, ConflictStrategy};
use crate::devices::{DeviceInfo, InMemoryDeviceRegistry};
use crate::error::{ConfigError, ControlError};
use crate::fuzzy::{FuzzyEngine, FuzzyEngineConfig, LinguisticDescriptor, SensorTypeConfig};
use crate::inference::InferenceConfig;
use crate::orchestrator::{PipelineSettings, RuleProcessingPipeline};
use crate::rules::{NaturalLanguageRule, PromptBuilder, RuleInterpreter, DEFAULT_TEMPLATE};
use crate::safety::{RateLimitConfig, SafetyPolicy};

pub const ENV_API_KEY: &str = "INFERENCE_API_KEY";
pub const ENV_BASE_URL: &str = "INFERENCE_BASE_URL";
pub const ENV_MODEL: &str = "INFERENCE_MODEL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    #[serde(default)]
    pub strategy: ConflictStrategy,
    /// Rule id to priority for the `priority` strategy
    #[serde(default)]
    pub priorities: HashMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub include_values: bool,
    pub prompt_template: Option<String>,
    pub parallel_inference: bool,
    pub tick_interval_secs: u64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            include_values: false,
            prompt_template: None,
            parallel_inference: false,
            tick_interval_secs: 5,
            cache_capacity: 1024,
            cache_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub sensors: Vec<SensorTypeConfig>,
    #[serde(default)]
    pub rules: Vec<NaturalLanguageRule>,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
    #[serde(default)]
    pub safety: SafetyPolicy,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub conflict: ConflictConfig,
    #[serde(default)]
    pub descriptor: LinguisticDescriptor,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AutomationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        info!(
            "Loaded {} sensor type(s), {} rule(s), {} device(s) from {}",
            config.sensors.len(),
            config.rules.len(),
            config.devices.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for sensor in &self.sensors {
            sensor.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        self.prompt_builder()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(0.0..=1.0).contains(&self.descriptor.min_degree) {
            return Err(ConfigError::Invalid(format!(
                "descriptor.min_degree must be within [0, 1] (got {})",
                self.descriptor.min_degree
            )));
        }
        if self.pipeline.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid("pipeline.tick_interval_secs must be positive".to_string()));
        }
        if self.pipeline.cache_capacity == 0 {
            return Err(ConfigError::Invalid("pipeline.cache_capacity must be positive".to_string()));
        }
        if !self.rate_limit.window_secs.is_finite() || self.rate_limit.window_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.window_secs must be a non-negative number (got {})",
                self.rate_limit.window_secs
            )));
        }
        Ok(())
    }

    /// Override inference settings from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override inference settings from any key lookup
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.inference.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.inference.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
            self.inference.options.model = model;
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.pipeline.tick_interval_secs)
    }

    pub fn prompt_builder(&self) -> Result<PromptBuilder, crate::error::PromptError> {
        let template = self.pipeline.prompt_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        Ok(PromptBuilder::new(template)?.with_values(self.pipeline.include_values))
    }

    pub fn build_engine(&self) -> Result<Arc<FuzzyEngine>, ControlError> {
        let engine = FuzzyEngine::new(FuzzyEngineConfig {
            cache_capacity: self.pipeline.cache_capacity,
            cache_ttl: Duration::from_secs(self.pipeline.cache_ttl_secs),
        });
        engine.load_configs(self.sensors.iter().cloned())?;
        Ok(Arc::new(engine))
    }

    pub fn build_interpreter(&self) -> Result<Arc<RuleInterpreter>, ControlError> {
        let interpreter = RuleInterpreter::new();
        interpreter.load_rules(self.rules.iter().cloned())?;
        Ok(Arc::new(interpreter))
    }

    pub fn build_registry(&self) -> Arc<InMemoryDeviceRegistry> {
        Arc::new(InMemoryDeviceRegistry::from_devices(self.devices.iter().cloned()))
    }

    /// Assemble a pipeline bound to the in-memory registry built from `devices`
    pub fn build_pipeline(&self) -> Result<RuleProcessingPipeline, ControlError> {
        let resolver = ConflictResolver::new(self.conflict.strategy).with_priorities(self.conflict.priorities.clone());
        let settings = PipelineSettings {
            parallel_inference: self.pipeline.parallel_inference,
            inference_timeout: self.inference.timeout(),
            inference_options: self.inference.options.clone(),
        };

        let mut pipeline = RuleProcessingPipeline::new(self.build_engine()?, self.build_interpreter()?)
            .with_registry(self.build_registry())
            .with_safety(self.safety.clone(), self.rate_limit)
            .with_descriptor(self.descriptor)
            .with_prompt_builder(self.prompt_builder()?)
            .with_conflict_resolver(resolver)
            .with_settings(settings);

        if let Some(provider) = self.inference.build_provider()? {
            pipeline = pipeline.with_provider(provider);
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ProviderKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
sensors:
  - sensor_type: temperature
    unit: "°C"
    universe: [-10, 50]
    variables:
      - term: cold
        function: { type: trapezoidal, a: -10, b: -10, c: 5, d: 15 }
      - term: hot
        function: { type: trapezoidal, a: 25, b: 32, c: 50, d: 50 }
rules:
  - id: cool_down
    text: "if temperature is hot, turn on the AC"
    priority: 10
devices:
  - device_id: ac_1
    kind: actuator
    capabilities: [turn_on, set_temperature]
    constraints:
      temperature: { min: 16, max: 30 }
safety:
  whitelist: [turn_on]
  critical_commands: [unlock]
rate_limit:
  max_commands: 3
  window_secs: 30
conflict:
  strategy: priority
  priorities: { cool_down: 90 }
inference:
  provider: none
pipeline:
  parallel_inference: true
  tick_interval_secs: 2
"#;

    #[test]
    fn test_parse_sample() {
        let config = AutomationConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.sensors.len(), 1);
        assert_eq!(config.rules[0].priority, 10);
        assert!(config.rules[0].enabled);
        assert_eq!(config.conflict.strategy, ConflictStrategy::Priority);
        assert_eq!(config.rate_limit.max_commands, 3);
        assert_eq!(config.inference.provider, ProviderKind::None);
        assert_eq!(config.tick_interval(), Duration::from_secs(2));
        assert_eq!(config.descriptor, LinguisticDescriptor::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = AutomationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.devices[0].device_id, "ac_1");

        let missing = AutomationConfig::from_file("/nonexistent/automation.yaml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_membership_fails_fast() {
        let yaml = r#"
sensors:
  - sensor_type: temperature
    universe: [0, 10]
    variables:
      - term: warm
        function: { type: triangular, a: 8, b: 2, c: 10 }
"#;
        assert!(matches!(
            AutomationConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_template_rejected() {
        let yaml = "pipeline:\n  prompt_template: \"no placeholders here\"\n";
        assert!(matches!(
            AutomationConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = AutomationConfig::default();
        let env = HashMap::from([
            (ENV_API_KEY, "sk-test"),
            (ENV_MODEL, "qwen2.5"),
            (ENV_BASE_URL, ""),
        ]);
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.inference.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.inference.options.model, "qwen2.5");
        assert_eq!(config.inference.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_build_pipeline() {
        let config = AutomationConfig::from_yaml_str(SAMPLE).unwrap();
        let pipeline = config.build_pipeline().unwrap();
        assert!(!pipeline.has_provider());
        assert_eq!(pipeline.conflict_strategy(), ConflictStrategy::Priority);
        assert_eq!(pipeline.interpreter().rule_count(), 1);
        assert_eq!(pipeline.engine().sensor_types(), vec!["temperature".to_string()]);
    }
}
