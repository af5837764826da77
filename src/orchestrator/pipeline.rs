//! Rule Processing Pipeline
//!
//! One tick: select candidate rules for the current sensor state, ask the
//! inference service about each one, turn actions into commands, resolve
//! per-device conflicts and validate the survivors. Collaborator failures are
//! recorded in the result; a tick never aborts.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::{SensorReading, SensorStateCache};
use crate::commands::{
    CommandGenerator, CommandValidator, ConflictInfo, ConflictResolver, ConflictStrategy, DeviceCommand,
    ValidationResult,
};
use crate::devices::DeviceRegistry;
use crate::error::{CommandError, FuzzyError, InferenceError};
use crate::fuzzy::{FuzzyEngine, LinguisticDescription, LinguisticDescriptor};
use crate::inference::{InferenceOptions, InferenceProvider, InferenceRequest};
use crate::rules::{CandidateRule, ParsedResponse, PromptBuilder, ResponseKind, ResponseParser, RuleInterpreter};
use crate::safety::{RateLimitConfig, SafetyPolicy};

pub const UNAVAILABLE_REASON: &str = "inference service unavailable";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Run inference for all candidates concurrently
    pub parallel_inference: bool,
    pub inference_timeout: Duration,
    pub inference_options: InferenceOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parallel_inference: false,
            inference_timeout: Duration::from_secs(30),
            inference_options: InferenceOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub rules_evaluated: u64,
    pub actions: u64,
    pub no_actions: u64,
    pub malformed: u64,
    pub inference_failures: u64,
    pub commands_generated: u64,
    pub commands_validated: u64,
    pub commands_rejected: u64,
    pub conflicts: u64,
    pub errors: u64,
    pub commands_executed: u64,
    pub commands_failed: u64,
}

/// What happened to one candidate rule during a tick
#[derive(Debug, Clone, Serialize)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub priority: u32,
    pub confidence: f64,
    pub prompt: String,
    pub response_text: Option<String>,
    pub parsed: ParsedResponse,
    pub command_id: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub tick_id: Uuid,
    pub evaluations: Vec<RuleEvaluation>,
    /// Validated commands, ready for egress
    pub commands: Vec<DeviceCommand>,
    pub validation_results: Vec<ValidationResult>,
    pub conflicts: Vec<ConflictInfo>,
    pub errors: Vec<String>,
}

impl PipelineResult {
    fn empty(tick_id: Uuid) -> Self {
        Self {
            tick_id,
            evaluations: Vec::new(),
            commands: Vec::new(),
            validation_results: Vec::new(),
            conflicts: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }
}

enum InferenceOutcome {
    Response(String),
    Unavailable,
    Failed(InferenceError),
}

pub struct RuleProcessingPipeline {
    engine: Arc<FuzzyEngine>,
    interpreter: Arc<RuleInterpreter>,
    descriptor: LinguisticDescriptor,
    prompt_builder: PromptBuilder,
    parser: ResponseParser,
    generator: CommandGenerator,
    validator: CommandValidator,
    resolver: RwLock<ConflictResolver>,
    registry: Option<Arc<dyn DeviceRegistry>>,
    provider: Option<Arc<dyn InferenceProvider>>,
    state: SensorStateCache,
    settings: PipelineSettings,
    stats: Mutex<PipelineStats>,
}

impl RuleProcessingPipeline {
    pub fn new(engine: Arc<FuzzyEngine>, interpreter: Arc<RuleInterpreter>) -> Self {
        Self {
            engine,
            interpreter,
            descriptor: LinguisticDescriptor::default(),
            prompt_builder: PromptBuilder::default(),
            parser: ResponseParser::new(),
            generator: CommandGenerator::new(),
            validator: CommandValidator::new(SafetyPolicy::default(), RateLimitConfig::default()),
            resolver: RwLock::new(ConflictResolver::default()),
            registry: None,
            provider: None,
            state: SensorStateCache::new(),
            settings: PipelineSettings::default(),
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Binds the registry to both the generator and the validator
    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.generator.set_registry(registry.clone());
        self.validator.set_registry(registry.clone());
        self.registry = Some(registry);
        self
    }

    pub fn with_safety(mut self, policy: SafetyPolicy, rate_limit: RateLimitConfig) -> Self {
        self.validator = CommandValidator::new(policy, rate_limit);
        if let Some(registry) = &self.registry {
            self.validator.set_registry(registry.clone());
        }
        self
    }

    pub fn with_descriptor(mut self, descriptor: LinguisticDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_conflict_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = RwLock::new(resolver);
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn engine(&self) -> &Arc<FuzzyEngine> {
        &self.engine
    }

    pub fn interpreter(&self) -> &Arc<RuleInterpreter> {
        &self.interpreter
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn set_conflict_strategy(&self, strategy: ConflictStrategy) {
        self.resolver
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_strategy(strategy);
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.resolver.read().unwrap_or_else(|e| e.into_inner()).strategy()
    }

    // --- sensor state ---

    /// Fuzzify and describe a reading, replacing the sensor's previous state
    pub fn ingest_reading(&self, reading: &SensorReading) -> Result<LinguisticDescription, FuzzyError> {
        let result = self.engine.fuzzify(&reading.sensor_type, reading.value)?;
        let unit = match &reading.unit {
            Some(unit) => Some(unit.clone()),
            None => self.engine.config(&reading.sensor_type).and_then(|c| c.unit),
        };
        let description = self.descriptor.describe(&result, &reading.sensor_id, unit.as_deref());
        debug!("{} -> {}", reading.sensor_id, description.to_text());
        self.state.upsert(description.clone());
        Ok(description)
    }

    pub fn current_state(&self) -> HashMap<String, LinguisticDescription> {
        self.state.snapshot()
    }

    pub fn remove_sensor(&self, sensor_id: &str) -> Option<LinguisticDescription> {
        self.state.remove(sensor_id)
    }

    pub fn clear_state(&self) {
        self.state.clear();
    }

    // --- evaluation ---

    /// Run one tick over the current sensor state
    pub async fn evaluate(&self) -> PipelineResult {
        let states = self.state.snapshot();
        self.evaluate_with(&states).await
    }

    /// Run one tick over an explicit sensor state
    pub async fn evaluate_with(&self, states: &HashMap<String, LinguisticDescription>) -> PipelineResult {
        let tick_id = Uuid::new_v4();
        let span = info_span!("tick", %tick_id);
        self.run_tick(tick_id, states).instrument(span).await
    }

    async fn run_tick(&self, tick_id: Uuid, states: &HashMap<String, LinguisticDescription>) -> PipelineResult {
        let mut result = PipelineResult::empty(tick_id);
        let mut stats = PipelineStats {
            ticks: 1,
            ..Default::default()
        };

        let candidates = self.interpreter.find_candidate_rules(states.values());
        if candidates.is_empty() {
            debug!("No candidate rules for {} sensor(s)", states.len());
            stats.idle_ticks = 1;
            self.merge_stats(&stats);
            return result;
        }
        info!("{} candidate rule(s)", candidates.len());

        let prompts: Vec<Result<String, String>> = candidates
            .iter()
            .map(|c| {
                self.prompt_builder
                    .build(&c.rule.text, states.values())
                    .map_err(|e| e.to_string())
            })
            .collect();

        let outcomes = self.run_inference(&prompts).await;

        let mut generated = Vec::new();
        for ((candidate, prompt), outcome) in candidates.iter().zip(prompts).zip(outcomes) {
            let evaluation = self.evaluate_rule(candidate, prompt, outcome, &mut generated, &mut stats);
            if let Some(error) = &evaluation.error {
                result.errors.push(format!("rule '{}': {}", evaluation.rule_id, error));
            }
            result.evaluations.push(evaluation);

            if let Err(e) = self.interpreter.record_trigger(&candidate.rule.id) {
                warn!("Could not record trigger for '{}': {}", candidate.rule.id, e);
            }
        }

        let resolution = self
            .resolver
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(generated);
        stats.conflicts = resolution.conflicts.len() as u64;
        result.conflicts = resolution.conflicts;

        for mut command in resolution.commands {
            let validation = self.validator.validate(&mut command);
            if validation.valid {
                stats.commands_validated += 1;
                result.commands.push(command);
            } else {
                stats.commands_rejected += 1;
                if let Some(reason) = validation.reason() {
                    result
                        .errors
                        .push(format!("command {} rejected: {}", validation.command_id, reason));
                }
            }
            result.validation_results.push(validation);
        }

        stats.errors = result.errors.len() as u64;
        self.merge_stats(&stats);
        info!(
            "Tick complete: {} evaluated, {} command(s), {} error(s)",
            result.evaluations.len(),
            result.commands.len(),
            result.errors.len()
        );
        result
    }

    /// Inference outcomes in the same order as `prompts`
    async fn run_inference(&self, prompts: &[Result<String, String>]) -> Vec<Option<InferenceOutcome>> {
        let calls = prompts.iter().map(|prompt| async move {
            match prompt {
                Ok(prompt) => Some(self.infer(prompt).await),
                Err(_) => None,
            }
        });

        if self.settings.parallel_inference {
            join_all(calls).await
        } else {
            let mut outcomes = Vec::with_capacity(prompts.len());
            for call in calls {
                outcomes.push(call.await);
            }
            outcomes
        }
    }

    async fn infer(&self, prompt: &str) -> InferenceOutcome {
        let Some(provider) = &self.provider else {
            return InferenceOutcome::Unavailable;
        };
        let request = InferenceRequest::new(prompt, self.settings.inference_options.clone());
        let timeout = self.settings.inference_timeout;
        match tokio::time::timeout(timeout, provider.generate(request)).await {
            Ok(Ok(response)) => InferenceOutcome::Response(response.text),
            Ok(Err(e)) => InferenceOutcome::Failed(e),
            Err(_) => InferenceOutcome::Failed(InferenceError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn evaluate_rule(
        &self,
        candidate: &CandidateRule,
        prompt: Result<String, String>,
        outcome: Option<InferenceOutcome>,
        generated: &mut Vec<DeviceCommand>,
        stats: &mut PipelineStats,
    ) -> RuleEvaluation {
        let rule = &candidate.rule;
        stats.rules_evaluated += 1;

        let mut evaluation = RuleEvaluation {
            rule_id: rule.id.clone(),
            priority: rule.priority,
            confidence: candidate.confidence,
            prompt: String::new(),
            response_text: None,
            parsed: ParsedResponse::no_action(UNAVAILABLE_REASON),
            command_id: None,
            error: None,
        };

        let prompt = match prompt {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Prompt for rule '{}' failed: {}", rule.id, e);
                evaluation.parsed = ParsedResponse::no_action(format!("prompt error: {}", e));
                evaluation.error = Some(e);
                stats.no_actions += 1;
                return evaluation;
            }
        };
        evaluation.prompt = prompt;

        evaluation.parsed = match outcome {
            Some(InferenceOutcome::Response(text)) => {
                let parsed = self.parser.parse(&text);
                evaluation.response_text = Some(text);
                parsed
            }
            Some(InferenceOutcome::Failed(e)) => {
                warn!("Inference for rule '{}' failed: {}", rule.id, e);
                stats.inference_failures += 1;
                evaluation.error = Some(e.to_string());
                ParsedResponse::no_action(format!("inference failed: {}", e))
            }
            Some(InferenceOutcome::Unavailable) | None => ParsedResponse::no_action(UNAVAILABLE_REASON),
        };

        match evaluation.parsed.kind() {
            ResponseKind::Action => stats.actions += 1,
            ResponseKind::NoAction => stats.no_actions += 1,
            ResponseKind::Malformed => {
                stats.malformed += 1;
                if let ParsedResponse::Malformed { reason } = &evaluation.parsed {
                    debug!("Rule '{}' got a malformed response: {}", rule.id, reason);
                }
            }
        }

        if let Some(action) = evaluation.parsed.action() {
            match self.generator.generate(action, Some(&rule.id)) {
                Ok(command) => {
                    stats.commands_generated += 1;
                    evaluation.command_id = Some(command.command_id);
                    generated.push(command);
                }
                Err(e) => {
                    warn!("Rule '{}' produced an unusable action: {}", rule.id, e);
                    evaluation.error = Some(e.to_string());
                }
            }
        }

        evaluation
    }

    // --- egress feedback ---

    /// Apply an execution outcome reported by the transport layer
    pub fn record_execution_outcome(
        &self,
        command: &mut DeviceCommand,
        outcome: Result<(), String>,
    ) -> Result<(), CommandError> {
        let mut delta = PipelineStats::default();
        match outcome {
            Ok(()) => {
                command.mark_executed()?;
                delta.commands_executed = 1;
            }
            Err(reason) => {
                command.mark_failed(reason)?;
                delta.commands_failed = 1;
            }
        }
        self.merge_stats(&delta);
        Ok(())
    }

    // --- statistics ---

    pub fn stats(&self) -> PipelineStats {
        self.lock_stats().clone()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = PipelineStats::default();
    }

    fn merge_stats(&self, delta: &PipelineStats) {
        let mut stats = self.lock_stats();
        stats.ticks += delta.ticks;
        stats.idle_ticks += delta.idle_ticks;
        stats.rules_evaluated += delta.rules_evaluated;
        stats.actions += delta.actions;
        stats.no_actions += delta.no_actions;
        stats.malformed += delta.malformed;
        stats.inference_failures += delta.inference_failures;
        stats.commands_generated += delta.commands_generated;
        stats.commands_validated += delta.commands_validated;
        stats.commands_rejected += delta.commands_rejected;
        stats.conflicts += delta.conflicts;
        stats.errors += delta.errors;
        stats.commands_executed += delta.commands_executed;
        stats.commands_failed += delta.commands_failed;
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, PipelineStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
