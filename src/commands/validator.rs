//! Command Validator
//!
//! Ordered gate: device exists, is an actuator, supports the command,
//! parameters satisfy constraints, command is whitelisted, device is under its
//! rate limit. The first failing step rejects the command. Critical commands
//! are flagged but not blocked.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::command::DeviceCommand;
use crate::devices::DeviceRegistry;
use crate::error::ValidationError;
use crate::safety::{RateLimitConfig, RateLimiter, SafetyPolicy};

/// Outcome of validating one command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub command_id: u64,
    pub device_id: String,
    pub command_type: String,
    pub valid: bool,
    pub is_critical: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ValidationError>,
}

fn serialize_error<S: serde::Serializer>(error: &Option<ValidationError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl ValidationResult {
    fn passed(command: &DeviceCommand, is_critical: bool) -> Self {
        Self {
            command_id: command.command_id,
            device_id: command.device_id.clone(),
            command_type: command.command_type.clone(),
            valid: true,
            is_critical,
            error: None,
        }
    }

    fn failed(command: &DeviceCommand, error: ValidationError) -> Self {
        Self {
            command_id: command.command_id,
            device_id: command.device_id.clone(),
            command_type: command.command_type.clone(),
            valid: false,
            is_critical: false,
            error: Some(error),
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

pub struct CommandValidator {
    registry: Option<Arc<dyn DeviceRegistry>>,
    policy: SafetyPolicy,
    rate_limiter: RateLimiter,
}

impl CommandValidator {
    pub fn new(policy: SafetyPolicy, rate_limit: RateLimitConfig) -> Self {
        Self {
            registry: None,
            policy,
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn set_registry(&mut self, registry: Arc<dyn DeviceRegistry>) {
        self.registry = Some(registry);
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    pub fn validate(&self, command: &mut DeviceCommand) -> ValidationResult {
        self.validate_at(command, Instant::now())
    }

    /// Validate against the rate-limit window ending at `now`
    pub fn validate_at(&self, command: &mut DeviceCommand, now: Instant) -> ValidationResult {
        match self.check(command, now) {
            Ok(is_critical) => {
                if let Err(e) = command.mark_validated() {
                    warn!("{}", e);
                }
                if is_critical {
                    warn!(
                        "Critical command {} validated: {}:{}",
                        command.command_id, command.device_id, command.command_type
                    );
                } else {
                    debug!("Command {} validated", command.command_id);
                }
                ValidationResult::passed(command, is_critical)
            }
            Err(error) => {
                warn!("Command {} rejected: {}", command.command_id, error);
                if let Err(e) = command.mark_rejected(error.to_string()) {
                    warn!("{}", e);
                }
                ValidationResult::failed(command, error)
            }
        }
    }

    /// Runs every blocking step; returns the critical flag on success
    fn check(&self, command: &DeviceCommand, now: Instant) -> Result<bool, ValidationError> {
        let registry = self.registry.as_ref().ok_or(ValidationError::NoRegistry)?;

        let device = registry
            .get_device(&command.device_id)
            .ok_or_else(|| ValidationError::DeviceNotFound(command.device_id.clone()))?;

        if !device.is_actuator() {
            return Err(ValidationError::NotActuator(command.device_id.clone()));
        }

        if !device.supports(&command.command_type) {
            return Err(ValidationError::UnsupportedCommand {
                device_id: command.device_id.clone(),
                command: command.command_type.clone(),
            });
        }

        for (parameter, value) in &command.parameters {
            if let Some(constraint) = device.constraints.get(parameter) {
                constraint
                    .check(value)
                    .map_err(|reason| ValidationError::ConstraintViolation {
                        parameter: parameter.clone(),
                        reason,
                    })?;
            }
        }

        if !self.policy.is_whitelisted(&command.device_id, &command.command_type) {
            return Err(ValidationError::NotWhitelisted(command.command_type.clone()));
        }

        // last blocking step, so an accepted slot is never wasted
        self.rate_limiter
            .try_acquire(&command.device_id, now)
            .map_err(|exceeded| ValidationError::RateLimited {
                device_id: command.device_id.clone(),
                count: exceeded.count,
                limit: exceeded.limit,
                window_secs: exceeded.window.as_secs_f64(),
            })?;

        Ok(self.policy.is_critical(&command.command_type))
    }

    pub fn rate_limit_count(&self, device_id: &str) -> usize {
        self.rate_limiter.count(device_id)
    }

    pub fn rate_limit_count_at(&self, device_id: &str, now: Instant) -> usize {
        self.rate_limiter.count_at(device_id, now)
    }

    pub fn rate_limited_devices(&self) -> Vec<String> {
        self.rate_limiter.tracked_devices()
    }

    pub fn clear_rate_limit(&self, device_id: &str) {
        self.rate_limiter.clear_device(device_id);
    }

    pub fn clear_all_rate_limits(&self) {
        self.rate_limiter.clear_all();
    }
}
