//! Error Types
//!
//! Typed errors for every stage of the control pipeline. Configuration errors
//! fail fast at load time; per-item errors are collected by the pipeline.

use thiserror::Error;

/// Errors raised by membership functions and the fuzzy engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("unknown sensor type: {0}")]
    UnknownSensorType(String),

    #[error("invalid membership function: {0}")]
    InvalidMembership(String),

    #[error("invalid configuration for sensor type '{sensor_type}': {reason}")]
    InvalidSensorConfig { sensor_type: String, reason: String },
}

/// Errors raised by the rule store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule '{0}' already exists")]
    DuplicateRule(String),

    #[error("rule '{0}' not found")]
    RuleNotFound(String),

    #[error("rule text must not be empty")]
    EmptyRuleText,

    #[error("rule priority must be at least 1 (got {0})")]
    InvalidPriority(u32),
}

/// Errors raised while building prompts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("invalid prompt template: missing placeholder(s) {0}")]
    InvalidTemplate(String),

    #[error("rule text must not be empty")]
    EmptyRuleText,
}

/// Errors raised while turning actions into device commands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no device registry bound")]
    NoRegistry,

    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("device '{0}' is not an actuator")]
    NotActuator(String),

    #[error("device '{device_id}' does not support command '{command}'")]
    UnsupportedCommand { device_id: String, command: String },

    #[error("command {command_id}: invalid status transition {from} -> {to}")]
    InvalidTransition { command_id: u64, from: String, to: String },
}

/// Reasons a command fails validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no device registry bound")]
    NoRegistry,

    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("device '{0}' is not an actuator")]
    NotActuator(String),

    #[error("device '{device_id}' does not support command '{command}'")]
    UnsupportedCommand { device_id: String, command: String },

    #[error("parameter '{parameter}' violates constraint: {reason}")]
    ConstraintViolation { parameter: String, reason: String },

    #[error("command '{0}' is not in the safety whitelist")]
    NotWhitelisted(String),

    #[error("rate limit exceeded for device '{device_id}': {count} commands in the last {window_secs:.1}s (limit {limit})")]
    RateLimited {
        device_id: String,
        count: usize,
        limit: usize,
        window_secs: f64,
    },
}

/// A single error kind for every inference-service failure mode
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("inference request timed out after {0} ms")]
    Timeout(u64),

    #[error("inference connection failed: {0}")]
    Connection(String),

    #[error("inference service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
}

impl InferenceError {
    /// Classify a transport error from the HTTP client
    pub fn from_reqwest(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout(timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            InferenceError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            InferenceError::InvalidResponse(err.to_string())
        } else {
            InferenceError::Connection(err.to_string())
        }
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for the control pipeline
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Fuzzy(#[from] FuzzyError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ControlResult<T> = std::result::Result<T, ControlError>;
