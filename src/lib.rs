//! Linguistic Automation Controller
//!
//! Drives actuators from free-text automation rules:
//! - Fuzzy inference over numeric sensor readings
//! - Natural-language descriptions of the current state
//! - Lexical candidate-rule selection and prompt rendering
//! - Remote language-model inference with bounded timeouts
//! - Command validation, rate limiting and conflict resolution

pub mod commands;
pub mod config;
pub mod devices;
pub mod error;
pub mod fuzzy;
pub mod inference;
pub mod orchestrator;
pub mod rules;
pub mod safety;
pub mod utils;

// Re-exports for convenience
pub use commands::{ConflictStrategy, DeviceCommand};
pub use config::AutomationConfig;
pub use error::{ControlError, ControlResult};
pub use fuzzy::FuzzyEngine;
pub use inference::InferenceProvider;
pub use orchestrator::{PipelineResult, RuleProcessingPipeline, SensorReading};
pub use rules::RuleInterpreter;
