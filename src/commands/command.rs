//! Command Types
//!
//! Parsed actions and the device commands synthesised from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CommandError;

/// A typed command parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Coerce raw text: boolean, then integer, then float, then string
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        let unquoted = strip_quotes(raw);
        if unquoted.len() != raw.len() {
            return ParamValue::Text(unquoted.to_string());
        }

        if raw.eq_ignore_ascii_case("true") {
            return ParamValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return ParamValue::Bool(false);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return ParamValue::Float(f);
            }
        }
        ParamValue::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

fn strip_quotes(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

pub type Parameters = BTreeMap<String, ParamValue>;

/// A device action extracted from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub device_id: String,
    pub command: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ActionSpec {
    pub fn new(device_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Validated,
    Rejected,
    Executed,
    Failed,
}

impl CommandStatus {
    fn can_transition_to(self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (CommandStatus::Pending, CommandStatus::Validated)
                | (CommandStatus::Pending, CommandStatus::Rejected)
                | (CommandStatus::Validated, CommandStatus::Executed)
                | (CommandStatus::Validated, CommandStatus::Failed)
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Validated => "validated",
            CommandStatus::Rejected => "rejected",
            CommandStatus::Executed => "executed",
            CommandStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A command addressed to one actuator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub command_id: u64,
    pub device_id: String,
    pub command_type: String,
    pub parameters: Parameters,
    pub rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
    status: CommandStatus,
    rejection_reason: Option<String>,
}

impl DeviceCommand {
    pub fn new(
        command_id: u64,
        device_id: impl Into<String>,
        command_type: impl Into<String>,
        parameters: Parameters,
        rule_id: Option<String>,
    ) -> Self {
        Self {
            command_id,
            device_id: device_id.into(),
            command_type: command_type.into(),
            parameters,
            rule_id,
            created_at: Utc::now(),
            status: CommandStatus::Pending,
            rejection_reason: None,
        }
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    fn transition(&mut self, next: CommandStatus) -> Result<(), CommandError> {
        if !self.status.can_transition_to(next) {
            return Err(CommandError::InvalidTransition {
                command_id: self.command_id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_validated(&mut self) -> Result<(), CommandError> {
        self.transition(CommandStatus::Validated)
    }

    pub fn mark_rejected(&mut self, reason: impl Into<String>) -> Result<(), CommandError> {
        self.transition(CommandStatus::Rejected)?;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    pub fn mark_executed(&mut self) -> Result<(), CommandError> {
        self.transition(CommandStatus::Executed)
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), CommandError> {
        self.transition(CommandStatus::Failed)?;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }
}
