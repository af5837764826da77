//! Rules Module
//!
//! Natural-language rule storage and matching, prompt rendering, and model
//! response parsing.

mod interpreter;
mod parser;
mod prompt;

pub use interpreter::{CandidateRule, NaturalLanguageRule, RuleInterpreter, RuleUpdate};
pub use parser::{ParsedResponse, ResponseKind, ResponseParser};
pub use prompt::{PromptBuilder, DEFAULT_TEMPLATE, RULE_PLACEHOLDER, SENSOR_STATES_PLACEHOLDER};
