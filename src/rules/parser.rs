//! Response Parser
//!
//! Classifies free-text model output as ACTION, NO_ACTION or MALFORMED.
//! Markers are searched anywhere in the text so preambles and epilogues from
//! verbose models are ignored. ACTION is checked first.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::commands::{ActionSpec, ParamValue, Parameters};
use crate::utils::truncate::{truncate_text, TruncationPolicy};

lazy_static::lazy_static! {
    // `\b` keeps the ACTION marker from matching inside NO_ACTION; line breaks
    // may follow the colon or the first comma, parameters end at the line
    static ref ACTION_RE: Regex = Regex::new(
        r"(?im)\bACTION\s*:\s*([^,\n]*?)\s*,\s*([^,\n]*?)[ \t]*(?:,[ \t]*([^\n]*))?$"
    ).expect("valid ACTION pattern");

    static ref NO_ACTION_RE: Regex = Regex::new(r"(?is)\bNO_ACTION\s*:\s*(.*)")
        .expect("valid NO_ACTION pattern");
}

const EXCERPT_BYTES: usize = 120;
const NO_REASON: &str = "no reason given";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    Action,
    NoAction,
    Malformed,
}

/// Terminal outcome of parsing one model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParsedResponse {
    Action(ActionSpec),
    NoAction { reason: String },
    Malformed { reason: String },
}

impl ParsedResponse {
    pub fn kind(&self) -> ResponseKind {
        match self {
            ParsedResponse::Action(_) => ResponseKind::Action,
            ParsedResponse::NoAction { .. } => ResponseKind::NoAction,
            ParsedResponse::Malformed { .. } => ResponseKind::Malformed,
        }
    }

    pub fn action(&self) -> Option<&ActionSpec> {
        match self {
            ParsedResponse::Action(action) => Some(action),
            _ => None,
        }
    }

    pub fn no_action(reason: impl Into<String>) -> Self {
        ParsedResponse::NoAction {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> ParsedResponse {
        if text.trim().is_empty() {
            return ParsedResponse::Malformed {
                reason: "empty response".to_string(),
            };
        }

        if let Some(caps) = ACTION_RE.captures(text) {
            let device_id = clean_token(caps.get(1).map_or("", |m| m.as_str()));
            let command = clean_token(caps.get(2).map_or("", |m| m.as_str()));
            if device_id.is_empty() || command.is_empty() {
                warn!("ACTION marker with empty device or command");
                return ParsedResponse::Malformed {
                    reason: format!(
                        "ACTION is missing a device or command: {}",
                        excerpt(caps.get(0).map_or(text, |m| m.as_str()))
                    ),
                };
            }

            let parameters = caps
                .get(3)
                .map(|m| parse_parameters(m.as_str()))
                .unwrap_or_default();

            debug!("Parsed ACTION {} {} ({} params)", device_id, command, parameters.len());
            return ParsedResponse::Action(ActionSpec {
                device_id: device_id.to_string(),
                command: command.to_string(),
                parameters,
            });
        }

        if let Some(caps) = NO_ACTION_RE.captures(text) {
            let reason = caps.get(1).map_or("", |m| m.as_str()).trim();
            let reason = if reason.is_empty() { NO_REASON } else { reason };
            return ParsedResponse::NoAction {
                reason: reason.to_string(),
            };
        }

        ParsedResponse::Malformed {
            reason: format!("no ACTION or NO_ACTION marker found in: {}", excerpt(text)),
        }
    }
}

/// Comma-separated `key=value` pairs; entries without `=` or with an empty key are skipped
fn parse_parameters(rest: &str) -> Parameters {
    let mut parameters = Parameters::new();
    for pair in rest.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            debug!("Ignoring parameter without '=': {}", pair);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_end_matches('.');
        parameters.insert(key.to_string(), ParamValue::coerce(value));
    }
    parameters
}

fn clean_token(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '*')
        .trim_end_matches('.')
        .trim()
}

fn excerpt(text: &str) -> String {
    truncate_text(text.trim(), TruncationPolicy::Bytes(EXCERPT_BYTES))
}
