//! Safety Module
//!
//! Whitelisting, critical-command classification and rate limiting for
//! commands leaving the pipeline.

mod rate_limiter;

pub use rate_limiter::{RateLimitConfig, RateLimitExceeded, RateLimiter};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Static command policy loaded from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Allowed command types, or `device_id:command` pairs. Empty allows everything.
    #[serde(default)]
    pub whitelist: BTreeSet<String>,
    /// Command types flagged for extra downstream caution
    #[serde(default)]
    pub critical_commands: BTreeSet<String>,
}

impl SafetyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, entry: impl Into<String>) -> Self {
        self.whitelist.insert(entry.into());
        self
    }

    pub fn critical(mut self, command: impl Into<String>) -> Self {
        self.critical_commands.insert(command.into());
        self
    }

    pub fn whitelist_enabled(&self) -> bool {
        !self.whitelist.is_empty()
    }

    pub fn is_whitelisted(&self, device_id: &str, command: &str) -> bool {
        if !self.whitelist_enabled() {
            return true;
        }
        self.whitelist.contains(command) || self.whitelist.contains(&format!("{}:{}", device_id, command))
    }

    pub fn is_critical(&self, command: &str) -> bool {
        self.critical_commands.contains(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_whitelist_allows_all() {
        let policy = SafetyPolicy::new();
        assert!(policy.is_whitelisted("ac_1", "anything"));
    }

    #[test]
    fn test_whitelist_by_command_or_device_pair() {
        let policy = SafetyPolicy::new().allow("turn_on").allow("heater_1:turn_off");
        assert!(policy.is_whitelisted("ac_1", "turn_on"));
        assert!(policy.is_whitelisted("heater_1", "turn_off"));
        assert!(!policy.is_whitelisted("ac_1", "turn_off"));
    }

    #[test]
    fn test_critical() {
        let policy = SafetyPolicy::new().critical("unlock");
        assert!(policy.is_critical("unlock"));
        assert!(!policy.is_critical("turn_on"));
    }
}
