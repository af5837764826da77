//! Rule Interpreter
//!
//! Stores natural-language rules and selects the ones whose text lexically
//! overlaps the current sensor vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{debug, info};

use crate::error::RuleError;
use crate::fuzzy::LinguisticDescription;

fn default_priority() -> u32 {
    50
}

fn default_enabled() -> bool {
    true
}

/// An operator-authored automation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaturalLanguageRule {
    pub id: String,
    pub text: String,
    /// Lower numbers are evaluated first
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger_count: u64,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl NaturalLanguageRule {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            priority: default_priority(),
            enabled: true,
            trigger_count: 0,
            last_triggered: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn validate(&self) -> Result<(), RuleError> {
        if self.text.trim().is_empty() {
            return Err(RuleError::EmptyRuleText);
        }
        if self.priority < 1 {
            return Err(RuleError::InvalidPriority(self.priority));
        }
        Ok(())
    }
}

/// Partial update applied in place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub text: Option<String>,
    pub priority: Option<u32>,
    pub enabled: Option<bool>,
    pub tags: Option<HashMap<String, String>>,
}

/// A rule selected for evaluation this tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRule {
    pub rule: NaturalLanguageRule,
    pub matched_terms: Vec<String>,
    pub confidence: f64,
}

#[derive(Default)]
pub struct RuleInterpreter {
    rules: RwLock<HashMap<String, NaturalLanguageRule>>,
}

impl RuleInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&self, rule: NaturalLanguageRule) -> Result<(), RuleError> {
        rule.validate()?;
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        if rules.contains_key(&rule.id) {
            return Err(RuleError::DuplicateRule(rule.id));
        }
        info!("Added rule '{}' (priority {})", rule.id, rule.priority);
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    pub fn load_rules(&self, rules: impl IntoIterator<Item = NaturalLanguageRule>) -> Result<usize, RuleError> {
        let mut count = 0;
        for rule in rules {
            self.add_rule(rule)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<NaturalLanguageRule, RuleError> {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))?;

        let mut updated = rule.clone();
        if let Some(text) = update.text {
            updated.text = text;
        }
        if let Some(priority) = update.priority {
            updated.priority = priority;
        }
        if let Some(enabled) = update.enabled {
            updated.enabled = enabled;
        }
        if let Some(tags) = update.tags {
            updated.tags = tags;
        }
        updated.validate()?;

        *rule = updated.clone();
        debug!("Updated rule '{}'", id);
        Ok(updated)
    }

    pub fn enable_rule(&self, id: &str) -> Result<(), RuleError> {
        self.set_enabled(id, true)
    }

    pub fn disable_rule(&self, id: &str) -> Result<(), RuleError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RuleError> {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))?;
        rule.enabled = enabled;
        info!("Rule '{}' {}", id, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn remove_rule(&self, id: &str) -> Result<NaturalLanguageRule, RuleError> {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))
    }

    pub fn get_rule(&self, id: &str) -> Option<NaturalLanguageRule> {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// All rules ordered by priority, then id
    pub fn list_rules(&self) -> Vec<NaturalLanguageRule> {
        let mut rules: Vec<NaturalLanguageRule> = self
            .rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn enabled_count(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| r.enabled)
            .count()
    }

    /// Count one evaluation of `id`. Serialised under the write lock.
    pub fn record_trigger(&self, id: &str) -> Result<u64, RuleError> {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))?;
        rule.trigger_count += 1;
        rule.last_triggered = Some(Utc::now());
        Ok(rule.trigger_count)
    }

    /// Vocabulary generated from the current sensor state
    pub fn candidate_terms<'a>(
        descriptions: impl IntoIterator<Item = &'a LinguisticDescription>,
    ) -> BTreeSet<String> {
        let mut terms = BTreeSet::new();
        for description in descriptions {
            let sensor_type = description.sensor_type.to_lowercase();
            for membership in &description.terms {
                let term = membership.term.to_lowercase();
                terms.insert(format!("{} is {}", sensor_type, term));
                terms.insert(term);
            }
            terms.insert(sensor_type);
        }
        terms
    }

    /// Enabled rules that mention at least one current term, in evaluation order
    pub fn find_candidate_rules<'a>(
        &self,
        descriptions: impl IntoIterator<Item = &'a LinguisticDescription>,
    ) -> Vec<CandidateRule> {
        let terms = Self::candidate_terms(descriptions);
        if terms.is_empty() {
            return Vec::new();
        }
        let total = terms.len() as f64;

        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        let mut candidates: Vec<CandidateRule> = rules
            .values()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| {
                let text = rule.text.to_lowercase();
                let matched_terms: Vec<String> = terms
                    .iter()
                    .filter(|term| text.contains(term.as_str()))
                    .cloned()
                    .collect();
                if matched_terms.is_empty() {
                    return None;
                }
                let confidence = (matched_terms.len() as f64 / total).min(1.0);
                Some(CandidateRule {
                    rule: rule.clone(),
                    matched_terms,
                    confidence,
                })
            })
            .collect();
        drop(rules);

        candidates.sort_by(|a, b| {
            a.rule
                .priority
                .cmp(&b.rule.priority)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.rule.id.cmp(&b.rule.id))
        });

        debug!(
            "{} candidate rules from {} terms",
            candidates.len(),
            terms.len()
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::TermMembership;

    fn description(sensor_type: &str, terms: &[(&str, f64)]) -> LinguisticDescription {
        LinguisticDescription {
            sensor_id: format!("{}_1", sensor_type),
            sensor_type: sensor_type.to_string(),
            value: 0.0,
            terms: terms
                .iter()
                .map(|(term, degree)| TermMembership {
                    term: term.to_string(),
                    degree: *degree,
                })
                .collect(),
            unit: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_duplicate_and_invalid_rules() {
        let interpreter = RuleInterpreter::new();
        interpreter
            .add_rule(NaturalLanguageRule::new("r1", "if hot turn on ac"))
            .unwrap();
        assert_eq!(
            interpreter.add_rule(NaturalLanguageRule::new("r1", "again")),
            Err(RuleError::DuplicateRule("r1".to_string()))
        );
        assert_eq!(
            interpreter.add_rule(NaturalLanguageRule::new("r2", "   ")),
            Err(RuleError::EmptyRuleText)
        );
        assert_eq!(
            interpreter.add_rule(NaturalLanguageRule::new("r3", "x").with_priority(0)),
            Err(RuleError::InvalidPriority(0))
        );
    }

    #[test]
    fn test_candidate_terms_vocabulary() {
        let d = description("Temperature", &[("Hot", 0.9)]);
        let terms = RuleInterpreter::candidate_terms([&d]);
        let expected: BTreeSet<String> = ["temperature", "hot", "temperature is hot"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(terms, expected);
    }

    #[test]
    fn test_candidates_ordered_by_priority_then_confidence() {
        let interpreter = RuleInterpreter::new();
        interpreter
            .add_rule(NaturalLanguageRule::new("low", "when hot open the window").with_priority(20))
            .unwrap();
        interpreter
            .add_rule(
                NaturalLanguageRule::new("strong", "if the temperature is hot turn on the ac")
                    .with_priority(10),
            )
            .unwrap();
        interpreter
            .add_rule(NaturalLanguageRule::new("weak", "if it is hot close blinds").with_priority(10))
            .unwrap();
        interpreter
            .add_rule(NaturalLanguageRule::new("humid", "if humid run the dehumidifier"))
            .unwrap();

        let d = description("temperature", &[("hot", 0.9)]);
        let candidates = interpreter.find_candidate_rules([&d]);
        let ids: Vec<&str> = candidates.iter().map(|c| c.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["strong", "weak", "low"]);
        assert!((candidates[0].confidence - 1.0).abs() < 1e-9);
        assert!((candidates[1].confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let interpreter = RuleInterpreter::new();
        interpreter
            .add_rule(NaturalLanguageRule::new("r1", "if hot turn on ac").disabled())
            .unwrap();
        let d = description("temperature", &[("hot", 0.9)]);
        assert!(interpreter.find_candidate_rules([&d]).is_empty());

        interpreter.enable_rule("r1").unwrap();
        assert_eq!(interpreter.find_candidate_rules([&d]).len(), 1);
    }

    #[test]
    fn test_update_and_trigger() {
        let interpreter = RuleInterpreter::new();
        interpreter
            .add_rule(NaturalLanguageRule::new("r1", "if hot turn on ac"))
            .unwrap();

        let updated = interpreter
            .update_rule(
                "r1",
                RuleUpdate {
                    priority: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.priority, 5);
        assert!(interpreter
            .update_rule(
                "r1",
                RuleUpdate {
                    text: Some(String::new()),
                    ..Default::default()
                },
            )
            .is_err());
        assert_eq!(interpreter.get_rule("r1").unwrap().text, "if hot turn on ac");

        assert_eq!(interpreter.record_trigger("r1").unwrap(), 1);
        assert_eq!(interpreter.record_trigger("r1").unwrap(), 2);
        assert!(interpreter.get_rule("r1").unwrap().last_triggered.is_some());
        assert!(interpreter.record_trigger("missing").is_err());

        interpreter.remove_rule("r1").unwrap();
        assert_eq!(interpreter.rule_count(), 0);
    }
}
