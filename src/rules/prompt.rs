//! Prompt Builder
//!
//! Renders a rule and the current sensor state into the text sent to the
//! inference service.

use crate::error::PromptError;
use crate::fuzzy::LinguisticDescription;

pub const SENSOR_STATES_PLACEHOLDER: &str = "{sensor_states}";
pub const RULE_PLACEHOLDER: &str = "{rule}";

const NO_SENSOR_DATA: &str = "- no sensor data available";

pub const DEFAULT_TEMPLATE: &str = "You are the decision core of a home automation controller.

Current sensor states:
{sensor_states}

Automation rule:
\"{rule}\"

Decide whether the rule requires an action right now.
Respond with exactly one line:
ACTION: <device_id>, <command>[, key=value, ...]
or
NO_ACTION: <short reason>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    template: String,
    include_values: bool,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        let missing: Vec<&str> = [SENSOR_STATES_PLACEHOLDER, RULE_PLACEHOLDER]
            .into_iter()
            .filter(|placeholder| !template.contains(placeholder))
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::InvalidTemplate(missing.join(", ")));
        }
        Ok(Self {
            template,
            include_values: false,
        })
    }

    /// Also show raw values and units in the sensor block
    pub fn with_values(mut self, include_values: bool) -> Self {
        self.include_values = include_values;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Bulleted sensor block, one line per sensor ordered by sensor id
    pub fn sensor_block<'a>(
        &self,
        descriptions: impl IntoIterator<Item = &'a LinguisticDescription>,
    ) -> String {
        let mut descriptions: Vec<&LinguisticDescription> = descriptions.into_iter().collect();
        if descriptions.is_empty() {
            return NO_SENSOR_DATA.to_string();
        }
        descriptions.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));

        descriptions
            .iter()
            .map(|d| {
                let line = if self.include_values {
                    d.to_text_with_value()
                } else {
                    d.to_short_text()
                };
                format!("- {}", line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build<'a>(
        &self,
        rule_text: &str,
        descriptions: impl IntoIterator<Item = &'a LinguisticDescription>,
    ) -> Result<String, PromptError> {
        let rule_text = rule_text.trim();
        if rule_text.is_empty() {
            return Err(PromptError::EmptyRuleText);
        }
        let block = self.sensor_block(descriptions);
        Ok(self
            .template
            .replace(SENSOR_STATES_PLACEHOLDER, &block)
            .replace(RULE_PLACEHOLDER, rule_text))
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            include_values: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::TermMembership;
    use chrono::Utc;

    fn description(sensor_id: &str, sensor_type: &str, term: &str) -> LinguisticDescription {
        LinguisticDescription {
            sensor_id: sensor_id.to_string(),
            sensor_type: sensor_type.to_string(),
            value: 24.0,
            terms: vec![TermMembership {
                term: term.to_string(),
                degree: 0.8,
            }],
            unit: Some("°C".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_template_requires_both_placeholders() {
        assert!(PromptBuilder::new("{sensor_states} {rule}").is_ok());
        assert_eq!(
            PromptBuilder::new("only {rule}"),
            Err(PromptError::InvalidTemplate("{sensor_states}".to_string()))
        );
        assert_eq!(
            PromptBuilder::new("nothing here"),
            Err(PromptError::InvalidTemplate("{sensor_states}, {rule}".to_string()))
        );
    }

    #[test]
    fn test_build_substitutes() {
        let builder = PromptBuilder::new("S:\n{sensor_states}\nR: {rule}").unwrap();
        let a = description("t2", "temperature", "hot");
        let b = description("h1", "humidity", "dry");
        let prompt = builder.build("  turn on the ac when hot ", [&a, &b]).unwrap();
        assert_eq!(
            prompt,
            "S:\n- humidity is dry\n- temperature is hot\nR: turn on the ac when hot"
        );
    }

    #[test]
    fn test_build_with_values_and_empty_state() {
        let builder = PromptBuilder::new("{sensor_states}|{rule}").unwrap().with_values(true);
        let a = description("t1", "temperature", "hot");
        assert_eq!(
            builder.build("r", [&a]).unwrap(),
            "- temperature is hot (0.80), value 24 °C|r"
        );
        assert_eq!(
            builder.build("r", std::iter::empty::<&LinguisticDescription>()).unwrap(),
            "- no sensor data available|r"
        );
    }

    #[test]
    fn test_empty_rule_text() {
        let builder = PromptBuilder::default();
        assert_eq!(
            builder.build("   ", std::iter::empty::<&LinguisticDescription>()),
            Err(PromptError::EmptyRuleText)
        );
    }
}
