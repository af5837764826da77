//! Linguistic Descriptor
//!
//! Turns a fuzzification result into the natural-language sensor state that
//! rule matching and prompting consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::{FuzzificationResult, TermMembership};

/// Degree above which a secondary term makes a description ambiguous
pub const AMBIGUITY_THRESHOLD: f64 = 0.3;

const UNKNOWN_TERM: &str = "unknown";

/// Natural-language state of one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticDescription {
    pub sensor_id: String,
    pub sensor_type: String,
    pub value: f64,
    pub terms: Vec<TermMembership>,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LinguisticDescription {
    pub fn dominant(&self) -> Option<&TermMembership> {
        self.terms.first()
    }

    pub fn dominant_term(&self) -> &str {
        self.dominant().map(|m| m.term.as_str()).unwrap_or(UNKNOWN_TERM)
    }

    pub fn is_ambiguous(&self) -> bool {
        self.terms
            .iter()
            .filter(|m| m.degree > AMBIGUITY_THRESHOLD)
            .count()
            >= 2
    }

    /// `temperature is hot (0.90)`
    pub fn to_text(&self) -> String {
        match self.dominant() {
            Some(m) => format!("{} is {} ({:.2})", self.sensor_type, m.term, m.degree),
            None => self.to_short_text(),
        }
    }

    /// `temperature is hot`
    pub fn to_short_text(&self) -> String {
        format!("{} is {}", self.sensor_type, self.dominant_term())
    }

    /// `temperature is hot (0.90), value 32.5 °C`
    pub fn to_text_with_value(&self) -> String {
        let value = match &self.unit {
            Some(unit) => format!("{} {}", self.value, unit),
            None => format!("{}", self.value),
        };
        format!("{}, value {}", self.to_text(), value)
    }

    pub fn render(&self, style: RenderStyle) -> String {
        match style {
            RenderStyle::WithDegree => self.to_text(),
            RenderStyle::TermOnly => self.to_short_text(),
            RenderStyle::WithValue => self.to_text_with_value(),
        }
    }
}

/// Which text rendering to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStyle {
    WithDegree,
    #[default]
    TermOnly,
    WithValue,
}

fn default_max_terms() -> usize {
    3
}

fn default_min_degree() -> f64 {
    0.1
}

/// Formatting limits, independent of the engine threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinguisticDescriptor {
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    #[serde(default = "default_min_degree")]
    pub min_degree: f64,
}

impl Default for LinguisticDescriptor {
    fn default() -> Self {
        Self {
            max_terms: default_max_terms(),
            min_degree: default_min_degree(),
        }
    }
}

impl LinguisticDescriptor {
    pub fn new(max_terms: usize, min_degree: f64) -> Self {
        Self { max_terms, min_degree }
    }

    pub fn describe(
        &self,
        result: &FuzzificationResult,
        sensor_id: &str,
        unit: Option<&str>,
    ) -> LinguisticDescription {
        let terms = result
            .memberships
            .iter()
            .filter(|m| m.degree >= self.min_degree)
            .take(self.max_terms)
            .cloned()
            .collect();

        LinguisticDescription {
            sensor_id: sensor_id.to_string(),
            sensor_type: result.sensor_type.clone(),
            value: result.value,
            terms,
            unit: unit.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Join several sensor descriptions into one line of text
pub fn join_descriptions<'a>(
    descriptions: impl IntoIterator<Item = &'a LinguisticDescription>,
    style: RenderStyle,
    separator: &str,
) -> String {
    descriptions
        .into_iter()
        .map(|d| d.render(style))
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(memberships: &[(&str, f64)]) -> FuzzificationResult {
        FuzzificationResult {
            sensor_type: "temperature".to_string(),
            value: 31.5,
            memberships: memberships
                .iter()
                .map(|(term, degree)| TermMembership {
                    term: term.to_string(),
                    degree: *degree,
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_truncates_and_filters() {
        let descriptor = LinguisticDescriptor::new(2, 0.2);
        let d = descriptor.describe(
            &result(&[("hot", 0.8), ("warm", 0.4), ("mild", 0.3), ("cool", 0.15)]),
            "t1",
            None,
        );
        let terms: Vec<&str> = d.terms.iter().map(|m| m.term.as_str()).collect();
        assert_eq!(terms, vec!["hot", "warm"]);
        assert_eq!(d.dominant_term(), "hot");
    }

    #[test]
    fn test_ambiguity() {
        let descriptor = LinguisticDescriptor::default();
        assert!(descriptor
            .describe(&result(&[("hot", 0.6), ("warm", 0.35)]), "t1", None)
            .is_ambiguous());
        assert!(!descriptor
            .describe(&result(&[("hot", 0.9), ("warm", 0.3)]), "t1", None)
            .is_ambiguous());
    }

    #[test]
    fn test_renderings() {
        let descriptor = LinguisticDescriptor::default();
        let d = descriptor.describe(&result(&[("hot", 0.9)]), "t1", Some("°C"));
        assert_eq!(d.to_text(), "temperature is hot (0.90)");
        assert_eq!(d.to_short_text(), "temperature is hot");
        assert_eq!(d.to_text_with_value(), "temperature is hot (0.90), value 31.5 °C");
    }

    #[test]
    fn test_empty_description_renders_unknown() {
        let d = LinguisticDescriptor::default().describe(&result(&[]), "t1", None);
        assert_eq!(d.to_text(), "temperature is unknown");
        assert!(!d.is_ambiguous());
    }

    #[test]
    fn test_join() {
        let descriptor = LinguisticDescriptor::default();
        let a = descriptor.describe(&result(&[("hot", 0.9)]), "t1", None);
        let mut b = descriptor.describe(&result(&[("humid", 0.7)]), "h1", None);
        b.sensor_type = "humidity".to_string();
        assert_eq!(
            join_descriptions([&a, &b], RenderStyle::TermOnly, "; "),
            "temperature is hot; humidity is humid"
        );
    }
}
