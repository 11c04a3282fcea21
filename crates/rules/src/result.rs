//! Rule results and the builder rules use to produce them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flightcheck_core::Severity;

use crate::rule::RuleDescriptor;

/// A recommended change to the recording configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Human-readable name of the setting.
    pub name: String,
    /// What the setting applies to (event type or option key).
    #[serde(rename = "setting")]
    pub target_setting: String,
    pub value: String,
}

impl Suggestion {
    pub fn new(
        name: impl Into<String>,
        target_setting: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_setting: target_setting.into(),
            value: value.into(),
        }
    }
}

/// Outcome of evaluating one rule.
///
/// `summary`, `explanation` and `solution` are message templates; they are
/// rendered against `values` when projected for callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub severity: Severity,
    pub score: Option<f64>,
    pub summary: String,
    pub explanation: String,
    pub solution: String,
    pub suggestions: Vec<Suggestion>,
    /// Typed values exposed to the message templates.
    pub values: BTreeMap<String, serde_json::Value>,
}

impl RuleResult {
    /// Placeholder for a rule that was not evaluated.
    pub fn not_applicable(descriptor: &RuleDescriptor) -> Self {
        ResultBuilder::for_rule(descriptor)
            .severity(Severity::NotApplicable)
            .build()
    }

    /// Explicit score, or the severity's canonical limit when absent.
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or_else(|| self.severity.limit())
    }

    pub fn is_not_applicable(&self) -> bool {
        self.severity == Severity::NotApplicable
    }
}

/// Fluent builder for [`RuleResult`].
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    result: RuleResult,
}

impl ResultBuilder {
    pub fn for_rule(descriptor: &RuleDescriptor) -> Self {
        Self {
            result: RuleResult {
                rule_id: descriptor.id.clone(),
                severity: Severity::Info,
                score: None,
                summary: String::new(),
                explanation: String::new(),
                solution: String::new(),
                suggestions: Vec::new(),
                values: BTreeMap::new(),
            },
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.result.severity = severity;
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.result.score = Some(score);
        self
    }

    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.result.summary = text.into();
        self
    }

    pub fn explanation(mut self, text: impl Into<String>) -> Self {
        self.result.explanation = text.into();
        self
    }

    pub fn solution(mut self, text: impl Into<String>) -> Self {
        self.result.solution = text.into();
        self
    }

    pub fn suggestion(mut self, suggestion: Suggestion) -> Self {
        self.result.suggestions.push(suggestion);
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.result.values.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> RuleResult {
        self.result
    }
}
