//! The [`Rule`] trait and the metadata the scheduler reads from it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use flightcheck_core::{CancellationFlag, EventCollection, Preferences, RequiredEvent, Severity};

use crate::result::RuleResult;
use crate::table::ResultsTable;

/// Gate on another rule: run only if `target_rule_id` reached `minimum_severity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "rule")]
    pub target_rule_id: String,
    pub minimum_severity: Severity,
}

impl Dependency {
    pub fn new(target_rule_id: impl Into<String>, minimum_severity: Severity) -> Self {
        Self {
            target_rule_id: target_rule_id.into(),
            minimum_severity,
        }
    }

    /// Whether a dependency result of `severity` lets the dependent rule run.
    pub fn admits(&self, severity: Severity) -> bool {
        severity >= self.minimum_severity
    }
}

/// Static description of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Stable unique identifier; the key in every result map.
    pub id: String,
    pub name: String,
    pub topic: String,
    /// Event types the recording must offer for the rule to apply.
    #[serde(default)]
    pub required_events: Vec<RequiredEvent>,
    #[serde(default)]
    pub dependency: Option<Dependency>,
}

impl RuleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            topic: topic.into(),
            required_events: Vec::new(),
            dependency: None,
        }
    }

    pub fn requires(mut self, event: RequiredEvent) -> Self {
        self.required_events.push(event);
        self
    }

    pub fn depends_on(mut self, target_rule_id: impl Into<String>, minimum_severity: Severity) -> Self {
        self.dependency = Some(Dependency::new(target_rule_id, minimum_severity));
        self
    }
}

/// Error returned by a rule evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation failed: {0}")]
    Failed(String),
    #[error("evaluation cancelled")]
    Cancelled,
    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

/// Everything one evaluation may read.
///
/// The event collection is shared read-only by all evaluations of a request;
/// the results table is that request's append-only record of finished rules.
pub struct EvaluationContext<'a> {
    pub events: &'a EventCollection,
    pub preferences: &'a Preferences,
    pub results: &'a ResultsTable,
    pub cancellation: &'a CancellationFlag,
}

impl<'a> EvaluationContext<'a> {
    /// Result of a rule that already finished in this request, if any.
    pub fn result_of(&self, rule_id: &str) -> Option<Arc<RuleResult>> {
        self.results.get(rule_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Bail out with [`EvaluationError::Cancelled`] once the request is cancelled.
    pub fn check_cancelled(&self) -> Result<(), EvaluationError> {
        if self.is_cancelled() {
            Err(EvaluationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// An independently pluggable analysis unit.
///
/// Implementations must be `Send + Sync`: one rule instance is shared by
/// every concurrent request and may be evaluated on any worker thread.
pub trait Rule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    /// Inspect the recording and produce exactly one result.
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}
