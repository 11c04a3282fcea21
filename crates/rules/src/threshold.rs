//! Declarative threshold rules defined in YAML.
//!
//! A threshold rule aggregates one metric over the events of a single type
//! and grades it against warning / critical limits:
//!
//! ```yaml
//! apiVersion: v1
//! kind: ThresholdRule
//! metadata:
//!   id: long-gc-pauses
//!   name: Long GC Pauses
//!   topic: garbage_collection
//! spec:
//!   event_type: jdk.GarbageCollection
//!   metric: max
//!   field: duration_ms
//!   warning: 100
//!   critical: 500
//!   summary: "Longest pause: {{ value | round(1) }} ms"
//! ```
//!
//! Limits can be overridden per request through preferences named
//! `<rule id>.warning` and `<rule id>.critical`.

use serde::{Deserialize, Serialize};

use flightcheck_core::{RequiredEvent, Severity};

use crate::loader::RuleError;
use crate::result::{ResultBuilder, RuleResult, Suggestion};
use crate::rule::{Dependency, EvaluationContext, EvaluationError, Rule, RuleDescriptor};

/// `kind` value of threshold rule documents.
pub const THRESHOLD_KIND: &str = "ThresholdRule";

/// Aggregate computed over the matching events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Count,
    Sum,
    Max,
    Mean,
}

/// Rule header metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdMetadata {
    pub id: String,
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Detection and message section of a threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdSpec {
    pub event_type: String,
    pub metric: Metric,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
    #[serde(default)]
    pub depends_on: Option<Dependency>,
    pub summary: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Full YAML document for a threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRuleDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ThresholdMetadata,
    pub spec: ThresholdSpec,
}

/// A loaded, validated threshold rule.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    descriptor: RuleDescriptor,
    metadata: ThresholdMetadata,
    spec: ThresholdSpec,
}

impl ThresholdRule {
    pub fn from_document(doc: ThresholdRuleDocument) -> Result<Self, RuleError> {
        let ThresholdRuleDocument {
            api_version,
            kind,
            metadata,
            spec,
        } = doc;
        if kind != THRESHOLD_KIND {
            return Err(RuleError::Validation(format!("unknown rule kind: '{}'", kind)));
        }
        if api_version != "v1" {
            return Err(RuleError::Validation(format!(
                "unsupported apiVersion '{}' for rule '{}'",
                api_version, metadata.id
            )));
        }
        if metadata.id.trim().is_empty() {
            return Err(RuleError::Validation("rule metadata.id must not be empty".to_string()));
        }
        if spec.metric != Metric::Count && spec.field.is_none() {
            return Err(RuleError::Validation(format!(
                "rule '{}': metric {:?} requires `field`",
                metadata.id, spec.metric
            )));
        }
        if let (Some(w), Some(c)) = (spec.warning, spec.critical) {
            if w > c {
                return Err(RuleError::Validation(format!(
                    "rule '{}': warning limit {} exceeds critical limit {}",
                    metadata.id, w, c
                )));
            }
        }

        let mut descriptor = RuleDescriptor::new(&metadata.id, &metadata.name, &metadata.topic)
            .requires(RequiredEvent::available(&spec.event_type));
        descriptor.dependency = spec.depends_on.clone();

        Ok(Self {
            descriptor,
            metadata,
            spec,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RuleError> {
        let doc: ThresholdRuleDocument = serde_yaml::from_str(yaml)?;
        Self::from_document(doc)
    }

    pub fn metadata(&self) -> &ThresholdMetadata {
        &self.metadata
    }

    pub fn spec(&self) -> &ThresholdSpec {
        &self.spec
    }

    /// Compute the metric; `None` when no event carries a numeric `field`.
    fn measure(&self, ctx: &EvaluationContext<'_>) -> Result<(Option<f64>, usize), EvaluationError> {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut max: Option<f64> = None;
        let mut numeric = 0usize;

        for (i, event) in ctx.events.of_type(&self.spec.event_type).enumerate() {
            if i % 4096 == 0 {
                ctx.check_cancelled()?;
            }
            count += 1;
            if let Some(field) = &self.spec.field {
                if let Some(v) = event.number(field) {
                    numeric += 1;
                    sum += v;
                    max = Some(max.map_or(v, |m: f64| m.max(v)));
                }
            }
        }

        let value = match self.spec.metric {
            Metric::Count => Some(count as f64),
            Metric::Sum => (numeric > 0).then_some(sum),
            Metric::Max => max,
            Metric::Mean => (numeric > 0).then(|| sum / numeric as f64),
        };
        Ok((value, count))
    }

    fn limits(&self, ctx: &EvaluationContext<'_>) -> (Option<f64>, Option<f64>) {
        let id = &self.descriptor.id;
        let warning = ctx
            .preferences
            .get(&format!("{id}.warning"))
            .and_then(|v| v.parse().ok())
            .or(self.spec.warning);
        let critical = ctx
            .preferences
            .get(&format!("{id}.critical"))
            .and_then(|v| v.parse().ok())
            .or(self.spec.critical);
        (warning, critical)
    }
}

/// Grade `value` and place it inside its severity band.
///
/// Below warning scores `[0, 50)`, warning to critical `[50, 75)`, at or above
/// critical `[75, 100]`.
fn grade(value: f64, warning: Option<f64>, critical: Option<f64>) -> (Severity, f64) {
    fn lerp(value: f64, from: f64, to: f64, lo: f64, hi: f64) -> f64 {
        if to <= from {
            return lo;
        }
        let t = ((value - from) / (to - from)).clamp(0.0, 1.0);
        lo + t * (hi - lo)
    }

    match (warning, critical) {
        (_, Some(c)) if value >= c => {
            let score = if c > 0.0 { lerp(value, c, 2.0 * c, 75.0, 100.0) } else { 75.0 };
            (Severity::Critical, score)
        }
        (Some(w), Some(c)) if value >= w => (Severity::Warning, lerp(value, w, c, 50.0, 74.9)),
        (Some(w), None) if value >= w => {
            let score = if w > 0.0 { lerp(value, w, 2.0 * w, 50.0, 74.9) } else { 50.0 };
            (Severity::Warning, score)
        }
        (Some(w), _) => (Severity::Ok, lerp(value, 0.0, w, 0.0, 49.9)),
        (None, Some(c)) => (Severity::Ok, lerp(value, 0.0, c, 0.0, 49.9)),
        (None, None) => (Severity::Info, 0.0),
    }
}

impl Rule for ThresholdRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError> {
        let (value, events) = self.measure(ctx)?;
        let builder = ResultBuilder::for_rule(&self.descriptor)
            .value("event_type", self.spec.event_type.as_str())
            .value("events", events as u64)
            .summary(&self.spec.summary)
            .explanation(&self.spec.explanation)
            .solution(&self.spec.solution);

        let Some(value) = value else {
            return Ok(builder
                .severity(Severity::Info)
                .value("value", serde_json::Value::Null)
                .build());
        };

        let (warning, critical) = self.limits(ctx);
        let (severity, score) = grade(value, warning, critical);
        let mut builder = builder.severity(severity).score(score).value("value", value);
        if let Some(w) = warning {
            builder = builder.value("warning", w);
        }
        if let Some(c) = critical {
            builder = builder.value("critical", c);
        }
        if severity >= Severity::Warning {
            for s in &self.spec.suggestions {
                builder = builder.suggestion(s.clone());
            }
        }
        Ok(builder.build())
    }
}
