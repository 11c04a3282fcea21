//! Minijinja rendering for result messages.
//!
//! A result's summary, explanation and solution are templates rendered with
//! access to the rule metadata, the severity, the score and the result's
//! typed `values`. Templates are arbitrary strings, so a fresh
//! [`minijinja::Environment`] is created per render call.

use serde::Serialize;

use crate::loader::RuleError;
use crate::result::RuleResult;
use crate::rule::RuleDescriptor;

/// Rule metadata exposed to templates.
#[derive(Debug, Clone, Serialize)]
struct RuleContext<'a> {
    id: &'a str,
    name: &'a str,
    topic: &'a str,
}

/// Context data available to message templates. Result values are
/// flattened to the top level, so `{{ count }}` reads `values["count"]`.
#[derive(Debug, Clone, Serialize)]
struct MessageContext<'a> {
    rule: RuleContext<'a>,
    severity: &'static str,
    score: f64,
    #[serde(flatten)]
    values: &'a std::collections::BTreeMap<String, serde_json::Value>,
}

/// Renders result message templates.
#[derive(Debug, Default)]
pub struct MessageRenderer {
    _private: (),
}

impl MessageRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env
    }

    /// Render one template against a result.
    pub fn render(
        &self,
        template: &str,
        descriptor: &RuleDescriptor,
        result: &RuleResult,
    ) -> Result<String, RuleError> {
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }
        let ctx = MessageContext {
            rule: RuleContext {
                id: &descriptor.id,
                name: &descriptor.name,
                topic: &descriptor.topic,
            },
            severity: result.severity.as_str(),
            score: result.effective_score(),
            values: &result.values,
        };
        Self::build_env()
            .render_str(template, ctx)
            .map_err(|e| RuleError::Template(e.to_string()))
    }

    /// Render, falling back to the raw template text if rendering fails.
    pub fn render_lossy(&self, template: &str, descriptor: &RuleDescriptor, result: &RuleResult) -> String {
        match self.render(template, descriptor, result) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(rule_id = %descriptor.id, error = %e, "message template failed to render");
                template.to_string()
            }
        }
    }

    /// Check that a template parses, without evaluating it.
    pub fn validate(&self, template: &str) -> Result<(), RuleError> {
        let env = Self::build_env();
        env.template_from_str(template)
            .map_err(|e| RuleError::Template(e.to_string()))?;
        Ok(())
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

#[cfg(test)]
mod tests {
    use flightcheck_core::Severity;

    use super::*;
    use crate::result::ResultBuilder;

    fn fixture() -> (RuleDescriptor, RuleResult) {
        let d = RuleDescriptor::new("gc-pauses", "GC Pauses", "garbage_collection");
        let r = ResultBuilder::for_rule(&d)
            .severity(Severity::Warning)
            .score(61.234)
            .value("value", 180.456)
            .value("event_type", "jdk.GarbageCollection")
            .build();
        (d, r)
    }

    #[test]
    fn renders_values_metadata_and_filters() {
        let (d, r) = fixture();
        let out = MessageRenderer::new()
            .render(
                "{{ rule.name }} [{{ severity }}]: {{ value | round(1) }} ms in {{ event_type }}, score {{ score | round }}",
                &d,
                &r,
            )
            .unwrap();
        assert_eq!(out, "GC Pauses [WARNING]: 180.5 ms in jdk.GarbageCollection, score 61");
    }

    #[test]
    fn plain_text_passes_through() {
        let (d, r) = fixture();
        assert_eq!(MessageRenderer::new().render("No issue.", &d, &r).unwrap(), "No issue.");
    }

    #[test]
    fn broken_template_falls_back_to_raw_text() {
        let (d, r) = fixture();
        let renderer = MessageRenderer::new();
        assert!(renderer.render("{{ unclosed", &d, &r).is_err());
        assert_eq!(renderer.render_lossy("{{ unclosed", &d, &r), "{{ unclosed");
        assert!(renderer.validate("{% if x %}").is_err());
        assert!(renderer.validate("{{ x }}").is_ok());
    }
}
