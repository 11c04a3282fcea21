use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use flightcheck_rules::{MessageRenderer, Rule, RuleResult};

use crate::scheduler::error::ReportError;
use crate::scheduler::request::{Execution, Settled};
use crate::scheduler::task::SlotOutcome;
use crate::scheduler::types::{AnalysisResult, Evaluation, RuleScore};

use super::resolver::{Plan, Planned};

/// Every registered rule paired with its result.
pub(super) type Collected = Vec<(Arc<dyn Rule>, Arc<RuleResult>)>;

/// Wait for every scheduled rule. The first failure, in completion order,
/// cancels everything still outstanding and fails the whole request; no
/// partial map is returned.
pub(super) fn collect(execution: &Execution, plan: Plan) -> Result<Collected, ReportError> {
    let scheduled = plan
        .entries
        .iter()
        .filter(|(_, planned)| matches!(planned, Planned::Scheduled(_)))
        .count();

    match execution.control.await_settled(scheduled) {
        Settled::Complete => {}
        Settled::Failed { rule_id, source } => {
            warn!(rule_id = %rule_id, error = %source, "rule evaluation failed, aborting report");
            execution.control.cancel();
            return Err(ReportError::Evaluation { rule_id, source });
        }
        Settled::Cancelled => {
            execution.control.cancel();
            return Err(ReportError::Cancelled);
        }
    }

    let mut collected = Vec::with_capacity(plan.entries.len());
    for (rule, planned) in plan.entries {
        let result = match planned {
            Planned::Placeholder(result) => result,
            Planned::Scheduled(slot) => match slot.wait(&execution.control.cancellation) {
                SlotOutcome::Completed(result) => result,
                SlotOutcome::Failed(source) => {
                    execution.control.cancel();
                    return Err(ReportError::Evaluation {
                        rule_id: rule.id().to_string(),
                        source,
                    });
                }
                SlotOutcome::Cancelled => {
                    execution.control.cancel();
                    return Err(ReportError::Cancelled);
                }
            },
        };
        collected.push((rule, result));
    }
    Ok(collected)
}

pub(super) fn project_analysis(collected: Collected) -> HashMap<String, AnalysisResult> {
    let renderer = MessageRenderer::new();
    collected
        .into_iter()
        .map(|(rule, result)| {
            let descriptor = rule.descriptor();
            let evaluation = Evaluation {
                summary: renderer.render_lossy(&result.summary, descriptor, &result),
                explanation: renderer.render_lossy(&result.explanation, descriptor, &result),
                solution: renderer.render_lossy(&result.solution, descriptor, &result),
                suggestions: result.suggestions.clone(),
            };
            let entry = AnalysisResult {
                name: descriptor.name.clone(),
                topic: descriptor.topic.clone(),
                score: result.effective_score(),
                evaluation,
            };
            (descriptor.id.clone(), entry)
        })
        .collect()
}

pub(super) fn project_scores(collected: Collected) -> HashMap<String, RuleScore> {
    collected
        .into_iter()
        .map(|(rule, result)| {
            let score = RuleScore {
                score: result.effective_score(),
                severity: result.severity,
            };
            (rule.id().to_string(), score)
        })
        .collect()
}
