//! Decides, rule by rule, whether to evaluate or short-circuit.
//!
//! Rules without a dependency are classified and submitted first, so they
//! all start in parallel. Rules with a dependency follow in dependency
//! order; each one forces its target to a result before deciding.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use flightcheck_rules::{Rule, RuleResult};

use crate::scheduler::error::ReportError;
use crate::scheduler::pool::WorkerPool;
use crate::scheduler::request::Execution;
use crate::scheduler::task::{SlotOutcome, TaskSlot};

/// What the resolver decided for one rule.
#[derive(Clone)]
pub(super) enum Planned {
    /// Not applicable; never submitted.
    Placeholder(Arc<RuleResult>),
    /// Submitted to the worker pool.
    Scheduled(Arc<TaskSlot>),
}

/// One entry per registered rule, in dependency order.
pub(super) struct Plan {
    pub(super) entries: Vec<(Arc<dyn Rule>, Planned)>,
}

pub(super) fn plan(
    execution: &Arc<Execution>,
    order: &[Arc<dyn Rule>],
    predicate: &(dyn Fn(&dyn Rule) -> bool + Send),
    workers: &dyn WorkerPool,
) -> Result<Plan, ReportError> {
    let mut decided: HashMap<String, Planned> = HashMap::with_capacity(order.len());
    let mut entries = Vec::with_capacity(order.len());

    let (independent, dependent): (Vec<_>, Vec<_>) = order
        .iter()
        .partition(|rule| rule.descriptor().dependency.is_none());

    for rule in independent {
        execution.control.ensure_active()?;
        let planned = if is_applicable(execution, rule.as_ref(), predicate) {
            submit(execution, rule, workers)?
        } else {
            Planned::Placeholder(execution.short_circuit(rule.as_ref()))
        };
        decided.insert(rule.id().to_string(), planned.clone());
        entries.push((Arc::clone(rule), planned));
    }

    for rule in dependent {
        execution.control.ensure_active()?;
        let planned = if gate(execution, rule.as_ref(), predicate, &decided)? {
            submit(execution, rule, workers)?
        } else {
            Planned::Placeholder(execution.short_circuit(rule.as_ref()))
        };
        decided.insert(rule.id().to_string(), planned.clone());
        entries.push((Arc::clone(rule), planned));
    }

    Ok(Plan { entries })
}

fn is_applicable(
    execution: &Execution,
    rule: &dyn Rule,
    predicate: &(dyn Fn(&dyn Rule) -> bool + Send),
) -> bool {
    if !predicate(rule) {
        debug!(rule_id = %rule.id(), "rule filtered out");
        return false;
    }
    if !execution.events.satisfies(&rule.descriptor().required_events) {
        debug!(rule_id = %rule.id(), "required events unavailable");
        return false;
    }
    true
}

/// Whether a dependent rule should run. Only cancellation is an error;
/// every other way of not obtaining a usable dependency result makes the
/// rule not applicable.
fn gate(
    execution: &Execution,
    rule: &dyn Rule,
    predicate: &(dyn Fn(&dyn Rule) -> bool + Send),
    decided: &HashMap<String, Planned>,
) -> Result<bool, ReportError> {
    if !is_applicable(execution, rule, predicate) {
        return Ok(false);
    }
    let Some(dependency) = &rule.descriptor().dependency else {
        return Ok(true);
    };

    let slot = match decided.get(&dependency.target_rule_id) {
        None => {
            debug!(rule_id = %rule.id(), dependency = %dependency.target_rule_id, "dependency is not registered");
            return Ok(false);
        }
        Some(Planned::Placeholder(_)) => {
            debug!(rule_id = %rule.id(), dependency = %dependency.target_rule_id, "dependency was not evaluated");
            return Ok(false);
        }
        Some(Planned::Scheduled(slot)) => slot,
    };

    match slot.force(execution) {
        SlotOutcome::Completed(result) => {
            let admitted = dependency.admits(result.severity);
            debug!(
                rule_id = %rule.id(),
                dependency = %dependency.target_rule_id,
                severity = %result.severity,
                required = %dependency.minimum_severity,
                admitted,
                "dependency resolved"
            );
            Ok(admitted)
        }
        SlotOutcome::Cancelled if execution.control.is_cancelled() => Err(ReportError::Cancelled),
        SlotOutcome::Failed(error) => {
            warn!(
                rule_id = %rule.id(),
                dependency = %dependency.target_rule_id,
                error = %error,
                "could not resolve dependency, rule treated as not applicable"
            );
            if let Ok(mut m) = execution.metrics.write() {
                m.dependency_warnings += 1;
            }
            Ok(false)
        }
        SlotOutcome::Cancelled => {
            warn!(
                rule_id = %rule.id(),
                dependency = %dependency.target_rule_id,
                "dependency was cancelled, rule treated as not applicable"
            );
            if let Ok(mut m) = execution.metrics.write() {
                m.dependency_warnings += 1;
            }
            Ok(false)
        }
    }
}

fn submit(
    execution: &Arc<Execution>,
    rule: &Arc<dyn Rule>,
    workers: &dyn WorkerPool,
) -> Result<Planned, ReportError> {
    let slot = TaskSlot::new(Arc::clone(rule));
    if !execution.control.track(&slot) {
        slot.cancel();
        return Err(ReportError::Cancelled);
    }

    let job_slot = Arc::clone(&slot);
    let job_execution = Arc::clone(execution);
    workers.submit(Box::new(move || {
        job_slot.run(&job_execution);
    }));
    debug!(rule_id = %rule.id(), "rule submitted");
    Ok(Planned::Scheduled(slot))
}
