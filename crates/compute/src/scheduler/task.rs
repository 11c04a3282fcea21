//! Per-rule task slots.
//!
//! A slot moves `Pending -> Running -> Done` or straight `Pending -> Done`
//! when cancelled. Exactly one claimant performs the `Pending -> Running`
//! transition: either the worker the slot was submitted to, or the
//! dispatcher forcing it as a dependency. A rule is therefore evaluated at
//! most once per request.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use flightcheck_core::CancellationFlag;
use flightcheck_rules::{EvaluationError, Rule, RuleResult};

use super::request::Execution;

/// Terminal state of a slot.
#[derive(Debug, Clone)]
pub(crate) enum SlotOutcome {
    Completed(Arc<RuleResult>),
    Failed(EvaluationError),
    Cancelled,
}

#[derive(Debug)]
enum SlotState {
    Pending,
    Running,
    Done(SlotOutcome),
}

pub(crate) struct TaskSlot {
    rule: Arc<dyn Rule>,
    state: Mutex<SlotState>,
    done: Condvar,
}

impl TaskSlot {
    pub(crate) fn new(rule: Arc<dyn Rule>) -> Arc<Self> {
        Arc::new(Self {
            rule,
            state: Mutex::new(SlotState::Pending),
            done: Condvar::new(),
        })
    }

    pub(crate) fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot and evaluate its rule on the calling thread.
    /// Returns `false` without doing anything if the slot was already claimed
    /// or cancelled.
    pub(crate) fn run(&self, execution: &Execution) -> bool {
        {
            let mut state = self.lock();
            if !matches!(*state, SlotState::Pending) {
                return false;
            }
            *state = SlotState::Running;
        }

        let outcome = match execution.evaluate(self.rule.as_ref()) {
            Ok(result) => {
                let result = Arc::new(result);
                execution.results.insert(Arc::clone(&result));
                SlotOutcome::Completed(result)
            }
            Err(EvaluationError::Cancelled) if execution.control.is_cancelled() => {
                SlotOutcome::Cancelled
            }
            Err(e) => SlotOutcome::Failed(e),
        };

        let failure = match &outcome {
            SlotOutcome::Failed(e) => Some(e.clone()),
            _ => None,
        };
        *self.lock() = SlotState::Done(outcome);
        self.done.notify_all();
        execution.control.slot_finished(self.rule.id(), failure);
        true
    }

    /// Cancel a slot that has not started and wake every waiter. A running
    /// evaluation is left to finish; waiters re-check the request flag.
    pub(crate) fn cancel(&self) {
        let mut state = self.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Done(SlotOutcome::Cancelled);
        }
        self.done.notify_all();
    }

    /// Block until the slot is done or `cancellation` is raised.
    pub(crate) fn wait(&self, cancellation: &CancellationFlag) -> SlotOutcome {
        let mut state = self.lock();
        loop {
            if let SlotState::Done(outcome) = &*state {
                return outcome.clone();
            }
            if cancellation.is_cancelled() {
                return SlotOutcome::Cancelled;
            }
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Run the slot inline if nobody has claimed it yet, then wait for it.
    pub(crate) fn force(&self, execution: &Execution) -> SlotOutcome {
        self.run(execution);
        self.wait(&execution.control.cancellation)
    }
}
