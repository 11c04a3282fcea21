//! Shared state of one report request.
//!
//! [`RequestControl`] exists from the moment a request is accepted and is
//! shared with the caller's handle. [`Execution`] exists once the recording
//! is loaded and is shared with every worker evaluating a rule for it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use flightcheck_core::{CancellationFlag, EventCollection, Preferences};
use flightcheck_rules::{EvaluationContext, EvaluationError, ResultsTable, Rule, RuleResult};

use super::error::ReportError;
use super::metrics::GeneratorMetrics;
use super::task::TaskSlot;

#[derive(Default)]
struct Progress {
    finished: usize,
    failure: Option<(String, EvaluationError)>,
}

/// How the evaluations of a request ended, as seen by the aggregator.
#[derive(Debug)]
pub(crate) enum Settled {
    Complete,
    Failed { rule_id: String, source: EvaluationError },
    Cancelled,
}

pub(crate) struct RequestControl {
    pub(crate) id: Uuid,
    pub(crate) cancellation: CancellationFlag,
    /// Every slot submitted so far, so cancellation can reach them.
    slots: Mutex<Vec<Arc<TaskSlot>>>,
    /// Finished evaluations and the first failure, in completion order.
    progress: Mutex<Progress>,
    progressed: Condvar,
    bytes_consumed: OnceLock<u64>,
}

impl RequestControl {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancellation: CancellationFlag::new(),
            slots: Mutex::new(Vec::new()),
            progress: Mutex::new(Progress::default()),
            progressed: Condvar::new(),
            bytes_consumed: OnceLock::new(),
        }
    }

    /// Register a slot before it is submitted. Returns `false` when the
    /// request was already cancelled; the caller must not submit the slot.
    pub(crate) fn track(&self, slot: &Arc<TaskSlot>) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(slot));
        // Checked after registering: a concurrent cancel either sees the
        // slot in the list or has already raised the flag.
        !self.cancellation.is_cancelled()
    }

    /// Raise the cancellation flag and cancel every tracked slot.
    /// Returns `true` if this call raised the flag.
    pub(crate) fn cancel(&self) -> bool {
        let first = self.cancellation.cancel();
        {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            for slot in slots.iter() {
                slot.cancel();
            }
        }
        // Taken so a waiter between its flag check and `wait` cannot miss this.
        let _progress = self.lock_progress();
        self.progressed.notify_all();
        first
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called once by every slot that ran, after its outcome is stored.
    pub(crate) fn slot_finished(&self, rule_id: &str, failure: Option<EvaluationError>) {
        let mut progress = self.lock_progress();
        progress.finished += 1;
        if let (None, Some(source)) = (&progress.failure, failure) {
            progress.failure = Some((rule_id.to_string(), source));
        }
        self.progressed.notify_all();
    }

    /// Block until `scheduled` slots have finished, any of them failed, or
    /// the request was cancelled, whichever happens first.
    pub(crate) fn await_settled(&self, scheduled: usize) -> Settled {
        let mut progress = self.lock_progress();
        loop {
            if let Some((rule_id, source)) = &progress.failure {
                return Settled::Failed {
                    rule_id: rule_id.clone(),
                    source: source.clone(),
                };
            }
            if self.is_cancelled() {
                return Settled::Cancelled;
            }
            if progress.finished >= scheduled {
                return Settled::Complete;
            }
            progress = self
                .progressed
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn ensure_active(&self) -> Result<(), ReportError> {
        if self.is_cancelled() {
            Err(ReportError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn set_bytes_consumed(&self, bytes: u64) {
        let _ = self.bytes_consumed.set(bytes);
    }

    pub(crate) fn bytes_consumed(&self) -> Option<u64> {
        self.bytes_consumed.get().copied()
    }
}

/// Read-only inputs plus the append-only results of a loaded request.
pub(crate) struct Execution {
    pub(crate) control: Arc<RequestControl>,
    pub(crate) events: EventCollection,
    pub(crate) preferences: Arc<Preferences>,
    pub(crate) results: ResultsTable,
    pub(crate) metrics: Arc<RwLock<GeneratorMetrics>>,
}

impl Execution {
    /// Evaluate one rule against this request. Panics become
    /// [`EvaluationError::Panicked`].
    pub(crate) fn evaluate(&self, rule: &dyn Rule) -> Result<RuleResult, EvaluationError> {
        let ctx = EvaluationContext {
            events: &self.events,
            preferences: &self.preferences,
            results: &self.results,
            cancellation: &self.control.cancellation,
        };

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(&ctx)))
            .unwrap_or_else(|payload| Err(EvaluationError::Panicked(panic_message(payload.as_ref()))));
        let elapsed = started.elapsed();

        debug!(
            request_id = %self.control.id,
            rule_id = %rule.id(),
            elapsed_ms = elapsed.as_millis() as u64,
            ok = outcome.is_ok(),
            "rule evaluated"
        );
        if let Ok(mut m) = self.metrics.write() {
            m.record_evaluation(rule.id(), elapsed);
        }

        outcome.map(|mut result| {
            if result.rule_id != rule.id() {
                result.rule_id = rule.id().to_string();
            }
            result
        })
    }

    /// Answer `rule` with a not-applicable placeholder without running it.
    pub(crate) fn short_circuit(&self, rule: &dyn Rule) -> Arc<RuleResult> {
        let placeholder = Arc::new(RuleResult::not_applicable(rule.descriptor()));
        self.results.insert(Arc::clone(&placeholder));
        if let Ok(mut m) = self.metrics.write() {
            m.rules_short_circuited += 1;
        }
        placeholder
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
