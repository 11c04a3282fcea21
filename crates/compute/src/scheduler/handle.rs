//! Caller-facing handle for an in-flight report.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::info;
use uuid::Uuid;

use super::error::ReportError;
use super::metrics::GeneratorMetrics;
use super::request::RequestControl;
use super::types::ReportStatus;

struct Outcome<T> {
    status: ReportStatus,
    value: Option<Result<T, ReportError>>,
}

/// Single-assignment outcome cell. The first completion wins; later ones
/// are ignored.
pub(crate) struct Completion<T> {
    inner: Mutex<Outcome<T>>,
    ready: Condvar,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Outcome {
                status: ReportStatus::Running,
                value: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Outcome<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome and run `on_complete` before any waiter is woken.
    /// Returns the resulting status if this call won.
    fn complete(
        &self,
        value: Result<T, ReportError>,
        on_complete: impl FnOnce(ReportStatus),
    ) -> Option<ReportStatus> {
        let mut outcome = self.lock();
        if outcome.status.is_terminal() {
            return None;
        }
        let status = match &value {
            Ok(_) => ReportStatus::Succeeded,
            Err(ReportError::Cancelled) => ReportStatus::Cancelled,
            Err(_) => ReportStatus::Failed,
        };
        on_complete(status);
        outcome.status = status;
        outcome.value = Some(value);
        self.ready.notify_all();
        Some(status)
    }

    fn status(&self) -> ReportStatus {
        self.lock().status
    }

    /// Block until terminal or `deadline` passes. Returns whether terminal.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut outcome = self.lock();
        while !outcome.status.is_terminal() {
            match deadline {
                None => {
                    outcome = self.ready.wait(outcome).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    outcome = self
                        .ready
                        .wait_timeout(outcome, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }

    fn take(&self) -> Option<Result<T, ReportError>> {
        self.lock().value.take()
    }
}

/// Record a terminal outcome, once, in the outcome cell and the metrics.
pub(crate) fn finish<T>(
    completion: &Completion<T>,
    metrics: &RwLock<GeneratorMetrics>,
    request_id: Uuid,
    value: Result<T, ReportError>,
) -> bool {
    let error = value.as_ref().err().map(ToString::to_string);
    let won = completion.complete(value, |status| {
        if let Ok(mut m) = metrics.write() {
            m.record_outcome(status);
        }
    });
    match won {
        Some(status) => {
            match error {
                Some(error) => info!(request_id = %request_id, status = ?status, error = %error, "report finished"),
                None => info!(request_id = %request_id, status = ?status, "report finished"),
            }
            true
        }
        None => false,
    }
}

/// Handle to an asynchronously generated report.
///
/// Dropping the handle does not stop the request; call [`cancel`] for that.
///
/// [`cancel`]: ReportHandle::cancel
pub struct ReportHandle<T> {
    control: Arc<RequestControl>,
    completion: Arc<Completion<T>>,
    metrics: Arc<RwLock<GeneratorMetrics>>,
}

impl<T> ReportHandle<T> {
    pub(crate) fn new(
        control: Arc<RequestControl>,
        completion: Arc<Completion<T>>,
        metrics: Arc<RwLock<GeneratorMetrics>>,
    ) -> Self {
        Self {
            control,
            completion,
            metrics,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.control.id
    }

    pub fn status(&self) -> ReportStatus {
        self.completion.status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Bytes read from the recording, once loading has finished.
    pub fn bytes_consumed(&self) -> Option<u64> {
        self.control.bytes_consumed()
    }

    /// Cancel the request. Pending evaluations never start and the handle
    /// resolves to [`ReportError::Cancelled`] immediately. Returns `false`
    /// if the request had already finished.
    pub fn cancel(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.control.cancel();
        finish(
            &self.completion,
            &self.metrics,
            self.control.id,
            Err(ReportError::Cancelled),
        )
    }

    /// Block until the report is finished and return its outcome.
    pub fn wait(self) -> Result<T, ReportError> {
        self.completion.wait_until(None);
        self.completion
            .take()
            .unwrap_or(Err(ReportError::Cancelled))
    }

    /// Block for at most `timeout`. Returns whether the report finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.completion.wait_until(Some(Instant::now() + timeout))
    }

    /// Wait for at most `timeout`, cancelling the request if it is still
    /// running by then.
    pub fn wait_for(self, timeout: Duration) -> Result<T, ReportError> {
        if !self.wait_timeout(timeout) && self.cancel() {
            return Err(ReportError::TimedOut(timeout));
        }
        self.wait()
    }
}

impl<T> std::fmt::Debug for ReportHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportHandle")
            .field("request_id", &self.control.id)
            .field("status", &self.status())
            .finish()
    }
}
