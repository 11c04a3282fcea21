use std::sync::Arc;
use std::time::Duration;

use flightcheck_core::LoadError;
use flightcheck_rules::{DependencyCycle, EvaluationError};

/// Error type for report generation.
///
/// Cloneable so the outcome can be observed by both the handle and metrics.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReportError {
    #[error("failed to load recording: {0}")]
    RecordingLoad(#[source] Arc<LoadError>),
    #[error("rule '{rule_id}' failed: {source}")]
    Evaluation {
        rule_id: String,
        #[source]
        source: EvaluationError,
    },
    #[error("report generation cancelled")]
    Cancelled,
    #[error(transparent)]
    DependencyCycle(#[from] DependencyCycle),
    #[error("report not finished after {0:?}")]
    TimedOut(Duration),
    #[error("report dispatch panicked: {0}")]
    Panicked(String),
    #[error("failed to start dispatch thread: {0}")]
    Dispatch(String),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl From<LoadError> for ReportError {
    fn from(e: LoadError) -> Self {
        ReportError::RecordingLoad(Arc::new(e))
    }
}
