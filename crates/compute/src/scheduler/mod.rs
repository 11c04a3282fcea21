//! Concurrent, dependency-aware rule evaluation.
//!
//! A [`ReportGenerator`] accepts report requests and returns a
//! [`ReportHandle`] immediately. Each request runs on its own dispatch
//! thread, which loads the recording, short-circuits inapplicable rules,
//! submits the rest to a shared [`WorkerPool`] and gates dependent rules on
//! the severity of the rule they depend on.

pub mod error;
pub mod generator;
pub mod handle;
pub mod metrics;
pub mod pool;
pub(crate) mod request;
pub(crate) mod task;
pub mod types;

pub use error::ReportError;
pub use generator::{all_rules, ReportGenerator};
pub use handle::ReportHandle;
pub use metrics::GeneratorMetrics;
pub use pool::{DispatchPool, Job, RayonWorkerPool, WorkerPool};
pub use types::{AnalysisResult, Evaluation, GeneratorConfig, ReportStatus, RuleScore};
