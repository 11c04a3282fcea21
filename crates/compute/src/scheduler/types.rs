use serde::{Deserialize, Serialize};

use flightcheck_core::Severity;
use flightcheck_rules::Suggestion;

/// Generator configuration, typically built from [`flightcheck_core::Config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Name prefix for per-request dispatch threads.
    #[serde(default = "default_dispatch_prefix")]
    pub dispatch_thread_prefix: String,
    /// Name prefix for worker pool threads.
    #[serde(default = "default_worker_prefix")]
    pub worker_thread_prefix: String,
}

fn default_worker_threads() -> usize { 0 }
fn default_dispatch_prefix() -> String { "report-dispatch".to_string() }
fn default_worker_prefix() -> String { "rule-worker".to_string() }

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            dispatch_thread_prefix: default_dispatch_prefix(),
            worker_thread_prefix: default_worker_prefix(),
        }
    }
}

impl GeneratorConfig {
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

impl From<&flightcheck_core::Config> for GeneratorConfig {
    fn from(config: &flightcheck_core::Config) -> Self {
        Self::default().with_worker_threads(config.report.worker_threads)
    }
}

/// Rendered texts of one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub summary: String,
    pub explanation: String,
    pub solution: String,
    pub suggestions: Vec<Suggestion>,
}

/// Full per-rule entry of a report, keyed by rule id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub name: String,
    pub topic: String,
    pub score: f64,
    pub evaluation: Evaluation,
}

/// Narrow per-rule entry: just the score and its severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleScore {
    pub score: f64,
    pub severity: Severity,
}

/// Lifecycle of one report request, as seen through its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReportStatus::Running)
    }
}
