use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::ReportStatus;

/// Report generator operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratorMetrics {
    pub reports_started: u64,
    pub reports_succeeded: u64,
    pub reports_failed: u64,
    pub reports_cancelled: u64,
    /// Evaluations that actually ran, across all rules.
    pub rules_evaluated: u64,
    /// Rules answered with a not-applicable placeholder without running.
    pub rules_short_circuited: u64,
    /// Dependency lookups that failed and degraded the dependent to not-applicable.
    pub dependency_warnings: u64,
    /// Recording bytes consumed, summed over requests.
    pub bytes_loaded: u64,
    /// Evaluation count by rule id.
    pub evaluations: HashMap<String, u64>,
    /// Average evaluation duration by rule id.
    pub avg_evaluation_duration: HashMap<String, Duration>,
    /// When the most recent request reached a terminal state.
    pub last_report: Option<DateTime<Utc>>,
}

impl GeneratorMetrics {
    /// Record one rule evaluation.
    pub fn record_evaluation(&mut self, rule_id: &str, duration: Duration) {
        self.rules_evaluated += 1;
        *self.evaluations.entry(rule_id.to_string()).or_default() += 1;

        let count = self.evaluations[rule_id];
        let prev_avg = self
            .avg_evaluation_duration
            .get(rule_id)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_evaluation_duration.insert(rule_id.to_string(), new_avg);
    }

    /// Record a request reaching a terminal state.
    pub fn record_outcome(&mut self, status: ReportStatus) {
        match status {
            ReportStatus::Running => return,
            ReportStatus::Succeeded => self.reports_succeeded += 1,
            ReportStatus::Failed => self.reports_failed += 1,
            ReportStatus::Cancelled => self.reports_cancelled += 1,
        }
        self.last_report = Some(Utc::now());
    }

    /// Requests started but not yet finished.
    pub fn reports_in_flight(&self) -> u64 {
        self.reports_started
            .saturating_sub(self.reports_succeeded + self.reports_failed + self.reports_cancelled)
    }
}
