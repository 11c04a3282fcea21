use std::collections::HashMap;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, info, info_span};

use flightcheck_core::{CountingReader, Preferences, RecordingLoader};
use flightcheck_rules::{ResultsTable, Rule};

use crate::scheduler::error::ReportError;
use crate::scheduler::handle::{finish, Completion, ReportHandle};
use crate::scheduler::metrics::GeneratorMetrics;
use crate::scheduler::pool::WorkerPool;
use crate::scheduler::request::{panic_message, Execution, RequestControl};
use crate::scheduler::types::{AnalysisResult, RuleScore};

use super::aggregate::{self, Collected};
use super::core::{DependencyOrder, ReportGenerator};
use super::resolver;

/// Predicate selecting every rule.
pub fn all_rules(_rule: &dyn Rule) -> bool {
    true
}

type Predicate = Box<dyn Fn(&dyn Rule) -> bool + Send>;

impl ReportGenerator {
    /// Start a full report for `recording`. Rules rejected by `predicate` are
    /// reported as not applicable without running.
    ///
    /// Returns immediately; the recording is read on the request's dispatch
    /// thread.
    pub fn generate_report<R, P>(
        &self,
        recording: R,
        predicate: P,
    ) -> ReportHandle<HashMap<String, AnalysisResult>>
    where
        R: Read + Send + 'static,
        P: Fn(&dyn Rule) -> bool + Send + 'static,
    {
        self.spawn_request(recording, Box::new(predicate), aggregate::project_analysis)
    }

    /// Like [`generate_report`](Self::generate_report), returning only the
    /// score and severity of each rule.
    pub fn generate_scores<R, P>(
        &self,
        recording: R,
        predicate: P,
    ) -> ReportHandle<HashMap<String, RuleScore>>
    where
        R: Read + Send + 'static,
        P: Fn(&dyn Rule) -> bool + Send + 'static,
    {
        self.spawn_request(recording, Box::new(predicate), aggregate::project_scores)
    }

    fn spawn_request<R, T>(
        &self,
        recording: R,
        predicate: Predicate,
        project: fn(Collected) -> T,
    ) -> ReportHandle<T>
    where
        R: Read + Send + 'static,
        T: Send + 'static,
    {
        let control = Arc::new(RequestControl::new());
        let completion = Arc::new(Completion::new());
        if let Ok(mut m) = self.metrics.write() {
            m.reports_started += 1;
        }

        let dispatcher = Dispatcher {
            control: Arc::clone(&control),
            order: self.order.clone(),
            loader: Arc::clone(&self.loader),
            workers: Arc::clone(&self.workers),
            preferences: Arc::clone(&self.preferences),
            metrics: Arc::clone(&self.metrics),
            predicate,
        };
        let thread_control = Arc::clone(&control);
        let thread_completion = Arc::clone(&completion);
        let thread_metrics = Arc::clone(&self.metrics);
        let request_id = control.id;

        let spawned = self.dispatch.spawn(move || {
            let span = info_span!("report", request_id = %request_id);
            let _enter = span.enter();
            // Predicates, loaders and projections are caller code; a panic in
            // any of them must still resolve the handle.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                dispatcher.run(recording).map(project)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(error = %message, "report dispatch panicked");
                thread_control.cancel();
                Err(ReportError::Panicked(message))
            });
            finish(&thread_completion, &thread_metrics, request_id, outcome);
        });
        if let Err(e) = spawned {
            finish(&completion, &self.metrics, request_id, Err(e));
        }

        ReportHandle::new(control, completion, Arc::clone(&self.metrics))
    }
}

/// Everything one dispatch thread needs, detached from the generator.
struct Dispatcher {
    control: Arc<RequestControl>,
    order: DependencyOrder,
    loader: Arc<dyn RecordingLoader>,
    workers: Arc<dyn WorkerPool>,
    preferences: Arc<Preferences>,
    metrics: Arc<RwLock<GeneratorMetrics>>,
    predicate: Predicate,
}

impl Dispatcher {
    fn run<R: Read>(self, recording: R) -> Result<Collected, ReportError> {
        let order = self.order?;
        self.control.ensure_active()?;

        let mut reader = CountingReader::new(recording);
        let loaded = self.loader.load(&mut reader);
        let bytes = reader.byte_count();
        self.control.set_bytes_consumed(bytes);
        if let Ok(mut m) = self.metrics.write() {
            m.bytes_loaded += bytes;
        }
        let events = loaded?;
        info!(bytes, events = events.len(), "recording loaded");
        self.control.ensure_active()?;

        let execution = Arc::new(Execution {
            control: self.control,
            events,
            preferences: self.preferences,
            results: ResultsTable::new(),
            metrics: self.metrics,
        });

        let plan = match resolver::plan(&execution, &order, self.predicate.as_ref(), self.workers.as_ref()) {
            Ok(plan) => plan,
            Err(e) => {
                execution.control.cancel();
                return Err(e);
            }
        };
        aggregate::collect(&execution, plan)
    }
}
