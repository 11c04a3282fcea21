use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use flightcheck_core::{Preferences, RecordingLoader};
use flightcheck_rules::{DependencyCycle, Rule, RuleRegistry};

use crate::scheduler::error::ReportError;
use crate::scheduler::metrics::GeneratorMetrics;
use crate::scheduler::pool::{DispatchPool, RayonWorkerPool, WorkerPool};
use crate::scheduler::types::GeneratorConfig;

/// Rules in dependency order, or the cycle that prevents ordering them.
pub(super) type DependencyOrder = Result<Arc<Vec<Arc<dyn Rule>>>, DependencyCycle>;

/// Generates analysis reports for recordings.
///
/// One generator serves any number of concurrent requests. Each request gets
/// its own dispatch thread; all requests share one bounded worker pool.
pub struct ReportGenerator {
    pub(super) registry: Arc<RuleRegistry>,
    pub(super) order: DependencyOrder,
    pub(super) loader: Arc<dyn RecordingLoader>,
    pub(super) workers: Arc<dyn WorkerPool>,
    pub(super) dispatch: DispatchPool,
    pub(super) preferences: Arc<Preferences>,
    pub(super) metrics: Arc<RwLock<GeneratorMetrics>>,
}

impl ReportGenerator {
    /// Create a generator with its own rayon worker pool.
    pub fn new(
        config: &GeneratorConfig,
        registry: RuleRegistry,
        loader: Arc<dyn RecordingLoader>,
    ) -> Result<Self, ReportError> {
        let threads = config.resolved_worker_threads();
        let workers = RayonWorkerPool::new(threads, &config.worker_thread_prefix)?;
        Ok(Self::with_worker_pool(config, registry, loader, Arc::new(workers)))
    }

    /// Create a generator on an existing worker pool.
    pub fn with_worker_pool(
        config: &GeneratorConfig,
        registry: RuleRegistry,
        loader: Arc<dyn RecordingLoader>,
        workers: Arc<dyn WorkerPool>,
    ) -> Self {
        let order = registry.dependency_order().map(Arc::new);
        match &order {
            Ok(rules) => info!(
                rules = rules.len(),
                workers = workers.capacity(),
                "report generator ready"
            ),
            Err(cycle) => warn!(error = %cycle, "rule dependencies are cyclic, every report will fail"),
        }

        Self {
            registry: Arc::new(registry),
            order,
            loader,
            workers,
            dispatch: DispatchPool::new(config.dispatch_thread_prefix.clone()),
            preferences: Arc::new(Preferences::new()),
            metrics: Arc::new(RwLock::new(GeneratorMetrics::default())),
        }
    }

    /// Preferences passed to every rule evaluation.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Arc::new(preferences);
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Get a snapshot of the current generator metrics.
    pub fn metrics(&self) -> GeneratorMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<GeneratorMetrics>> {
        Arc::clone(&self.metrics)
    }

    pub fn worker_capacity(&self) -> usize {
        self.workers.capacity()
    }

    /// Requests whose dispatch thread is still running.
    pub fn dispatch_in_flight(&self) -> usize {
        self.dispatch.in_flight()
    }
}

impl std::fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportGenerator")
            .field("registry", &self.registry)
            .field("workers", &self.workers.capacity())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}
