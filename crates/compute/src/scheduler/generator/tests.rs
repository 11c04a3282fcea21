use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flightcheck_core::{JsonLinesLoader, Severity};
use flightcheck_rules::{
    EvaluationContext, EvaluationError, ResultBuilder, Rule, RuleDescriptor, RuleRegistry,
    RuleResult,
};

use crate::scheduler::error::ReportError;
use crate::scheduler::generator::{all_rules, ReportGenerator};
use crate::scheduler::pool::{Job, WorkerPool};
use crate::scheduler::types::GeneratorConfig;

const RECORDING: &[u8] = b"{\"type\": \"jdk.CPULoad\", \"fields\": {\"machine\": 0.5}}\n";

/// Worker pool running every job on the submitting thread.
#[derive(Default)]
struct InlinePool {
    submitted: AtomicUsize,
}

impl WorkerPool for InlinePool {
    fn submit(&self, job: Job) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        job();
    }

    fn capacity(&self) -> usize {
        1
    }
}

struct FixedRule {
    descriptor: RuleDescriptor,
    severity: Severity,
}

impl FixedRule {
    fn new(id: &str, severity: Severity) -> Self {
        Self {
            descriptor: RuleDescriptor::new(id, id, "test"),
            severity,
        }
    }
}

impl Rule for FixedRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError> {
        Ok(ResultBuilder::for_rule(&self.descriptor).severity(self.severity).build())
    }
}

/// Copies the severity of the rule it depends on.
struct EchoRule(RuleDescriptor);

impl Rule for EchoRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.0
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError> {
        let target = self.0.dependency.as_ref().map(|d| d.target_rule_id.as_str()).unwrap_or("");
        let upstream = ctx
            .result_of(target)
            .ok_or_else(|| EvaluationError::Failed(format!("no result for {target}")))?;
        Ok(ResultBuilder::for_rule(&self.0)
            .severity(upstream.severity)
            .value("upstream", target)
            .build())
    }
}

struct PanicRule(RuleDescriptor);

impl Rule for PanicRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.0
    }

    fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError> {
        panic!("rule bug");
    }
}

fn registry(rules: Vec<Arc<dyn Rule>>) -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for rule in rules {
        registry.register(rule).unwrap();
    }
    registry
}

fn inline_generator(rules: Vec<Arc<dyn Rule>>) -> (ReportGenerator, Arc<InlinePool>) {
    let pool = Arc::new(InlinePool::default());
    let gen = ReportGenerator::with_worker_pool(
        &GeneratorConfig::default(),
        registry(rules),
        Arc::new(JsonLinesLoader::new()),
        Arc::clone(&pool) as Arc<dyn WorkerPool>,
    );
    (gen, pool)
}

#[test]
fn generator_creation() {
    let gen = ReportGenerator::new(
        &GeneratorConfig::default().with_worker_threads(3),
        RuleRegistry::new(),
        Arc::new(JsonLinesLoader::new()),
    )
    .unwrap();
    assert_eq!(gen.worker_capacity(), 3);
    assert_eq!(gen.metrics().reports_started, 0);
    assert!(gen.registry().is_empty());
}

#[test]
fn empty_registry_yields_empty_report() {
    let (gen, pool) = inline_generator(Vec::new());
    let report = gen.generate_report(RECORDING, all_rules).wait().unwrap();
    assert!(report.is_empty());
    assert_eq!(pool.submitted.load(Ordering::SeqCst), 0);
}

#[test]
fn custom_worker_pool_receives_every_applicable_rule() {
    let (gen, pool) = inline_generator(vec![
        Arc::new(FixedRule::new("a", Severity::Ok)),
        Arc::new(FixedRule::new("b", Severity::Info)),
        Arc::new(FixedRule::new("skip", Severity::Critical)),
    ]);
    let scores = gen
        .generate_scores(RECORDING, |rule: &dyn Rule| rule.id() != "skip")
        .wait()
        .unwrap();

    assert_eq!(scores.len(), 3);
    assert_eq!(pool.submitted.load(Ordering::SeqCst), 2);
    let metrics = gen.metrics();
    assert_eq!(metrics.rules_evaluated, 2);
    assert_eq!(metrics.rules_short_circuited, 1);
    assert_eq!(metrics.evaluations["a"], 1);
}

#[test]
fn dependent_reads_dependency_result() {
    let echo = RuleDescriptor::new("echo", "Echo", "test").depends_on("source", Severity::Warning);
    let gen = ReportGenerator::new(
        &GeneratorConfig::default().with_worker_threads(2),
        registry(vec![
            Arc::new(EchoRule(echo)),
            Arc::new(FixedRule::new("source", Severity::Critical)),
        ]),
        Arc::new(JsonLinesLoader::new()),
    )
    .unwrap();

    let report = gen.generate_scores(RECORDING, all_rules).wait().unwrap();
    assert_eq!(report["echo"].severity, Severity::Critical);
    assert_eq!(report["echo"].score, 75.0);
}

#[test]
fn panicking_rule_fails_report_without_hanging() {
    let gen = ReportGenerator::new(
        &GeneratorConfig::default().with_worker_threads(1),
        registry(vec![Arc::new(PanicRule(RuleDescriptor::new("bug", "Bug", "test")))]),
        Arc::new(JsonLinesLoader::new()),
    )
    .unwrap();

    match gen.generate_report(RECORDING, all_rules).wait_for(Duration::from_secs(10)) {
        Err(ReportError::Evaluation { rule_id, source }) => {
            assert_eq!(rule_id, "bug");
            assert!(matches!(source, EvaluationError::Panicked(ref m) if m == "rule bug"));
        }
        other => panic!("unexpected outcome {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn dispatch_threads_exit_after_report() {
    let (gen, _pool) = inline_generator(vec![Arc::new(FixedRule::new("a", Severity::Ok))]);
    gen.generate_report(RECORDING, all_rules).wait().unwrap();
    for _ in 0..500 {
        if gen.dispatch_in_flight() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(gen.dispatch_in_flight(), 0);
    let metrics = gen.metrics();
    assert_eq!(metrics.reports_succeeded, 1);
    assert_eq!(metrics.reports_in_flight(), 0);
    assert!(metrics.last_report.is_some());
}

#[test]
fn empty_recording_is_a_load_error() {
    let (gen, pool) = inline_generator(vec![Arc::new(FixedRule::new("a", Severity::Ok))]);
    let handle = gen.generate_report(&b""[..], all_rules);
    assert!(matches!(handle.wait(), Err(ReportError::RecordingLoad(_))));
    assert_eq!(pool.submitted.load(Ordering::SeqCst), 0);
    assert_eq!(gen.metrics().reports_failed, 1);
}
