pub mod scheduler;

pub use scheduler::{
    all_rules, AnalysisResult, DispatchPool, Evaluation, GeneratorConfig, GeneratorMetrics,
    Job, RayonWorkerPool, ReportError, ReportGenerator, ReportHandle, ReportStatus, RuleScore,
    WorkerPool,
};
