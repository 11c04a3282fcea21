mod cli;
mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightcheck_compute::{GeneratorConfig, ReportError, ReportGenerator};
use flightcheck_core::config::load_dotenv;
use flightcheck_core::{Config, JsonLinesLoader};

use crate::cli::CliArgs;
use crate::report::RuleFilter;

fn main() -> Result<()> {
    load_dotenv();
    let config = Config::from_env();

    // Initialize tracing; logs go to stderr so stdout stays pure JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    config.log_summary();

    let rules_dir = args
        .rules_dir
        .clone()
        .unwrap_or_else(|| config.rules.rules_dir.clone());
    let registry = report::load_registry(&rules_dir)?;

    let filter = RuleFilter::new(&args.only, &args.exclude);
    for id in filter.unknown_ids(&registry) {
        warn!(rule_id = %id, "rule named on the command line is not loaded");
    }

    let mut generator_config = GeneratorConfig::from(&config);
    if let Some(workers) = args.workers {
        generator_config = generator_config.with_worker_threads(workers);
    }
    let generator = ReportGenerator::new(&generator_config, registry, Arc::new(JsonLinesLoader::new()))
        .context("failed to start report generator")?
        .with_preferences(report::preferences(&args.preferences));

    let recording = report::open_recording(&args.recording)?;
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.report.timeout_secs));
    let predicate = move |rule: &dyn flightcheck_rules::Rule| filter.accepts(rule);

    let output = if args.scores {
        let handle = generator.generate_scores(recording, predicate);
        info!(request_id = %handle.request_id(), "report requested");
        let scores = handle.wait_for(timeout).map_err(explain)?;
        report::to_json(&sorted(scores), args.pretty)?
    } else {
        let handle = generator.generate_report(recording, predicate);
        info!(request_id = %handle.request_id(), "report requested");
        let results = handle.wait_for(timeout).map_err(explain)?;
        report::to_json(&sorted(results), args.pretty)?
    };
    println!("{}", output);

    if args.metrics {
        eprintln!("{}", report::to_json(&generator.metrics(), true)?);
    }
    Ok(())
}

/// Stable key order for output.
fn sorted<V>(map: std::collections::HashMap<String, V>) -> std::collections::BTreeMap<String, V> {
    map.into_iter().collect()
}

fn explain(e: ReportError) -> anyhow::Error {
    match &e {
        ReportError::DependencyCycle(_) => anyhow::Error::new(e).context("rule configuration is invalid"),
        ReportError::TimedOut(_) => anyhow::Error::new(e).context("raise --timeout or narrow the rule set with --only"),
        _ => anyhow::Error::new(e).context("report generation failed"),
    }
}
