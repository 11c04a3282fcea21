use std::path::PathBuf;

use clap::Parser;

use crate::report::parse_preference;

/// Analyze a recorded event stream with a directory of rules.
///
/// Reads a newline-delimited JSON recording, evaluates every applicable rule
/// and prints the report as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "flightcheck", about = "Rule-based analysis of recorded events")]
pub struct CliArgs {
    /// Recording file, or `-` for stdin
    pub recording: PathBuf,

    /// Directory containing rule YAML files
    #[arg(long, env = "FLIGHTCHECK_RULES_DIR")]
    pub rules_dir: Option<PathBuf>,

    /// Worker threads (0 = available parallelism)
    #[arg(long, env = "FLIGHTCHECK_WORKER_THREADS")]
    pub workers: Option<usize>,

    /// Only evaluate these rule ids (repeatable)
    #[arg(long = "only", value_name = "RULE_ID")]
    pub only: Vec<String>,

    /// Never evaluate these rule ids (repeatable)
    #[arg(long = "exclude", value_name = "RULE_ID")]
    pub exclude: Vec<String>,

    /// Preference override `key=value` passed to every rule (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_preference)]
    pub preferences: Vec<(String, String)>,

    /// Print only score and severity per rule
    #[arg(long)]
    pub scores: bool,

    /// Give up and cancel after this many seconds
    #[arg(long, env = "FLIGHTCHECK_REPORT_TIMEOUT_SECS")]
    pub timeout: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Print generator metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,
}
