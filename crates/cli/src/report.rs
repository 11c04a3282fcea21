//! Glue between command-line arguments and the report generator.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use flightcheck_core::Preferences;
use flightcheck_rules::{LoadStatus, Rule, RuleLoader, RuleRegistry};

/// Parse a `key=value` preference override.
pub fn parse_preference(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

pub fn preferences(overrides: &[(String, String)]) -> Preferences {
    overrides.iter().cloned().collect()
}

/// Rule selection from `--only` / `--exclude`.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    only: HashSet<String>,
    exclude: HashSet<String>,
}

impl RuleFilter {
    pub fn new(only: &[String], exclude: &[String]) -> Self {
        Self {
            only: only.iter().cloned().collect(),
            exclude: exclude.iter().cloned().collect(),
        }
    }

    pub fn accepts(&self, rule: &dyn Rule) -> bool {
        let id = rule.id();
        (self.only.is_empty() || self.only.contains(id)) && !self.exclude.contains(id)
    }

    /// Ids named on the command line that no registered rule has.
    pub fn unknown_ids<'a>(&'a self, registry: &'a RuleRegistry) -> Vec<&'a str> {
        let mut unknown: Vec<&str> = self
            .only
            .iter()
            .chain(self.exclude.iter())
            .filter(|id| registry.get(id).is_none())
            .map(String::as_str)
            .collect();
        unknown.sort_unstable();
        unknown
    }
}

/// Load every rule under `dir`, logging per-file outcomes.
pub fn load_registry(dir: &Path) -> Result<RuleRegistry> {
    let loader = RuleLoader::new(dir.to_path_buf());
    let results = loader
        .load_all()
        .with_context(|| format!("failed to scan rules directory '{}'", dir.display()))?;

    let mut failed = 0usize;
    for result in &results {
        if let LoadStatus::Failed { error } = &result.status {
            failed += 1;
            warn!(path = %result.path.display(), error = %error, "rule not loaded");
        }
    }
    let registry = loader.registry().context("failed to build rule registry")?;
    info!(
        rules = registry.len(),
        failed,
        dir = %dir.display(),
        "rules loaded"
    );
    if registry.is_empty() {
        bail!("no rules found in '{}'", dir.display());
    }
    Ok(registry)
}

/// Open the recording, `-` meaning stdin.
pub fn open_recording(path: &Path) -> Result<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path)
        .with_context(|| format!("failed to open recording '{}'", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("failed to serialize report")
}
