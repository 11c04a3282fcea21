use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub report: ReportConfig,
    pub rules: RulesConfig,
    pub log: LogConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLIGHTCHECK_PROFILE`. When set (e.g. `CI`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FLIGHTCHECK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            report: ReportConfig::from_env_profiled(p),
            rules: RulesConfig::from_env_profiled(p),
            log: LogConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  report:  worker_threads={}, timeout={}s",
            self.report.worker_threads,
            self.report.timeout_secs
        );
        tracing::info!("  rules:   dir={}", self.rules.rules_dir.display());
        tracing::info!("  log:     filter={}", self.log.filter);
    }
}

// ── Report generation ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Worker tier size. 0 = available parallelism.
    pub worker_threads: usize,
    /// How long a caller waits for a report before giving up on it.
    pub timeout_secs: u64,
}

impl ReportConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            worker_threads: profiled_env_usize(p, "FLIGHTCHECK_WORKER_THREADS", 0),
            timeout_secs: profiled_env_u64(p, "FLIGHTCHECK_REPORT_TIMEOUT_SECS", 300),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub rules_dir: PathBuf,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "FLIGHTCHECK_RULES_DIR", "rules")),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl LogConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            filter: profiled_env_or(p, "FLIGHTCHECK_LOG", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = Config::for_profile("defaultstest");
        assert_eq!(config.profile, "DEFAULTSTEST");
        assert_eq!(config.report.timeout_secs, 300);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn profiled_key_wins_over_plain_key() {
        env::set_var("CFGTEST_FLIGHTCHECK_REPORT_TIMEOUT_SECS", "42");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.report.timeout_secs, 42);
        assert_eq!(config.profile_label(), "CFGTEST");
        env::remove_var("CFGTEST_FLIGHTCHECK_REPORT_TIMEOUT_SECS");
    }

    #[test]
    fn unparsable_number_falls_back_to_default() {
        env::set_var("BADNUM_FLIGHTCHECK_WORKER_THREADS", "lots");
        let config = Config::for_profile("badnum");
        assert_eq!(config.report.worker_threads, 0);
        env::remove_var("BADNUM_FLIGHTCHECK_WORKER_THREADS");
    }

    #[test]
    fn empty_profile_label_is_default() {
        let config = Config::for_profile("");
        assert_eq!(config.profile_label(), "default");
    }
}
