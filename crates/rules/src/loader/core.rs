//! Core [`RuleLoader`] struct: filesystem-backed rule loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use tracing::{info, warn};

use crate::registry::RuleRegistry;
use crate::templates::MessageRenderer;
use crate::threshold::{ThresholdRule, ThresholdRuleDocument, THRESHOLD_KIND};

use super::error::{LoadResult, LoadStatus, Result, RuleError};

/// Header read before the full document to dispatch on `kind`.
#[derive(Debug, Deserialize)]
struct RuleHeader {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
}

/// Filesystem-backed rule loader.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, parses them
/// into [`ThresholdRule`]s and keeps them in memory keyed by rule ID.
pub struct RuleLoader {
    /// Root directory containing rule YAML files.
    rules_dir: PathBuf,
    /// Loaded, enabled rules keyed by `metadata.id`.
    rules: RwLock<BTreeMap<String, ThresholdRule>>,
}

impl RuleLoader {
    /// Create a new loader for the given directory.
    pub fn new(rules_dir: PathBuf) -> Self {
        Self {
            rules_dir,
            rules: RwLock::new(BTreeMap::new()),
        }
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// Dotfiles (filenames starting with `.`) and non-YAML files are skipped.
    /// Parse errors are reported per-file but do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        if !self.rules_dir.is_dir() {
            return Err(RuleError::Validation(format!(
                "rules directory '{}' does not exist",
                self.rules_dir.display()
            )));
        }
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.rules_dir, &mut results)?;
        Ok(results)
    }

    /// Recursively scan a directory for YAML rule files.
    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        paths.sort();

        for path in paths {
            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);

            if !is_yaml {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let status = match self.load_file(&path) {
                Ok(rule) if !rule.metadata().enabled => {
                    info!(rule_id = %rule.metadata().id, path = %path.display(), "rule disabled, skipping");
                    LoadStatus::Skipped {
                        reason: "disabled".to_string(),
                    }
                }
                Ok(rule) => {
                    let rule_id = rule.metadata().id.clone();
                    let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
                    if rules.contains_key(&rule_id) {
                        warn!(rule_id = %rule_id, path = %path.display(), "duplicate rule id");
                        LoadStatus::Failed {
                            error: format!("duplicate rule id '{}'", rule_id),
                        }
                    } else {
                        info!(rule_id = %rule_id, path = %path.display(), "loaded rule");
                        rules.insert(rule_id.clone(), rule);
                        LoadStatus::Loaded { rule_id }
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    LoadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(LoadResult { path, status });
        }

        Ok(())
    }

    /// Parse a single YAML file into a [`ThresholdRule`].
    ///
    /// First pass reads only `apiVersion`/`kind`; the second pass
    /// deserializes the kind-specific document.
    pub fn load_file(&self, path: &Path) -> Result<ThresholdRule> {
        let contents = fs::read_to_string(path)?;

        let header: RuleHeader = serde_yaml::from_str(&contents)?;
        if header.kind != THRESHOLD_KIND {
            return Err(RuleError::Validation(format!(
                "unknown rule kind: '{}' (apiVersion {})",
                header.kind, header.api_version
            )));
        }

        let doc: ThresholdRuleDocument = serde_yaml::from_str(&contents)?;
        let renderer = MessageRenderer::new();
        for template in [&doc.spec.summary, &doc.spec.explanation, &doc.spec.solution] {
            renderer.validate(template)?;
        }
        ThresholdRule::from_document(doc)
    }

    /// Build a registry of every loaded rule, ordered by id.
    pub fn registry(&self) -> Result<RuleRegistry> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let mut registry = RuleRegistry::new();
        for rule in rules.values() {
            registry.register(Arc::new(rule.clone()))?;
        }
        Ok(registry)
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the rules directory path.
    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }
}
