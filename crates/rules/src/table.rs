//! Append-only, concurrency-safe table of results computed within one request.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::result::RuleResult;

/// Results keyed by rule id. Each rule is written at most once; the first
/// write wins and later writes for the same id are rejected, never merged.
///
/// One table belongs to exactly one report request, so concurrent requests
/// never observe each other's results.
#[derive(Debug, Default)]
pub struct ResultsTable {
    entries: RwLock<HashMap<String, Arc<RuleResult>>>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns `false` if the rule already has one.
    pub fn insert(&self, result: Arc<RuleResult>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&result.rule_id) {
            return false;
        }
        entries.insert(result.rule_id.clone(), result);
        true
    }

    pub fn get(&self, rule_id: &str) -> Option<Arc<RuleResult>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(rule_id)
            .cloned()
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(rule_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use flightcheck_core::Severity;

    use super::*;
    use crate::result::ResultBuilder;
    use crate::rule::RuleDescriptor;

    fn result(id: &str, severity: Severity) -> Arc<RuleResult> {
        Arc::new(
            ResultBuilder::for_rule(&RuleDescriptor::new(id, id, "t"))
                .severity(severity)
                .build(),
        )
    }

    #[test]
    fn first_write_wins() {
        let table = ResultsTable::new();
        assert!(table.insert(result("a", Severity::Ok)));
        assert!(!table.insert(result("a", Severity::Critical)));
        assert_eq!(table.get("a").unwrap().severity, Severity::Ok);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn concurrent_inserts_lose_nothing() {
        let table = Arc::new(ResultsTable::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..50 {
                        table.insert(result(&format!("rule-{t}-{i}"), Severity::Info));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 400);
        assert!(table.contains("rule-7-49"));
    }
}
