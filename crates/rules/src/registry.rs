//! [`RuleRegistry`]: the set of known rules and their dependency graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::info;

use crate::loader::RuleError;
use crate::rule::Rule;

/// A cycle in the declared rule dependencies. Members are listed in
/// dependency order starting from the lexicographically smallest id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle among rules: {}", rules.join(" -> "))]
pub struct DependencyCycle {
    pub rules: Vec<String>,
}

/// Ordered collection of rules, looked up by id.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
    index: HashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Ids must be unique.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> Result<(), RuleError> {
        let id = rule.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RuleError::Validation(format!("duplicate rule id '{}'", id)));
        }
        info!(rule_id = %id, dependency = ?rule.descriptor().dependency.as_ref().map(|d| &d.target_rule_id), "registered rule");
        self.index.insert(id, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules ordered so every dependency precedes its dependents (Kahn's
    /// algorithm, registration order among peers). Dependencies on unknown
    /// rule ids impose no ordering.
    pub fn dependency_order(&self) -> Result<Vec<Arc<dyn Rule>>, DependencyCycle> {
        let n = self.rules.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, rule) in self.rules.iter().enumerate() {
            if let Some(dep) = &rule.descriptor().dependency {
                if let Some(&target) = self.index.get(&dep.target_rule_id) {
                    dependents[target].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(n);
        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            for &next in &dependents[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if sorted.len() != n {
            let stuck: HashSet<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
            return Err(self.extract_cycle(&stuck));
        }

        Ok(sorted.into_iter().map(|i| Arc::clone(&self.rules[i])).collect())
    }

    /// Detect circular dependencies without ordering.
    pub fn validate_dependencies(&self) -> Result<(), DependencyCycle> {
        self.dependency_order().map(|_| ())
    }

    /// Every stuck node has exactly one in-registry dependency, so following
    /// dependency edges from any of them must revisit a node: that loop is the cycle.
    fn extract_cycle(&self, stuck: &HashSet<usize>) -> DependencyCycle {
        let Some(&start) = stuck.iter().min() else {
            return DependencyCycle { rules: Vec::new() };
        };
        let mut path: Vec<usize> = Vec::new();
        let mut seen: HashMap<usize, usize> = HashMap::new();
        let mut current = start;
        while !seen.contains_key(&current) {
            seen.insert(current, path.len());
            path.push(current);
            let next = self.rules[current]
                .descriptor()
                .dependency
                .as_ref()
                .and_then(|d| self.index.get(&d.target_rule_id).copied());
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        let mut cycle: Vec<String> = match seen.get(&current) {
            Some(&pos) => path[pos..]
                .iter()
                .map(|&i| self.rules[i].id().to_string())
                .collect(),
            None => Vec::new(),
        };
        if let Some(min_pos) = cycle
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
        {
            cycle.rotate_left(min_pos);
        }
        DependencyCycle { rules: cycle }
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use flightcheck_core::Severity;

    use super::*;
    use crate::result::{ResultBuilder, RuleResult};
    use crate::rule::{EvaluationContext, EvaluationError, RuleDescriptor};

    struct StubRule(RuleDescriptor);

    impl Rule for StubRule {
        fn descriptor(&self) -> &RuleDescriptor {
            &self.0
        }

        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> Result<RuleResult, EvaluationError> {
            Ok(ResultBuilder::for_rule(&self.0).severity(Severity::Ok).build())
        }
    }

    fn stub(id: &str, dep: Option<&str>) -> Arc<dyn Rule> {
        let mut d = RuleDescriptor::new(id, id, "test");
        if let Some(dep) = dep {
            d = d.depends_on(dep, Severity::Warning);
        }
        Arc::new(StubRule(d))
    }

    fn registry(rules: Vec<Arc<dyn Rule>>) -> RuleRegistry {
        let mut reg = RuleRegistry::new();
        for r in rules {
            reg.register(r).unwrap();
        }
        reg
    }

    fn ids(rules: &[Arc<dyn Rule>]) -> Vec<&str> {
        rules.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut reg = RuleRegistry::new();
        reg.register(stub("a", None)).unwrap();
        assert!(matches!(reg.register(stub("a", None)), Err(RuleError::Validation(_))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn chain_orders_dependencies_first() {
        let reg = registry(vec![stub("c", Some("b")), stub("b", Some("a")), stub("a", None)]);
        let order = reg.dependency_order().unwrap();
        assert_eq!(ids(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_target_imposes_no_order() {
        let reg = registry(vec![stub("x", Some("ghost")), stub("y", None)]);
        let order = reg.dependency_order().unwrap();
        assert_eq!(ids(&order), vec!["x", "y"]);
    }

    #[test]
    fn three_rule_cycle_detected() {
        let reg = registry(vec![
            stub("b", Some("c")),
            stub("a", Some("b")),
            stub("c", Some("a")),
            stub("free", None),
        ]);
        let err = reg.validate_dependencies().unwrap_err();
        assert_eq!(err.rules, vec!["a", "b", "c"]);
        assert_eq!(err.to_string(), "dependency cycle among rules: a -> b -> c");
    }

    #[test]
    fn rule_behind_cycle_is_not_reported_as_member() {
        let reg = registry(vec![
            stub("tail", Some("p")),
            stub("p", Some("q")),
            stub("q", Some("p")),
        ]);
        let err = reg.validate_dependencies().unwrap_err();
        assert_eq!(err.rules, vec!["p", "q"]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let reg = registry(vec![stub("loop", Some("loop"))]);
        assert_eq!(reg.validate_dependencies().unwrap_err().rules, vec!["loop"]);
    }
}
