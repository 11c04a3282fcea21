//! Rule model for recording analysis.
//!
//! This crate provides:
//! - The [`Rule`] trait and its [`RuleDescriptor`] metadata, including the
//!   optional dependency gate on another rule's severity
//! - [`RuleResult`] values and the [`ResultBuilder`] used to produce them
//! - [`ResultsTable`], the append-only per-request table rules consult for
//!   results computed before them
//! - [`RuleRegistry`] with dependency-cycle validation
//! - Minijinja rendering of result messages
//! - Declarative YAML threshold rules and a filesystem [`RuleLoader`]

pub mod loader;
pub mod registry;
pub mod result;
pub mod rule;
pub mod table;
pub mod templates;
pub mod threshold;

pub use loader::{LoadResult, LoadStatus, RuleError, RuleLoader};
pub use registry::{DependencyCycle, RuleRegistry};
pub use result::{ResultBuilder, RuleResult, Suggestion};
pub use rule::{Dependency, EvaluationContext, EvaluationError, Rule, RuleDescriptor};
pub use table::ResultsTable;
pub use templates::MessageRenderer;
pub use threshold::{Metric, ThresholdRule};
