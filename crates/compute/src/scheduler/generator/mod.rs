//! Report generator: accepts requests and coordinates their evaluation.
//!
//! Split into focused submodules:
//! - `core`: ReportGenerator struct, constructors and accessors
//! - `dispatch`: request entry points and the per-request dispatch flow
//! - `resolver`: applicability checks, dependency gating and submission
//! - `aggregate`: collecting finished slots and projecting results

mod aggregate;
mod core;
mod dispatch;
mod resolver;
#[cfg(test)]
mod tests;

pub use self::core::ReportGenerator;
pub use self::dispatch::all_rules;
