//! Filesystem rule loader.
//!
//! Scans the rules directory for YAML threshold rule documents and builds a
//! [`RuleRegistry`](crate::RuleRegistry) from them. A broken file is reported
//! per-file and never aborts the scan.

mod core;
mod error;

#[cfg(test)]
mod tests;

pub use self::core::RuleLoader;
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
