//! lintmux - run external static-analysis checkers concurrently
//!
//! Targets come from a package lister, each configured checker runs in
//! batch or per-target mode under a shared concurrency cap, and every
//! failing invocation's output lands in one report grouped by checker.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod report;

pub use config::{CheckerDefinition, Config, PoolMode};
pub use engine::{Engine, Outcome};
pub use error::{LintmuxError, Result};
pub use report::Report;
