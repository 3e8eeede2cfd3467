//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: discover targets and run every checker (default)
//! - targets: discover and print targets only
//! - checkers: print the configured checkers

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Overrides, PoolMode};

/// lintmux - run static-analysis checkers concurrently and report failures
#[derive(Parser, Debug)]
#[command(name = "lintmux")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Package to check (overrides the config file)
    #[arg(short, long, global = true)]
    pub package: Option<String>,

    /// Maximum simultaneous checker invocations
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    /// Slot pool arrangement: split or shared
    #[arg(long, global = true)]
    pub pool_mode: Option<PoolMode>,

    /// Print targets and commands as they run
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Config values given on the command line
    pub fn overrides(&self) -> Overrides {
        Overrides {
            package: self.package.clone(),
            concurrency: self.concurrency,
            pool_mode: self.pool_mode,
            verbose: self.verbose,
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Discover targets and run every configured checker
    Run,

    /// Discover and print targets without running checkers
    Targets,

    /// Print the configured checkers
    Checkers,
}
