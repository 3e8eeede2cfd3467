//! CLI module for lintmux - command-line interface and subcommands.

pub mod commands;

pub use commands::{Cli, Commands};
