//! Run configuration for lintmux.
//!
//! Loaded once per run from YAML with a fallback chain, then adjusted by
//! CLI overrides and normalized. The resulting value is immutable and is
//! passed explicitly into discovery and the engine.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LintmuxError, Result};

/// Concurrency cap used when the configured value is 1 or less.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// File name searched for in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "lintmux.yml";

/// Environment variable used as the target prefix when a `full_path`
/// checker has no explicit prefix.
pub const PREFIX_ENV_VAR: &str = "GOPATH";

/// How admission slots are arranged between checker jobs and invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Independent pools for checker jobs and for subprocess invocations.
    #[default]
    Split,
    /// One pool shared by checker jobs and their per-target invocations.
    Shared,
}

impl std::str::FromStr for PoolMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "split" => Ok(PoolMode::Split),
            "shared" => Ok(PoolMode::Shared),
            other => Err(format!("unknown pool mode '{}' (expected split or shared)", other)),
        }
    }
}

impl std::fmt::Display for PoolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolMode::Split => write!(f, "split"),
            PoolMode::Shared => write!(f, "shared"),
        }
    }
}

/// One external checker and how it should be invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckerDefinition {
    /// Executable name or path.
    pub command: String,
    /// Fixed arguments placed before the targets.
    pub args: Vec<String>,
    /// Join each target onto `prefix` before invoking.
    #[serde(alias = "fullPath")]
    pub full_path: bool,
    /// Prefix for `full_path`; falls back to `$GOPATH` when empty.
    pub prefix: String,
    /// Invoke once per target instead of once with every target.
    #[serde(alias = "onePackage")]
    pub one_package: bool,
}

impl CheckerDefinition {
    /// Create a batch checker with no fixed arguments
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the fixed arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Select the per-target strategy
    pub fn per_target(mut self) -> Self {
        self.one_package = true;
        self
    }

    /// Join targets onto `prefix` before invoking
    pub fn full_path(mut self, prefix: impl Into<String>) -> Self {
        self.full_path = true;
        self.prefix = prefix.into();
        self
    }

    /// Prefix to join targets onto, if any.
    fn resolved_prefix(&self) -> Option<String> {
        if !self.full_path {
            return None;
        }
        if !self.prefix.is_empty() {
            return Some(self.prefix.clone());
        }
        std::env::var(PREFIX_ENV_VAR).ok().filter(|p| !p.is_empty())
    }

    /// Targets as this checker should receive them.
    pub fn prepare_targets(&self, targets: &[String]) -> Vec<String> {
        match self.resolved_prefix() {
            Some(prefix) => targets
                .iter()
                .map(|t| join_slash_path(&prefix, t))
                .collect(),
            None => targets.to_vec(),
        }
    }

    /// Full argument vector: fixed args followed by `targets`.
    pub fn argv(&self, targets: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + targets.len());
        argv.extend(self.args.iter().cloned());
        argv.extend(targets.iter().cloned());
        argv
    }
}

/// Join `prefix` and `target` with `/` and lexically clean the result.
///
/// An absolute target is still placed under the prefix, and `.` and `..`
/// segments are resolved without touching the filesystem.
fn join_slash_path(prefix: &str, target: &str) -> String {
    let joined = match (prefix.is_empty(), target.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => target.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, target),
    };

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub package: Option<String>,
    pub concurrency: Option<usize>,
    pub pool_mode: Option<PoolMode>,
    pub verbose: bool,
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package handed to the lister; empty means the current package.
    pub package: String,
    /// Regex selecting targets; replaces the vendor exclusion when set.
    #[serde(alias = "filter_regexp")]
    pub filter: Option<String>,
    /// Print targets and commands as they run.
    pub show: bool,
    /// Maximum number of simultaneous checker invocations.
    #[serde(alias = "goroutines")]
    pub concurrency: usize,
    /// Slot pool arrangement.
    pub pool_mode: PoolMode,
    /// Command used to list targets; the package is appended.
    pub lister: Vec<String>,
    /// Directories searched for checker executables before PATH.
    pub search_path: Vec<PathBuf>,
    /// Checkers to run.
    pub checkers: Vec<CheckerDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package: String::new(),
            filter: None,
            show: false,
            concurrency: DEFAULT_CONCURRENCY,
            pool_mode: PoolMode::default(),
            lister: vec!["go".to_string(), "list".to_string(), "-json".to_string()],
            search_path: Vec::new(),
            checkers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. ./lintmux.yml
    /// 3. <config dir>/lintmux/lintmux.yml
    /// 4. Defaults
    ///
    /// A file that exists but does not parse is always an error.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(LintmuxError::Config(format!(
                    "couldn't open config file: {}",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }

        let project_config = PathBuf::from(CONFIG_FILE_NAME);
        if project_config.exists() {
            return Self::load_from_file(&project_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME);
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default().normalized())
    }

    /// Parse a YAML config file and normalize it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LintmuxError::Config(format!("couldn't read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content).map_err(|e| {
            LintmuxError::Config(format!(
                "config file {} must be valid YAML: {}",
                path.display(),
                e
            ))
        })?;
        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parse YAML text and normalize it
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        if content.trim().is_empty() {
            return Ok(Self::default().normalized());
        }
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Apply CLI overrides, then normalize again
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(package) = overrides.package.filter(|p| !p.is_empty()) {
            self.package = package;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(mode) = overrides.pool_mode {
            self.pool_mode = mode;
        }
        if overrides.verbose {
            self.show = true;
        }
        self.normalized()
    }

    /// Caps of 1 or less fall back to the default.
    pub fn normalized(mut self) -> Self {
        if self.concurrency <= 1 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        self
    }
}
