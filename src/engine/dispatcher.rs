//! Fan-out of checker jobs.
//!
//! The [`Engine`] acquires one job slot per checker, spawns the checker's
//! strategy with that slot moved into the task, and waits for every job
//! before draining the collector into a [`Report`].

use std::sync::Arc;

use colored::*;
use futures::future::join_all;

use super::admission::Admission;
use super::collector::Collector;
use super::invoker::{Invoker, ProcessInvoker};
use super::strategy::{self, JobContext, Strategy};
use crate::config::{CheckerDefinition, Config, PoolMode};
use crate::report::Report;

/// Runs a fixed set of checkers against target lists.
pub struct Engine {
    checkers: Arc<Vec<CheckerDefinition>>,
    admission: Admission,
    invoker: Arc<dyn Invoker>,
    verbose: bool,
}

impl Engine {
    /// Create an engine from explicit parts
    ///
    /// A shared pool is replaced by split pools when the per-target
    /// checkers could park every slot.
    pub fn new(checkers: Vec<CheckerDefinition>, admission: Admission, invoker: Arc<dyn Invoker>) -> Self {
        let admission = admission_for(&checkers, admission);
        Self {
            checkers: Arc::new(checkers),
            admission,
            invoker,
            verbose: false,
        }
    }

    /// Create an engine that runs real processes as configured
    pub fn from_config(config: &Config) -> Self {
        let admission = Admission::new(config.concurrency, config.pool_mode);
        let invoker = ProcessInvoker::new().with_search_path(config.search_path.clone());
        Self::new(config.checkers.clone(), admission, Arc::new(invoker)).verbose(config.show)
    }

    /// Print each command as it starts
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn checkers(&self) -> &[CheckerDefinition] {
        &self.checkers
    }

    /// Run every checker against `targets` and return the sorted report.
    ///
    /// Returns once every checker job and every per-target sub-job has
    /// finished and the collector has been drained.
    pub async fn run(&self, targets: &[String]) -> Report {
        if targets.is_empty() || self.checkers.is_empty() {
            log::info!(
                "nothing to run: {} targets, {} checkers",
                targets.len(),
                self.checkers.len()
            );
            return Report::default();
        }

        log::info!(
            "running {} checkers on {} targets (cap {}, {} pools)",
            self.checkers.len(),
            targets.len(),
            self.admission.invocations().capacity(),
            self.admission.mode()
        );

        let collector = Collector::spawn(self.admission.invocations().capacity());
        let ctx = JobContext {
            invoker: Arc::clone(&self.invoker),
            admission: self.admission.clone(),
            sink: collector.sink(),
        };

        let mut jobs = Vec::with_capacity(self.checkers.len());
        for checker in self.checkers.iter() {
            let outer = self.admission.jobs().acquire().await;
            let kind = Strategy::for_checker(checker);
            let prepared = Arc::new(checker.prepare_targets(targets));
            let checker = Arc::new(checker.clone());
            let ctx = ctx.clone();
            let verbose = self.verbose;

            jobs.push(tokio::spawn(async move {
                let _outer = outer;
                if verbose {
                    println!(
                        "Run command: {} {} deps...({})",
                        checker.command,
                        checker.args.join(" "),
                        prepared.len()
                    );
                }
                strategy::execute(&ctx, kind, checker, prepared).await;
            }));
        }
        // The collector closes only when the last sink is gone.
        drop(ctx);

        for result in join_all(jobs).await {
            if let Err(e) = result {
                log::error!("checker job did not complete: {}", e);
            }
        }

        let records = collector.finish().await;
        log::info!("run finished with {} failure records", records.len());
        Report::new(records)
    }
}

/// Keep `admission` unless it is a shared pool that per-target checkers
/// can exhaust with parked outer slots, leaving none for their targets.
fn admission_for(checkers: &[CheckerDefinition], admission: Admission) -> Admission {
    let capacity = admission.jobs().capacity();
    let per_target = checkers.iter().filter(|c| c.one_package).count();
    if admission.mode() != PoolMode::Shared || per_target < capacity {
        return admission;
    }

    let message = format!(
        "shared pool of {} slots cannot serve {} per-target checkers, using split pools",
        capacity, per_target
    );
    log::warn!("{}", message);
    eprintln!("{} {}", "warning:".yellow().bold(), message);
    Admission::new(capacity, PoolMode::Split)
}
