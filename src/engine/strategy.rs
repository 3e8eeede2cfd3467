//! Batch and per-target execution of one checker.

use std::sync::Arc;

use colored::*;
use futures::future::join_all;

use super::admission::Admission;
use super::collector::{FailureRecord, FailureSink};
use super::invoker::{Invoker, Outcome};
use crate::config::CheckerDefinition;

/// How a checker receives its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One invocation with every target
    Batch,
    /// One invocation per target
    PerTarget,
}

impl Strategy {
    pub fn for_checker(checker: &CheckerDefinition) -> Self {
        if checker.one_package {
            Strategy::PerTarget
        } else {
            Strategy::Batch
        }
    }
}

/// Everything a running job needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub(crate) struct JobContext {
    pub invoker: Arc<dyn Invoker>,
    pub admission: Admission,
    pub sink: FailureSink,
}

impl JobContext {
    /// Run one invocation and route its outcome.
    async fn invoke(&self, command: &str, args: &[String]) {
        match self.invoker.invoke(command, args).await {
            Outcome::Clean => log::debug!("{} reported no issues", command),
            Outcome::IssuesFound(output) => {
                log::debug!("{} reported issues ({} bytes)", command, output.len());
                self.sink.send(FailureRecord::new(command, output)).await;
            }
            Outcome::InfraError(reason) => report_infra_error(command, &reason),
        }
    }
}

/// Tell the operator a checker could not run. Never reaches the report.
fn report_infra_error(command: &str, reason: &str) {
    log::error!("could not run {}: {}", command, reason);
    eprintln!("{}", format_infra_error(command, reason));
}

/// Terminal line naming a checker that could not run.
pub(crate) fn format_infra_error(command: &str, reason: &str) -> String {
    format!("{} Run command {} Error: {}", "error:".red().bold(), command, reason)
}

/// Run `checker` under `strategy` until all of its invocations finish.
pub(crate) async fn execute(
    ctx: &JobContext,
    strategy: Strategy,
    checker: Arc<CheckerDefinition>,
    targets: Arc<Vec<String>>,
) {
    match strategy {
        Strategy::Batch => run_batch(ctx, &checker, &targets).await,
        Strategy::PerTarget => run_per_target(ctx, checker, targets).await,
    }
}

async fn run_batch(ctx: &JobContext, checker: &CheckerDefinition, targets: &[String]) {
    let _slot = ctx.admission.batch_slot().await;
    let args = checker.argv(targets);
    ctx.invoke(&checker.command, &args).await;
}

async fn run_per_target(ctx: &JobContext, checker: Arc<CheckerDefinition>, targets: Arc<Vec<String>>) {
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets.iter() {
        let slot = ctx.admission.invocations().acquire().await;
        let ctx = ctx.clone();
        let checker = Arc::clone(&checker);
        let target = target.clone();
        handles.push(tokio::spawn(async move {
            let _slot = slot;
            let args = checker.argv(std::slice::from_ref(&target));
            ctx.invoke(&checker.command, &args).await;
        }));
    }

    for result in join_all(handles).await {
        if let Err(e) = result {
            log::error!("{} sub-job did not complete: {}", checker.command, e);
        }
    }
}
