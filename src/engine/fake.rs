//! Scripted invoker for exercising the engine without real processes.
//!
//! Records every call, tracks how many invocations are in flight at once,
//! and can hold invocations until the test releases them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::invoker::{Invoker, Outcome};

type Responder = dyn Fn(&str, &[String]) -> Outcome + Send + Sync;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

/// Invoker whose outcomes come from a closure.
pub struct ScriptedInvoker {
    respond: Box<Responder>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedInvoker {
    /// Create an invoker answering with `respond`
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &[String]) -> Outcome + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            gate: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every invocation is clean
    pub fn clean() -> Self {
        Self::new(|_, _| Outcome::Clean)
    }

    /// Keep each invocation running for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every invocation until [`release`](Self::release) lets it go
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` blocked (or future) invocations finish
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Invocations currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of invocations running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// All calls so far, in start order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, command: &str, args: &[String]) -> Outcome {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Invocation {
                command: command.to_string(),
                args: args.to_vec(),
            });
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = (self.respond)(command, args);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
