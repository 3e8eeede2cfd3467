//! Bounded-concurrency checker execution.
//!
//! - **admission**: slot pools limiting simultaneous jobs and invocations
//! - **invoker**: runs one checker process and classifies its [`Outcome`]
//! - **strategy**: batch and per-target execution of a checker
//! - **dispatcher**: the [`Engine`], one job per configured checker
//! - **collector**: single consumer aggregating [`FailureRecord`]s
//! - **fake**: scripted invoker for tests

pub mod admission;
pub mod collector;
pub mod dispatcher;
pub mod fake;
pub mod invoker;
pub mod strategy;

pub use admission::{Admission, AdmissionController, Slot};
pub use collector::{Collector, FailureRecord, FailureSink};
pub use dispatcher::Engine;
pub use fake::{Invocation, ScriptedInvoker};
pub use invoker::{Invoker, Outcome, ProcessInvoker};
pub use strategy::Strategy;
