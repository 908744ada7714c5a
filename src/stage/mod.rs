//! Pipeline stages.
//!
//! Each stage is a small struct holding the shared [`RouterContext`](crate::pipeline::RouterContext)
//! with a `run` loop for its worker thread and single-step entry points that tests and benchmarks
//! drive synchronously.

pub mod classifier;
pub mod dispatcher;
pub mod forwarder;
pub mod generator;
pub mod output;
pub mod stats;

pub use classifier::Classifier;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use forwarder::Forwarder;
pub use generator::{Generator, GeneratorState};
pub use output::OutputWorker;
pub use stats::StatsReporter;
