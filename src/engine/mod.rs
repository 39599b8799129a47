//! Engine module: drives strategies through query workloads.
//!
//! # Architecture
//!
//! - **Driver** (`driver`): the state machine that prepares a strategy,
//!   replays queries in order, verifies every row and reports through a
//!   `Sinks` pair.
//! - **Outcome** (`outcome`): what a run produced, convertible into a
//!   persisted `BenchRecord`.
//! - **Baseline** (`baseline`): a fixed workload through the same driver,
//!   with an internal direct lookup instead of a trace-selected strategy.
//!
//! # Boundaries
//!
//! - The engine knows nothing about files or the CLI; callers hand it text
//!   or a parsed `Trace` and a pair of sinks.
//! - Strategies know nothing about traces; they only see a `StaticDb` and keys.

pub mod baseline;
pub mod cancel;
pub mod driver;
pub mod outcome;

pub use baseline::{BASELINE_DATASET, BASELINE_QUERIES, baseline_outcome, run_baseline};
pub use cancel::CancellationToken;
pub use driver::{BenchmarkDriver, DriverOptions, run_benchmark};
pub use outcome::{BenchmarkOutcome, DriverState, FailureKind, RunStatus};
