//! The benchmark loop.
//!
//! `Idle -> Preparing -> Running -> Reporting -> Done`, with `Preparing` and
//! `Running` falling through to `Failed` on a fatal error. Per-query
//! failures never stop the loop; they are counted and reported on the
//! diagnostic channel, rate-limited so a broken strategy cannot flood it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{DatasetShape, RunConfig};
use crate::pir::{StaticDb, Strategy, StrategyKind, new_strategy};
use crate::sink::{Sink, Sinks};
use crate::trace::{Query, Trace};

use super::cancel::CancellationToken;
use super::outcome::{BenchmarkOutcome, DriverState, FailureKind, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Emit a progress line every this many queries (0 = only at completion)
    pub progress_every: usize,
    /// Per-query diagnostic lines before the rest are suppressed
    pub max_diagnostic_errors: usize,
    /// Seed for strategy-side randomness
    pub seed: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        let config = RunConfig::default();
        DriverOptions {
            progress_every: config.progress_every,
            max_diagnostic_errors: config.max_diagnostic_errors,
            seed: config.seed,
        }
    }
}

impl DriverOptions {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            progress_every: self.progress_every,
            max_diagnostic_errors: self.max_diagnostic_errors,
            seed: self.seed,
        }
    }
}

#[derive(Debug)]
pub struct BenchmarkDriver {
    options: DriverOptions,
    cancel: CancellationToken,
    state: DriverState,
}

impl BenchmarkDriver {
    pub fn new(options: DriverOptions) -> Self {
        BenchmarkDriver {
            options,
            cancel: CancellationToken::new(),
            state: DriverState::Idle,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// State the last run ended in.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Parse `text` and run it against a fresh strategy of `kind`.
    pub fn run_text(&mut self, text: &str, kind: StrategyKind, sinks: Sinks<'_>) -> BenchmarkOutcome {
        let strategy = new_strategy(kind, self.options.seed);
        self.run_text_with(text, strategy, sinks)
    }

    pub fn run_text_with(
        &mut self,
        text: &str,
        strategy: Box<dyn Strategy>,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        self.reset();
        self.transition(DriverState::Preparing);
        match Trace::parse(text) {
            Ok(trace) => self.prepare_and_run(&trace, strategy, sinks),
            Err(e) => {
                let outcome = BenchmarkOutcome::new(strategy.name(), strategy.kind(), 0);
                self.abort(outcome, FailureKind::MalformedTrace, e.to_string(), sinks)
            }
        }
    }

    /// Run an already parsed trace.
    pub fn run_trace(
        &mut self,
        trace: &Trace,
        strategy: Box<dyn Strategy>,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        self.reset();
        self.transition(DriverState::Preparing);
        self.prepare_and_run(trace, strategy, sinks)
    }

    /// Run `queries` against a dataset the caller built, without a trace.
    pub fn run_queries(
        &mut self,
        db: Arc<StaticDb>,
        queries: &[Query],
        strategy: Box<dyn Strategy>,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        self.reset();
        self.transition(DriverState::Preparing);
        self.execute(db, queries, strategy, sinks)
    }

    fn prepare_and_run(
        &mut self,
        trace: &Trace,
        strategy: Box<dyn Strategy>,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        let shape = DatasetShape { rows: trace.dataset.rows, row_len: trace.dataset.row_len };
        // Reject before materialising: the dataset can be gigabytes.
        let built = strategy
            .check_shape(shape.rows, shape.row_len)
            .and_then(|()| trace.build_db());
        match built {
            Ok(db) => self.execute(Arc::new(db), &trace.queries, strategy, sinks),
            Err(e) => {
                let mut outcome = BenchmarkOutcome::new(strategy.name(), strategy.kind(), trace.len());
                outcome.dataset = Some(shape);
                self.abort(outcome, FailureKind::SetupError, e.to_string(), sinks)
            }
        }
    }

    fn execute(
        &mut self,
        db: Arc<StaticDb>,
        queries: &[Query],
        mut strategy: Box<dyn Strategy>,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        let total = queries.len();
        let mut outcome = BenchmarkOutcome::new(strategy.name(), strategy.kind(), total);
        outcome.dataset = Some(DatasetShape { rows: db.num_rows(), row_len: db.row_len() });
        tracing::info!(
            strategy = %outcome.strategy,
            rows = db.num_rows(),
            row_len = db.row_len(),
            queries = total,
            "preparing strategy"
        );

        let setup_start = Instant::now();
        let prepared = strategy.prepare(db);
        outcome.setup_elapsed = setup_start.elapsed();
        outcome.transcript = strategy.transcript();
        outcome.client_storage_bytes = strategy.client_storage_bytes();
        if let Err(e) = prepared {
            return self.abort(outcome, FailureKind::SetupError, e.to_string(), sinks);
        }

        self.transition(DriverState::Running);
        let mut reported_errors = 0usize;
        let run_start = Instant::now();

        for (index, query) in queries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcome.run_elapsed = run_start.elapsed();
                outcome.transcript = strategy.transcript();
                let message = format!("stopped after {} of {total} queries", outcome.queries_processed);
                return self.abort(outcome, FailureKind::Cancelled, message, sinks);
            }

            let started = Instant::now();
            let result = strategy.retrieve(query.key);
            outcome.retrieve_times.push(started.elapsed());
            outcome.queries_processed += 1;

            match result {
                Ok(row) if row == query.expected => {}
                Ok(_) => {
                    outcome.mismatches += 1;
                    let detail = format!("query {index} (key {}): retrieved row differs from expected", query.key);
                    self.report_error(&mut reported_errors, FailureKind::RetrievalMismatch, &detail, sinks);
                }
                Err(e) => {
                    outcome.internal_errors += 1;
                    tracing::warn!(query = index, key = query.key, error = %e, "strategy error");
                    let detail = format!("query {index} (key {}): {e}", query.key);
                    self.report_error(&mut reported_errors, FailureKind::StrategyInternalError, &detail, sinks);
                }
            }

            let done = outcome.queries_processed;
            if self.options.progress_every > 0 && done % self.options.progress_every == 0 && done < total {
                sinks.primary(&progress_line(&outcome, run_start.elapsed()));
            }
        }

        outcome.run_elapsed = run_start.elapsed();
        outcome.transcript = strategy.transcript();
        outcome.client_storage_bytes = strategy.client_storage_bytes();
        sinks.primary(&progress_line(&outcome, outcome.run_elapsed));

        self.transition(DriverState::Reporting);
        sinks.primary(&summary_line(&outcome));
        self.transition(DriverState::Done);
        outcome.final_state = DriverState::Done;
        tracing::info!(
            strategy = %outcome.strategy,
            failures = outcome.failure_count(),
            elapsed_ms = outcome.run_elapsed.as_millis() as u64,
            "benchmark finished"
        );
        outcome
    }

    fn report_error(&self, reported: &mut usize, kind: FailureKind, detail: &str, sinks: Sinks<'_>) {
        let limit = self.options.max_diagnostic_errors;
        if *reported < limit {
            sinks.diagnostic(&format!("{kind}: {detail}"));
        } else if *reported == limit {
            sinks.diagnostic(&format!("{limit} errors reported, further errors suppressed"));
        }
        *reported += 1;
    }

    /// Fatal path: exactly one diagnostic line, nothing on primary.
    fn abort(
        &mut self,
        mut outcome: BenchmarkOutcome,
        kind: FailureKind,
        message: String,
        sinks: Sinks<'_>,
    ) -> BenchmarkOutcome {
        tracing::error!(strategy = %outcome.strategy, kind = %kind, "{message}");
        sinks.diagnostic(&format!("{kind}: {message}"));
        self.transition(DriverState::Failed);
        outcome.status = RunStatus::Aborted(kind);
        outcome.final_state = DriverState::Failed;
        outcome.error = Some(message);
        outcome
    }

    fn reset(&mut self) {
        self.state = DriverState::Idle;
    }

    fn transition(&mut self, next: DriverState) {
        tracing::debug!(from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }
}

fn progress_line(outcome: &BenchmarkOutcome, elapsed: Duration) -> String {
    format!(
        "[{}] {}/{} queries, {} failures, {:.3}s",
        outcome.strategy,
        outcome.queries_processed,
        outcome.total_queries,
        outcome.failure_count(),
        elapsed.as_secs_f64()
    )
}

fn summary_line(outcome: &BenchmarkOutcome) -> String {
    let n = outcome.queries_processed;
    let run_secs = outcome.run_elapsed.as_secs_f64();
    let mean_ms = if n == 0 { 0.0 } else { run_secs * 1000.0 / n as f64 };
    let throughput = if run_secs > 0.0 { n as f64 / run_secs } else { 0.0 };
    format!(
        "[{}] queries={} failures={} mismatches={} internal_errors={} setup_ms={:.3} total_ms={:.3} mean_ms={:.4} throughput={:.1}/s server_ms={:.3} client_ms={:.3} offline_bytes={} online_bytes={} client_storage_bytes={}",
        outcome.strategy,
        n,
        outcome.failure_count(),
        outcome.mismatches,
        outcome.internal_errors,
        outcome.setup_elapsed.as_secs_f64() * 1000.0,
        (outcome.setup_elapsed + outcome.run_elapsed).as_secs_f64() * 1000.0,
        mean_ms,
        throughput,
        outcome.server_time().as_secs_f64() * 1000.0,
        outcome.client_time().as_secs_f64() * 1000.0,
        outcome.transcript.offline_bytes,
        outcome.transcript.online_bytes,
        outcome.client_storage_bytes,
    )
}

/// Run `trace_text` against `kind` with default options. True on a clean run.
pub fn run_benchmark(trace_text: &str, kind: StrategyKind, primary: &dyn Sink, diagnostic: &dyn Sink) -> bool {
    BenchmarkDriver::new(DriverOptions::default())
        .run_text(trace_text, kind, Sinks::new(primary, diagnostic))
        .success()
}
