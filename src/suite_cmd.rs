use std::path::PathBuf;

use tracing::{info, warn};

use crate::bench::load_suite_config;
use crate::engine::BenchmarkDriver;
use crate::pir::StrategyRegistry;
use crate::run_cmd::{check_outcome, persist};
use crate::sink::{Sinks, WriterSink};
use crate::{BenchError, BenchResult};

/// Run every (trace, strategy) pair of the config. Keeps going after a failed
/// pair and reports the failures at the end.
pub fn run(config_path: PathBuf, jsonl: Option<PathBuf>) -> BenchResult<()> {
    let cfg = load_suite_config(&config_path)?;
    let registry = StrategyRegistry::with_builtin();

    if let Some(unknown) = cfg.entries.iter().find(|e| !registry.contains(&e.strategy)) {
        return Err(BenchError::Message(format!(
            "unknown strategy `{}` for trace `{}` (known: {})",
            unknown.strategy,
            unknown.name,
            registry.names().join(", ")
        )));
    }

    let options = cfg.settings.driver_options();
    let max_failures = cfg.settings.max_failures.unwrap_or(0);
    let primary = WriterSink::stdout();
    let diagnostic = WriterSink::stderr();
    let sinks = Sinks::new(&primary, &diagnostic);
    let mut driver = BenchmarkDriver::new(options);
    let mut failed = Vec::new();

    for entry in &cfg.entries {
        info!(trace = %entry.name, strategy = %entry.strategy, "suite entry");
        let text = match std::fs::read_to_string(&entry.path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "failed to read trace");
                failed.push(format!("{}/{}: {e}", entry.name, entry.strategy));
                continue;
            }
        };
        let Some(strategy) = registry.create(&entry.strategy, options.seed) else {
            continue;
        };

        let outcome = driver.run_text_with(&text, strategy, sinks);
        persist(&outcome, &entry.name, &options, jsonl.as_deref())?;
        if let Err(e) = check_outcome(&outcome, max_failures) {
            failed.push(format!("{}/{}", entry.name, e));
        }
    }

    if failed.is_empty() {
        info!(runs = cfg.entries.len(), "suite passed");
        Ok(())
    } else {
        Err(BenchError::Message(format!(
            "{} of {} suite runs failed: {}",
            failed.len(),
            cfg.entries.len(),
            failed.join("; ")
        )))
    }
}
