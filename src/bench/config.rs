use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::DriverOptions;
use crate::pir::StrategyKind;
use crate::{BenchError, BenchResult};

/// One (trace, strategy) pair to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteEntry {
    pub name: String,
    pub path: PathBuf,
    pub strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSettings {
    pub progress_every: Option<usize>,
    pub max_diagnostic_errors: Option<usize>,
    pub seed: Option<u64>,
    /// Failures tolerated per run before the suite is reported as failed
    pub max_failures: Option<usize>,
}

impl SuiteSettings {
    pub fn driver_options(&self) -> DriverOptions {
        let defaults = DriverOptions::default();
        DriverOptions {
            progress_every: self.progress_every.unwrap_or(defaults.progress_every),
            max_diagnostic_errors: self.max_diagnostic_errors.unwrap_or(defaults.max_diagnostic_errors),
            seed: self.seed.unwrap_or(defaults.seed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub settings: SuiteSettings,
    pub entries: Vec<SuiteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrace {
    name: Option<String>,
    path: PathBuf,
    #[serde(default)]
    strategies: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawSuite {
    #[serde(default)]
    settings: SuiteSettings,
    #[serde(rename = "trace", default)]
    traces: Vec<RawTrace>,
}

/// Parse suite TOML. Relative trace paths are resolved against `base_dir`;
/// a trace without `strategies` runs against every built-in kind.
pub fn parse_suite_config(text: &str, base_dir: &Path) -> BenchResult<SuiteConfig> {
    let raw: RawSuite = toml::from_str(text).map_err(|e| BenchError::Message(format!("invalid suite config: {e}")))?;
    if raw.traces.is_empty() {
        return Err(BenchError::Message("suite config lists no [[trace]] entries".into()));
    }

    let mut entries = Vec::new();
    for t in raw.traces {
        let path = if t.path.is_absolute() { t.path } else { base_dir.join(t.path) };
        let name = match t.name {
            Some(n) => n,
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "trace".to_string()),
        };
        let strategies = match t.strategies {
            Some(list) if !list.is_empty() => list,
            _ => StrategyKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
        };
        for strategy in strategies {
            entries.push(SuiteEntry { name: name.clone(), path: path.clone(), strategy });
        }
    }
    Ok(SuiteConfig { settings: raw.settings, entries })
}

pub fn load_suite_config(path: &Path) -> BenchResult<SuiteConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", path.display())))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_suite_config(&s, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_traces_by_strategy() {
        let text = r#"
            [settings]
            progress_every = 50
            seed = 9

            [[trace]]
            name = "small"
            path = "traces/small.csv"
            strategies = ["dpf", "non-private"]

            [[trace]]
            path = "/abs/big.csv"
        "#;
        let cfg = parse_suite_config(text, Path::new("/suite")).unwrap();
        assert_eq!(cfg.entries.len(), 5);
        assert_eq!(cfg.entries[0].name, "small");
        assert_eq!(cfg.entries[0].path, PathBuf::from("/suite/traces/small.csv"));
        assert_eq!(cfg.entries[1].strategy, "non-private");
        assert_eq!(cfg.entries[2].name, "big");
        assert_eq!(cfg.entries[2].strategy, "Punc");

        let opts = cfg.settings.driver_options();
        assert_eq!(opts.progress_every, 50);
        assert_eq!(opts.seed, 9);
        assert_eq!(opts.max_diagnostic_errors, 20);
    }

    #[test]
    fn test_rejects_empty_and_unknown_fields() {
        assert!(parse_suite_config("[settings]\nseed = 1\n", Path::new(".")).is_err());
        assert!(parse_suite_config("[[trace]]\npath = \"a\"\nbogus = 1\n", Path::new(".")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(&path, "[[trace]]\npath = \"t.csv\"\nstrategies = [\"punc\"]\n").unwrap();
        let cfg = load_suite_config(&path).unwrap();
        assert_eq!(cfg.entries, vec![SuiteEntry {
            name: "t".to_string(),
            path: dir.path().join("t.csv"),
            strategy: "punc".to_string(),
        }]);
        assert_eq!(cfg.settings, SuiteSettings::default());
    }
}
