//! Suite configuration.

pub mod config;

pub use config::{SuiteConfig, SuiteEntry, SuiteSettings, load_suite_config, parse_suite_config};
