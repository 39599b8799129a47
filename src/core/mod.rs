//! Core types and schemas for pir-bench.
//!
//! This module contains the canonical `BenchRecord` schema (v1) used for all persisted outcomes.

pub mod env;
pub mod schema;

// Re-export key types for convenience
pub use env::{CpuInfo, EnvironmentInfo, GitRevision, MemoryInfo};
pub use schema::{BenchRecord, DatasetShape, RunConfig, SCHEMA_VERSION, StrategyInfo, TimingStat};
