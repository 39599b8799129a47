//! Host description attached to every record.
//!
//! Retrieval cost is bound by memory bandwidth and XOR throughput, so a
//! record keeps what moves those numbers: the CPU, memory headroom, the
//! build profile and the source revision. Runs from a phone and a server
//! can then be told apart and debug builds filtered out.

use std::process::Command;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub logical_cores: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_cores: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    /// Free for new allocations when the record was taken
    pub available_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRevision {
    pub sha: String,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(default)]
    pub cpu: CpuInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,

    pub os: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    pub arch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// `release` or `debug`
    pub build_profile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitRevision>,

    pub crate_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            cpu: CpuInfo::default(),
            memory: None,
            os: std::env::consts::OS.to_string(),
            os_version: None,
            arch: std::env::consts::ARCH.to_string(),
            hostname: None,
            build_profile: build_profile().to_string(),
            git: None,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl EnvironmentInfo {
    /// Describe the current host. Only CPU and memory are refreshed; process
    /// tables are never loaded.
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpus = sys.cpus();
        let cpu = CpuInfo {
            model: cpus
                .first()
                .map(|c| c.brand().trim().to_string())
                .filter(|m| !m.is_empty()),
            logical_cores: cpus.len(),
            physical_cores: sys.physical_core_count(),
            frequency_mhz: cpus.first().map(|c| c.frequency()).filter(|f| *f > 0),
        };
        let memory = Some(sys.total_memory())
            .filter(|total| *total > 0)
            .map(|total_bytes| MemoryInfo {
                total_bytes,
                available_bytes: sys.available_memory(),
            });

        EnvironmentInfo {
            cpu,
            memory,
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version(),
            hostname: System::host_name(),
            git: detect_git(),
            ..Default::default()
        }
    }

    pub fn is_release(&self) -> bool {
        self.build_profile == "release"
    }

    /// Whether a dataset of `bytes` fits in physical memory, if memory is known.
    pub fn fits_in_memory(&self, bytes: u64) -> Option<bool> {
        self.memory.map(|m| bytes <= m.total_bytes)
    }
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "release" }
}

/// Trimmed stdout of a successful `git` invocation.
fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn detect_git() -> Option<GitRevision> {
    let sha = git(&["rev-parse", "HEAD"]).filter(|s| !s.is_empty())?;
    let dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());
    Some(GitRevision { sha, dirty })
}
