//! System Metadata Collection
//!
//! Collects the host description recorded in every report: OS, architecture,
//! CPU model and core count. Linux-specific data (CPU model) degrades to
//! "Unknown" on other platforms.

use chrono::Utc;
use steadybench_report::{ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};

/// Run-level facts gathered while the harness executes
#[derive(Debug, Clone, Default)]
pub(crate) struct RunFacts {
    pub clock_resolution_ns: Option<u64>,
    pub sink_overhead_ns: f64,
    pub allocation_tracking: bool,
    pub pinned_cpu: Option<usize>,
    pub warnings: Vec<String>,
}

/// Build report metadata for a finished run
pub(crate) fn build_report_meta(facts: RunFacts, config: ReportConfig) -> ReportMeta {
    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: system_info(facts.pinned_cpu),
        clock_resolution_ns: facts.clock_resolution_ns,
        sink_overhead_ns: facts.sink_overhead_ns,
        allocation_tracking: facts.allocation_tracking,
        warnings: facts.warnings,
        config,
    }
}

/// Describe the host
pub fn system_info(pinned_cpu: Option<usize>) -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: cpu_cores(),
        pinned_cpu,
    }
}

/// First `model name` entry of `/proc/cpuinfo`; `None` off Linux
#[cfg(target_os = "linux")]
fn cpu_model() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

#[cfg(not(target_os = "linux"))]
fn cpu_model() -> Option<String> {
    None
}

/// Cores the measuring process may run on, at least one
fn cpu_cores() -> u32 {
    std::thread::available_parallelism().map_or(1, |n| n.get() as u32)
}
