#![warn(missing_docs)]
//! # SteadyBench
//!
//! Statistically sound microbenchmark harness for short, repeatable units of
//! work measured in-process, one at a time.
//!
//! - **Pilot phase**: batch sizes grow until a batch spans 100 clock ticks
//! - **Warmup**: sliding-window coefficient of variation detects a steady state
//! - **Measurement**: a fixed number of batches; allocation deltas when
//!   [`TrackingAllocator`] is the global allocator
//! - **Statistics**: Tukey IQR outlier rejection, Student-t confidence
//!   intervals (99% by default)
//! - **Baselines**: ratio to the baseline case of each parameter group, with
//!   propagated error
//! - **Failure isolation**: panics, timeouts and unusable clocks fail a single
//!   pipeline and the run carries on
//!
//! ## Quick Start
//!
//! ```ignore
//! use steadybench::prelude::*;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     ParameterGroup::from_values("sum", vec![1_000u64, 100_000])
//!         .baseline("loop", |n: &u64| (0..*n).sum::<u64>())
//!         .case("formula", |n: &u64| n * (n - 1) / 2),
//! );
//!
//! let report = Harness::new(HarnessConfig::default()).run(&registry)?;
//! for result in &report.results {
//!     println!("{} {:?} {:?}", result.label(), result.mean_ns(), result.ratio);
//! }
//! ```
//!
//! ## Async Cases
//!
//! ```ignore
//! let case = BenchmarkCase::new_async("fetch", |_: &()| async { cache.get("key").await })?;
//! registry.register(ParameterGroup::unit("cache").with_case(case));
//! ```
//!
//! ## Allocation Tracking
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: steadybench::TrackingAllocator = steadybench::TrackingAllocator;
//! ```

mod config;
mod harness;
mod metadata;
mod report;
mod statistics;

pub use config::{
    CONFIG_FILE_NAME, HarnessConfig, MeasurementSection, PilotSection, RunnerSection,
    StatisticsSection, SteadyConfig, WarmupSection, parse_duration,
};
pub use harness::Harness;
pub use metadata::system_info;

// Re-export core types
pub use steadybench_core::{
    AllocationCounter, AllocationTrackingUnavailable, BenchmarkCase, BlackHole, Clock,
    ConfigurationError, ExecutionPlan, MeasurementConfig, MonotonicClock, ParameterGroup,
    ParameterSource, Phase, PilotConfig, Pipeline, PipelineError, PipelineId, PipelineState,
    Registry, Routine, SimulatedClock, TrackingAllocator, WarmupConfig,
};

// Re-export stats
pub use steadybench_stats::{
    BaselineRatio, Estimate, OutlierMethod, Statistic, StatisticsConfig, StatisticsError,
    compute_statistic, ratio_to_baseline,
};

// Re-export report model
pub use steadybench_report::{
    CaseMetrics, CaseResult, PipelineStatus, RatioMetrics, Report, ReportConfig, ReportMeta,
    ReportSummary, SystemInfo,
};

/// Lower-level building blocks: pilot, warmup, measurement and statistics
pub mod internals {
    pub use steadybench_core::{
        Measurement, MeasurementEngine, PhaseBudget, PilotEstimate, PilotEstimator,
        PipelineRunner, Sample, SteadyStateDetector, WarmupController, WarmupOutcome, WarmupState,
        probe_resolution,
    };
    pub use steadybench_stats::{
        OutlierAnalysis, Quartiles, TukeyFences, critical_value, quantile, reject_outliers,
        student_t_quantile,
    };
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchmarkCase, BlackHole, Harness, HarnessConfig, ParameterGroup, Registry, Report,
    };
}

/// Run `registry` with `steadybench.toml` settings, or defaults when no file exists.
///
/// Call this from a benchmark binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     tracing_subscriber::fmt().with_env_filter("steadybench=info").init();
///     let report = steadybench::run(&my_registry())?;
///     println!("{}", serde_json::to_string_pretty(&report)?);
///     Ok(())
/// }
/// ```
pub fn run(registry: &Registry) -> anyhow::Result<Report> {
    let config = match SteadyConfig::discover()? {
        Some(file) => file.into_harness_config()?,
        None => HarnessConfig::default(),
    };
    Ok(Harness::new(config).run(registry)?)
}
