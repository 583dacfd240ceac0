//! Harness Orchestration
//!
//! ```text
//! validate config ─► plan registry ─► pin CPU ─► detect allocation counter
//!        │
//!        ▼
//! calibrate sink overhead ─► run pipelines (sequential) ─► statistics (Rayon)
//!        │
//!        ▼
//! baseline normalization ─► Report
//! ```
//!
//! Only configuration problems abort a run. Every pipeline failure ends up
//! as a `Failed` row in the report.

use crate::config::HarnessConfig;
use crate::metadata::{RunFacts, build_report_meta};
use crate::report::{build_results, normalize};
use crate::statistics::{compute_statistics, finish_pipelines};
use std::sync::Arc;
use std::time::Instant;
use steadybench_core::{
    AllocationCounter, Clock, ConfigurationError, MonotonicClock, PipelineRunner, Registry,
    pin_to_cpu,
};
use steadybench_report::Report;
use steadybench_stats::compute_statistic;

/// Runs registered benchmark cases and assembles the [`Report`]
pub struct Harness {
    config: HarnessConfig,
    clock: Arc<dyn Clock>,
}

impl Harness {
    /// Harness timing with the system monotonic clock
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Harness timing with a custom clock
    pub fn with_clock(config: HarnessConfig, clock: impl Clock + 'static) -> Self {
        Self {
            config,
            clock: Arc::new(clock),
        }
    }

    /// Settings in use
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Measure every selected case over every parameter tuple.
    ///
    /// Fails only with a [`ConfigurationError`], before anything is measured.
    /// With `pin_cpu` set, the calling thread stays pinned after the run.
    pub fn run(&self, registry: &Registry) -> Result<Report, ConfigurationError> {
        let started = Instant::now();
        let filter = self.config.validate()?;
        let plan = registry.plan(filter.as_ref())?;

        tracing::info!(
            groups = plan.groups().len(),
            pipelines = plan.pipeline_count(),
            "starting benchmark run"
        );

        let mut facts = RunFacts::default();

        if let Some(cpu) = self.config.pin_cpu {
            match pin_to_cpu(cpu) {
                Ok(()) => facts.pinned_cpu = Some(cpu),
                Err(e) => {
                    tracing::warn!(cpu, "failed to pin measuring thread: {e}");
                    facts.warnings.push(format!("failed to pin to CPU {cpu}: {e}"));
                }
            }
        }

        let allocations = if self.config.measurement.track_allocations {
            match AllocationCounter::detect() {
                Ok(counter) => Some(counter),
                Err(e) => {
                    tracing::warn!("{e}; allocated bytes omitted for this run");
                    facts.warnings.push(e.to_string());
                    None
                }
            }
        } else {
            None
        };
        facts.allocation_tracking = allocations.is_some();

        let mut runner = PipelineRunner::new(
            Arc::clone(&self.clock),
            self.config.pilot.clone(),
            self.config.warmup.clone(),
            self.config.measurement.clone(),
        )
        .with_allocations(allocations);
        facts.clock_resolution_ns = runner.clock_resolution();

        if self.config.measurement.subtract_sink_overhead {
            self.calibrate_overhead(&mut runner, &mut facts.warnings);
        }
        facts.sink_overhead_ns = runner.overhead_ns();

        let mut pipelines = plan.execute(&runner);

        let computed = compute_statistics(&pipelines, &self.config.statistics);
        let statistics = finish_pipelines(&mut pipelines, computed);

        let mut results = build_results(&pipelines, &statistics);
        facts.warnings.extend(normalize(&mut results));

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let report = Report::new(
            build_report_meta(facts, self.config.report_config()),
            results,
            elapsed_ms,
        );

        tracing::info!(
            total = report.summary.total,
            done = report.summary.done,
            failed = report.summary.failed,
            elapsed_ms,
            "benchmark run finished"
        );

        Ok(report)
    }

    fn calibrate_overhead(&self, runner: &mut PipelineRunner, warnings: &mut Vec<String>) {
        let overhead = runner
            .measure_sink_overhead()
            .map_err(|e| e.to_string())
            .and_then(|m| {
                compute_statistic(&m.per_invocation_ns, &self.config.statistics)
                    .map_err(|e| e.to_string())
            });

        match overhead {
            Ok(stat) => {
                tracing::debug!(overhead_ns = stat.mean, "sink overhead calibrated");
                runner.set_overhead_ns(stat.mean);
            }
            Err(reason) => {
                tracing::warn!("sink overhead calibration failed: {reason}; subtracting nothing");
                warnings.push(format!("sink overhead calibration failed: {reason}"));
                runner.set_overhead_ns(0.0);
            }
        }
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
