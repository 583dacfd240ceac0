//! Measurement Engine
//!
//! Runs the fixed number of measured batches after warmup. Each batch is one
//! timed region of `r` invocations; the allocation counter is read just
//! outside that region.
//!
//! ```text
//!  alloc.read() ─┐                          ┌─ alloc.read()
//!                ▼                          ▼
//!          clock.now() ── r × invoke ── clock.now()
//!                └──── elapsed / r − sink overhead ────┘  → per-invocation ns
//! ```

use crate::allocator::AllocationCounter;
use crate::error::{Phase, PipelineError};
use crate::pipeline::PhaseBudget;
use std::time::Duration;

/// Default number of measured batches
pub const DEFAULT_BATCH_COUNT: usize = 15;

/// One measured batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Invocations in the batch
    pub repetitions: u64,
    /// Elapsed clock nanoseconds for the whole batch
    pub elapsed_ns: u64,
    /// Bytes allocated during the batch, when tracking is available
    pub allocated_bytes: Option<u64>,
}

impl Sample {
    /// Mean nanoseconds per invocation (before overhead correction)
    #[inline]
    pub fn per_invocation_ns(&self) -> f64 {
        self.elapsed_ns as f64 / self.repetitions.max(1) as f64
    }
}

/// Measurement phase settings
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    /// Measured batches per pipeline
    pub batches: usize,
    /// Read the allocation counter around each batch
    pub track_allocations: bool,
    /// Measure the sink overhead once per run and subtract it
    pub subtract_sink_overhead: bool,
    /// Wall-clock budget for the whole phase
    pub budget: Duration,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            batches: DEFAULT_BATCH_COUNT,
            track_allocations: true,
            subtract_sink_overhead: true,
            budget: Duration::from_secs(30),
        }
    }
}

/// Raw output of the measurement phase
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Repetitions per batch
    pub repetitions: u64,
    /// Measured batches in execution order
    pub samples: Vec<Sample>,
    /// Overhead-corrected nanoseconds per invocation, one per batch
    pub per_invocation_ns: Vec<f64>,
    /// Sink overhead subtracted from each per-invocation time
    pub overhead_ns: f64,
}

impl Measurement {
    /// Mean allocated bytes per invocation across all batches
    pub fn allocated_bytes_per_invocation(&self) -> Option<u64> {
        let mut total_bytes = 0u64;
        let mut total_invocations = 0u64;
        for sample in &self.samples {
            total_bytes = total_bytes.saturating_add(sample.allocated_bytes?);
            total_invocations = total_invocations.saturating_add(sample.repetitions);
        }
        (total_invocations > 0).then(|| total_bytes / total_invocations)
    }

    /// Total invocations across measured batches
    pub fn invocations(&self) -> u64 {
        self.samples.iter().map(|s| s.repetitions).sum()
    }
}

/// Executes measured batches for one pipeline
#[derive(Debug, Clone)]
pub struct MeasurementEngine {
    config: MeasurementConfig,
}

impl MeasurementEngine {
    /// Create an engine
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Run `config.batches` batches.
    ///
    /// `time_batch()` executes one batch of `repetitions` invocations and
    /// returns elapsed clock nanoseconds. `overhead_ns` is subtracted from
    /// every per-invocation time, floored at zero.
    pub fn measure<F>(
        &self,
        repetitions: u64,
        overhead_ns: f64,
        allocations: Option<&AllocationCounter>,
        mut time_batch: F,
    ) -> Result<Measurement, PipelineError>
    where
        F: FnMut() -> u64,
    {
        let repetitions = repetitions.max(1);
        let budget = PhaseBudget::start(Phase::Measurement, self.config.budget);
        let mut samples = Vec::with_capacity(self.config.batches);
        let mut per_invocation_ns = Vec::with_capacity(self.config.batches);

        for _ in 0..self.config.batches {
            let before = allocations.map(AllocationCounter::read);
            let elapsed_ns = time_batch();
            let after = allocations.map(AllocationCounter::read);

            let allocated_bytes = match (before, after) {
                (Some(b), Some(a)) => Some(a.saturating_sub(b)),
                _ => None,
            };

            let sample = Sample {
                repetitions,
                elapsed_ns,
                allocated_bytes,
            };
            per_invocation_ns.push((sample.per_invocation_ns() - overhead_ns).max(0.0));
            samples.push(sample);

            budget.check()?;
        }

        Ok(Measurement {
            repetitions,
            samples,
            per_invocation_ns,
            overhead_ns,
        })
    }
}
