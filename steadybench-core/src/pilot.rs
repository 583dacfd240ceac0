//! Pilot Estimator
//!
//! Finds how many invocations one batch needs so that the batch spans a safe
//! multiple of the clock resolution. Starting at one repetition, the batch
//! size doubles until a timed batch reaches `resolution_multiple × resolution`
//! or the repetition cap is hit.

use crate::error::{Phase, PipelineError};
use crate::pipeline::PhaseBudget;
use std::time::Duration;

/// Hard cap on repetitions per batch (2^30, about 1e9)
pub const MAX_REPETITIONS: u64 = 1 << 30;

/// Pilot phase settings
#[derive(Debug, Clone)]
pub struct PilotConfig {
    /// Required batch length in units of clock resolution (K)
    pub resolution_multiple: u64,
    /// Repetition cap; doubling stops once `r` reaches it
    pub max_repetitions: u64,
    /// Coarsest acceptable clock resolution
    pub max_resolution: Duration,
    /// Wall-clock budget for the whole phase
    pub budget: Duration,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            resolution_multiple: 100,
            max_repetitions: MAX_REPETITIONS,
            max_resolution: Duration::from_millis(1),
            budget: Duration::from_secs(10),
        }
    }
}

/// Outcome of the pilot phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PilotEstimate {
    /// Repetitions per batch for warmup and measurement
    pub repetitions: u64,
    /// Elapsed nanoseconds of the final pilot batch
    pub batch_elapsed_ns: u64,
    /// Clock resolution the estimate was made against
    pub resolution_ns: u64,
    /// Whether the repetition cap stopped the doubling early
    pub capped: bool,
}

/// Calibrates the repetition count for one pipeline
#[derive(Debug, Clone)]
pub struct PilotEstimator {
    config: PilotConfig,
}

impl PilotEstimator {
    /// Create an estimator
    pub fn new(config: PilotConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    /// Validate a clock resolution reading against the configured floor.
    pub fn check_resolution(&self, resolution: Option<u64>) -> Result<u64, PipelineError> {
        let max_ns = self.config.max_resolution.as_nanos() as u64;
        match resolution {
            None | Some(0) => Err(PipelineError::ClockResolution(
                "clock resolution could not be determined (timestamps never advance)".to_string(),
            )),
            Some(ns) if ns > max_ns => Err(PipelineError::ClockResolution(format!(
                "clock resolution {ns} ns is coarser than the {max_ns} ns floor"
            ))),
            Some(ns) => Ok(ns),
        }
    }

    /// Run the doubling search.
    ///
    /// `time_batch(r)` must execute `r` invocations and return the elapsed
    /// nanoseconds as seen by the clock whose resolution is `resolution`.
    pub fn estimate<F>(
        &self,
        resolution: Option<u64>,
        mut time_batch: F,
    ) -> Result<PilotEstimate, PipelineError>
    where
        F: FnMut(u64) -> u64,
    {
        let resolution_ns = self.check_resolution(resolution)?;
        let target = resolution_ns.saturating_mul(self.config.resolution_multiple.max(1));
        let cap = self.config.max_repetitions.max(1);
        let budget = PhaseBudget::start(Phase::Pilot, self.config.budget);

        let mut repetitions = 1u64;
        loop {
            let elapsed = time_batch(repetitions);
            budget.check()?;

            if elapsed >= target || repetitions >= cap {
                let capped = elapsed < target;
                if capped {
                    tracing::debug!(
                        repetitions,
                        elapsed,
                        target,
                        "pilot reached repetition cap before target batch length"
                    );
                }
                return Ok(PilotEstimate {
                    repetitions,
                    batch_elapsed_ns: elapsed,
                    resolution_ns,
                    capped,
                });
            }

            repetitions = repetitions.saturating_mul(2).min(cap);
        }
    }
}
