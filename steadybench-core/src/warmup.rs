//! Warmup Controller
//!
//! Runs batches until per-invocation timings settle. A sliding window of the
//! most recent batch means is considered stable when its coefficient of
//! variation falls below a threshold; the steady state is declared after a
//! run of consecutive stable windows.
//!
//! ```text
//!  batch means:  [ 50 30 20 10 10 10 10 10 10 10 ]
//!  window W=5:             └──────────┘ stable #1
//!                             └──────────┘ stable #2
//!                                └──────────┘ stable #3 → Stable
//! ```

use crate::error::{Phase, PipelineError};
use crate::pipeline::PhaseBudget;
use std::collections::VecDeque;
use std::time::Duration;

/// Warmup phase settings
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    /// Batches per sliding window (W)
    pub window: usize,
    /// Coefficient of variation below which a window counts as stable
    pub cv_threshold: f64,
    /// Consecutive stable windows required (C)
    pub consecutive_windows: usize,
    /// Batches after which warmup gives up and proceeds unstable
    pub max_batches: usize,
    /// Wall-clock budget for the whole phase
    pub budget: Duration,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            window: 5,
            cv_threshold: 0.02,
            consecutive_windows: 3,
            max_batches: 100,
            budget: Duration::from_secs(10),
        }
    }
}

/// Detector verdict after a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    /// Still waiting for a steady state
    Warming,
    /// Required number of consecutive stable windows observed
    Stable,
}

/// Sliding-window steady-state detector.
///
/// Pure state machine fed with per-invocation batch means; knows nothing
/// about clocks or budgets.
#[derive(Debug, Clone)]
pub struct SteadyStateDetector {
    window: VecDeque<f64>,
    capacity: usize,
    cv_threshold: f64,
    required: usize,
    consecutive: usize,
    observed: usize,
}

impl SteadyStateDetector {
    /// Create a detector from warmup settings
    pub fn new(config: &WarmupConfig) -> Self {
        let capacity = config.window.max(2);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            cv_threshold: config.cv_threshold,
            required: config.consecutive_windows.max(1),
            consecutive: 0,
            observed: 0,
        }
    }

    /// Feed one batch mean and get the verdict so far
    pub fn observe(&mut self, per_invocation_ns: f64) -> WarmupState {
        self.observed += 1;
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(per_invocation_ns);

        if self.window.len() < self.capacity {
            return WarmupState::Warming;
        }

        if self.window_cv() < self.cv_threshold {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }

        if self.consecutive >= self.required {
            WarmupState::Stable
        } else {
            WarmupState::Warming
        }
    }

    /// Batches observed so far
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Coefficient of variation (sample stddev / mean) of the current window
    pub fn window_cv(&self) -> f64 {
        coefficient_of_variation(self.window.iter().copied())
    }
}

fn coefficient_of_variation(values: impl ExactSizeIterator<Item = f64> + Clone) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::INFINITY;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        0.0
    } else if mean == 0.0 {
        f64::INFINITY
    } else {
        std_dev / mean.abs()
    }
}

/// Result of the warmup phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupOutcome {
    /// Batches executed during warmup
    pub batches: usize,
    /// Whether a steady state was detected before the batch limit
    pub stable: bool,
    /// Coefficient of variation of the last full window
    pub final_cv: f64,
}

/// Drives warmup batches for one pipeline
#[derive(Debug, Clone)]
pub struct WarmupController {
    config: WarmupConfig,
}

impl WarmupController {
    /// Create a controller
    pub fn new(config: WarmupConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    /// Run batches of `repetitions` invocations until stable.
    ///
    /// `time_batch()` runs one batch and returns its elapsed nanoseconds.
    /// Reaching `max_batches` returns an unstable outcome; exhausting the
    /// wall-clock budget returns [`PipelineError::Timeout`].
    pub fn run<F>(
        &self,
        repetitions: u64,
        mut time_batch: F,
    ) -> Result<WarmupOutcome, PipelineError>
    where
        F: FnMut() -> u64,
    {
        let repetitions = repetitions.max(1) as f64;
        let mut detector = SteadyStateDetector::new(&self.config);
        let budget = PhaseBudget::start(Phase::Warmup, self.config.budget);

        while detector.observed() < self.config.max_batches {
            let elapsed = time_batch();
            let state = detector.observe(elapsed as f64 / repetitions);
            budget.check()?;

            if state == WarmupState::Stable {
                return Ok(WarmupOutcome {
                    batches: detector.observed(),
                    stable: true,
                    final_cv: detector.window_cv(),
                });
            }
        }

        tracing::warn!(
            batches = detector.observed(),
            cv = detector.window_cv(),
            "warmup did not reach a steady state; measuring anyway"
        );
        Ok(WarmupOutcome {
            batches: detector.observed(),
            stable: false,
            final_cv: detector.window_cv(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut SteadyStateDetector, values: &[f64]) -> Option<usize> {
        for (i, &v) in values.iter().enumerate() {
            if detector.observe(v) == WarmupState::Stable {
                return Some(i);
            }
        }
        None
    }

    #[test]
    fn test_constant_sequence_stabilizes_after_window_plus_streak() {
        let config = WarmupConfig::default();
        let mut detector = SteadyStateDetector::new(&config);
        let values = vec![100.0; 20];

        // W + C - 1 = 7 batches, index 6
        assert_eq!(feed(&mut detector, &values), Some(6));
    }

    #[test]
    fn test_noisy_window_resets_streak() {
        let config = WarmupConfig::default();
        let mut detector = SteadyStateDetector::new(&config);
        let mut values = vec![100.0; 6];
        values.push(300.0);
        values.extend(vec![100.0; 10]);

        // stable windows end at indices 4 and 5, the spike at 6 breaks the
        // streak, it leaves the window at 11, then three more windows: 11,12,13
        assert_eq!(feed(&mut detector, &values), Some(13));
    }

    #[test]
    fn test_zero_timings_are_stable() {
        let mut detector = SteadyStateDetector::new(&WarmupConfig::default());
        assert_eq!(feed(&mut detector, &[0.0; 10]), Some(6));
    }

    #[test]
    fn test_controller_reports_unstable_at_batch_limit() {
        let config = WarmupConfig {
            max_batches: 12,
            ..WarmupConfig::default()
        };
        let mut toggle = false;
        let outcome = WarmupController::new(config)
            .run(10, || {
                toggle = !toggle;
                if toggle { 1_000 } else { 3_000 }
            })
            .unwrap();

        assert!(!outcome.stable);
        assert_eq!(outcome.batches, 12);
        assert!(outcome.final_cv > 0.02);
    }

    #[test]
    fn test_controller_uses_per_invocation_means() {
        let outcome = WarmupController::new(WarmupConfig::default())
            .run(4, || 400)
            .unwrap();
        assert!(outcome.stable);
        assert_eq!(outcome.batches, 7);
        assert_eq!(outcome.final_cv, 0.0);
    }

    #[test]
    fn test_controller_times_out() {
        let config = WarmupConfig {
            budget: Duration::from_millis(1),
            ..WarmupConfig::default()
        };
        let err = WarmupController::new(config)
            .run(1, || {
                std::thread::sleep(Duration::from_millis(2));
                1
            })
            .unwrap_err();
        assert_eq!(err.timed_out_phase(), Some(Phase::Warmup));
    }
}
