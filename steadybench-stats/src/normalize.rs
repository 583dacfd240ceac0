//! Baseline Normalization
//!
//! `ratio = case.mean / baseline.mean`, with relative errors combined in
//! quadrature:
//!
//! ```text
//! error = ratio × √(rel_case² + rel_baseline²),   rel = std_error / mean
//! ```
//!
//! `ratio × rel_case` is evaluated as `case.std_error / baseline.mean`, which
//! is the same quantity but stays finite when the case mean is zero.

use crate::statistic::Statistic;

/// Mean and standard error of one measured case
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Mean
    pub mean: f64,
    /// Standard error of the mean
    pub std_error: f64,
}

impl Estimate {
    /// Build from mean and relative error
    pub fn with_relative_error(mean: f64, relative_error: f64) -> Self {
        Self {
            mean,
            std_error: mean.abs() * relative_error,
        }
    }
}

impl From<&Statistic> for Estimate {
    fn from(stat: &Statistic) -> Self {
        Self {
            mean: stat.mean,
            std_error: stat.std_error,
        }
    }
}

/// A case's speed relative to its group's baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineRatio {
    /// `case.mean / baseline.mean`
    pub ratio: f64,
    /// Propagated absolute error of the ratio
    pub error: f64,
}

impl BaselineRatio {
    /// What the baseline reports against itself
    pub const IDENTITY: BaselineRatio = BaselineRatio {
        ratio: 1.0,
        error: 0.0,
    };
}

/// Ratio of `case` to `baseline`.
///
/// `None` when the baseline mean is zero or not finite.
pub fn ratio_to_baseline(case: Estimate, baseline: Estimate) -> Option<BaselineRatio> {
    if baseline.mean == 0.0 || !baseline.mean.is_finite() {
        return None;
    }

    let ratio = case.mean / baseline.mean;
    let case_term = case.std_error / baseline.mean.abs();
    let baseline_term = if baseline.std_error == 0.0 {
        0.0
    } else {
        ratio.abs() * baseline.std_error / baseline.mean.abs()
    };

    Some(BaselineRatio {
        ratio,
        error: case_term.hypot(baseline_term),
    })
}
