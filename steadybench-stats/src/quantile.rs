//! Quantiles
//!
//! Linear interpolation between closest ranks (the "type 7" estimator):
//! the `q` quantile of `n` sorted values sits at rank `q × (n − 1)`.

use std::cmp::Ordering;

/// Sort a copy of `samples` in ascending total order.
pub fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Quantile `q` (0.0..=1.0) of already sorted values.
///
/// Returns `NaN` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = rank - lower as f64;
            sorted[lower] + fraction * (sorted[upper] - sorted[lower])
        }
    }
}

/// Quantile `q` of unsorted samples
pub fn quantile(samples: &[f64], q: f64) -> f64 {
    quantile_sorted(&sorted(samples), q)
}

/// First quartile, median and third quartile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    /// 25th percentile
    pub q1: f64,
    /// 50th percentile
    pub median: f64,
    /// 75th percentile
    pub q3: f64,
}

impl Quartiles {
    /// Compute all three from unsorted samples
    pub fn of(samples: &[f64]) -> Self {
        let sorted = sorted(samples);
        Self {
            q1: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q3: quantile_sorted(&sorted, 0.75),
        }
    }

    /// Interquartile range
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Smallest and largest sample, `None` when empty
pub fn min_max(samples: &[f64]) -> Option<(f64, f64)> {
    let min = samples.iter().copied().min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;
    let max = samples.iter().copied().max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;
    Some((min, max))
}
