//! Descriptive Statistics
//!
//! Follows the same split as tail-latency reporting:
//! - mean, median, stddev, standard error and the confidence interval come
//!   from the CLEANED samples (outliers removed)
//! - min and max come from ALL samples
//!
//! Summation runs in input order, so identical input yields identical bits.

use crate::outliers::{OutlierMethod, reject_outliers};
use crate::quantile::{min_max, quantile_sorted, sorted};
use crate::student_t::critical_value;
use crate::{DEFAULT_CONFIDENCE_LEVEL, DEFAULT_MIN_SAMPLES};
use thiserror::Error;

/// Statistics phase settings
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsConfig {
    /// Outlier rejection applied before anything is computed
    pub outlier_method: OutlierMethod,
    /// Two-sided confidence level of the interval
    pub confidence_level: f64,
    /// Fewest samples a statistic may be computed from
    pub min_samples: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            outlier_method: OutlierMethod::default(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Why a statistic could not be computed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatisticsError {
    /// Too few samples, before any cleaning
    #[error("not enough samples: got {got}, need at least {min}")]
    #[allow(missing_docs)]
    NotEnoughSamples { got: usize, min: usize },

    /// Confidence level outside (0, 1)
    #[error("confidence level {0} is outside (0, 1)")]
    InvalidConfidenceLevel(f64),
}

/// Two-sided confidence interval for the mean
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Confidence level, e.g. 0.99
    pub level: f64,
}

/// Summary of one pipeline's per-invocation times, in nanoseconds
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    /// Mean of the cleaned samples
    pub mean: f64,
    /// Median of the cleaned samples
    pub median: f64,
    /// Sample standard deviation (n − 1) of the cleaned samples
    pub std_dev: f64,
    /// `std_dev / √n`
    pub std_error: f64,
    /// Student-t interval around the mean
    pub confidence_interval: ConfidenceInterval,
    /// Samples used after cleaning
    pub sample_count: usize,
    /// Samples dropped as outliers
    pub outliers_removed: usize,
    /// Cleaning was skipped to keep the minimum sample count
    pub unfiltered: bool,
    /// Smallest raw sample
    pub min: f64,
    /// Largest raw sample
    pub max: f64,
}

impl Statistic {
    /// `std_error / mean`; zero when both are zero
    pub fn relative_error(&self) -> f64 {
        if self.std_error == 0.0 {
            0.0
        } else {
            self.std_error / self.mean.abs()
        }
    }

    /// Half-width of the confidence interval
    pub fn margin_of_error(&self) -> f64 {
        (self.confidence_interval.upper - self.confidence_interval.lower) / 2.0
    }
}

/// Clean `samples` and compute the statistic.
pub fn compute_statistic(
    samples: &[f64],
    config: &StatisticsConfig,
) -> Result<Statistic, StatisticsError> {
    let level = config.confidence_level;
    if level.is_nan() || level <= 0.0 || level >= 1.0 {
        return Err(StatisticsError::InvalidConfidenceLevel(level));
    }

    let min = config.min_samples.max(2);
    if samples.len() < min {
        return Err(StatisticsError::NotEnoughSamples {
            got: samples.len(),
            min,
        });
    }

    let analysis = reject_outliers(samples, config.outlier_method, min);
    let cleaned = &analysis.retained;
    let n = cleaned.len();

    let mean = cleaned.iter().sum::<f64>() / n as f64;
    let variance = cleaned.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    let std_error = std_dev / (n as f64).sqrt();

    let margin = if std_error == 0.0 {
        0.0
    } else {
        critical_value(level, (n - 1) as f64) * std_error
    };

    let (raw_min, raw_max) = min_max(samples).unwrap_or((mean, mean));

    Ok(Statistic {
        mean,
        median: quantile_sorted(&sorted(cleaned), 0.5),
        std_dev,
        std_error,
        confidence_interval: ConfidenceInterval {
            lower: mean - margin,
            upper: mean + margin,
            level,
        },
        sample_count: n,
        outliers_removed: analysis.removed(),
        unfiltered: analysis.unfiltered,
        min: raw_min,
        max: raw_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED: [f64; 15] = [
        101.0, 99.5, 100.2, 98.9, 100.8, 250.0, 100.1, 99.7, 100.4, 100.0, 99.2, 100.6, 99.9,
        100.3, 40.0,
    ];

    #[test]
    fn test_basic_statistic() {
        let samples = [10.0, 12.0, 14.0];
        let stat = compute_statistic(&samples, &StatisticsConfig::default()).unwrap();

        assert_eq!(stat.mean, 12.0);
        assert_eq!(stat.median, 12.0);
        assert_eq!(stat.std_dev, 2.0);
        assert!((stat.std_error - 2.0 / 3f64.sqrt()).abs() < 1e-12);
        // t(0.995, 2) ≈ 9.925
        let margin = stat.margin_of_error();
        assert!((margin / stat.std_error - 9.925).abs() < 1e-3);
        assert_eq!(stat.sample_count, 3);
        assert!(!stat.unfiltered);
    }

    #[test]
    fn test_outliers_excluded_from_mean_but_not_extremes() {
        let stat = compute_statistic(&FIXED, &StatisticsConfig::default()).unwrap();

        assert_eq!(stat.outliers_removed, 2);
        assert_eq!(stat.sample_count, 13);
        assert!(stat.mean > 99.0 && stat.mean < 101.0);
        assert_eq!(stat.max, 250.0);
        assert_eq!(stat.min, 40.0);
        assert!(stat.confidence_interval.lower < stat.mean);
        assert!(stat.confidence_interval.upper > stat.mean);
        assert_eq!(stat.confidence_interval.level, 0.99);
    }

    #[test]
    fn test_values_inside_input_fences_count_toward_mean() {
        let samples = [1.0, 1.0, 1.0, 2.0, 50.0, 1.0, 9.0];
        let stat = compute_statistic(&samples, &StatisticsConfig::default()).unwrap();

        assert_eq!(stat.outliers_removed, 1);
        assert_eq!(stat.sample_count, 6);
        assert_eq!(stat.mean, 2.5);
    }

    #[test]
    fn test_bit_for_bit_deterministic() {
        let config = StatisticsConfig::default();
        let a = compute_statistic(&FIXED, &config).unwrap();
        let b = compute_statistic(&FIXED, &config).unwrap();

        assert_eq!(a.mean.to_bits(), b.mean.to_bits());
        assert_eq!(a.std_error.to_bits(), b.std_error.to_bits());
        assert_eq!(
            a.confidence_interval.upper.to_bits(),
            b.confidence_interval.upper.to_bits()
        );
    }

    #[test]
    fn test_constant_samples_have_zero_width_interval() {
        let stat = compute_statistic(&[5.0; 15], &StatisticsConfig::default()).unwrap();
        assert_eq!(stat.std_error, 0.0);
        assert_eq!(stat.confidence_interval.lower, 5.0);
        assert_eq!(stat.confidence_interval.upper, 5.0);
        assert_eq!(stat.relative_error(), 0.0);
    }

    #[test]
    fn test_unfiltered_flag_when_cleaning_would_starve() {
        let config = StatisticsConfig {
            min_samples: 5,
            ..StatisticsConfig::default()
        };
        let stat = compute_statistic(&[1.0, 1.0, 100.0, 1.0, 1.0], &config).unwrap();
        assert!(stat.unfiltered);
        assert_eq!(stat.sample_count, 5);
        assert_eq!(stat.outliers_removed, 0);
        assert_eq!(stat.mean, 20.8);
    }

    #[test]
    fn test_errors() {
        let config = StatisticsConfig::default();
        assert_eq!(
            compute_statistic(&[1.0, 2.0], &config),
            Err(StatisticsError::NotEnoughSamples { got: 2, min: 3 })
        );

        let bad = StatisticsConfig {
            confidence_level: 1.0,
            ..StatisticsConfig::default()
        };
        assert_eq!(
            compute_statistic(&[1.0, 2.0, 3.0], &bad),
            Err(StatisticsError::InvalidConfidenceLevel(1.0))
        );
    }
}
