#![warn(missing_docs)]
//! SteadyBench Statistical Engine
//!
//! Pure, deterministic statistics over per-invocation timings:
//! - Quantiles by linear interpolation between closest ranks
//! - Single-pass Tukey IQR outlier rejection with a minimum-sample floor
//! - Student-t critical values from the regularized incomplete beta function
//! - Mean, standard error and confidence interval ([`Statistic`])
//! - Baseline ratios with propagated relative error

mod normalize;
mod outliers;
mod quantile;
mod statistic;
mod student_t;

pub use normalize::{BaselineRatio, Estimate, ratio_to_baseline};
pub use outliers::{OutlierAnalysis, OutlierMethod, TukeyFences, reject_outliers};
pub use quantile::{Quartiles, min_max, quantile, quantile_sorted, sorted};
pub use statistic::{
    ConfidenceInterval, Statistic, StatisticsConfig, StatisticsError, compute_statistic,
};
pub use student_t::{
    critical_value, ln_gamma, regularized_incomplete_beta, student_t_cdf, student_t_quantile,
};

/// Default two-sided confidence level (99%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.99;

/// Default fewest samples a statistic is computed from
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Default Tukey fence multiplier
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_agree() {
        let config = StatisticsConfig::default();
        assert_eq!(config.confidence_level, DEFAULT_CONFIDENCE_LEVEL);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
        assert_eq!(
            config.outlier_method,
            OutlierMethod::Iqr {
                k: DEFAULT_IQR_MULTIPLIER
            }
        );
    }
}
