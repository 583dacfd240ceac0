//! Outlier Rejection
//!
//! Tukey's fences: values outside `[Q1 − k·IQR, Q3 + k·IQR]`, with the
//! quartiles taken over the input samples, are dropped in a single pass.
//!
//! When dropping them would leave fewer than the minimum number of samples,
//! nothing is removed and the analysis is marked `unfiltered`.

use crate::quantile::Quartiles;

/// How outliers are rejected before statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierMethod {
    /// Tukey's fences with multiplier `k` (1.5 is the classic choice)
    Iqr {
        /// IQR multiplier
        k: f64,
    },
    /// Keep every sample
    None,
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Iqr {
            k: crate::DEFAULT_IQR_MULTIPLIER,
        }
    }
}

/// Fence bounds of one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TukeyFences {
    /// Values below are outliers
    pub lower: f64,
    /// Values above are outliers
    pub upper: f64,
}

impl TukeyFences {
    /// Fences for `samples` with multiplier `k`
    pub fn of(samples: &[f64], k: f64) -> Self {
        let quartiles = Quartiles::of(samples);
        let iqr = quartiles.iqr();
        Self {
            lower: quartiles.q1 - k * iqr,
            upper: quartiles.q3 + k * iqr,
        }
    }

    /// Whether `value` lies inside the fences (inclusive)
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Result of outlier rejection
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierAnalysis {
    /// Samples kept, in input order
    pub retained: Vec<f64>,
    /// Samples below the lower fence that were dropped
    pub low_removed: usize,
    /// Samples above the upper fence that were dropped
    pub high_removed: usize,
    /// Fences computed from the input, `None` when rejection is disabled
    pub fences: Option<TukeyFences>,
    /// Rejection was skipped to keep the minimum sample count
    pub unfiltered: bool,
}

impl OutlierAnalysis {
    /// Total samples dropped
    pub fn removed(&self) -> usize {
        self.low_removed + self.high_removed
    }
}

/// Reject outliers from `samples`, keeping at least `min_retained` values.
pub fn reject_outliers(
    samples: &[f64],
    method: OutlierMethod,
    min_retained: usize,
) -> OutlierAnalysis {
    let mut analysis = OutlierAnalysis {
        retained: samples.to_vec(),
        low_removed: 0,
        high_removed: 0,
        fences: None,
        unfiltered: false,
    };

    let k = match method {
        OutlierMethod::Iqr { k } => k,
        OutlierMethod::None => return analysis,
    };

    let fences = TukeyFences::of(samples, k);
    analysis.fences = Some(fences);

    let kept: Vec<f64> = samples.iter().copied().filter(|&v| fences.contains(v)).collect();
    if kept.len() == samples.len() {
        return analysis;
    }
    if kept.len() < min_retained {
        analysis.unfiltered = true;
        return analysis;
    }

    analysis.low_removed = samples.iter().filter(|&&v| v < fences.lower).count();
    analysis.high_removed = samples.len() - kept.len() - analysis.low_removed;
    analysis.retained = kept;
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_data_is_untouched() {
        let samples = [10.0, 11.0, 10.5, 9.8, 10.2];
        let analysis = reject_outliers(&samples, OutlierMethod::default(), 3);
        assert_eq!(analysis.retained, samples.to_vec());
        assert_eq!(analysis.removed(), 0);
        assert!(!analysis.unfiltered);
    }

    #[test]
    fn test_high_outlier_removed_and_order_kept() {
        let samples = [10.0, 11.0, 100.0, 10.5, 9.8, 10.2];
        let analysis = reject_outliers(&samples, OutlierMethod::default(), 3);
        assert_eq!(analysis.retained, vec![10.0, 11.0, 10.5, 9.8, 10.2]);
        assert_eq!(analysis.high_removed, 1);
        assert_eq!(analysis.low_removed, 0);
    }

    #[test]
    fn test_rejection_is_idempotent() {
        let samples = [10.0, 11.0, 100.0, 10.5, 9.8, 10.2];
        let once = reject_outliers(&samples, OutlierMethod::default(), 3);
        let twice = reject_outliers(&once.retained, OutlierMethod::default(), 3);

        assert_eq!(once.removed(), 1);
        assert_eq!(twice.retained, once.retained);
        assert_eq!(twice.removed(), 0);
        assert!(!twice.unfiltered);
    }

    #[test]
    fn test_single_pass_uses_input_fences() {
        // Q1 = 1, Q3 = 5.5: fences [-5.75, 12.25] keep 9.0 and drop only 50.0
        let samples = [1.0, 1.0, 1.0, 2.0, 50.0, 1.0, 9.0];
        let analysis = reject_outliers(&samples, OutlierMethod::default(), 3);

        assert_eq!(
            analysis.fences,
            Some(TukeyFences {
                lower: -5.75,
                upper: 12.25
            })
        );
        assert_eq!(analysis.retained, vec![1.0, 1.0, 1.0, 2.0, 1.0, 9.0]);
        assert_eq!(analysis.high_removed, 1);
        assert!(!analysis.unfiltered);
    }

    #[test]
    fn test_unfiltered_depends_only_on_input_and_minimum() {
        let samples = [1.0, 1.0, 1.0, 2.0, 50.0, 1.0, 9.0];

        let six = reject_outliers(&samples, OutlierMethod::default(), 6);
        assert!(!six.unfiltered);
        assert_eq!(six.retained.len(), 6);
        assert_eq!(reject_outliers(&samples, OutlierMethod::default(), 6), six);

        let seven = reject_outliers(&samples, OutlierMethod::default(), 7);
        assert!(seven.unfiltered);
        assert_eq!(seven.retained, samples.to_vec());
        assert_eq!(seven.removed(), 0);
    }

    #[test]
    fn test_minimum_prevents_first_pass() {
        // IQR is zero, so the fences would drop 100.0 and leave four
        let samples = [1.0, 1.0, 100.0, 1.0, 1.0];
        let analysis = reject_outliers(&samples, OutlierMethod::default(), 5);
        assert!(analysis.unfiltered);
        assert_eq!(analysis.retained, samples.to_vec());
        assert_eq!(analysis.removed(), 0);

        let relaxed = reject_outliers(&samples, OutlierMethod::default(), 4);
        assert!(!relaxed.unfiltered);
        assert_eq!(relaxed.retained, vec![1.0; 4]);
    }

    #[test]
    fn test_method_none_keeps_everything() {
        let samples = [1.0, 2.0, 1_000.0];
        let analysis = reject_outliers(&samples, OutlierMethod::None, 3);
        assert_eq!(analysis.retained.len(), 3);
        assert!(!analysis.unfiltered);
    }
}
