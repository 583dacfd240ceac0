//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steadybench_core::{Phase, PipelineError};
use steadybench_stats::{BaselineRatio, Statistic};

/// Version of the serialized layout below
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result set of one harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub results: Vec<CaseResult>,
    pub summary: ReportSummary,
}

impl Report {
    /// Assemble a report and derive its summary
    pub fn new(meta: ReportMeta, results: Vec<CaseResult>, total_duration_ms: f64) -> Self {
        let summary = ReportSummary::from_results(&results, total_duration_ms);
        Self {
            meta,
            results,
            summary,
        }
    }

    /// First result for `group/case`
    pub fn find(&self, group: &str, case: &str) -> Option<&CaseResult> {
        self.results
            .iter()
            .find(|r| r.group == group && r.case == case)
    }

    /// Result for `group/case` at parameter tuple `tuple_index`
    pub fn find_tuple(&self, group: &str, case: &str, tuple_index: usize) -> Option<&CaseResult> {
        self.results
            .iter()
            .find(|r| r.group == group && r.case == case && r.tuple_index == tuple_index)
    }

    /// Results whose pipeline failed
    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| !r.status.is_done())
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
    /// Resolution of the clock used for timing, if it has one
    pub clock_resolution_ns: Option<u64>,
    /// Sink overhead subtracted from every per-invocation time
    pub sink_overhead_ns: f64,
    /// Whether allocated bytes were recorded in this run
    pub allocation_tracking: bool,
    /// Run-level degradations (allocation tracking, calibration, baselines)
    pub warnings: Vec<String>,
    pub config: ReportConfig,
}

/// Execution configuration captured in report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub resolution_multiple: u64,
    pub max_repetitions: u64,
    pub max_resolution_ns: u64,
    pub warmup_window: usize,
    pub warmup_cv_threshold: f64,
    pub warmup_consecutive_windows: usize,
    pub warmup_max_batches: usize,
    pub measurement_batches: usize,
    /// Tukey multiplier; absent when outlier rejection is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iqr_multiplier: Option<f64>,
    pub confidence_level: f64,
    pub min_samples: usize,
    pub pilot_budget_ms: u64,
    pub warmup_budget_ms: u64,
    pub measurement_budget_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
    /// CPU the measurement thread was pinned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_cpu: Option<usize>,
}

/// One (case, parameter tuple) row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub group: String,
    pub case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered parameter tuple; empty for unit groups
    pub parameters: String,
    pub tuple_index: usize,
    pub is_baseline: bool,
    pub status: PipelineStatus,
    /// Present only for `Done` pipelines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CaseMetrics>,
    /// Present only when the group has a usable baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<RatioMetrics>,
}

impl CaseResult {
    /// `group/case` or `group/case(parameters)`
    pub fn label(&self) -> String {
        if self.parameters.is_empty() {
            format!("{}/{}", self.group, self.case)
        } else {
            format!("{}/{}({})", self.group, self.case, self.parameters)
        }
    }

    /// Mean nanoseconds per invocation, for `Done` pipelines
    pub fn mean_ns(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.mean_ns)
    }
}

/// Terminal state of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PipelineStatus {
    Done,
    Failed {
        /// Machine-readable failure code
        code: String,
        /// Phase that ran out of budget, for timeouts
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<Phase>,
        reason: String,
    },
}

impl PipelineStatus {
    /// Whether statistics are available
    pub fn is_done(&self) -> bool {
        matches!(self, PipelineStatus::Done)
    }

    /// Failure code, if failed
    pub fn failure_code(&self) -> Option<&str> {
        match self {
            PipelineStatus::Done => None,
            PipelineStatus::Failed { code, .. } => Some(code),
        }
    }
}

impl From<&PipelineError> for PipelineStatus {
    fn from(err: &PipelineError) -> Self {
        PipelineStatus::Failed {
            code: err.code().to_string(),
            phase: err.timed_out_phase(),
            reason: err.to_string(),
        }
    }
}

/// Timing and allocation metrics of a finished pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetrics {
    pub mean_ns: f64,
    pub median_ns: f64,
    pub std_dev_ns: f64,
    pub std_error_ns: f64,
    pub ci_lower_ns: f64,
    pub ci_upper_ns: f64,
    pub ci_level: f64,
    pub min_ns: f64,
    pub max_ns: f64,
    pub samples_used: usize,
    pub outliers_removed: usize,
    /// Outlier rejection was skipped to keep the minimum sample count
    pub unfiltered: bool,
    /// Invocations per measured batch
    pub repetitions: u64,
    pub warmup_batches: usize,
    /// Warmup hit its batch limit without a steady state
    pub unstable_warmup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_bytes: Option<u64>,
}

impl CaseMetrics {
    /// Metrics from a statistic; pipeline details start at their defaults
    pub fn from_statistic(stat: &Statistic) -> Self {
        Self {
            mean_ns: stat.mean,
            median_ns: stat.median,
            std_dev_ns: stat.std_dev,
            std_error_ns: stat.std_error,
            ci_lower_ns: stat.confidence_interval.lower,
            ci_upper_ns: stat.confidence_interval.upper,
            ci_level: stat.confidence_interval.level,
            min_ns: stat.min,
            max_ns: stat.max,
            samples_used: stat.sample_count,
            outliers_removed: stat.outliers_removed,
            unfiltered: stat.unfiltered,
            repetitions: 0,
            warmup_batches: 0,
            unstable_warmup: false,
            allocated_bytes: None,
        }
    }

    /// Record pilot and warmup outcomes
    pub fn with_pipeline(mut self, repetitions: u64, warmup_batches: usize, stable: bool) -> Self {
        self.repetitions = repetitions;
        self.warmup_batches = warmup_batches;
        self.unstable_warmup = !stable;
        self
    }

    /// Record allocated bytes per invocation
    pub fn with_allocated_bytes(mut self, allocated_bytes: Option<u64>) -> Self {
        self.allocated_bytes = allocated_bytes;
        self
    }

    /// `std_error / mean`
    pub fn relative_error(&self) -> f64 {
        if self.std_error_ns == 0.0 {
            0.0
        } else {
            self.std_error_ns / self.mean_ns.abs()
        }
    }
}

/// Ratio to the group baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioMetrics {
    pub ratio: f64,
    pub error: f64,
}

impl From<BaselineRatio> for RatioMetrics {
    fn from(r: BaselineRatio) -> Self {
        Self {
            ratio: r.ratio,
            error: r.error,
        }
    }
}

/// Report summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub unstable_warmups: usize,
    pub unfiltered: usize,
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Count outcomes across `results`
    pub fn from_results(results: &[CaseResult], total_duration_ms: f64) -> Self {
        let mut summary = ReportSummary {
            total: results.len(),
            total_duration_ms,
            ..Default::default()
        };

        for result in results {
            match &result.status {
                PipelineStatus::Done => summary.done += 1,
                PipelineStatus::Failed { phase, .. } => {
                    summary.failed += 1;
                    if phase.is_some() {
                        summary.timed_out += 1;
                    }
                }
            }
            if let Some(metrics) = &result.metrics {
                summary.unstable_warmups += usize::from(metrics.unstable_warmup);
                summary.unfiltered += usize::from(metrics.unfiltered);
            }
        }

        summary
    }

    /// Whether every pipeline finished
    pub fn all_done(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use steadybench_stats::{StatisticsConfig, compute_statistic};

    fn meta() -> ReportMeta {
        ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: "0.1.0".to_string(),
            timestamp: Utc::now(),
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "test cpu".to_string(),
                cpu_cores: 4,
                pinned_cpu: None,
            },
            clock_resolution_ns: Some(1),
            sink_overhead_ns: 0.0,
            allocation_tracking: false,
            warnings: vec![],
            config: ReportConfig {
                resolution_multiple: 100,
                max_repetitions: 1 << 30,
                max_resolution_ns: 1_000_000,
                warmup_window: 5,
                warmup_cv_threshold: 0.02,
                warmup_consecutive_windows: 3,
                warmup_max_batches: 100,
                measurement_batches: 15,
                iqr_multiplier: Some(1.5),
                confidence_level: 0.99,
                min_samples: 3,
                pilot_budget_ms: 10_000,
                warmup_budget_ms: 10_000,
                measurement_budget_ms: 30_000,
                filter: None,
            },
        }
    }

    fn done(case: &str, mean: f64) -> CaseResult {
        let stat = compute_statistic(&[mean; 5], &StatisticsConfig::default()).unwrap();
        CaseResult {
            group: "g".to_string(),
            case: case.to_string(),
            description: None,
            parameters: String::new(),
            tuple_index: 0,
            is_baseline: false,
            status: PipelineStatus::Done,
            metrics: Some(CaseMetrics::from_statistic(&stat).with_pipeline(64, 7, true)),
            ratio: None,
        }
    }

    fn timed_out(case: &str) -> CaseResult {
        let err = PipelineError::Timeout {
            phase: Phase::Warmup,
            budget: Duration::from_millis(1),
        };
        CaseResult {
            status: PipelineStatus::from(&err),
            metrics: None,
            ..done(case, 1.0)
        }
    }

    #[test]
    fn test_summary_counts() {
        let report = Report::new(meta(), vec![done("a", 10.0), timed_out("b")], 12.5);

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.done, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.timed_out, 1);
        assert!(!report.summary.all_done());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.find("g", "a").and_then(|r| r.mean_ns()), Some(10.0));
    }

    #[test]
    fn test_failed_status_serializes_with_reason() {
        let json = serde_json::to_value(timed_out("slow")).unwrap();

        assert_eq!(json["status"]["state"], "failed");
        assert_eq!(json["status"]["code"], "timeout");
        assert_eq!(json["status"]["phase"], "warmup");
        assert!(json.get("metrics").is_none());
        assert!(json.get("ratio").is_none());
    }

    #[test]
    fn test_absent_optionals_are_skipped() {
        let json = serde_json::to_value(done("a", 3.0)).unwrap();
        assert_eq!(json["status"]["state"], "done");
        assert!(json["metrics"].get("allocated_bytes").is_none());
        assert!(json.get("description").is_none());
        assert_eq!(json["metrics"]["repetitions"], 64);
    }

    #[test]
    fn test_report_json_roundtrip_keeps_ratio() {
        let mut case = done("fast", 5.0);
        case.ratio = Some(RatioMetrics::from(BaselineRatio {
            ratio: 0.5,
            error: 0.01,
        }));
        let report = Report::new(meta(), vec![case], 1.0);

        let text = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&text).unwrap();
        assert_eq!(back.results[0].ratio, Some(RatioMetrics { ratio: 0.5, error: 0.01 }));
        assert_eq!(back.summary, report.summary);
        assert_eq!(back.meta.config, report.meta.config);
    }

    #[test]
    fn test_label() {
        let mut r = done("a", 1.0);
        assert_eq!(r.label(), "g/a");
        r.parameters = "1024".to_string();
        assert_eq!(r.label(), "g/a(1024)");
    }
}
