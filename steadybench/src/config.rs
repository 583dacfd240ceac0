//! Configuration
//!
//! [`HarnessConfig`] is the typed runtime configuration handed to
//! [`Harness`](crate::Harness). It can be built in code or loaded from a
//! `steadybench.toml` file ([`SteadyConfig`]), discovered by walking up from
//! the current directory.

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use steadybench_core::{ConfigurationError, MeasurementConfig, PilotConfig, WarmupConfig};
use steadybench_report::ReportConfig;
use steadybench_stats::{OutlierMethod, StatisticsConfig};

/// File name looked up by [`SteadyConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "steadybench.toml";

// ─── Runtime configuration ──────────────────────────────────────────────────

/// Everything a run needs, with typed durations and counts
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    /// Repetition calibration
    pub pilot: PilotConfig,
    /// Steady-state detection
    pub warmup: WarmupConfig,
    /// Measured batches
    pub measurement: MeasurementConfig,
    /// Outlier rejection and confidence intervals
    pub statistics: StatisticsConfig,
    /// Pin the measuring thread to this CPU (Linux only)
    pub pin_cpu: Option<usize>,
    /// Only run cases whose `group/case` matches this regex
    pub filter: Option<String>,
}

impl HarnessConfig {
    /// Reject inconsistent settings; returns the compiled case filter.
    pub fn validate(&self) -> Result<Option<Regex>, ConfigurationError> {
        if self.pilot.resolution_multiple == 0 {
            return Err(ConfigurationError::invalid(
                "pilot.resolution_multiple",
                "must be at least 1",
            ));
        }
        if self.pilot.max_repetitions == 0 {
            return Err(ConfigurationError::invalid("pilot.max_repetitions", "must be at least 1"));
        }
        if self.pilot.max_resolution.is_zero() {
            return Err(ConfigurationError::invalid("pilot.max_resolution", "must be positive"));
        }

        if self.warmup.window < 2 {
            return Err(ConfigurationError::invalid("warmup.window", "must be at least 2 batches"));
        }
        if !(self.warmup.cv_threshold.is_finite() && self.warmup.cv_threshold > 0.0) {
            return Err(ConfigurationError::invalid(
                "warmup.cv_threshold",
                "must be a positive number",
            ));
        }
        if self.warmup.consecutive_windows == 0 {
            return Err(ConfigurationError::invalid(
                "warmup.consecutive_windows",
                "must be at least 1",
            ));
        }
        if self.warmup.max_batches == 0 {
            return Err(ConfigurationError::invalid("warmup.max_batches", "must be at least 1"));
        }

        if self.statistics.min_samples < 2 {
            return Err(ConfigurationError::invalid("statistics.min_samples", "must be at least 2"));
        }
        if self.measurement.batches < self.statistics.min_samples {
            return Err(ConfigurationError::invalid(
                "measurement.batches",
                format!(
                    "{} batches cannot satisfy min_samples = {}",
                    self.measurement.batches, self.statistics.min_samples
                ),
            ));
        }
        let level = self.statistics.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(ConfigurationError::invalid(
                "statistics.confidence_level",
                "must be inside (0, 1)",
            ));
        }
        if let OutlierMethod::Iqr { k } = self.statistics.outlier_method {
            if !(k.is_finite() && k > 0.0) {
                return Err(ConfigurationError::invalid(
                    "statistics.iqr_multiplier",
                    "must be a positive number",
                ));
            }
        }

        for (name, budget) in [
            ("pilot.budget", self.pilot.budget),
            ("warmup.budget", self.warmup.budget),
            ("measurement.budget", self.measurement.budget),
        ] {
            if budget.is_zero() {
                return Err(ConfigurationError::invalid(name, "must be positive"));
            }
        }

        self.filter
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigurationError::invalid("runner.filter", e.to_string()))
    }

    /// Snapshot recorded in report metadata
    pub fn report_config(&self) -> ReportConfig {
        let millis = |d: Duration| d.as_millis() as u64;
        ReportConfig {
            resolution_multiple: self.pilot.resolution_multiple,
            max_repetitions: self.pilot.max_repetitions,
            max_resolution_ns: self.pilot.max_resolution.as_nanos() as u64,
            warmup_window: self.warmup.window,
            warmup_cv_threshold: self.warmup.cv_threshold,
            warmup_consecutive_windows: self.warmup.consecutive_windows,
            warmup_max_batches: self.warmup.max_batches,
            measurement_batches: self.measurement.batches,
            iqr_multiplier: match self.statistics.outlier_method {
                OutlierMethod::Iqr { k } => Some(k),
                OutlierMethod::None => None,
            },
            confidence_level: self.statistics.confidence_level,
            min_samples: self.statistics.min_samples,
            pilot_budget_ms: millis(self.pilot.budget),
            warmup_budget_ms: millis(self.warmup.budget),
            measurement_budget_ms: millis(self.measurement.budget),
            filter: self.filter.clone(),
        }
    }
}

// ─── File configuration ─────────────────────────────────────────────────────

/// Contents of `steadybench.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SteadyConfig {
    /// Pilot phase
    #[serde(default)]
    pub pilot: PilotSection,
    /// Warmup phase
    #[serde(default)]
    pub warmup: WarmupSection,
    /// Measurement phase
    #[serde(default)]
    pub measurement: MeasurementSection,
    /// Statistics phase
    #[serde(default)]
    pub statistics: StatisticsSection,
    /// Run-wide options
    #[serde(default)]
    pub runner: RunnerSection,
}

/// `[pilot]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotSection {
    /// Batch length in clock ticks
    #[serde(default = "default_resolution_multiple")]
    pub resolution_multiple: u64,
    /// Repetition cap
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: u64,
    /// Coarsest acceptable clock resolution (e.g. "1ms")
    #[serde(default = "default_max_resolution")]
    pub max_resolution: String,
    /// Phase budget (e.g. "10s")
    #[serde(default = "default_phase_budget")]
    pub budget: String,
}

impl Default for PilotSection {
    fn default() -> Self {
        Self {
            resolution_multiple: default_resolution_multiple(),
            max_repetitions: default_max_repetitions(),
            max_resolution: default_max_resolution(),
            budget: default_phase_budget(),
        }
    }
}

/// `[warmup]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupSection {
    /// Sliding window length in batches
    #[serde(default = "default_window")]
    pub window: usize,
    /// Coefficient of variation below which a window is stable
    #[serde(default = "default_cv_threshold")]
    pub cv_threshold: f64,
    /// Stable windows needed in a row
    #[serde(default = "default_consecutive_windows")]
    pub consecutive_windows: usize,
    /// Give up (unstable) after this many batches
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,
    /// Phase budget
    #[serde(default = "default_phase_budget")]
    pub budget: String,
}

impl Default for WarmupSection {
    fn default() -> Self {
        Self {
            window: default_window(),
            cv_threshold: default_cv_threshold(),
            consecutive_windows: default_consecutive_windows(),
            max_batches: default_max_batches(),
            budget: default_phase_budget(),
        }
    }
}

/// `[measurement]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSection {
    /// Measured batches per pipeline
    #[serde(default = "default_batches")]
    pub batches: usize,
    /// Record allocated bytes (needs `TrackingAllocator`)
    #[serde(default = "default_true")]
    pub track_allocations: bool,
    /// Measure and subtract the sink overhead
    #[serde(default = "default_true")]
    pub subtract_sink_overhead: bool,
    /// Phase budget
    #[serde(default = "default_measurement_budget")]
    pub budget: String,
}

impl Default for MeasurementSection {
    fn default() -> Self {
        Self {
            batches: default_batches(),
            track_allocations: true,
            subtract_sink_overhead: true,
            budget: default_measurement_budget(),
        }
    }
}

/// `[statistics]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsSection {
    /// Apply Tukey outlier rejection
    #[serde(default = "default_true")]
    pub outlier_rejection: bool,
    /// Tukey fence multiplier
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
    /// Confidence level of the interval
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Fewest samples a statistic may use
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

impl Default for StatisticsSection {
    fn default() -> Self {
        Self {
            outlier_rejection: true,
            iqr_multiplier: default_iqr_multiplier(),
            confidence_level: default_confidence_level(),
            min_samples: default_min_samples(),
        }
    }
}

/// `[runner]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerSection {
    /// CPU to pin the measuring thread to
    #[serde(default)]
    pub pin_cpu: Option<usize>,
    /// Regex over `group/case`
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_resolution_multiple() -> u64 {
    100
}
fn default_max_repetitions() -> u64 {
    steadybench_core::MAX_REPETITIONS
}
fn default_max_resolution() -> String {
    "1ms".to_string()
}
fn default_phase_budget() -> String {
    "10s".to_string()
}
fn default_window() -> usize {
    5
}
fn default_cv_threshold() -> f64 {
    0.02
}
fn default_consecutive_windows() -> usize {
    3
}
fn default_max_batches() -> usize {
    100
}
fn default_batches() -> usize {
    steadybench_core::DEFAULT_BATCH_COUNT
}
fn default_true() -> bool {
    true
}
fn default_measurement_budget() -> String {
    "30s".to_string()
}
fn default_iqr_multiplier() -> f64 {
    steadybench_stats::DEFAULT_IQR_MULTIPLIER
}
fn default_confidence_level() -> f64 {
    steadybench_stats::DEFAULT_CONFIDENCE_LEVEL
}
fn default_min_samples() -> usize {
    steadybench_stats::DEFAULT_MIN_SAMPLES
}

impl SteadyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Find `steadybench.toml` by walking up from the current directory.
    ///
    /// `Ok(None)` when no file exists; a file that fails to load is an error.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Convert to a validated [`HarnessConfig`]
    pub fn into_harness_config(self) -> anyhow::Result<HarnessConfig> {
        let config = HarnessConfig {
            pilot: PilotConfig {
                resolution_multiple: self.pilot.resolution_multiple,
                max_repetitions: self.pilot.max_repetitions,
                max_resolution: parse_duration(&self.pilot.max_resolution)
                    .context("pilot.max_resolution")?,
                budget: parse_duration(&self.pilot.budget).context("pilot.budget")?,
            },
            warmup: WarmupConfig {
                window: self.warmup.window,
                cv_threshold: self.warmup.cv_threshold,
                consecutive_windows: self.warmup.consecutive_windows,
                max_batches: self.warmup.max_batches,
                budget: parse_duration(&self.warmup.budget).context("warmup.budget")?,
            },
            measurement: MeasurementConfig {
                batches: self.measurement.batches,
                track_allocations: self.measurement.track_allocations,
                subtract_sink_overhead: self.measurement.subtract_sink_overhead,
                budget: parse_duration(&self.measurement.budget).context("measurement.budget")?,
            },
            statistics: StatisticsConfig {
                outlier_method: if self.statistics.outlier_rejection {
                    OutlierMethod::Iqr {
                        k: self.statistics.iqr_multiplier,
                    }
                } else {
                    OutlierMethod::None
                },
                confidence_level: self.statistics.confidence_level,
                min_samples: self.statistics.min_samples,
            },
            pin_cpu: self.runner.pin_cpu,
            filter: self.runner.filter,
        };

        config.validate()?;
        Ok(config)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# SteadyBench Configuration

[pilot]
# Each batch must last at least this many clock ticks
resolution_multiple = 100
# Upper bound on invocations per batch (2^30)
max_repetitions = 1073741824
# Refuse clocks coarser than this
max_resolution = "1ms"
# Wall-clock budget of the pilot phase
budget = "10s"

[warmup]
# Batches per sliding window
window = 5
# Coefficient of variation below which a window is stable
cv_threshold = 0.02
# Stable windows required in a row
consecutive_windows = 3
# Proceed (flagged unstable) after this many batches
max_batches = 100
budget = "10s"

[measurement]
# Measured batches per case and parameter tuple
batches = 15
# Record allocated bytes (install TrackingAllocator as the global allocator)
track_allocations = true
# Measure the sink's own cost once and subtract it from every case
subtract_sink_overhead = true
budget = "30s"

[statistics]
# Tukey IQR outlier rejection
outlier_rejection = true
iqr_multiplier = 1.5
# Two-sided confidence level of the interval around the mean
confidence_level = 0.99
# Never compute a statistic from fewer samples than this
min_samples = 3

[runner]
# Pin the measuring thread to one CPU (uncomment to enable)
# pin_cpu = 0
# Only run cases whose "group/case" matches (uncomment to enable)
# filter = "^sort/"
"#
        .to_string()
    }
}

/// Parse a duration string ("3s", "500ms", "250us", "2m"); bare numbers are seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration string");
    }

    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic() || *c == 'µ')
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration number: {num_part}"))?;
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("duration must be a non-negative number: {s}");
    }

    let nanos_per_unit: f64 = match unit_part.trim().to_lowercase().as_str() {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "s" | "" => 1e9,
        "m" | "min" => 60e9,
        other => anyhow::bail!("unknown duration unit: {other}"),
    };

    Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
}
