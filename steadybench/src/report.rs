//! Report Building
//!
//! Turns finished pipelines into [`CaseResult`] rows and runs the baseline
//! normalization pass.
//!
//! ```text
//! Pipeline + Option<Statistic>
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │    CaseMetrics      │  timing stats + pilot/warmup facts + allocations
//!   └──────────┬──────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │ Baseline Normalizer │  per (group, parameter tuple)
//!   └─────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use steadybench_core::Pipeline;
use steadybench_report::{CaseMetrics, CaseResult, PipelineStatus, RatioMetrics};
use steadybench_stats::{BaselineRatio, Estimate, Statistic, ratio_to_baseline};

/// One row per pipeline, in execution order
pub(crate) fn build_results(
    pipelines: &[Pipeline],
    statistics: &[Option<Statistic>],
) -> Vec<CaseResult> {
    pipelines
        .iter()
        .zip(statistics)
        .map(|(pipeline, stat)| {
            let id = pipeline.id();
            let status = match pipeline.state().failure() {
                Some(err) => PipelineStatus::from(err),
                None => PipelineStatus::Done,
            };

            let metrics = stat.as_ref().filter(|_| status.is_done()).map(|stat| {
                let mut metrics = CaseMetrics::from_statistic(stat);
                if let (Some(pilot), Some(warmup)) = (pipeline.pilot(), pipeline.warmup()) {
                    metrics =
                        metrics.with_pipeline(pilot.repetitions, warmup.batches, warmup.stable);
                }
                metrics.with_allocated_bytes(
                    pipeline
                        .measurement()
                        .and_then(|m| m.allocated_bytes_per_invocation()),
                )
            });

            CaseResult {
                group: id.group.clone(),
                case: id.case.clone(),
                description: pipeline.description().map(str::to_string),
                parameters: id.parameters.clone(),
                tuple_index: id.tuple_index,
                is_baseline: pipeline.is_baseline(),
                status,
                metrics,
                ratio: None,
            }
        })
        .collect()
}

/// Fill in `ratio` for every result whose (group, tuple) has a usable baseline.
///
/// Returns a warning for each (group, tuple) whose baseline failed or has a
/// zero mean.
pub(crate) fn normalize(results: &mut [CaseResult]) -> Vec<String> {
    let mut baselines: HashMap<(String, usize), Option<Estimate>> = HashMap::new();
    for result in results.iter().filter(|r| r.is_baseline) {
        let estimate = result.metrics.as_ref().map(|m| Estimate {
            mean: m.mean_ns,
            std_error: m.std_error_ns,
        });
        baselines.insert((result.group.clone(), result.tuple_index), estimate);
    }

    let mut warnings = Vec::new();
    let mut warned = HashSet::new();

    for result in results.iter_mut() {
        let key = (result.group.clone(), result.tuple_index);
        let Some(baseline) = baselines.get(&key) else {
            continue;
        };
        let Some(metrics) = &result.metrics else {
            continue;
        };

        let ratio = match baseline {
            Some(_) if result.is_baseline => Some(BaselineRatio::IDENTITY),
            Some(base) => ratio_to_baseline(
                Estimate {
                    mean: metrics.mean_ns,
                    std_error: metrics.std_error_ns,
                },
                *base,
            ),
            None => None,
        };

        if ratio.is_none() && warned.insert(key) {
            let label = if result.parameters.is_empty() {
                result.group.clone()
            } else {
                format!("{}({})", result.group, result.parameters)
            };
            let message = match baseline {
                None => format!("baseline of {label} failed; ratios omitted"),
                Some(_) => format!("baseline of {label} has a zero mean; ratios omitted"),
            };
            tracing::warn!("{message}");
            warnings.push(message);
        }

        result.ratio = ratio.map(RatioMetrics::from);
    }

    warnings
}
