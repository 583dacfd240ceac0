//! Statistics Computation
//!
//! Runs after every pipeline has been measured. Each pipeline's samples are
//! independent, so the work is spread across cores with Rayon; nothing is
//! being timed at this point.

use rayon::prelude::*;
use steadybench_core::{Pipeline, PipelineError, PipelineState};
use steadybench_stats::{Statistic, StatisticsConfig, StatisticsError, compute_statistic};

/// Compute statistics for every pipeline waiting in `Statistics` (parallelized with Rayon)
///
/// Returns one entry per pipeline, `None` for pipelines that already failed.
pub(crate) fn compute_statistics(
    pipelines: &[Pipeline],
    config: &StatisticsConfig,
) -> Vec<Option<Result<Statistic, StatisticsError>>> {
    pipelines
        .par_iter()
        .map(|p| match (p.state(), p.measurement()) {
            (PipelineState::Statistics, Some(m)) => {
                Some(compute_statistic(&m.per_invocation_ns, config))
            }
            _ => None,
        })
        .collect()
}

/// Move each pipeline to its terminal state; returns the statistics of `Done` ones.
pub(crate) fn finish_pipelines(
    pipelines: &mut [Pipeline],
    computed: Vec<Option<Result<Statistic, StatisticsError>>>,
) -> Vec<Option<Statistic>> {
    pipelines
        .iter_mut()
        .zip(computed)
        .map(|(pipeline, outcome)| match outcome {
            Some(Ok(stat)) => {
                pipeline.complete();
                Some(stat)
            }
            Some(Err(err)) => {
                pipeline.fail(match err {
                    StatisticsError::NotEnoughSamples { got, min } => {
                        PipelineError::InsufficientSamples { got, min }
                    }
                    other => PipelineError::Statistics(other.to_string()),
                });
                None
            }
            None => {
                // measurement errors already failed the pipeline
                if !pipeline.state().is_terminal() {
                    pipeline.fail(PipelineError::Statistics("no measurement recorded".to_string()));
                }
                None
            }
        })
        .collect()
}
