//! Pipeline State Machine and Runner
//!
//! A pipeline is the measurement of one (case, parameter tuple) pair:
//!
//! ```text
//! Pending → Piloting → WarmingUp → Measuring → Statistics → Done
//!    └──────────┴───────────┴───────────┴───────────┴──→ Failed(reason)
//! ```
//!
//! [`PipelineRunner`] drives the first four transitions on the calling
//! thread. The statistics step belongs to the caller, which finishes the
//! pipeline with [`Pipeline::complete`] or [`Pipeline::fail`].

use crate::allocator::AllocationCounter;
use crate::clock::Clock;
use crate::engine::{Measurement, MeasurementConfig, MeasurementEngine};
use crate::error::{Phase, PipelineError, panic_message};
use crate::pilot::{PilotConfig, PilotEstimate, PilotEstimator};
use crate::registry::Routine;
use crate::sink::BlackHole;
use crate::warmup::{WarmupConfig, WarmupController, WarmupOutcome};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Repetition cap used when calibrating the empty-case overhead
pub const OVERHEAD_MAX_REPETITIONS: u64 = 1 << 16;

// ─── Budgets ────────────────────────────────────────────────────────────────

/// Wall-clock allowance for one phase.
///
/// Always measured with `std::time::Instant`, independent of the clock under
/// which the benchmark itself is timed.
#[derive(Debug, Clone, Copy)]
pub struct PhaseBudget {
    phase: Phase,
    limit: Duration,
    started: Instant,
}

impl PhaseBudget {
    /// Start counting down
    pub fn start(phase: Phase, limit: Duration) -> Self {
        Self {
            phase,
            limit,
            started: Instant::now(),
        }
    }

    /// Fail with [`PipelineError::Timeout`] once the limit has passed
    #[inline]
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.started.elapsed() > self.limit {
            Err(PipelineError::Timeout {
                phase: self.phase,
                budget: self.limit,
            })
        } else {
            Ok(())
        }
    }
}

// ─── State machine ──────────────────────────────────────────────────────────

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Planned, not started
    Pending,
    /// Calibrating repetitions per batch
    Piloting,
    /// Waiting for a steady state
    WarmingUp,
    /// Running measured batches
    Measuring,
    /// Samples collected, statistics outstanding
    Statistics,
    /// Finished with statistics
    Done,
    /// Finished without statistics
    Failed(PipelineError),
}

impl PipelineState {
    /// `Done` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// Failure reason, if failed
    pub fn failure(&self) -> Option<&PipelineError> {
        match self {
            PipelineState::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn ordinal(&self) -> Option<u8> {
        match self {
            PipelineState::Pending => Some(0),
            PipelineState::Piloting => Some(1),
            PipelineState::WarmingUp => Some(2),
            PipelineState::Measuring => Some(3),
            PipelineState::Statistics => Some(4),
            PipelineState::Done => Some(5),
            PipelineState::Failed(_) => None,
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: &PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.ordinal(), next.ordinal()) {
            (_, None) => true,
            (Some(from), Some(to)) => to == from + 1,
            (None, Some(_)) => false,
        }
    }

    /// Lower-case state name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Pending => "pending",
            PipelineState::Piloting => "piloting",
            PipelineState::WarmingUp => "warming-up",
            PipelineState::Measuring => "measuring",
            PipelineState::Statistics => "statistics",
            PipelineState::Done => "done",
            PipelineState::Failed(_) => "failed",
        }
    }
}

/// Identity of one (case, parameter tuple) pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineId {
    /// Owning parameter group
    pub group: String,
    /// Case name, unique within the group
    pub case: String,
    /// Human-readable parameter tuple
    pub parameters: String,
    /// Position of the tuple within the group
    pub tuple_index: usize,
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.parameters.is_empty() {
            write!(f, "{}/{}", self.group, self.case)
        } else {
            write!(f, "{}/{}({})", self.group, self.case, self.parameters)
        }
    }
}

/// One pipeline and everything it has produced so far
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: PipelineId,
    description: Option<String>,
    is_baseline: bool,
    state: PipelineState,
    pilot: Option<PilotEstimate>,
    warmup: Option<WarmupOutcome>,
    measurement: Option<Measurement>,
}

impl Pipeline {
    /// New pipeline in `Pending`
    pub fn new(id: PipelineId, description: Option<String>, is_baseline: bool) -> Self {
        Self {
            id,
            description,
            is_baseline,
            state: PipelineState::Pending,
            pilot: None,
            warmup: None,
            measurement: None,
        }
    }

    /// Pipeline identity
    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    /// Case description, if registered with one
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the case is its group's baseline
    pub fn is_baseline(&self) -> bool {
        self.is_baseline
    }

    /// Current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Pilot result, once piloting finished
    pub fn pilot(&self) -> Option<&PilotEstimate> {
        self.pilot.as_ref()
    }

    /// Warmup result, once warmup finished
    pub fn warmup(&self) -> Option<&WarmupOutcome> {
        self.warmup.as_ref()
    }

    /// Measured batches, once measurement finished
    pub fn measurement(&self) -> Option<&Measurement> {
        self.measurement.as_ref()
    }

    /// Move to the next lifecycle state
    pub fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal pipeline transition {} -> {}",
            self.state.name(),
            next.name()
        );
        tracing::trace!(
            pipeline = %self.id,
            from = self.state.name(),
            to = next.name(),
            "transition"
        );
        self.state = next;
    }

    /// Terminate with a failure; no-op once terminal
    pub fn fail(&mut self, err: PipelineError) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(
            pipeline = %self.id,
            phase = self.state.name(),
            error = %err,
            "pipeline failed"
        );
        self.advance(PipelineState::Failed(err));
    }

    /// Finish after statistics were computed
    pub fn complete(&mut self) {
        self.advance(PipelineState::Done);
    }
}

// ─── Runner ─────────────────────────────────────────────────────────────────

/// Executes pilot, warmup and measurement for pipelines, one at a time.
pub struct PipelineRunner {
    clock: Arc<dyn Clock>,
    sink: BlackHole,
    pilot: PilotEstimator,
    warmup: WarmupController,
    engine: MeasurementEngine,
    allocations: Option<AllocationCounter>,
    overhead_ns: f64,
}

impl PipelineRunner {
    /// Create a runner timing against `clock`
    pub fn new(
        clock: Arc<dyn Clock>,
        pilot: PilotConfig,
        warmup: WarmupConfig,
        measurement: MeasurementConfig,
    ) -> Self {
        Self {
            clock,
            sink: BlackHole::new(),
            pilot: PilotEstimator::new(pilot),
            warmup: WarmupController::new(warmup),
            engine: MeasurementEngine::new(measurement),
            allocations: None,
            overhead_ns: 0.0,
        }
    }

    /// Record allocation deltas around each measured batch
    pub fn with_allocations(mut self, counter: Option<AllocationCounter>) -> Self {
        self.allocations = counter;
        self
    }

    /// Whether allocation deltas are recorded
    pub fn tracks_allocations(&self) -> bool {
        self.allocations.is_some()
    }

    /// Resolution reported by the clock
    pub fn clock_resolution(&self) -> Option<u64> {
        self.clock.resolution()
    }

    /// Sink overhead subtracted from every per-invocation time
    pub fn overhead_ns(&self) -> f64 {
        self.overhead_ns
    }

    /// Set the sink overhead (negative or non-finite values become zero)
    pub fn set_overhead_ns(&mut self, overhead_ns: f64) {
        self.overhead_ns = if overhead_ns.is_finite() {
            overhead_ns.max(0.0)
        } else {
            0.0
        };
    }

    /// Time batches of an empty routine to expose the sink's own cost.
    ///
    /// Uses the regular pilot and measurement path with the repetition cap
    /// lowered to [`OVERHEAD_MAX_REPETITIONS`]; no overhead is subtracted.
    pub fn measure_sink_overhead(&self) -> Result<Measurement, PipelineError> {
        let empty: Routine<()> = Routine::new(|_: &()| {});
        let estimator = PilotEstimator::new(PilotConfig {
            max_repetitions: OVERHEAD_MAX_REPETITIONS,
            ..self.pilot.config().clone()
        });

        let estimate =
            estimator.estimate(self.clock.resolution(), |r| self.time_batch(&empty, &(), r))?;
        self.engine.measure(estimate.repetitions, 0.0, None, || {
            self.time_batch(&empty, &(), estimate.repetitions)
        })
    }

    /// Drive `pipeline` from `Pending` to `Statistics`, or to `Failed`.
    ///
    /// Panics raised by the routine are caught and recorded as failures.
    pub fn run<P>(&self, pipeline: &mut Pipeline, routine: &Routine<P>, params: &P) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.drive(pipeline, routine, params)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => pipeline.fail(err),
            Err(payload) => pipeline.fail(PipelineError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn drive<P>(
        &self,
        pipeline: &mut Pipeline,
        routine: &Routine<P>,
        params: &P,
    ) -> Result<(), PipelineError> {
        pipeline.advance(PipelineState::Piloting);
        let pilot = self
            .pilot
            .estimate(self.clock.resolution(), |r| self.time_batch(routine, params, r))?;
        tracing::debug!(
            pipeline = %pipeline.id,
            repetitions = pilot.repetitions,
            batch_ns = pilot.batch_elapsed_ns,
            "pilot complete"
        );
        pipeline.pilot = Some(pilot);
        let repetitions = pilot.repetitions;

        pipeline.advance(PipelineState::WarmingUp);
        let warmup = self
            .warmup
            .run(repetitions, || self.time_batch(routine, params, repetitions))?;
        tracing::debug!(
            pipeline = %pipeline.id,
            batches = warmup.batches,
            stable = warmup.stable,
            "warmup complete"
        );
        pipeline.warmup = Some(warmup);

        pipeline.advance(PipelineState::Measuring);
        let measurement = self.engine.measure(
            repetitions,
            self.overhead_ns,
            self.allocations.as_ref(),
            || self.time_batch(routine, params, repetitions),
        )?;
        pipeline.measurement = Some(measurement);

        pipeline.advance(PipelineState::Statistics);
        Ok(())
    }

    /// One timed region of `repetitions` invocations
    #[inline(never)]
    fn time_batch<P>(&self, routine: &Routine<P>, params: &P, repetitions: u64) -> u64 {
        let sink = &self.sink;
        let params = std::hint::black_box(params);

        let start = self.clock.now();
        for _ in 0..repetitions {
            routine.invoke(params, sink);
        }
        let end = self.clock.now();

        self.clock.elapsed(start, end)
    }
}
