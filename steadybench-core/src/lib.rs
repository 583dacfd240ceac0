#![warn(missing_docs)]
//! SteadyBench Core - Measurement Runtime
//!
//! This crate provides everything that runs while a benchmark is timed:
//! - Pluggable [`Clock`] sources, including a deterministic [`SimulatedClock`]
//! - The [`BlackHole`] sink that keeps results observable
//! - Pilot, warmup and measurement phases, each under a wall-clock budget
//! - The per-pipeline state machine and its [`PipelineRunner`]
//! - The explicit case [`Registry`] and its [`ExecutionPlan`]
//! - An optional counting global allocator for allocation deltas

mod allocator;
mod clock;
mod engine;
mod error;
mod pilot;
mod pipeline;
mod registry;
mod sink;
mod warmup;

pub use allocator::{
    AllocationCounter, AllocationTrackingUnavailable, TrackingAllocator, allocated_bytes,
    allocation_count,
};
pub use clock::{Clock, MonotonicClock, SimulatedClock, pin_to_cpu, probe_resolution};
pub use engine::{
    DEFAULT_BATCH_COUNT, Measurement, MeasurementConfig, MeasurementEngine, Sample,
};
pub use error::{ConfigurationError, Phase, PipelineError};
pub use pilot::{MAX_REPETITIONS, PilotConfig, PilotEstimate, PilotEstimator};
pub use pipeline::{
    OVERHEAD_MAX_REPETITIONS, PhaseBudget, Pipeline, PipelineId, PipelineRunner, PipelineState,
};
pub use registry::{
    BenchmarkCase, ExecutionPlan, ParameterGroup, ParameterSource, PlannedGroup, Registry, Routine,
};
pub use sink::BlackHole;
pub use warmup::{SteadyStateDetector, WarmupConfig, WarmupController, WarmupOutcome, WarmupState};
