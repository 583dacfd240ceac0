//! Integration tests for SteadyBench
//!
//! End-to-end runs through [`Harness`], mostly on a [`SimulatedClock`] that the
//! benchmarked units advance themselves, so timings are exact.

use std::time::Duration;
use steadybench::internals::{PilotEstimator, WarmupController};
use steadybench::{
    BenchmarkCase, Clock, ConfigurationError, Estimate, Harness, HarnessConfig, MeasurementConfig,
    ParameterGroup, Phase, PilotConfig, PipelineStatus, Registry, SimulatedClock,
    TrackingAllocator, WarmupConfig, ratio_to_baseline,
};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("steadybench=debug")
        .with_test_writer()
        .try_init();
}

fn quiet_config() -> HarnessConfig {
    HarnessConfig {
        measurement: MeasurementConfig {
            track_allocations: false,
            ..MeasurementConfig::default()
        },
        ..HarnessConfig::default()
    }
}

/// Two cases costing `base_ns` and `case_ns` simulated nanoseconds per call
fn cost_registry(clock: &SimulatedClock, base_ns: u64, case_ns: u64) -> Registry {
    let (tick, tock) = (clock.clone(), clock.clone());
    let mut registry = Registry::new();
    registry.register(
        ParameterGroup::unit("scale")
            .baseline("base", move |_| tick.advance(base_ns))
            .case("slow", move |_| tock.advance(case_ns)),
    );
    registry
}

#[test]
fn test_pilot_doubles_to_resolution_multiple() {
    let estimate = PilotEstimator::new(PilotConfig::default())
        .estimate(Some(1), |r| r)
        .unwrap();

    assert_eq!(estimate.repetitions, 128);
    assert_eq!(estimate.batch_elapsed_ns, 128);
    assert!(!estimate.capped);

    // 1 µs ticks, 1 ns per call: smallest doubling with r ≥ 100_000
    let estimate = PilotEstimator::new(PilotConfig::default())
        .estimate(Some(1_000), |r| r)
        .unwrap();
    assert_eq!(estimate.repetitions, 131_072);
}

#[test]
fn test_warmup_stabilizes_after_transient() {
    let mut timings = [50u64, 30, 20].into_iter();
    let outcome = WarmupController::new(WarmupConfig::default())
        .run(1, || timings.next().unwrap_or(10))
        .unwrap();

    assert!(outcome.stable);
    assert_eq!(outcome.batches, 10);
}

#[test]
fn test_ratio_with_propagated_error() {
    let ratio = ratio_to_baseline(
        Estimate::with_relative_error(20.0, 0.05),
        Estimate {
            mean: 10.0,
            std_error: 0.0,
        },
    )
    .unwrap();

    assert!((ratio.ratio - 2.0).abs() < 1e-12);
    assert!((ratio.error - 0.1).abs() < 1e-12);
}

#[test]
fn test_end_to_end_baseline_ratio() {
    init_tracing();
    let clock = SimulatedClock::new();
    let registry = cost_registry(&clock, 100, 200);

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report.summary.all_done());
    assert_eq!(report.meta.clock_resolution_ns, Some(1));
    assert_eq!(report.meta.sink_overhead_ns, 0.0);

    let base = report.find("scale", "base").unwrap();
    assert!(base.is_baseline);
    assert_eq!(base.mean_ns(), Some(100.0));
    assert_eq!(base.ratio.map(|r| r.ratio), Some(1.0));

    let slow = report.find("scale", "slow").unwrap();
    let metrics = slow.metrics.as_ref().unwrap();
    assert_eq!(metrics.mean_ns, 200.0);
    assert_eq!(metrics.samples_used, 15);
    assert_eq!(metrics.repetitions, 1);
    assert!(!metrics.unstable_warmup);
    assert!(metrics.ci_lower_ns <= metrics.mean_ns && metrics.mean_ns <= metrics.ci_upper_ns);

    let ratio = slow.ratio.unwrap();
    assert!((ratio.ratio - 2.0).abs() < 1e-12);
    assert_eq!(ratio.error, 0.0);
}

#[test]
fn test_parameter_tuples_get_their_own_ratios() {
    let clock = SimulatedClock::new();
    let (tick, tock) = (clock.clone(), clock.clone());
    let mut registry = Registry::new();
    registry.register(
        ParameterGroup::from_values("linear", vec![100u64, 400])
            .baseline("once", move |n: &u64| tick.advance(*n))
            .case("thrice", move |n: &u64| tock.advance(3 * *n)),
    );

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    assert_eq!(report.results.len(), 4);
    for tuple in 0..2 {
        let row = report.find_tuple("linear", "thrice", tuple).unwrap();
        assert!((row.ratio.unwrap().ratio - 3.0).abs() < 1e-12);
    }
    let wide = report.find_tuple("linear", "thrice", 1).unwrap();
    assert_eq!(wide.parameters, "400");
    assert_eq!(wide.mean_ns(), Some(1200.0));
}

#[test]
fn test_frozen_clock_fails_without_aborting() {
    let clock = SimulatedClock::frozen();
    let registry = cost_registry(&clock, 100, 200);

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.meta.clock_resolution_ns, None);
    for result in &report.results {
        assert_eq!(result.status.failure_code(), Some("clock_resolution"));
        assert!(result.metrics.is_none());
        assert!(result.ratio.is_none());
    }
    assert!(
        report
            .meta
            .warnings
            .iter()
            .any(|w| w.contains("sink overhead"))
    );
}

/// Clock whose every reading is the same instant
struct StuckClock;

impl Clock for StuckClock {
    fn now(&self) -> u64 {
        42
    }
}

#[test]
fn test_constant_timestamps_fail_resolution_probe() {
    let mut registry = Registry::new();
    registry.register(
        ParameterGroup::unit("stuck")
            .baseline("base", |_| 1u8)
            .case("other", |_| 2u8),
    );

    let report = Harness::with_clock(quiet_config(), StuckClock)
        .run(&registry)
        .unwrap();

    assert_eq!(report.meta.clock_resolution_ns, None);
    assert_eq!(report.summary.failed, 2);
    for result in &report.results {
        assert_eq!(result.status.failure_code(), Some("clock_resolution"));
    }
}

#[test]
fn test_timeout_is_isolated_to_its_pipeline() {
    init_tracing();
    let clock = SimulatedClock::new();
    let (tick, tock) = (clock.clone(), clock.clone());
    let mut registry = Registry::new();
    registry
        .register(ParameterGroup::unit("quick").case("steady", move |_| tick.advance(100)))
        .register(ParameterGroup::unit("sluggish").case("sleepy", move |_| {
            std::thread::sleep(Duration::from_millis(3));
            tock.advance(100);
        }));

    let mut config = quiet_config();
    config.warmup.budget = Duration::from_millis(1);

    let report = Harness::with_clock(config, clock).run(&registry).unwrap();

    assert!(report.find("quick", "steady").unwrap().status.is_done());
    match &report.find("sluggish", "sleepy").unwrap().status {
        PipelineStatus::Failed { code, phase, .. } => {
            assert_eq!(code, "timeout");
            assert_eq!(*phase, Some(Phase::Warmup));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(report.summary.timed_out, 1);
}

#[test]
fn test_panicking_case_is_reported() {
    let clock = SimulatedClock::new();
    let tick = clock.clone();
    let mut registry = Registry::new();
    registry.register(
        ParameterGroup::unit("mixed")
            .baseline("fine", move |_| tick.advance(100))
            .case("broken", |_: &()| -> u32 { panic!("index out of range") }),
    );

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    assert!(report.find("mixed", "fine").unwrap().status.is_done());
    let broken = report.find("mixed", "broken").unwrap();
    match &broken.status {
        PipelineStatus::Failed { code, reason, .. } => {
            assert_eq!(code, "panic");
            assert!(reason.contains("index out of range"));
        }
        other => panic!("expected panic failure, got {other:?}"),
    }
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn test_configuration_errors_abort_before_measuring() {
    let clock = SimulatedClock::new();
    let registry = cost_registry(&clock, 100, 200);

    let mut config = quiet_config();
    config.measurement.batches = 2;
    let err = Harness::with_clock(config, clock.clone())
        .run(&registry)
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::InvalidSetting {
            name: "measurement.batches",
            ..
        }
    ));

    let mut config = quiet_config();
    config.filter = Some("(".to_string());
    let err = Harness::with_clock(config, clock.clone())
        .run(&registry)
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::InvalidSetting {
            name: "runner.filter",
            ..
        }
    ));

    let err = Harness::with_clock(quiet_config(), clock.clone())
        .run(&Registry::new())
        .unwrap_err();
    assert_eq!(err, ConfigurationError::EmptyRegistry);
    assert_eq!(clock.raw_nanos(), 0);
}

#[test]
fn test_filter_without_baseline_omits_ratios() {
    let clock = SimulatedClock::new();
    let registry = cost_registry(&clock, 100, 200);

    let mut config = quiet_config();
    config.filter = Some("^scale/slow$".to_string());
    let report = Harness::with_clock(config, clock).run(&registry).unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].label(), "scale/slow");
    assert!(report.results[0].ratio.is_none());
    assert_eq!(report.meta.config.filter.as_deref(), Some("^scale/slow$"));
}

#[test]
fn test_allocation_tracking() {
    let clock = SimulatedClock::new();
    let tick = clock.clone();
    let mut registry = Registry::new();
    registry.register(ParameterGroup::unit("alloc").case("buffer", move |_| {
        tick.advance(100);
        vec![7u8; 4096]
    }));

    let report = Harness::with_clock(HarnessConfig::default(), clock)
        .run(&registry)
        .unwrap();

    assert!(report.meta.allocation_tracking);
    let metrics = report.results[0].metrics.as_ref().unwrap();
    assert!(metrics.allocated_bytes.is_some_and(|bytes| bytes >= 4096));
}

#[test]
fn test_thread_fan_out_payload() {
    let clock = SimulatedClock::new();
    let tick = clock.clone();
    let mut registry = Registry::new();
    registry.register(ParameterGroup::from_values("fan_out", vec![4usize]).case(
        "scoped",
        move |workers: &usize| {
            std::thread::scope(|s| {
                for _ in 0..*workers {
                    let tick = tick.clone();
                    s.spawn(move || tick.advance(25));
                }
            });
        },
    ));

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    assert!(report.summary.all_done());
    assert_eq!(report.results[0].mean_ns(), Some(100.0));
}

#[test]
fn test_async_case_through_harness() {
    let clock = SimulatedClock::new();
    let tick = clock.clone();
    let case = BenchmarkCase::new_async("lookup", move |_: &()| {
        let tick = tick.clone();
        async move { tick.advance(150) }
    })
    .unwrap();

    let mut registry = Registry::new();
    registry.register(ParameterGroup::unit("async").with_case(case));

    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();
    assert_eq!(report.results[0].mean_ns(), Some(150.0));
}

#[test]
fn test_report_serializes() {
    let clock = SimulatedClock::new();
    let registry = cost_registry(&clock, 100, 200);
    let report = Harness::with_clock(quiet_config(), clock).run(&registry).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["status"]["state"], "done");
    assert_eq!(json["summary"]["total"], 2);
}
