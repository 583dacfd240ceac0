//! Clock Sources
//!
//! A [`Clock`] hands out monotonic nanosecond timestamps and reports its
//! resolution. [`MonotonicClock`] wraps `std::time::Instant`;
//! [`SimulatedClock`] is advanced explicitly and makes timing deterministic
//! for tests and calibration experiments.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of consecutive reads used to probe a clock's resolution
const RESOLUTION_PROBES: usize = 1_000;

/// Spin limit while waiting for a clock reading to change
const RESOLUTION_SPIN_LIMIT: usize = 1_000_000;

/// A monotonic time source measured in nanoseconds.
pub trait Clock {
    /// Current timestamp in nanoseconds since an arbitrary origin.
    fn now(&self) -> u64;

    /// Smallest observable tick in nanoseconds.
    ///
    /// `None` when the clock never advances, so no resolution can be
    /// determined. The default implementation probes consecutive readings.
    fn resolution(&self) -> Option<u64> {
        probe_resolution(self)
    }

    /// Elapsed nanoseconds between two timestamps taken from this clock.
    #[inline(always)]
    fn elapsed(&self, start: u64, end: u64) -> u64 {
        end.saturating_sub(start)
    }
}

/// Measure the smallest positive step between consecutive clock readings.
pub fn probe_resolution<C: Clock + ?Sized>(clock: &C) -> Option<u64> {
    let mut smallest: Option<u64> = None;

    for _ in 0..RESOLUTION_PROBES {
        let start = clock.now();
        let mut next = start;
        let mut spins = 0;
        while next == start {
            if spins >= RESOLUTION_SPIN_LIMIT {
                return smallest;
            }
            next = clock.now();
            spins += 1;
        }
        let step = next.saturating_sub(start);
        if step > 0 {
            smallest = Some(smallest.map_or(step, |s| s.min(step)));
        }
    }

    smallest
}

// ─── MonotonicClock ─────────────────────────────────────────────────────────

/// Wall clock backed by `std::time::Instant`.
///
/// Resolution is probed on first request and cached for the clock's lifetime.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: std::time::Instant,
    resolution: OnceLock<Option<u64>>,
}

impl MonotonicClock {
    /// Create a clock whose origin is the current instant
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
            resolution: OnceLock::new(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn resolution(&self) -> Option<u64> {
        *self.resolution.get_or_init(|| probe_resolution(self))
    }
}

// ─── SimulatedClock ─────────────────────────────────────────────────────────

/// Manually advanced clock.
///
/// Clones share the same underlying time, so a unit of work can advance the
/// clock that the harness reads. Readings are truncated to multiples of the
/// configured resolution. A frozen clock (resolution zero) always reads the
/// same timestamp, and its resolution is probed like any other clock's.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    nanos: Arc<AtomicU64>,
    resolution_ns: u64,
}

impl SimulatedClock {
    /// Clock with the given tick size in nanoseconds
    pub fn with_resolution(resolution_ns: u64) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            resolution_ns,
        }
    }

    /// Clock with one-nanosecond ticks
    pub fn new() -> Self {
        Self::with_resolution(1)
    }

    /// Clock whose readings never change, however far it is advanced
    pub fn frozen() -> Self {
        Self::with_resolution(0)
    }

    /// Move simulated time forward
    #[inline]
    pub fn advance(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Move simulated time forward by a `Duration`
    pub fn advance_by(&self, duration: Duration) {
        self.advance(duration.as_nanos() as u64);
    }

    /// Untruncated simulated time
    pub fn raw_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimulatedClock {
    #[inline]
    fn now(&self) -> u64 {
        let raw = self.raw_nanos();
        match self.resolution_ns {
            0 => 0,
            1 => raw,
            tick => raw - raw % tick,
        }
    }

    fn resolution(&self) -> Option<u64> {
        match self.resolution_ns {
            0 => probe_resolution(self),
            tick => Some(tick),
        }
    }
}

// ─── CPU pinning ────────────────────────────────────────────────────────────

/// Set CPU affinity to pin the current thread to a specific core
///
/// Keeps the measurement thread from migrating between cores mid-batch.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set and the
    // pointer handed to sched_setaffinity is valid for the call.
    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// CPU pinning is a no-op outside Linux
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    Ok(())
}
