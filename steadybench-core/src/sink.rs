//! Black-Hole Sink
//!
//! Every value produced by a measured unit of work is handed to a
//! [`BlackHole`] so the optimizer has to assume it is observed.

/// Consumer of benchmark results.
///
/// Stateless; the cost of one `consume` call is what the harness measures as
/// the empty-case overhead and subtracts from every other case.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlackHole;

impl BlackHole {
    /// Create a sink
    pub const fn new() -> Self {
        Self
    }

    /// Swallow a value without letting the compiler prove it unused.
    #[inline(always)]
    pub fn consume<T>(&self, value: T) {
        drop(std::hint::black_box(value));
    }

    /// Pass a value through the optimization barrier and hand it back.
    #[inline(always)]
    pub fn pass<T>(&self, value: T) -> T {
        std::hint::black_box(value)
    }
}
