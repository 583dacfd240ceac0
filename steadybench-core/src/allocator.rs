//! Allocation Counting
//!
//! Install [`TrackingAllocator`] as the global allocator to make the
//! process-wide allocated-bytes counter available:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: steadybench::TrackingAllocator = steadybench::TrackingAllocator;
//! ```
//!
//! The counters only ever grow. The harness reads them before and after a
//! batch and never resets them, so concurrent readers cannot disturb each other.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATION_COUNT: AtomicU64 = AtomicU64::new(0);

/// Global allocator wrapper that counts bytes handed out by `System`
pub struct TrackingAllocator;

// SAFETY: every call is forwarded unchanged to `System`; the counters are
// lock-free atomics and never allocate.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record(new_size.saturating_sub(layout.size()));
        }
        new_ptr
    }
}

#[inline(always)]
fn record(bytes: usize) {
    ALLOCATED_BYTES.fetch_add(bytes as u64, Ordering::Relaxed);
    ALLOCATION_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Total bytes allocated through [`TrackingAllocator`] since process start
#[inline]
pub fn allocated_bytes() -> u64 {
    ALLOCATED_BYTES.load(Ordering::Relaxed)
}

/// Total allocations made through [`TrackingAllocator`] since process start
#[inline]
pub fn allocation_count() -> u64 {
    ALLOCATION_COUNT.load(Ordering::Relaxed)
}

/// The counter is not fed by the global allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("allocation tracking unavailable: TrackingAllocator is not the global allocator")]
pub struct AllocationTrackingUnavailable;

/// Handle proving the allocation counter is live.
#[derive(Debug, Clone, Copy)]
pub struct AllocationCounter {
    _private: (),
}

impl AllocationCounter {
    /// Check that heap allocations move the counter.
    pub fn detect() -> Result<Self, AllocationTrackingUnavailable> {
        let before = allocated_bytes();
        let probe = std::hint::black_box(Box::new([0u8; 64]));
        drop(probe);
        if allocated_bytes() > before {
            Ok(Self { _private: () })
        } else {
            Err(AllocationTrackingUnavailable)
        }
    }

    /// Current reading of the process-wide counter
    #[inline(always)]
    pub fn read(&self) -> u64 {
        allocated_bytes()
    }
}
