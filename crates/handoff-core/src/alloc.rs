//! Thread-scoped allocation counting.
//!
//! [`CountingAlloc`] wraps the system allocator and, while a
//! [`TrackingGuard`] is alive on the current thread, counts every
//! allocation and deallocation made by that thread. Tests install it as the
//! global allocator to prove an export/import/release cycle frees exactly
//! what it allocated.
//!
//! ```rust,ignore
//! use handoff_core::alloc::{CountingAlloc, TrackingGuard};
//!
//! #[global_allocator]
//! static ALLOC: CountingAlloc = CountingAlloc::new();
//!
//! let guard = TrackingGuard::enter();
//! // ... export, import, drop ...
//! assert!(guard.stats().is_balanced());
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    /// Number of live guards on this thread (0 = not counting).
    static TRACKING_DEPTH: Cell<usize> = const { Cell::new(0) };
    static ALLOCATIONS: Cell<u64> = const { Cell::new(0) };
    static DEALLOCATIONS: Cell<u64> = const { Cell::new(0) };
    static BYTES_ALLOCATED: Cell<u64> = const { Cell::new(0) };
    static BYTES_FREED: Cell<u64> = const { Cell::new(0) };
}

/// Allocation counters for one tracked section.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of allocations.
    pub allocations: u64,
    /// Number of deallocations.
    pub deallocations: u64,
    /// Total bytes allocated.
    pub bytes_allocated: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl AllocationStats {
    /// Counters for the current thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            allocations: ALLOCATIONS.with(Cell::get),
            deallocations: DEALLOCATIONS.with(Cell::get),
            bytes_allocated: BYTES_ALLOCATED.with(Cell::get),
            bytes_freed: BYTES_FREED.with(Cell::get),
        }
    }

    /// Returns `true` if everything allocated was freed.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.allocations == self.deallocations && self.bytes_allocated == self.bytes_freed
    }

    fn reset() {
        ALLOCATIONS.with(|c| c.set(0));
        DEALLOCATIONS.with(|c| c.set(0));
        BYTES_ALLOCATED.with(|c| c.set(0));
        BYTES_FREED.with(|c| c.set(0));
    }
}

/// RAII guard enabling allocation counting on the current thread.
///
/// Guards nest: only the outermost guard resets the counters, and counting
/// stops when the last guard drops.
pub struct TrackingGuard {
    // Counting is thread-local, so the guard must stay on its thread.
    _marker: PhantomData<*const ()>,
}

impl TrackingGuard {
    /// Start counting, resetting the counters unless a guard is already live.
    #[must_use]
    pub fn enter() -> Self {
        TRACKING_DEPTH.with(|d| {
            let depth = d.get();
            if depth == 0 {
                AllocationStats::reset();
            }
            d.set(depth + 1);
        });
        Self {
            _marker: PhantomData,
        }
    }

    /// Counters accumulated since the outermost [`TrackingGuard::enter`].
    #[must_use]
    pub fn stats(&self) -> AllocationStats {
        AllocationStats::current()
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        TRACKING_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn tracking() -> bool {
    TRACKING_DEPTH.try_with(|d| d.get() > 0).unwrap_or(false)
}

fn bump(counter: &'static std::thread::LocalKey<Cell<u64>>, by: u64) {
    let _ = counter.try_with(|c| c.set(c.get() + by));
}

/// Global allocator that counts tracked allocations.
pub struct CountingAlloc {
    inner: System,
}

impl CountingAlloc {
    /// Create a counting allocator over [`System`].
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: System }
    }
}

impl Default for CountingAlloc {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: every operation delegates to `System`; counting touches only
// const-initialized thread-locals, which never allocate.
unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if tracking() {
            bump(&ALLOCATIONS, 1);
            bump(&BYTES_ALLOCATED, layout.size() as u64);
        }
        // SAFETY: forwarded unchanged.
        unsafe { self.inner.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if tracking() {
            bump(&DEALLOCATIONS, 1);
            bump(&BYTES_FREED, layout.size() as u64);
        }
        // SAFETY: forwarded unchanged.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if tracking() {
            bump(&ALLOCATIONS, 1);
            bump(&BYTES_ALLOCATED, layout.size() as u64);
        }
        // SAFETY: forwarded unchanged.
        unsafe { self.inner.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // Counted as a free of the old block plus a fresh allocation.
        if tracking() {
            bump(&DEALLOCATIONS, 1);
            bump(&BYTES_FREED, layout.size() as u64);
            bump(&ALLOCATIONS, 1);
            bump(&BYTES_ALLOCATED, new_size as u64);
        }
        // SAFETY: forwarded unchanged.
        unsafe { self.inner.realloc(ptr, layout, new_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_resets_and_stops() {
        let guard = TrackingGuard::enter();
        assert_eq!(guard.stats(), AllocationStats::default());
        assert!(tracking());
        drop(guard);
        assert!(!tracking());
    }

    #[test]
    fn test_nested_guards_keep_counting() {
        let outer = TrackingGuard::enter();
        bump(&ALLOCATIONS, 1);

        let inner = TrackingGuard::enter();
        assert_eq!(inner.stats().allocations, 1, "inner guard must not reset");
        drop(inner);

        assert!(tracking(), "outer guard is still live");
        assert_eq!(outer.stats().allocations, 1);
        drop(outer);
        assert!(!tracking());
    }

    #[test]
    fn test_balance() {
        let stats = AllocationStats {
            allocations: 2,
            deallocations: 2,
            bytes_allocated: 64,
            bytes_freed: 64,
        };
        assert!(stats.is_balanced());
        assert!(!AllocationStats {
            deallocations: 1,
            ..stats
        }
        .is_balanced());
    }
}
