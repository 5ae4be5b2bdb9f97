//! Release protocol shared by both sides of the handshake.
//!
//! Every descriptor moves through `Unpopulated → Populated → Released`.
//! The exporter performs the first transition; whoever currently owns the
//! descriptor performs the second by invoking its release callback. The
//! callback reference itself is the one-shot guard: it is cleared as part of
//! the release, so a second attempt finds `None` and does nothing.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use crate::descriptor::ArrowArray;

/// Lifecycle state of a descriptor, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Freshly allocated slot, nothing exported into it yet.
    Unpopulated,
    /// Exported and owning its buffers.
    Populated,
    /// Release callback has run, or ownership moved elsewhere. Terminal.
    Released,
}

impl ArrowArray {
    /// Current lifecycle state.
    ///
    /// A released descriptor with no shape left (zero length, zero buffers)
    /// cannot be told apart from an unpopulated one and reports
    /// [`DescriptorState::Unpopulated`].
    #[must_use]
    pub fn state(&self) -> DescriptorState {
        if self.release.is_some() {
            DescriptorState::Populated
        } else if self.is_empty_slot() {
            DescriptorState::Unpopulated
        } else {
            DescriptorState::Released
        }
    }

    /// Returns `true` once the release callback has been cleared.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Invoke the release callback if one is installed.
    ///
    /// Returns `true` if a callback ran. Calling this on a released or
    /// unpopulated descriptor is a no-op.
    pub fn release_in_place(&mut self) -> bool {
        let Some(release) = self.release else {
            return false;
        };
        // SAFETY: a populated descriptor's callback accepts the descriptor
        // it was installed in; it runs once because `release` is cleared
        // below even if the callback forgets to.
        unsafe { release(self) };
        self.release = None;
        trace!(length = self.length, "descriptor released");
        true
    }
}

impl Drop for ArrowArray {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

/// Ownership record for an imported descriptor.
///
/// Holds the descriptor moved out of the caller's slot together with a
/// one-shot flag. Shared behind an `Arc` by every view over the imported
/// buffers; the callback runs when the last reference drops.
#[derive(Debug)]
pub(crate) struct ForeignAllocation {
    descriptor: ArrowArray,
    released: AtomicBool,
}

// SAFETY: the buffers behind the descriptor are immutable after export and
// the descriptor itself is only touched again by `Drop`, which has exclusive
// access. The Arrow C Data Interface allows release from any thread.
unsafe impl Send for ForeignAllocation {}
// SAFETY: shared access only reads immutable buffer memory.
unsafe impl Sync for ForeignAllocation {}

impl ForeignAllocation {
    pub(crate) fn new(descriptor: ArrowArray) -> Self {
        Self {
            descriptor,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn descriptor(&self) -> &ArrowArray {
        &self.descriptor
    }

    /// Run the release callback unless it already ran.
    fn release(&mut self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.descriptor.release_in_place()
    }
}

impl Drop for ForeignAllocation {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::ffi::c_void;

    use super::*;

    thread_local! {
        static RELEASES: Cell<usize> = const { Cell::new(0) };
    }

    unsafe extern "C" fn counting_release(array: *mut ArrowArray) {
        RELEASES.with(|r| r.set(r.get() + 1));
        // SAFETY: called with a valid descriptor by `release_in_place`.
        unsafe { (*array).release = None };
    }

    // Leaves `release` set, like a careless foreign producer.
    unsafe extern "C" fn forgetful_release(_array: *mut ArrowArray) {
        RELEASES.with(|r| r.set(r.get() + 1));
    }

    fn populated(release: crate::descriptor::ArrayReleaseFn) -> ArrowArray {
        let mut array = ArrowArray::empty();
        array.n_buffers = 2;
        array.private_data = std::ptr::NonNull::<c_void>::dangling().as_ptr();
        array.release = Some(release);
        array
    }

    #[test]
    fn test_state_transitions() {
        let mut array = ArrowArray::empty();
        assert_eq!(array.state(), DescriptorState::Unpopulated);

        array = populated(counting_release);
        assert_eq!(array.state(), DescriptorState::Populated);

        assert!(array.release_in_place());
        assert_eq!(array.state(), DescriptorState::Released);
    }

    #[test]
    fn test_release_in_place_is_one_shot() {
        RELEASES.with(|r| r.set(0));
        let mut array = populated(forgetful_release);

        assert!(array.release_in_place());
        assert!(!array.release_in_place());
        drop(array);

        assert_eq!(RELEASES.with(Cell::get), 1);
    }

    #[test]
    fn test_drop_releases_populated_descriptor() {
        RELEASES.with(|r| r.set(0));
        drop(populated(counting_release));
        drop(ArrowArray::empty());
        assert_eq!(RELEASES.with(Cell::get), 1);
    }

    #[test]
    fn test_foreign_allocation_releases_once() {
        RELEASES.with(|r| r.set(0));
        let mut owner = ForeignAllocation::new(populated(counting_release));
        assert!(owner.release());
        assert!(!owner.release());
        drop(owner);
        assert_eq!(RELEASES.with(Cell::get), 1);
    }
}
