//! The C Data Interface array descriptor.
//!
//! [`ArrowArray`] mirrors `struct ArrowArray` from the
//! [Arrow C Data Interface](https://arrow.apache.org/docs/format/CDataInterface.html#the-arrowarray-structure)
//! field for field, so a pointer to it can cross any C ABI boundary and be
//! read by pyarrow, arrow-rs, Arrow C++ or a hand-written C consumer.

use std::ffi::c_void;
use std::ptr;

/// `null_count` value meaning "not computed yet".
pub const NULL_COUNT_UNKNOWN: i64 = -1;

/// Release callback stored in [`ArrowArray::release`].
///
/// Receives the descriptor being released. Must be callable through the C
/// calling convention, whatever language produced it.
pub type ArrayReleaseFn = unsafe extern "C" fn(array: *mut ArrowArray);

/// ABI-compatible array descriptor.
///
/// A populated descriptor owns its buffers until `release` runs. Dropping a
/// populated descriptor releases it; moving one is always allowed since the
/// buffers never point back into the struct.
#[repr(C)]
#[derive(Debug)]
pub struct ArrowArray {
    /// Logical number of elements.
    pub length: i64,
    /// Number of null elements, or [`NULL_COUNT_UNKNOWN`].
    pub null_count: i64,
    /// Logical start offset into every buffer.
    pub offset: i64,
    /// Number of entries in `buffers`.
    pub n_buffers: i64,
    /// Number of entries in `children`.
    pub n_children: i64,
    /// `n_buffers` buffer pointers. For a primitive array: validity, values.
    pub buffers: *mut *const c_void,
    /// `n_children` child descriptors.
    pub children: *mut *mut ArrowArray,
    /// Dictionary values for dictionary-encoded arrays.
    pub dictionary: *mut ArrowArray,
    /// One-shot release callback; `None` once released or never populated.
    pub release: Option<ArrayReleaseFn>,
    /// Producer-owned context for `release`.
    pub private_data: *mut c_void,
}

// The byte layout is the whole wire contract, so pin it.
#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<ArrowArray>() == 80);
    assert!(std::mem::align_of::<ArrowArray>() == 8);
};

impl ArrowArray {
    /// An unpopulated slot, ready to be handed to an exporter.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            length: 0,
            null_count: 0,
            offset: 0,
            n_buffers: 0,
            n_children: 0,
            buffers: ptr::null_mut(),
            children: ptr::null_mut(),
            dictionary: ptr::null_mut(),
            release: None,
            private_data: ptr::null_mut(),
        }
    }

    /// Returns `true` if every field still has its [`ArrowArray::empty`] value.
    #[must_use]
    pub fn is_empty_slot(&self) -> bool {
        self.length == 0
            && self.null_count == 0
            && self.offset == 0
            && self.n_buffers == 0
            && self.n_children == 0
            && self.buffers.is_null()
            && self.children.is_null()
            && self.dictionary.is_null()
            && self.release.is_none()
            && self.private_data.is_null()
    }

    /// Raw pointer to buffer `index`, or `None` if the index is out of range
    /// or the buffer array itself is missing.
    ///
    /// The returned pointer may be null (an absent validity bitmap).
    #[must_use]
    pub fn buffer(&self, index: usize) -> Option<*const c_void> {
        let count = usize::try_from(self.n_buffers).ok()?;
        if index >= count || self.buffers.is_null() {
            return None;
        }
        // SAFETY: index < n_buffers and a populated descriptor keeps
        // `buffers` pointing at n_buffers entries.
        Some(unsafe { *self.buffers.add(index) })
    }

    /// The marker left behind in a slot whose contents were moved out.
    ///
    /// Keeps the shape fields so the slot reads as released rather than
    /// unpopulated, and drops every pointer.
    pub(crate) fn moved_marker(&self) -> Self {
        let mut marker = Self::empty();
        marker.length = self.length;
        marker.null_count = self.null_count;
        marker.offset = self.offset;
        marker.n_buffers = self.n_buffers;
        marker.n_children = self.n_children;
        marker
    }
}

impl Default for ArrowArray {
    fn default() -> Self {
        Self::empty()
    }
}
