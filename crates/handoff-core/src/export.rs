//! Exporter side of the handshake.
//!
//! Builds a self-describing, independently releasable [`ArrowArray`] for a
//! flat fixed-width array. Every allocation the descriptor references is
//! kept alive by one boxed private record hung off `private_data`, and the
//! installed release callback frees all of it in one step.
//!
//! Buffers are allocated with `try_reserve_exact` so an out-of-memory
//! condition surfaces as [`HandoffError::AllocationFailure`] instead of an
//! abort. On any error nothing has been written to the output slot, and the
//! partial allocations have already been dropped.

use std::any::Any;
use std::ffi::c_void;
use std::ptr;

use tracing::{debug, trace};

use crate::bitmap;
use crate::descriptor::ArrowArray;
use crate::error::{HandoffError, Result};
use crate::release::DescriptorState;
use crate::types::NativeType;

/// Number of buffers a flat primitive array exports: validity, values.
pub const PRIMITIVE_BUFFER_COUNT: usize = 2;

/// Everything a populated descriptor borrows from the exporter.
struct PrivateData {
    // Type-erased `Vec<T>`; only its heap block is referenced.
    _values: Box<dyn Any + Send>,
    _validity: Option<Vec<u8>>,
    buffers: Box<[*const c_void]>,
}

/// Build a populated descriptor that takes ownership of `values`.
///
/// `validity` holds one flag per element (`true` = valid). A validity
/// bitmap is only exported when at least one element is null.
///
/// # Errors
///
/// - [`HandoffError::ContractViolation`] if `validity` and `values` differ
///   in length, or the length does not fit an `i64`.
/// - [`HandoffError::AllocationFailure`] if the bitmap or buffer table
///   cannot be allocated.
#[allow(clippy::cast_possible_wrap)]
pub fn build_primitive<T: NativeType>(
    values: Vec<T>,
    validity: Option<&[bool]>,
) -> Result<ArrowArray> {
    if let Some(validity) = validity {
        if validity.len() != values.len() {
            return Err(HandoffError::contract(format!(
                "validity has {} entries but there are {} values",
                validity.len(),
                values.len()
            )));
        }
    }
    let length = i64::try_from(values.len())
        .map_err(|_| HandoffError::contract("array length does not fit in an i64"))?;

    let null_count = validity.map_or(0, |v| v.iter().filter(|valid| !**valid).count());
    let bitmap = match validity {
        Some(validity) if null_count > 0 => Some(bitmap::pack(validity)?),
        _ => None,
    };

    let mut buffers = Vec::new();
    buffers
        .try_reserve_exact(PRIMITIVE_BUFFER_COUNT)
        .map_err(HandoffError::allocation(
            "buffer table",
            PRIMITIVE_BUFFER_COUNT * std::mem::size_of::<*const c_void>(),
        ))?;
    buffers.push(bitmap.as_ref().map_or(ptr::null(), |b| b.as_ptr().cast()));
    // An empty Vec still hands out a dangling, aligned, non-null pointer.
    buffers.push(values.as_ptr().cast());
    let mut buffers = buffers.into_boxed_slice();
    let buffers_ptr = buffers.as_mut_ptr();

    let private = Box::new(PrivateData {
        _values: Box::new(values),
        _validity: bitmap,
        buffers,
    });

    debug!(length, null_count, format = T::FORMAT, "exported primitive array");

    let mut array = ArrowArray::empty();
    array.length = length;
    // null_count <= length, which fits in i64
    array.null_count = null_count as i64;
    array.offset = 0;
    array.n_buffers = PRIMITIVE_BUFFER_COUNT as i64;
    array.n_children = 0;
    array.buffers = buffers_ptr;
    array.private_data = Box::into_raw(private).cast();
    array.release = Some(release_exported_array);
    Ok(array)
}

/// Export a copy of `values` into a caller-provided slot.
///
/// # Errors
///
/// As [`export_from_vec`], plus [`HandoffError::AllocationFailure`] if the
/// values buffer cannot be allocated.
pub fn export_primitive<T: NativeType>(
    values: &[T],
    validity: Option<&[bool]>,
    out: &mut ArrowArray,
) -> Result<()> {
    ensure_writable(out)?;
    let mut owned = Vec::new();
    owned
        .try_reserve_exact(values.len())
        .map_err(HandoffError::allocation(
            "values buffer",
            values.len().saturating_mul(T::WIDTH),
        ))?;
    owned.extend_from_slice(values);
    *out = build_primitive(owned, validity)?;
    Ok(())
}

/// Export `values` into a caller-provided slot without copying them.
///
/// # Errors
///
/// [`HandoffError::ContractViolation`] if `out` already holds a populated
/// descriptor, plus everything [`build_primitive`] reports. `out` is left
/// untouched on error.
pub fn export_from_vec<T: NativeType>(
    values: Vec<T>,
    validity: Option<&[bool]>,
    out: &mut ArrowArray,
) -> Result<()> {
    ensure_writable(out)?;
    *out = build_primitive(values, validity)?;
    Ok(())
}

// Overwriting a populated slot would leak the previous owner's buffers.
fn ensure_writable(out: &ArrowArray) -> Result<()> {
    if out.state() == DescriptorState::Populated {
        return Err(HandoffError::contract(
            "output slot already holds a populated descriptor",
        ));
    }
    Ok(())
}

/// Release callback installed by this module.
///
/// Safe to call any number of times: the first call clears `release` and
/// frees the private data, later calls see `None` and return.
unsafe extern "C" fn release_exported_array(array: *mut ArrowArray) {
    if array.is_null() {
        return;
    }
    // SAFETY: callers pass the descriptor this callback was installed in.
    let array = unsafe { &mut *array };
    if array.release.take().is_none() {
        return;
    }
    let private = array.private_data.cast::<PrivateData>();
    array.private_data = ptr::null_mut();
    array.buffers = ptr::null_mut();
    if !private.is_null() {
        // SAFETY: `private_data` came from `Box::into_raw` in
        // `build_primitive` and the cleared `release` guarantees this is
        // the only reclaim.
        let private = unsafe { Box::from_raw(private) };
        debug_assert_eq!(private.buffers.len(), PRIMITIVE_BUFFER_COUNT);
        drop(private);
    }
    trace!(length = array.length, "exported array released");
}
