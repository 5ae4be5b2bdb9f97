//! Native exporter of int32 arrays over the Arrow C Data Interface.
//!
//! Built as a `cdylib`, this crate is the producer side of the handshake: a
//! host loads it at runtime, allocates an `ArrowArray` and hands a pointer
//! to one of the symbols below, which fills it in and installs the release
//! callback.
//!
//! # Design
//!
//! - **Caller-allocated slots**: output structs may be uninitialized; they
//!   are overwritten without being read
//! - **Error codes**: the `handoff_*` functions return `i32` (0 = success)
//! - **Thread-local errors**: `handoff_last_error()` returns the last message
//!
//! # Example (C)
//!
//! ```c
//! struct ArrowArray array;
//! struct ArrowSchema schema;
//! int32_t rc = handoff_export_int32_sequence(1, 4, &array, &schema);
//! if (rc != HANDOFF_OK) {
//!     printf("Error: %s\n", handoff_last_error());
//!     return 1;
//! }
//! const int32_t* data = array.buffers[1];
//! // ...
//! array.release(&array);
//! schema.release(&schema);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod generate;

use std::ffi::c_char;
use std::ptr;
use std::slice;

use handoff_core::{
    build_primitive, export_from_vec, export_primitive, export_schema, ArrowArray, ArrowSchema,
    HandoffError,
};
use tracing::debug;

pub use error::{
    handoff_clear_error, handoff_last_error, handoff_last_error_code, HANDOFF_ERR_ALLOCATION,
    HANDOFF_ERR_CONTRACT, HANDOFF_ERR_INTERNAL, HANDOFF_ERR_NULL_POINTER, HANDOFF_OK,
};

/// Number of values `export_int32_data` produces.
pub const DEFAULT_EXPORT_LEN: usize = 1000;

/// Field name given to exported schemas.
pub const FIELD_NAME: &str = "values";

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Fill `array` with `DEFAULT_EXPORT_LEN` pseudo-random int32 values and no
/// nulls.
///
/// A null `array` is ignored. On failure the slot is left empty (`release`
/// null) and the reason is available from `handoff_last_error()`.
///
/// # Safety
///
/// `array` must be null or point to writable memory for one `ArrowArray`.
/// Its previous contents are overwritten without being released.
#[no_mangle]
pub unsafe extern "C" fn export_int32_data(array: *mut ArrowArray) {
    error::clear_last_error();
    if array.is_null() {
        error::null_pointer("array");
        return;
    }
    let built = generate::random_values(&mut rand::rng(), DEFAULT_EXPORT_LEN)
        .and_then(|values| build_primitive(values, None));
    let slot = match built {
        Ok(populated) => populated,
        Err(err) => {
            error::record(&err);
            ArrowArray::empty()
        }
    };
    // SAFETY: non-null and writable per the contract above.
    unsafe { ptr::write(array, slot) };
}

/// Export a copy of `len` caller values.
///
/// `validity` is null (all valid) or points to `len` bytes, non-zero meaning
/// valid. `out_schema` may be null when no schema is wanted.
///
/// # Returns
///
/// `HANDOFF_OK` on success, or an error code.
///
/// # Safety
///
/// * `values` must point to `len` readable `i32` values (or be null when
///   `len` is 0)
/// * `validity`, when non-null, must point to `len` readable bytes
/// * `out_array` and `out_schema` must be null or point to writable structs
/// * Caller must eventually call the release callbacks on both structs
#[no_mangle]
pub unsafe extern "C" fn handoff_export_int32(
    values: *const i32,
    validity: *const u8,
    len: usize,
    out_array: *mut ArrowArray,
    out_schema: *mut ArrowSchema,
) -> i32 {
    error::clear_last_error();
    if values.is_null() && len > 0 {
        return error::null_pointer("values");
    }
    let addressable = len
        .checked_mul(std::mem::size_of::<i32>())
        .is_some_and(|bytes| isize::try_from(bytes).is_ok());
    if !addressable {
        return error::record(&HandoffError::ContractViolation(format!(
            "{len} values exceed the addressable size"
        )));
    }
    let values: &[i32] = if len == 0 {
        &[]
    } else {
        // SAFETY: non-null, `len` readable values per the contract above.
        unsafe { slice::from_raw_parts(values, len) }
    };
    let flags = if validity.is_null() {
        None
    } else {
        // SAFETY: `len` readable bytes per the contract above.
        let bytes = unsafe { slice::from_raw_parts(validity, len) };
        match validity_flags(bytes) {
            Ok(flags) => Some(flags),
            Err(err) => return error::record(&err),
        }
    };

    // SAFETY: forwarded from the caller.
    unsafe {
        fill_slots(out_array, out_schema, |slot| {
            export_primitive(values, flags.as_deref(), slot)
        })
    }
}

/// Export `start, start + 1, …` (`len` values, wrapping at `i32::MAX`).
///
/// # Safety
///
/// As [`handoff_export_int32`] for `out_array` and `out_schema`.
#[no_mangle]
pub unsafe extern "C" fn handoff_export_int32_sequence(
    start: i32,
    len: usize,
    out_array: *mut ArrowArray,
    out_schema: *mut ArrowSchema,
) -> i32 {
    error::clear_last_error();
    // SAFETY: forwarded from the caller.
    unsafe {
        fill_slots(out_array, out_schema, |slot| {
            export_from_vec(generate::sequence(start, len)?, None, slot)
        })
    }
}

/// Export `len` pseudo-random values, deterministic for a given `seed`.
///
/// # Safety
///
/// As [`handoff_export_int32`] for `out_array` and `out_schema`.
#[no_mangle]
pub unsafe extern "C" fn handoff_export_int32_random(
    seed: u64,
    len: usize,
    out_array: *mut ArrowArray,
    out_schema: *mut ArrowSchema,
) -> i32 {
    error::clear_last_error();
    // SAFETY: forwarded from the caller.
    unsafe {
        fill_slots(out_array, out_schema, |slot| {
            export_from_vec(generate::seeded_values(seed, len)?, None, slot)
        })
    }
}

/// Library version as a NUL-terminated string with static lifetime.
#[no_mangle]
pub extern "C" fn handoff_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

fn validity_flags(bytes: &[u8]) -> handoff_core::Result<Vec<bool>> {
    let mut flags = Vec::new();
    flags
        .try_reserve_exact(bytes.len())
        .map_err(|_| HandoffError::AllocationFailure {
            what: "validity flags",
            bytes: bytes.len(),
        })?;
    flags.extend(bytes.iter().map(|b| *b != 0));
    Ok(flags)
}

/// Reset both output slots, run `export` on the array slot and, if asked
/// for, describe the result in the schema slot.
///
/// On failure both slots are left empty.
unsafe fn fill_slots<F>(
    out_array: *mut ArrowArray,
    out_schema: *mut ArrowSchema,
    export: F,
) -> i32
where
    F: FnOnce(&mut ArrowArray) -> handoff_core::Result<()>,
{
    if out_array.is_null() {
        return error::null_pointer("out_array");
    }
    // SAFETY: caller-allocated and possibly uninitialized, so write without
    // dropping the old contents.
    unsafe { ptr::write(out_array, ArrowArray::empty()) };
    if !out_schema.is_null() {
        // SAFETY: as above.
        unsafe { ptr::write(out_schema, ArrowSchema::empty()) };
    }
    // SAFETY: initialized just above.
    let array = unsafe { &mut *out_array };

    if let Err(err) = export(array) {
        return error::record(&err);
    }
    if !out_schema.is_null() {
        // SAFETY: initialized just above.
        let schema = unsafe { &mut *out_schema };
        if let Err(err) = export_schema::<i32>(FIELD_NAME, array.null_count > 0, schema) {
            array.release_in_place();
            *array = ArrowArray::empty();
            return error::record(&err);
        }
    }
    debug!(
        length = array.length,
        null_count = array.null_count,
        with_schema = !out_schema.is_null(),
        "filled export slots"
    );
    error::HANDOFF_OK
}
