//! Return codes and thread-local error storage for the C ABI.
//!
//! Exported functions return an `i32` code; the message for the last failure
//! on the calling thread is kept here so callers can fetch it with
//! `handoff_last_error()`.

use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::ptr;

use handoff_core::HandoffError;
use tracing::warn;

/// Success return code.
pub const HANDOFF_OK: i32 = 0;
/// A required pointer argument was null.
pub const HANDOFF_ERR_NULL_POINTER: i32 = -1;
/// An exporter buffer could not be allocated.
pub const HANDOFF_ERR_ALLOCATION: i32 = 100;
/// Arguments or descriptor violate the C Data Interface contract.
pub const HANDOFF_ERR_CONTRACT: i32 = 200;
/// Unexpected internal state.
pub const HANDOFF_ERR_INTERNAL: i32 = 900;

thread_local! {
    static LAST_ERROR: RefCell<Option<StoredError>> = const { RefCell::new(None) };
}

/// Stored error with its pre-built C string.
struct StoredError {
    code: i32,
    c_message: CString,
}

/// Map a core error to its return code.
pub(crate) fn error_code(err: &HandoffError) -> i32 {
    match err {
        HandoffError::AllocationFailure { .. } => HANDOFF_ERR_ALLOCATION,
        HandoffError::ContractViolation(_) => HANDOFF_ERR_CONTRACT,
        // Exporting never observes a released descriptor.
        HandoffError::AlreadyReleased => HANDOFF_ERR_INTERNAL,
    }
}

/// Store `message` under `code` and return `code`.
pub(crate) fn set_last_error(code: i32, message: impl Into<Vec<u8>>) -> i32 {
    let c_message = CString::new(message).unwrap_or_else(|_| {
        CString::from(c"error message contained a NUL byte")
    });
    warn!(code, message = ?c_message, "export failed");
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(StoredError { code, c_message }));
    code
}

/// Record a core error and return its code.
pub(crate) fn record(err: &HandoffError) -> i32 {
    set_last_error(error_code(err), err.to_string())
}

/// Record a null pointer argument.
pub(crate) fn null_pointer(argument: &str) -> i32 {
    set_last_error(HANDOFF_ERR_NULL_POINTER, format!("{argument} is null"))
}

/// Clear the last error.
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Get the last error message.
///
/// Returns a pointer to a NUL-terminated string, or null if no error is
/// stored. The pointer is valid until the next `handoff_*` or
/// `export_int32_data` call on the same thread.
#[no_mangle]
pub extern "C" fn handoff_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(stored) => stored.c_message.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the last error code, or `HANDOFF_OK` if none.
#[no_mangle]
pub extern "C" fn handoff_last_error_code() -> i32 {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(HANDOFF_OK, |stored| stored.code))
}

/// Clear the last error.
#[no_mangle]
pub extern "C" fn handoff_clear_error() {
    clear_last_error();
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn test_no_error_returns_null() {
        clear_last_error();
        assert!(handoff_last_error().is_null());
        assert_eq!(handoff_last_error_code(), HANDOFF_OK);
    }

    #[test]
    fn test_record_and_read_back() {
        let code = record(&HandoffError::ContractViolation("n_buffers is 3".into()));
        assert_eq!(code, HANDOFF_ERR_CONTRACT);
        assert_eq!(handoff_last_error_code(), HANDOFF_ERR_CONTRACT);

        // SAFETY: just stored on this thread.
        let message = unsafe { CStr::from_ptr(handoff_last_error()) };
        assert!(message.to_str().unwrap().contains("n_buffers is 3"));

        handoff_clear_error();
        assert!(handoff_last_error().is_null());
    }

    #[test]
    fn test_error_code_mapping() {
        let alloc = HandoffError::AllocationFailure {
            what: "values buffer",
            bytes: 4096,
        };
        assert_eq!(error_code(&alloc), HANDOFF_ERR_ALLOCATION);
        assert_eq!(error_code(&HandoffError::AlreadyReleased), HANDOFF_ERR_INTERNAL);
        assert_eq!(null_pointer("out_array"), HANDOFF_ERR_NULL_POINTER);
    }

    #[test]
    fn test_message_with_nul_is_replaced() {
        set_last_error(HANDOFF_ERR_INTERNAL, "bad\0message");
        // SAFETY: just stored on this thread.
        let message = unsafe { CStr::from_ptr(handoff_last_error()) };
        assert!(message.to_str().unwrap().contains("NUL"));
    }
}
