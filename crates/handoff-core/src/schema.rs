//! The C Data Interface schema descriptor.
//!
//! A flat array descriptor carries no type information. Pairing it with an
//! [`ArrowSchema`] lets the importer check that the element type it was told
//! to expect is the one the exporter actually produced.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use tracing::trace;

use crate::error::{HandoffError, Result};
use crate::types::NativeType;

/// Dictionary indices are ordered.
pub const ARROW_FLAG_DICTIONARY_ORDERED: i64 = 1;
/// The field may contain nulls.
pub const ARROW_FLAG_NULLABLE: i64 = 2;
/// Map keys are sorted.
pub const ARROW_FLAG_MAP_KEYS_SORTED: i64 = 4;

/// Release callback stored in [`ArrowSchema::release`].
pub type SchemaReleaseFn = unsafe extern "C" fn(schema: *mut ArrowSchema);

/// ABI-compatible schema descriptor, mirroring `struct ArrowSchema`.
#[repr(C)]
#[derive(Debug)]
pub struct ArrowSchema {
    /// Null-terminated format string.
    pub format: *const c_char,
    /// Null-terminated field name, may be null.
    pub name: *const c_char,
    /// Binary metadata, may be null.
    pub metadata: *const c_char,
    /// `ARROW_FLAG_*` bits.
    pub flags: i64,
    /// Number of entries in `children`.
    pub n_children: i64,
    /// Child schemas.
    pub children: *mut *mut ArrowSchema,
    /// Dictionary value schema.
    pub dictionary: *mut ArrowSchema,
    /// One-shot release callback.
    pub release: Option<SchemaReleaseFn>,
    /// Producer-owned context for `release`.
    pub private_data: *mut c_void,
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<ArrowSchema>() == 72);

struct SchemaPrivateData {
    _format: CString,
    _name: CString,
}

impl ArrowSchema {
    /// An unpopulated slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            format: ptr::null(),
            name: ptr::null(),
            metadata: ptr::null(),
            flags: 0,
            n_children: 0,
            children: ptr::null_mut(),
            dictionary: ptr::null_mut(),
            release: None,
            private_data: ptr::null_mut(),
        }
    }

    /// Build a populated schema describing a flat array of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::ContractViolation`] if `name` contains a NUL
    /// byte.
    pub fn for_type<T: NativeType>(name: &str, nullable: bool) -> Result<Self> {
        let format = CString::new(T::FORMAT)
            .map_err(|_| HandoffError::contract("format string contains a NUL byte"))?;
        let name = CString::new(name)
            .map_err(|_| HandoffError::contract(format!("field name {name:?} contains a NUL byte")))?;

        let mut schema = Self::empty();
        schema.format = format.as_ptr();
        schema.name = name.as_ptr();
        schema.flags = if nullable { ARROW_FLAG_NULLABLE } else { 0 };
        let private = Box::new(SchemaPrivateData {
            _format: format,
            _name: name,
        });
        schema.private_data = Box::into_raw(private).cast();
        schema.release = Some(release_exported_schema);
        Ok(schema)
    }

    /// Format string, if the schema is populated and the format is valid
    /// UTF-8.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        if self.is_released() || self.format.is_null() {
            return None;
        }
        // SAFETY: non-null `format` is a NUL-terminated string that lives
        // as long as the schema is populated.
        unsafe { CStr::from_ptr(self.format) }.to_str().ok()
    }

    /// Field name, if the schema is populated and has a valid UTF-8 name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if self.is_released() || self.name.is_null() {
            return None;
        }
        // SAFETY: as for `format`.
        unsafe { CStr::from_ptr(self.name) }.to_str().ok()
    }

    /// Returns `true` if the nullable flag is set.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.flags & ARROW_FLAG_NULLABLE != 0
    }

    /// Returns `true` once the release callback has been cleared.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Returns `true` if nothing was ever exported into this slot.
    ///
    /// Released schemas keep their (no longer readable) `format` pointer,
    /// so only a slot that was never populated has a null one.
    #[must_use]
    pub fn is_unpopulated(&self) -> bool {
        self.is_released() && self.format.is_null()
    }

    /// Invoke the release callback if one is installed.
    pub fn release_in_place(&mut self) -> bool {
        let Some(release) = self.release else {
            return false;
        };
        // SAFETY: the callback was installed together with this schema.
        unsafe { release(self) };
        self.release = None;
        true
    }

    /// Check this schema describes a flat, childless array of `T`.
    pub(crate) fn check_describes<T: NativeType>(&self) -> Result<()> {
        if self.is_unpopulated() {
            return Err(HandoffError::contract("schema has not been populated"));
        }
        if self.is_released() {
            return Err(HandoffError::AlreadyReleased);
        }
        let Some(format) = self.format() else {
            return Err(HandoffError::contract("schema has no readable format string"));
        };
        if format != T::FORMAT {
            return Err(HandoffError::contract(format!(
                "schema format {format:?} does not match the requested element type {:?}",
                T::FORMAT
            )));
        }
        if self.n_children != 0 || !self.dictionary.is_null() {
            return Err(HandoffError::contract(format!(
                "schema for a primitive array has {} children{}",
                self.n_children,
                if self.dictionary.is_null() { "" } else { " and a dictionary" }
            )));
        }
        Ok(())
    }
}

impl Default for ArrowSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for ArrowSchema {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

/// Export a schema for `T` into a caller-provided slot.
///
/// # Errors
///
/// Returns [`HandoffError::ContractViolation`] if the slot already holds a
/// populated schema or `name` contains a NUL byte. The slot is untouched on
/// error.
pub fn export_schema<T: NativeType>(name: &str, nullable: bool, out: &mut ArrowSchema) -> Result<()> {
    if !out.is_released() {
        return Err(HandoffError::contract(
            "schema slot already holds a populated schema",
        ));
    }
    *out = ArrowSchema::for_type::<T>(name, nullable)?;
    Ok(())
}

unsafe extern "C" fn release_exported_schema(schema: *mut ArrowSchema) {
    if schema.is_null() {
        return;
    }
    // SAFETY: callers pass the schema this callback was installed in.
    let schema = unsafe { &mut *schema };
    if schema.release.take().is_none() {
        return;
    }
    let private = schema.private_data.cast::<SchemaPrivateData>();
    // `format` stays behind as the released marker; it is never read again.
    schema.private_data = ptr::null_mut();
    schema.name = ptr::null();
    if !private.is_null() {
        // SAFETY: `private_data` was produced by `Box::into_raw` in
        // `for_type` and is reclaimed exactly once, guarded by `release`.
        drop(unsafe { Box::from_raw(private) });
    }
    trace!("exported schema released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_type() {
        let schema = ArrowSchema::for_type::<i32>("values", true).unwrap();
        assert_eq!(schema.format(), Some("i"));
        assert_eq!(schema.name(), Some("values"));
        assert!(schema.is_nullable());
        assert!(!schema.is_released());
        assert!(schema.check_describes::<i32>().is_ok());
    }

    #[test]
    fn test_format_mismatch() {
        let schema = ArrowSchema::for_type::<i64>("values", false).unwrap();
        let err = schema.check_describes::<i32>().unwrap_err();
        assert!(matches!(err, HandoffError::ContractViolation(_)));
        assert!(err.to_string().contains("\"l\""));
    }

    #[test]
    fn test_release_is_one_shot() {
        let mut schema = ArrowSchema::for_type::<f64>("x", false).unwrap();
        let release = schema.release.unwrap();

        assert!(schema.release_in_place());
        assert!(schema.is_released());
        assert!(schema.format().is_none());
        assert!(!schema.is_unpopulated());

        // Calling the raw callback again must be a no-op.
        unsafe { release(&mut schema) };
        assert!(!schema.release_in_place());
        assert!(matches!(
            schema.check_describes::<f64>(),
            Err(HandoffError::AlreadyReleased)
        ));
    }

    #[test]
    fn test_export_schema_rejects_populated_slot() {
        let mut slot = ArrowSchema::empty();
        export_schema::<u8>("bytes", false, &mut slot).unwrap();
        let err = export_schema::<u8>("bytes", false, &mut slot).unwrap_err();
        assert!(matches!(err, HandoffError::ContractViolation(_)));
        assert_eq!(slot.format(), Some("C"));
    }

    #[test]
    fn test_unpopulated_schema_is_a_contract_violation() {
        let schema = ArrowSchema::empty();
        assert!(schema.is_unpopulated());
        let err = schema.check_describes::<i32>().unwrap_err();
        assert!(matches!(err, HandoffError::ContractViolation(_)));
        assert!(err.to_string().contains("not been populated"));
    }

    #[test]
    fn test_name_with_nul_is_rejected() {
        assert!(ArrowSchema::for_type::<i32>("a\0b", false).is_err());
    }

    #[test]
    fn test_readable_by_arrow() {
        use arrow::datatypes::DataType;
        use arrow::ffi::FFI_ArrowSchema;

        let schema = ArrowSchema::for_type::<i32>("values", true).unwrap();
        // SAFETY: both structs have the C Data Interface layout.
        let ffi: FFI_ArrowSchema = unsafe { std::mem::transmute(schema) };
        assert_eq!(DataType::try_from(&ffi).unwrap(), DataType::Int32);
        assert!(ffi.nullable());
    }
}
