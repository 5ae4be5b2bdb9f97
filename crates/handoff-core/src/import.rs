//! Importer side of the handshake.
//!
//! [`import_array`] validates a populated descriptor against the element
//! type the caller expects, moves it out of the caller's slot and wraps it
//! in an [`ImportedArray`]: a typed, read-only view over the foreign buffers.
//! No buffer content is copied. The descriptor's release callback fires when
//! the last clone of the view (or of any arrow buffer built from it) drops.
//!
//! The minimal C Data Interface carries no buffer sizes, so the importer can
//! only check that the declared shape is self-consistent. Transports that
//! know the real allocation sizes can pass them through [`ImportOptions`] to
//! have oversized lengths rejected before any read.

use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bitmap::{self, bitmap_len};
use crate::descriptor::{ArrowArray, NULL_COUNT_UNKNOWN};
use crate::error::{HandoffError, Result};
use crate::export::PRIMITIVE_BUFFER_COUNT;
use crate::release::{DescriptorState, ForeignAllocation};
use crate::schema::ArrowSchema;
use crate::types::NativeType;

/// Out-of-band knowledge the importer can check a descriptor against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Allocated byte size of each buffer, indexed like `buffers`.
    pub buffer_sizes: Option<Vec<usize>>,
}

impl ImportOptions {
    /// Options with no extra knowledge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the allocated byte size of each buffer.
    #[must_use]
    pub fn with_buffer_sizes(mut self, sizes: impl Into<Vec<usize>>) -> Self {
        self.buffer_sizes = Some(sizes.into());
        self
    }
}

/// Import a populated descriptor as a flat array of `T`.
///
/// The element type is trusted: nothing in a bare array descriptor says what
/// it holds. Use [`import_array_with_schema`] when a schema is available.
///
/// On success the slot is left released (its contents moved into the
/// returned array). On error the slot is untouched and still owned by the
/// caller.
///
/// # Errors
///
/// - [`HandoffError::AlreadyReleased`] if the slot was released or already
///   imported.
/// - [`HandoffError::ContractViolation`] if the descriptor is unpopulated or
///   malformed for `T`.
pub fn import_array<T: NativeType>(slot: &mut ArrowArray) -> Result<ImportedArray<T>> {
    import_array_with_options(slot, &ImportOptions::default())
}

/// Import a descriptor, checking it against its paired schema first.
///
/// The schema is released once the array has been imported. On error both
/// slots are untouched.
///
/// # Errors
///
/// As [`import_array`], plus [`HandoffError::ContractViolation`] if the
/// schema does not describe a flat array of `T`, and
/// [`HandoffError::AlreadyReleased`] if the schema was released.
pub fn import_array_with_schema<T: NativeType>(
    slot: &mut ArrowArray,
    schema: &mut ArrowSchema,
) -> Result<ImportedArray<T>> {
    schema.check_describes::<T>()?;
    let array = import_array(slot)?;
    schema.release_in_place();
    Ok(array)
}

/// Import a descriptor, also checking buffer sizes from `options`.
///
/// # Errors
///
/// As [`import_array`], plus [`HandoffError::ContractViolation`] if a buffer
/// is smaller than the declared offset and length require.
pub fn import_array_with_options<T: NativeType>(
    slot: &mut ArrowArray,
    options: &ImportOptions,
) -> Result<ImportedArray<T>> {
    let layout = match validate::<T>(slot, options) {
        Ok(layout) => layout,
        Err(err) => {
            warn!(
                length = slot.length,
                offset = slot.offset,
                null_count = slot.null_count,
                n_buffers = slot.n_buffers,
                error = %err,
                "rejected array descriptor"
            );
            return Err(err);
        }
    };

    let marker = slot.moved_marker();
    let descriptor = std::mem::replace(slot, marker);
    let owner = Arc::new(ForeignAllocation::new(descriptor));

    debug!(
        length = layout.len,
        offset = layout.offset,
        null_count = layout.null_count,
        format = T::FORMAT,
        "imported array descriptor"
    );

    Ok(ImportedArray {
        owner,
        values: layout.values,
        validity: layout.validity,
        offset: layout.offset,
        len: layout.len,
        null_count: layout.null_count,
    })
}

struct Layout<T> {
    values: NonNull<T>,
    validity: Option<NonNull<u8>>,
    offset: usize,
    len: usize,
    null_count: usize,
}

#[allow(clippy::cast_possible_wrap)]
fn validate<T: NativeType>(array: &ArrowArray, options: &ImportOptions) -> Result<Layout<T>> {
    match array.state() {
        DescriptorState::Released => return Err(HandoffError::AlreadyReleased),
        DescriptorState::Unpopulated => {
            return Err(HandoffError::contract("descriptor has not been populated"))
        }
        DescriptorState::Populated => {}
    }

    let len = usize::try_from(array.length)
        .map_err(|_| HandoffError::contract(format!("negative length {}", array.length)))?;
    let offset = usize::try_from(array.offset)
        .map_err(|_| HandoffError::contract(format!("negative offset {}", array.offset)))?;
    if array.null_count < NULL_COUNT_UNKNOWN || array.null_count > array.length {
        return Err(HandoffError::contract(format!(
            "null count {} is outside 0..={}",
            array.null_count, array.length
        )));
    }
    if array.n_buffers != PRIMITIVE_BUFFER_COUNT as i64 {
        return Err(HandoffError::contract(format!(
            "a primitive array has {PRIMITIVE_BUFFER_COUNT} buffers, descriptor declares {}",
            array.n_buffers
        )));
    }
    if array.n_children != 0 || !array.dictionary.is_null() {
        return Err(HandoffError::contract(format!(
            "a primitive array has no children or dictionary, descriptor declares {} children{}",
            array.n_children,
            if array.dictionary.is_null() { "" } else { " and a dictionary" }
        )));
    }
    if array.buffers.is_null() {
        return Err(HandoffError::contract("buffer table is null"));
    }

    let end = offset
        .checked_add(len)
        .ok_or_else(|| HandoffError::contract("offset + length overflows"))?;
    let values_bytes = end
        .checked_mul(T::WIDTH)
        .filter(|bytes| isize::try_from(*bytes).is_ok())
        .ok_or_else(|| {
            HandoffError::contract(format!(
                "{end} elements of {} bytes exceed the addressable range",
                T::WIDTH
            ))
        })?;
    let validity_bytes = bitmap_len(end);

    let values_ptr = array.buffer(1).unwrap_or(ptr::null()).cast::<T>().cast_mut();
    let values = match NonNull::new(values_ptr) {
        Some(values) if !values.as_ptr().is_aligned() => {
            return Err(HandoffError::contract(format!(
                "values buffer at {values_ptr:p} is not aligned to {} bytes",
                std::mem::align_of::<T>()
            )))
        }
        Some(values) => values,
        None if end == 0 => NonNull::dangling(),
        None => {
            return Err(HandoffError::contract(format!(
                "values buffer is null but the array spans {end} elements"
            )))
        }
    };

    let validity = NonNull::new(array.buffer(0).unwrap_or(ptr::null()).cast::<u8>().cast_mut());
    if validity.is_none() && array.null_count > 0 {
        return Err(HandoffError::contract(format!(
            "null count is {} but there is no validity bitmap",
            array.null_count
        )));
    }

    if let Some(sizes) = &options.buffer_sizes {
        if sizes.len() < PRIMITIVE_BUFFER_COUNT {
            return Err(HandoffError::contract(format!(
                "{} buffer sizes supplied for {PRIMITIVE_BUFFER_COUNT} buffers",
                sizes.len()
            )));
        }
        if validity.is_some() && sizes[0] < validity_bytes {
            return Err(HandoffError::contract(format!(
                "validity buffer holds {} bytes but {validity_bytes} are required",
                sizes[0]
            )));
        }
        if sizes[1] < values_bytes {
            return Err(HandoffError::contract(format!(
                "values buffer holds {} bytes but length {len} at offset {offset} requires {values_bytes}",
                sizes[1]
            )));
        }
    }

    // A declared null count of zero means the bitmap may be ignored. A
    // positive count without a bitmap was rejected above.
    let (validity, null_count) = match (array.null_count, validity) {
        (0, _) | (_, None) => (None, 0),
        (declared, Some(bits)) => {
            // SAFETY: a populated bitmap covers offset + length bits.
            let bytes = unsafe { std::slice::from_raw_parts(bits.as_ptr(), validity_bytes) };
            let counted = bitmap::count_unset(bytes, offset, len);
            if declared != NULL_COUNT_UNKNOWN && usize::try_from(declared).ok() != Some(counted) {
                return Err(HandoffError::contract(format!(
                    "null count {declared} disagrees with validity bitmap ({counted} nulls)"
                )));
            }
            (Some(bits), counted)
        }
    };

    Ok(Layout {
        values,
        validity,
        offset,
        len,
        null_count,
    })
}

/// A typed, zero-copy view over an imported descriptor.
///
/// Cloning is cheap and shares ownership; the release callback runs once,
/// when the last clone drops.
pub struct ImportedArray<T: NativeType> {
    owner: Arc<ForeignAllocation>,
    // Element 0 of the values buffer, before `offset` is applied.
    values: NonNull<T>,
    validity: Option<NonNull<u8>>,
    offset: usize,
    len: usize,
    null_count: usize,
}

// SAFETY: the view only reads buffers that stay immutable and alive for as
// long as `owner` is referenced, and `ForeignAllocation` is Send + Sync.
unsafe impl<T: NativeType> Send for ImportedArray<T> {}
// SAFETY: see above; no interior mutability is reachable through `&self`.
unsafe impl<T: NativeType> Sync for ImportedArray<T> {}

impl<T: NativeType> Clone for ImportedArray<T> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
            values: self.values,
            validity: self.validity,
            offset: self.offset,
            len: self.len,
            null_count: self.null_count,
        }
    }
}

impl<T: NativeType> ImportedArray<T> {
    /// Number of logical elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical offset into the foreign buffers.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of null elements.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// The values, offset applied. Null slots hold unspecified values.
    #[must_use]
    pub fn values(&self) -> &[T] {
        // SAFETY: validation checked the buffer is non-null (or dangling for
        // an empty span), aligned, and declared to hold offset + len
        // elements; `owner` keeps it alive for the lifetime of `&self`.
        unsafe { std::slice::from_raw_parts(self.values.as_ptr().add(self.offset), self.len) }
    }

    /// Raw validity bitmap and the bit offset of element 0, if any element
    /// is null.
    #[must_use]
    pub fn validity(&self) -> Option<(&[u8], usize)> {
        self.validity.map(|bits| {
            // SAFETY: the bitmap spans offset + len bits.
            let bytes = unsafe {
                std::slice::from_raw_parts(bits.as_ptr(), bitmap_len(self.offset + self.len))
            };
            (bytes, self.offset)
        })
    }

    /// Value at `index`, ignoring validity.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn value(&self, index: usize) -> T {
        self.values()[index]
    }

    /// Returns `true` if element `index` is not null.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        assert!(
            index < self.len,
            "index {index} out of bounds for array of length {}",
            self.len
        );
        self.validity()
            .map_or(true, |(bytes, offset)| bitmap::get_bit(bytes, offset + index))
    }

    /// Returns `true` if element `index` is null.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        !self.is_valid(index)
    }

    /// Element `index`, or `None` if it is null or out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        (index < self.len && self.is_valid(index)).then(|| self.value(index))
    }

    /// Iterate elements with nulls as `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.len).map(|i| self.is_valid(i).then(|| self.value(i)))
    }

    /// Copy the elements out, nulls as `None`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Option<T>> {
        self.iter().collect()
    }

    /// Number of live views sharing the imported descriptor.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.owner)
    }

    pub(crate) fn owner(&self) -> &Arc<ForeignAllocation> {
        &self.owner
    }

    pub(crate) fn values_ptr(&self) -> NonNull<T> {
        self.values
    }

    pub(crate) fn validity_ptr(&self) -> Option<NonNull<u8>> {
        self.validity
    }
}

impl<T: NativeType> fmt::Debug for ImportedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedArray")
            .field("format", &T::FORMAT)
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("null_count", &self.null_count)
            .field("descriptor_length", &self.owner.descriptor().length)
            .finish()
    }
}
