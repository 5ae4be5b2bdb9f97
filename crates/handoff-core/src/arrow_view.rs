//! Zero-copy conversion of imported arrays into arrow-rs arrays.
//!
//! Each arrow buffer is a custom allocation whose owner is the shared
//! ownership record of the import, so the descriptor is released when the
//! last [`ImportedArray`] clone or arrow buffer referencing it drops.

use std::sync::Arc;

use arrow::array::PrimitiveArray;
use arrow::buffer::{BooleanBuffer, Buffer, NullBuffer, ScalarBuffer};

use crate::bitmap::bitmap_len;
use crate::import::ImportedArray;
use crate::types::NativeType;

impl<T: NativeType> ImportedArray<T> {
    /// View the imported buffers as an arrow-rs [`PrimitiveArray`].
    ///
    /// No element is copied; the returned array keeps the descriptor alive.
    #[must_use]
    pub fn into_arrow(self) -> PrimitiveArray<T::Arrow> {
        let end = self.offset() + self.len();
        let owner = Arc::clone(self.owner());

        // SAFETY: the import validated both buffers cover `end` elements and
        // `owner` keeps them alive for as long as any arrow buffer exists.
        let values = unsafe {
            Buffer::from_custom_allocation(self.values_ptr().cast(), end * T::WIDTH, owner.clone())
        };
        let values = ScalarBuffer::<T>::new(values, self.offset(), self.len());

        let nulls = self.validity_ptr().map(|bits| {
            // SAFETY: as above, the bitmap spans `end` bits.
            let bits = unsafe { Buffer::from_custom_allocation(bits, bitmap_len(end), owner) };
            NullBuffer::new(BooleanBuffer::new(bits, self.offset(), self.len()))
        });

        PrimitiveArray::new(values, nulls)
    }
}
