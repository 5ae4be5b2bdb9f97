//! Validity bitmap helpers.
//!
//! Bitmaps are LSB-numbered: element `i` lives in bit `i % 8` of byte
//! `i / 8`, and a set bit means the element is valid.

use crate::error::{HandoffError, Result};

/// Number of bytes needed to hold `bits` bits.
#[must_use]
pub const fn bitmap_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Read bit `index`.
///
/// # Panics
///
/// Panics if `index` is beyond the end of `bytes`.
#[inline]
#[must_use]
pub fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes[index >> 3] & (1 << (index & 7)) != 0
}

/// Pack one `bool` per element into a bitmap.
///
/// # Errors
///
/// Returns [`HandoffError::AllocationFailure`] if the bitmap cannot be
/// allocated.
pub fn pack(validity: &[bool]) -> Result<Vec<u8>> {
    let len = bitmap_len(validity.len());
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(HandoffError::allocation("validity bitmap", len))?;
    bytes.resize(len, 0);
    for (i, _) in validity.iter().enumerate().filter(|(_, valid)| **valid) {
        bytes[i >> 3] |= 1 << (i & 7);
    }
    Ok(bytes)
}

/// Count unset (null) bits in `offset..offset + len`.
///
/// # Panics
///
/// Panics if the range extends beyond the end of `bytes`.
#[must_use]
pub fn count_unset(bytes: &[u8], offset: usize, len: usize) -> usize {
    (offset..offset + len).filter(|&i| !get_bit(bytes, i)).count()
}
