//! Fixed-width element types that can cross the boundary.

use arrow::datatypes::{
    ArrowNativeType, ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};

mod private {
    pub trait Sealed {}
}

/// A fixed-width numeric element type.
///
/// Implemented for the signed and unsigned integers from 8 to 64 bits and
/// for `f32`/`f64`. Sealed: the format strings below are the complete set
/// of flat primitive layouts this crate moves.
pub trait NativeType: private::Sealed + ArrowNativeType + PartialEq {
    /// C Data Interface format string, as found in `ArrowSchema::format`.
    const FORMAT: &'static str;

    /// Width of one element in bytes.
    const WIDTH: usize = std::mem::size_of::<Self>();

    /// The arrow-rs primitive type with the same layout.
    type Arrow: ArrowPrimitiveType<Native = Self>;
}

macro_rules! native_type {
    ($native:ty, $format:literal, $arrow:ty) => {
        impl private::Sealed for $native {}

        impl NativeType for $native {
            const FORMAT: &'static str = $format;
            type Arrow = $arrow;
        }
    };
}

native_type!(i8, "c", Int8Type);
native_type!(u8, "C", UInt8Type);
native_type!(i16, "s", Int16Type);
native_type!(u16, "S", UInt16Type);
native_type!(i32, "i", Int32Type);
native_type!(u32, "I", UInt32Type);
native_type!(i64, "l", Int64Type);
native_type!(u64, "L", UInt64Type);
native_type!(f32, "f", Float32Type);
native_type!(f64, "g", Float64Type);
