//! # Arrow handoff core
//!
//! The Arrow C Data Interface export/import handshake for flat fixed-width
//! arrays: the minimal ABI contract letting a native library hand a
//! columnar array to a foreign runtime without copying it.
//!
//! - **Descriptors**: [`ArrowArray`] and [`ArrowSchema`], byte-compatible
//!   with the C structs
//! - **Exporter**: [`export_primitive`] and friends populate a descriptor
//!   and install a one-shot release callback
//! - **Importer**: [`import_array`] validates a descriptor and wraps it into
//!   an [`ImportedArray`] without copying
//! - **Release protocol**: [`DescriptorState`] and the guarded release that
//!   runs exactly once
//!
//! ## Example
//!
//! ```rust
//! use handoff_core::{export_primitive, import_array, ArrowArray};
//!
//! let mut slot = ArrowArray::empty();
//! export_primitive(&[1i32, 2, 3, 4], None, &mut slot)?;
//!
//! let array = import_array::<i32>(&mut slot)?;
//! assert_eq!(array.values(), &[1, 2, 3, 4]);
//! assert_eq!(array.null_count(), 0);
//! // Dropping the last view runs the exporter's release callback.
//! drop(array);
//! # Ok::<(), handoff_core::HandoffError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alloc;
mod arrow_view;
pub mod bitmap;
mod descriptor;
mod error;
pub mod export;
pub mod import;
mod release;
mod schema;
mod types;

pub use descriptor::{ArrayReleaseFn, ArrowArray, NULL_COUNT_UNKNOWN};
pub use error::{HandoffError, Result};
pub use export::{build_primitive, export_from_vec, export_primitive};
pub use import::{
    import_array, import_array_with_options, import_array_with_schema, ImportOptions,
    ImportedArray,
};
pub use release::DescriptorState;
pub use schema::{
    export_schema, ArrowSchema, SchemaReleaseFn, ARROW_FLAG_DICTIONARY_ORDERED,
    ARROW_FLAG_MAP_KEYS_SORTED, ARROW_FLAG_NULLABLE,
};
pub use types::NativeType;
