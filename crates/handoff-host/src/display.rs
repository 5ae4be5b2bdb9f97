//! Rendering imported arrays.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::error::ArrowError;
use arrow::util::pretty::pretty_format_columns;
use handoff_core::{ImportedArray, NativeType};

/// Column header used in the rendered table.
pub const COLUMN_NAME: &str = "values";

/// Render the first `rows` elements of `array` as a table.
///
/// Consumes the array; its descriptor is released once the table is built.
///
/// # Errors
///
/// Returns the formatting error reported by arrow.
pub fn render<T: NativeType>(array: ImportedArray<T>, rows: usize) -> Result<String, ArrowError> {
    let array = array.into_arrow();
    let shown = array.slice(0, rows.min(array.len()));
    let columns: [ArrayRef; 1] = [Arc::new(shown)];
    Ok(pretty_format_columns(COLUMN_NAME, &columns)?.to_string())
}
