//! # Arrow handoff host
//!
//! Consumer side of the handshake: loads an exporter shared library at
//! runtime, lets one of its symbols fill a descriptor, imports the result as
//! an int32 array and renders it with arrow-rs.
//!
//! ```rust,ignore
//! use handoff_host::{run, HostConfig};
//!
//! let config = HostConfig {
//!     library: Some("target/release/libarrow_exporter.so".into()),
//!     ..HostConfig::default()
//! };
//! let report = run(&config)?;
//! println!("{}", report.preview);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod display;
mod error;
pub mod loader;

use handoff_core::{import_array, ArrowArray, DescriptorState};
use tracing::info;

pub use config::{ConfigError, HostConfig, Overrides, DEFAULT_CONFIG_FILE};
pub use error::HostError;
pub use loader::{ExportFn, ExporterLibrary, LoadError};

/// Outcome of one export/import cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Number of imported elements.
    pub length: usize,
    /// Number of null elements.
    pub null_count: usize,
    /// Rendered table of the first rows.
    pub preview: String,
}

/// Load the configured library, call its symbol and import the result.
///
/// The array is released before the library is unloaded.
///
/// # Errors
///
/// Any [`HostError`]: missing library path, load failure, missing symbol,
/// an unpopulated or malformed descriptor, or a rendering failure.
pub fn run(config: &HostConfig) -> Result<Report, HostError> {
    let library = ExporterLibrary::open(config.library()?)?;
    let mut slot = ArrowArray::empty();
    library.export_into(&config.symbol, &mut slot)?;
    let report = report(&mut slot, &config.symbol, config.preview_rows);
    // Releasing calls into the library, so it must still be loaded.
    drop(slot);
    drop(library);
    report
}

/// Run one cycle against an exporter function linked into this process.
///
/// # Errors
///
/// As [`run`], minus the loading errors.
pub fn run_with_exporter(export: ExportFn, preview_rows: usize) -> Result<Report, HostError> {
    let mut slot = ArrowArray::empty();
    // SAFETY: `slot` is a valid, writable descriptor for the whole call.
    unsafe { export(&mut slot) };
    report(&mut slot, "<linked exporter>", preview_rows)
}

fn report(slot: &mut ArrowArray, symbol: &str, preview_rows: usize) -> Result<Report, HostError> {
    if slot.state() != DescriptorState::Populated {
        return Err(HostError::NothingExported {
            symbol: symbol.to_string(),
        });
    }
    let array = import_array::<i32>(slot)?;
    let length = array.len();
    let null_count = array.null_count();
    info!(symbol, length, null_count, "imported array");

    let preview = display::render(array, preview_rows)?;
    Ok(Report {
        length,
        null_count,
        preview,
    })
}
