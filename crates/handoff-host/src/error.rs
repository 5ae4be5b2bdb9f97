//! Host error type.

use arrow::error::ArrowError;
use handoff_core::HandoffError;

use crate::config::ConfigError;
use crate::loader::LoadError;

/// Errors raised by the host pipeline.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Exporter library or symbol could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The exporter returned without populating the descriptor.
    #[error("Exporter `{symbol}` left the descriptor unpopulated")]
    NothingExported {
        /// Symbol that was called.
        symbol: String,
    },

    /// The exported descriptor was rejected on import.
    #[error("Import failed: {0}")]
    Import(#[from] HandoffError),

    /// The imported array could not be rendered.
    #[error("Render failed: {0}")]
    Render(#[from] ArrowError),
}
