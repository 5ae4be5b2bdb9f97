//! Error types for the export/import handshake.

use std::collections::TryReserveError;

/// Result type for handoff operations.
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Errors raised while exporting or importing a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// A buffer owned by the exporter could not be allocated.
    #[error("Allocation failure: could not allocate {bytes} bytes for the {what}")]
    AllocationFailure {
        /// Which buffer was being allocated.
        what: &'static str,
        /// Requested size in bytes.
        bytes: usize,
    },

    /// Descriptor fields are inconsistent with each other or with the
    /// declared element type.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// The descriptor's release callback has already fired, or its contents
    /// were already moved to another owner.
    #[error("Descriptor has already been released")]
    AlreadyReleased,
}

impl HandoffError {
    /// Create a contract violation error.
    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    /// Map a failed `try_reserve` to an allocation failure.
    pub(crate) fn allocation(what: &'static str, bytes: usize) -> impl FnOnce(TryReserveError) -> Self {
        move |_| Self::AllocationFailure { what, bytes }
    }
}
