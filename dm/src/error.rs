//! Error type shared by every driver-model operation.
//!
//! Driver and class hooks return [DmError] as well, so whatever a hook reports
//! reaches the caller unchanged after the stage that invoked it has rolled back.

use crate::class::ClassId;
use thiserror::Error;

/// Errors returned by the driver model and by driver hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DmError {
    /// No device, entry or node matched the lookup.
    #[error("no matching device")]
    NotFound,
    /// No driver of that name is registered.
    #[error("driver not found")]
    DriverNotFound,
    /// The class identifier has no registered class driver.
    ///
    /// Kept apart from [DmError::NotFound] so that a missing class driver
    /// stands out during bring-up.
    #[error("class {0:?} is not implemented")]
    ClassNotImplemented(ClassId),
    /// A stale handle or a negative identity where one is required.
    #[error("invalid argument")]
    InvalidArgument,
    /// The allocator could not satisfy a request.
    #[error("out of memory")]
    NoMemory,
    /// An operation was requested in a lifecycle state that forbids it.
    #[error("lifecycle violation: {0}")]
    Lifecycle(&'static str),
    /// Every sequence number below the class maximum is in use.
    #[error("no free sequence number")]
    SequenceExhausted,
    /// Driver-specific failure described by a static message.
    #[error("driver error: {0}")]
    Driver(&'static str),
    /// Driver-specific failure carrying a raw status code.
    #[error("driver error code {0}")]
    Code(i32),
}

impl DmError {
    /// Whether this is one of the "nothing matched" errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DmError::NotFound | DmError::DriverNotFound | DmError::ClassNotImplemented(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T, E = DmError> = core::result::Result<T, E>;
