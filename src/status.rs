//! Status codes and the error type used behind the public call boundary.
//!
//! Internals propagate [`BlasError`] with `?`; every public entry point
//! funnels its result through [`guard`], which turns errors into a
//! [`Status`] and catches panics so that no fault crosses the boundary.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::device::DeviceError;

/// Status returned by every public routine. Numeric values are stable.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success = 0,
    /// Handle not initialized, invalid or null.
    InvalidHandle = 1,
    /// Function is not implemented for the requested types.
    NotImplemented = 2,
    InvalidPointer = 3,
    /// Invalid size or stride argument.
    InvalidSize = 4,
    /// Failed internal memory allocation, copy or dealloc.
    MemoryError = 5,
    InternalError = 6,
    PerfDegraded = 7,
    /// Unmatched start/stop device memory size query.
    SizeQueryMismatch = 8,
    SizeIncreased = 9,
    SizeUnchanged = 10,
    /// Passed argument not valid, including unknown solution indices.
    InvalidValue = 11,
    Continue = 12,
    /// A vector or matrix contained NaN or Inf while check-numerics was on.
    CheckNumericsFail = 13,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::InvalidHandle => "invalid_handle",
            Status::NotImplemented => "not_implemented",
            Status::InvalidPointer => "invalid_pointer",
            Status::InvalidSize => "invalid_size",
            Status::MemoryError => "memory_error",
            Status::InternalError => "internal_error",
            Status::PerfDegraded => "perf_degraded",
            Status::SizeQueryMismatch => "size_query_mismatch",
            Status::SizeIncreased => "size_increased",
            Status::SizeUnchanged => "size_unchanged",
            Status::InvalidValue => "invalid_value",
            Status::Continue => "continue",
            Status::CheckNumericsFail => "check_numerics_fail",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum BlasError {
    #[error("invalid handle")]
    InvalidHandle,
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),
    #[error("solution index {index} is not valid for this problem")]
    InvalidSolutionIndex { index: i32 },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("check numerics failed for {routine}: {detail}")]
    CheckNumerics { routine: String, detail: String },
    #[error("memory error: {0}")]
    Memory(String),
    #[error("device memory size query stopped without being started")]
    SizeQueryMismatch,
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type BlasResult<T> = Result<T, BlasError>;

impl BlasError {
    pub fn status(&self) -> Status {
        match self {
            BlasError::InvalidHandle => Status::InvalidHandle,
            BlasError::InvalidSize(_) => Status::InvalidSize,
            BlasError::InvalidPointer(_) => Status::InvalidPointer,
            BlasError::InvalidSolutionIndex { .. } | BlasError::InvalidValue(_) => {
                Status::InvalidValue
            }
            BlasError::NotImplemented(_) => Status::NotImplemented,
            BlasError::CheckNumerics { .. } => Status::CheckNumericsFail,
            BlasError::Memory(_) => Status::MemoryError,
            BlasError::SizeQueryMismatch => Status::SizeQueryMismatch,
            BlasError::Device(DeviceError::OutOfMemory { .. }) => Status::MemoryError,
            BlasError::Device(_) | BlasError::Internal(_) => Status::InternalError,
        }
    }
}

impl From<BlasError> for Status {
    fn from(err: BlasError) -> Self {
        err.status()
    }
}

/// Run `f` and convert its outcome into a [`Status`].
///
/// Panics are caught and reported as [`Status::InternalError`].
pub fn guard<F>(routine: &str, f: F) -> Status
where
    F: FnOnce() -> BlasResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Success,
        Ok(Err(err)) => {
            log::debug!("{routine}: {err}");
            err.status()
        }
        Err(payload) => {
            log::error!("{routine}: internal fault: {}", panic_message(&*payload));
            Status::InternalError
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::InvalidSize.code(), 4);
        assert_eq!(Status::InternalError.code(), 6);
        assert_eq!(Status::InvalidValue.code(), 11);
        assert_eq!(Status::CheckNumericsFail.code(), 13);
    }

    #[test]
    fn test_solution_index_maps_to_invalid_value() {
        let err = BlasError::InvalidSolutionIndex { index: 12 };
        assert_eq!(err.status(), Status::InvalidValue);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_guard_converts_panic() {
        let status = guard("test_routine", || panic!("boom"));
        assert_eq!(status, Status::InternalError);
    }

    #[test]
    fn test_guard_passes_errors_through() {
        let status = guard("test_routine", || Err(BlasError::InvalidPointer("x".into())));
        assert_eq!(status, Status::InvalidPointer);
        assert_eq!(guard("test_routine", || Ok(())), Status::Success);
    }

    #[test]
    fn test_out_of_memory_is_memory_error() {
        let err = BlasError::from(DeviceError::OutOfMemory { requested: 64, limit: 32 });
        assert_eq!(err.status(), Status::MemoryError);
    }
}
