//! Hardware status codes and error handling.
//!
//! Every driver-level call returns a native status code. This module
//! converts those codes into Rust's `Result` type, attaching the operation
//! context so a failed call can be traced back to the operation and port
//! that issued it.

use std::fmt;
use thiserror::Error;

/// Native status codes returned by the lane-control driver layer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoResources = -4,
    InvalidParameter = -5,
    NotFound = -7,
    Busy = -9,
    Timeout = -10,
}

impl HwStatus {
    /// Creates a status from a raw driver return code.
    ///
    /// Unrecognized codes collapse to [`HwStatus::Failure`].
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => HwStatus::Success,
            -2 => HwStatus::NotSupported,
            -4 => HwStatus::NoResources,
            -5 => HwStatus::InvalidParameter,
            -7 => HwStatus::NotFound,
            -9 => HwStatus::Busy,
            -10 => HwStatus::Timeout,
            _ => HwStatus::Failure,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == HwStatus::Success
    }
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HwStatus::Success => "SUCCESS",
            HwStatus::Failure => "FAILURE",
            HwStatus::NotSupported => "NOT_SUPPORTED",
            HwStatus::NoResources => "NO_RESOURCES",
            HwStatus::InvalidParameter => "INVALID_PARAMETER",
            HwStatus::NotFound => "NOT_FOUND",
            HwStatus::Busy => "BUSY",
            HwStatus::Timeout => "TIMEOUT",
        };
        write!(f, "{} ({})", name, *self as i32)
    }
}

/// Error raised when a hardware call returns a non-success status.
///
/// Carries the native status code plus a context string naming the
/// operation and the port it was issued against. Hardware failures are
/// fatal to the in-flight reconfiguration; no retry happens at this layer.
#[derive(Debug, Clone, Error)]
#[error("{context}: {status}")]
pub struct HwError {
    /// The native status code reported by the driver.
    pub status: HwStatus,
    /// Human-readable operation context ("disable linkscan for port 42").
    pub context: String,
}

impl HwError {
    /// Creates a new error from a status and an operation context.
    pub fn new(status: HwStatus, context: impl Into<String>) -> Self {
        Self {
            status,
            context: context.into(),
        }
    }

    /// Converts a raw driver return code into a `Result`.
    ///
    /// The context closure is only evaluated on failure.
    pub fn check(raw: i32, context: impl FnOnce() -> String) -> HwResult<()> {
        let status = HwStatus::from_raw(raw);
        if status.is_success() {
            Ok(())
        } else {
            Err(HwError::new(status, context()))
        }
    }
}

/// Result type for hardware operations.
pub type HwResult<T> = Result<T, HwError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_from_raw() {
        assert_eq!(HwStatus::from_raw(0), HwStatus::Success);
        assert_eq!(HwStatus::from_raw(-7), HwStatus::NotFound);
        assert_eq!(HwStatus::from_raw(-999), HwStatus::Failure);
    }

    #[test]
    fn test_check_success_skips_context() {
        let result = HwError::check(0, || unreachable!("context built on success"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_failure_carries_context() {
        let err = HwError::check(-7, || "lookup port 5".to_string()).unwrap_err();
        assert_eq!(err.status, HwStatus::NotFound);
        assert_eq!(err.to_string(), "lookup port 5: NOT_FOUND (-7)");
    }
}
