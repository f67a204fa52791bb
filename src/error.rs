// src/error.rs
//! Unified error handling for the BERT manager core
//!
//! Every operation reports one of a small, fixed set of outcomes. `Status`
//! is the numeric code the instrument protocol uses; `BertError` carries the
//! failing outcome together with enough context to debug it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outcome codes shared by every manager operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    /// Operation completed
    Success = 0,
    /// Generic operation failure
    Failed = 1,
    /// No response within the expected window; retryable
    Timeout = 2,
    /// Protocol or internal fault; not retryable without reconnecting
    UnexpectedError = 3,
    /// Requested mode or value is not available on this hardware
    UnsupportedOption = 4,
    /// BER/FEC subsystem is inactive
    BerDisabled = 5,
}

impl Status {
    /// Numeric protocol code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Parse a protocol code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Success),
            1 => Some(Status::Failed),
            2 => Some(Status::Timeout),
            3 => Some(Status::UnexpectedError),
            4 => Some(Status::UnsupportedOption),
            5 => Some(Status::BerDisabled),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Timeout => "TIMEOUT",
            Status::UnexpectedError => "UNEXPECTED_ERROR",
            Status::UnsupportedOption => "UNSUPPORTED_OPTION",
            Status::BerDisabled => "BER_DISABLED",
        };
        f.write_str(name)
    }
}

/// Error type for every fallible manager operation
///
/// Variants follow the status taxonomy one to one, except
/// `IncompatibleVersion` which is reported as `Status::Failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BertError {
    /// Generic operation failure
    #[error("[FAILED] {operation}: {reason}")]
    Failed {
        /// Operation that failed
        operation: String,
        /// Human readable cause
        reason: String,
    },

    /// The instrument did not answer in time
    #[error("[TIMEOUT] {operation} gave no result within {waited_ms} ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Protocol or internal fault
    #[error("[UNEXPECTED] {reason}")]
    UnexpectedError {
        /// Human readable cause
        reason: String,
    },

    /// Mode or value not available on this board
    #[error("[UNSUPPORTED] {option}: {reason}")]
    UnsupportedOption {
        /// Rejected option or field
        option: String,
        /// Why it was rejected
        reason: String,
    },

    /// BER/FEC subsystem must be enabled first
    #[error("[BER_DISABLED] {operation} requires an active BER session")]
    BerDisabled {
        /// Operation that needed BER
        operation: String,
    },

    /// Instrument speaks an incompatible protocol major version
    #[error("[VERSION] instrument reports protocol {found}, manager requires {expected}")]
    IncompatibleVersion {
        /// Version the manager implements
        expected: String,
        /// Version the instrument reported
        found: String,
    },
}

impl BertError {
    /// Build a `Failed` error
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        BertError::Failed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Timeout` error
    pub fn timeout(operation: impl Into<String>, waited_ms: u64) -> Self {
        BertError::Timeout {
            operation: operation.into(),
            waited_ms,
        }
    }

    /// Build an `UnexpectedError`
    pub fn unexpected(reason: impl Into<String>) -> Self {
        BertError::UnexpectedError {
            reason: reason.into(),
        }
    }

    /// Build an `UnsupportedOption` error
    pub fn unsupported(option: impl Into<String>, reason: impl Into<String>) -> Self {
        BertError::UnsupportedOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Build a `BerDisabled` error
    pub fn ber_disabled(operation: impl Into<String>) -> Self {
        BertError::BerDisabled {
            operation: operation.into(),
        }
    }

    /// Status code this error reports as
    pub fn status(&self) -> Status {
        match self {
            BertError::Failed { .. } | BertError::IncompatibleVersion { .. } => Status::Failed,
            BertError::Timeout { .. } => Status::Timeout,
            BertError::UnexpectedError { .. } => Status::UnexpectedError,
            BertError::UnsupportedOption { .. } => Status::UnsupportedOption,
            BertError::BerDisabled { .. } => Status::BerDisabled,
        }
    }

    /// Whether the caller may retry the same operation unchanged
    ///
    /// `BerDisabled` is retryable once BER has been enabled.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BertError::Timeout { .. } | BertError::BerDisabled { .. })
    }
}

/// Result alias used across the crate
pub type BertResult<T> = Result<T, BertError>;

/// Turns any error into a `BertError` with operation context
pub trait IntoBertError<T> {
    /// Map the error to `Failed` tagged with `operation`
    fn bert_err(self, operation: &str) -> BertResult<T>;
}

impl<T, E> IntoBertError<T> for Result<T, E>
where
    E: std::error::Error,
{
    fn bert_err(self, operation: &str) -> BertResult<T> {
        self.map_err(|err| BertError::failed(operation, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in 0..6 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(Status::from_code(6), None);
        assert_eq!(Status::from_code(-1), None);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(BertError::failed("commit", "nack").status(), Status::Failed);
        assert_eq!(BertError::timeout("histogram", 10).status(), Status::Timeout);
        assert_eq!(BertError::unexpected("bad frame").status(), Status::UnexpectedError);
        assert_eq!(
            BertError::unsupported("fec_mode", "no FEC ASIC").status(),
            Status::UnsupportedOption
        );
        assert_eq!(BertError::ber_disabled("sample").status(), Status::BerDisabled);

        let version = BertError::IncompatibleVersion {
            expected: "1.4.0".into(),
            found: "2.0.0".into(),
        };
        assert_eq!(version.status(), Status::Failed);
    }

    #[test]
    fn test_retryable() {
        assert!(BertError::timeout("read", 5).is_retryable());
        assert!(BertError::ber_disabled("read").is_retryable());
        assert!(!BertError::unexpected("x").is_retryable());
        assert!(!BertError::unsupported("x", "y").is_retryable());
        assert!(!BertError::failed("x", "y").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = BertError::timeout("histogram_read", 250);
        let display = err.to_string();
        assert!(display.contains("TIMEOUT"));
        assert!(display.contains("histogram_read"));
        assert!(display.contains("250"));
    }

    #[test]
    fn test_into_bert_error_trait() {
        let result: Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "link down",
        ));

        match result.bert_err("open_link").unwrap_err() {
            BertError::Failed { operation, reason } => {
                assert_eq!(operation, "open_link");
                assert!(reason.contains("link down"));
            }
            other => panic!("Expected failed error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BertError>();
    }
}
