// src/version.rs
//! Protocol version negotiation

use crate::error::{BertError, BertResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manager module revision shipped alongside the protocol triple
pub const MANAGER_MODULE_VERSION: u32 = 18;

/// Protocol version this manager implements
pub const API_VERSION: ApiVersion = ApiVersion {
    major: 1,
    minor: 4,
    revision: 0,
};

/// {major, minor, revision} protocol identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Incompatible changes bump this
    pub major: u16,
    /// Backwards compatible additions
    pub minor: u16,
    /// Fixes only
    pub revision: u16,
}

impl ApiVersion {
    /// Create a version triple
    pub const fn new(major: u16, minor: u16, revision: u16) -> Self {
        Self { major, minor, revision }
    }

    /// Only the major number decides compatibility
    pub fn is_compatible_with(&self, other: &ApiVersion) -> bool {
        self.major == other.major
    }

    /// Reject a peer version this manager cannot drive
    pub fn ensure_compatible(&self, reported: &ApiVersion) -> BertResult<()> {
        if self.is_compatible_with(reported) {
            Ok(())
        } else {
            Err(BertError::IncompatibleVersion {
                expected: self.to_string(),
                found: reported.to_string(),
            })
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}
