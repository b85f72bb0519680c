//! Typed errors shared across the scanning pipeline.

use serde::Serialize;
use thiserror::Error;

/// Errors produced while building the license library or scanning input.
///
/// Resource errors can only occur during library construction; once a
/// [`crate::licenses::LicenseLibrary`] exists it is valid for the life of the
/// process. Per-scan errors are limited to `InvalidInput`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ScanError {
    /// The input text is empty, contains control characters, or is too large.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A template or JSON resource is missing on disk or in the embedded set.
    #[error("resource not found: {path}")]
    ResourceNotFound { path: String },

    /// A resource exists but could not be parsed or compiled.
    #[error("malformed resource {path}: {reason}")]
    ResourceMalformed { path: String, reason: String },

    /// Custom and SPDX sources disagree about an SPDX-standard license.
    #[error("library conflict: {0}")]
    LibraryConflict(String),

    /// The mutator state machine reached a state it guards against.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ScanError {
    /// Wrap an I/O failure for `path` as `ResourceNotFound` or
    /// `ResourceMalformed` depending on the error kind.
    pub(crate) fn from_io(path: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ScanError::ResourceNotFound {
                path: path.to_string(),
            }
        } else {
            ScanError::ResourceMalformed {
                path: path.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
