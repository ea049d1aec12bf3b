//! Error types for archive read and write.

use std::io;

use ardan_core::TimelineError;
use thiserror::Error;

/// Errors that can occur while saving or loading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The input does not start with the expected `b"ARDN"` magic bytes.
    #[error("invalid magic bytes (expected b\"ARDN\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the input.
        found: u8,
    },
    /// The input is truncated or a field holds an impossible value.
    #[error("malformed archive: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The decoded history violates a timeline invariant.
    #[error("invalid history: {0}")]
    Invalid(#[from] TimelineError),
}
