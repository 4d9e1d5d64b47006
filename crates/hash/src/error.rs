//! Hash Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A hashing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for hashing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading one chunk of the content failed; the whole digest is abandoned.
    #[display("failed to read chunk {index} of {total}")]
    Read { index: u64, total: u64 },
    /// Chunk size must be at least one byte.
    #[display("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// String is not a lowercase hexadecimal digest.
    #[display("invalid digest: {_0:?}")]
    InvalidDigest(#[error(not(source))] String),
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Path exists but is a directory, socket, etc.
    #[display("not a regular file: {}", _0.display())]
    NotAFile(#[error(not(source))] PathBuf),
    /// Requested byte range falls outside the content.
    #[display("range {start}..{end} is outside content of {len} bytes")]
    OutOfRange { start: u64, end: u64, len: u64 },
    /// Content shrank between sizing it and reading it.
    #[display("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
