//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A config error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A provider failed or the merged values don't fit [`Config`](crate::Config).
    #[display("could not load configuration")]
    Load,
    #[display("chunk_size must be at least 1 byte")]
    InvalidChunkSize,
    #[display("lookup_timeout must be at least 1 second")]
    InvalidTimeout,
    #[display("no gateway configured")]
    MissingGateway,
    #[display("gateway must be an absolute http(s) URL: {_0}")]
    InvalidGateway(#[error(not(source))] String),
}
