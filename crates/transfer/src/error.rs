//! Transfer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Collaborator failures are raised as
//! one of the kinds below with the collaborator's own error as the child.

use crate::file::FileId;
use derive_more::{Display, Error};

/// A transfer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not hash file content")]
    Hash,
    #[display("digest cache operation failed")]
    Cache,
    #[display("catalog lookup failed")]
    Catalog,
    #[display("file registry operation failed")]
    Registry,
    #[display("unknown file: {_0}")]
    UnknownFile(#[error(not(source))] FileId),
    /// A transferred file carries no `md5` metadata, so no canonical record
    /// can be resolved for it.
    #[display("file {_0} has no digest")]
    MissingDigest(#[error(not(source))] FileId),
}
