//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// "The catalog doesn't know this digest" is **not** an error; it's
/// [`Lookup::NotFound`](crate::Lookup::NotFound). Everything here means the
/// question could not be asked or answered.
///
/// ### Caller Errors
/// - [`ErrorKind::InvalidQuery`]
/// - [`ErrorKind::InvalidGateway`]
///
/// ### Lookup Failures
/// - [`ErrorKind::Network`]
/// - [`ErrorKind::Timeout`]
/// - [`ErrorKind::Status`]
/// - [`ErrorKind::Decode`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An empty digest was presented; no request was sent.
    #[display("empty digest")]
    InvalidQuery,
    /// Gateway address is not an absolute http(s) URL.
    #[display("invalid gateway address: {_0}")]
    InvalidGateway(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Client,
    /// Connection refused, reset, DNS failure, etc.
    #[display("lookup request failed")]
    Network,
    /// The catalog did not answer within the configured timeout.
    #[display("lookup timed out")]
    Timeout,
    /// The catalog answered with a non-success HTTP status.
    #[display("lookup returned HTTP {_0}")]
    Status(#[error(not(source))] u16),
    /// The body was not the expected JSON envelope.
    #[display("malformed lookup response")]
    Decode,
}

impl ErrorKind {
    /// Returns `true` if the catalog could not be asked or could not answer,
    /// as opposed to the caller asking a bad question.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Status(_) | Self::Decode)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::Status(code) => *code >= 500,
            _ => false,
        }
    }
}
