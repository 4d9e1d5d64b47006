//! Content sources that can be read in byte ranges.
//!
//! The hasher never needs the whole file at once: it asks its
//! [`ContentSource`] for one range at a time, in ascending order, and folds
//! each into the digest before asking for the next.

mod local;
mod memory;

pub use self::local::LocalSource;
pub use self::memory::MemorySource;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;

/// Random-access, read-only view of some content.
///
/// # Examples
///
/// ```
/// use twin_hash::{ContentSource, MemorySource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = MemorySource::new(*b"0123456789");
/// assert_eq!(source.len(), 10);
/// assert_eq!(source.read_range(2..5).await.unwrap(), b"234");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Total size of the content in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly the bytes in `range`.
    ///
    /// Returns [`OutOfRange`](ErrorKind::OutOfRange) if the range is inverted
    /// or extends past [`len()`](Self::len), and
    /// [`ShortRead`](ErrorKind::ShortRead) if fewer bytes came back than the
    /// range covers.
    async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>>;
}

pub type SourceHandle = Arc<dyn ContentSource>;

pub(crate) fn check_range(range: &Range<u64>, len: u64) -> Result<()> {
    if range.start > range.end || range.end > len {
        exn::bail!(ErrorKind::OutOfRange { start: range.start, end: range.end, len });
    }
    Ok(())
}
