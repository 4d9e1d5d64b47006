//! In-memory content source.

use super::{ContentSource, check_range};
use crate::error::Result;
use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;

/// Content held entirely in memory.
///
/// Cloning is cheap; clones share the same bytes.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: Arc::from(bytes.into()) }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>> {
        check_range(&range, self.len())?;
        // Both bounds were checked against a length that came from a usize.
        Ok(self.bytes[range.start as usize..range.end as usize].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_read_range() {
        let source = MemorySource::new(*b"hello world");
        assert_eq!(source.read_range(0..5).await.unwrap(), b"hello");
        assert_eq!(source.read_range(6..11).await.unwrap(), b"world");
        assert_eq!(source.read_range(3..3).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_read_past_end() {
        let source = MemorySource::new(*b"tiny");
        let err = source.read_range(2..10).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutOfRange { start: 2, end: 10, len: 4 }));
    }

    #[tokio::test]
    async fn test_inverted_range() {
        let source = MemorySource::new(*b"tiny");
        #[allow(clippy::reversed_empty_ranges)]
        let err = source.read_range(3..1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutOfRange { .. }));
    }

    #[test]
    fn test_default_is_empty() {
        assert!(MemorySource::default().is_empty());
    }
}
