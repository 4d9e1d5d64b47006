//! Local filesystem content source.
//!
//! Reads go through `tokio::fs` so that a large file being hashed never
//! blocks the runtime; each range opens the file, seeks, and reads exactly
//! the requested span.

use super::{ContentSource, check_range};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A regular file on the local filesystem.
///
/// The size is captured when the source is opened. If the file later
/// shrinks, reads past the new end fail with
/// [`ShortRead`](ErrorKind::ShortRead) rather than hashing truncated content.
///
/// # Examples
///
/// ```no_run
/// use twin_hash::{ChunkedHasher, LocalSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = LocalSource::open("/srv/uploads/report.pdf").await.unwrap();
/// let digest = ChunkedHasher::default().digest(&source).await.unwrap();
/// println!("{digest}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
    len: u64,
}

impl LocalSource {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotAFile(path));
        }
        Ok(Self { path, len: metadata.len() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl ContentSource for LocalSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>> {
        check_range(&range, self.len)?;
        let expected = range.end - range.start;
        let mut file = fs::File::open(&self.path).await.map_err(|e| Self::map_io_error(e, &self.path))?;
        file.seek(SeekFrom::Start(range.start)).await.map_err(ErrorKind::Io)?;
        let mut buffer = Vec::new();
        file.take(expected).read_to_end(&mut buffer).await.map_err(ErrorKind::Io)?;
        let actual = buffer.len() as u64;
        if actual != expected {
            exn::bail!(ErrorKind::ShortRead { expected, actual });
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_open_and_read() {
        let file = temp_file(b"0123456789");
        let source = LocalSource::open(file.path()).await.unwrap();
        assert_eq!(source.len(), 10);
        assert_eq!(source.read_range(0..4).await.unwrap(), b"0123");
        assert_eq!(source.read_range(8..10).await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalSource::open(dir.path().join("missing.bin")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalSource::open(dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_file_shrinks_after_open() {
        let file = temp_file(b"0123456789");
        let source = LocalSource::open(file.path()).await.unwrap();
        std::fs::write(file.path(), b"01234").unwrap();
        let err = source.read_range(0..10).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ShortRead { expected: 10, actual: 5 }));
    }

    #[tokio::test]
    async fn test_file_removed_after_open() {
        let file = temp_file(b"data");
        let source = LocalSource::open(file.path()).await.unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        let err = source.read_range(0..4).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if *p == path));
    }
}
