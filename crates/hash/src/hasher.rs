use crate::digest::Digest;
use crate::error::{ErrorKind, Result};
use crate::source::ContentSource;
use async_stream::stream;
use futures::{Stream, TryStreamExt};
use md5::{Digest as _, Md5};
use std::num::NonZeroU64;
use std::pin::pin;

/// Two mebibytes: large enough to keep the number of reads low, small enough
/// that hashing many files concurrently doesn't balloon memory.
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// One fixed-size slice of the content, in the order it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk.
    pub index: u64,
    /// Number of chunks the content splits into.
    pub total: u64,
    pub bytes: Vec<u8>,
}

/// Reported after each chunk has been folded into the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashProgress {
    /// Number of chunks consumed so far (1-based).
    pub chunk: u64,
    pub total: u64,
}
impl HashProgress {
    /// Fraction of the content consumed, between `0.0` and `1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 { 1.0 } else { self.chunk as f64 / self.total as f64 }
    }
}

/// Streams `source` as sequential, non-overlapping chunks of `chunk_size`
/// bytes. The final chunk may be shorter; empty content yields no chunks.
///
/// Chunk `k + 1` is not requested from the source until chunk `k` has been
/// yielded and the consumer polls again. A failed read ends the stream with
/// a [`Read`](ErrorKind::Read) error wrapping the source's error.
pub fn chunks<'a>(
    source: &'a dyn ContentSource,
    chunk_size: NonZeroU64,
) -> impl Stream<Item = Result<Chunk>> + Send + 'a {
    let size = chunk_size.get();
    let len = source.len();
    let total = len.div_ceil(size);
    stream!({
        for index in 0..total {
            let start = index * size;
            let end = start.saturating_add(size).min(len);
            match source.read_range(start..end).await {
                Ok(bytes) => yield Ok(Chunk { index, total, bytes }),
                Err(err) => {
                    yield Err(err.raise(ErrorKind::Read { index, total }));
                    return;
                },
            }
        }
    })
}

/// Computes MD5 digests by streaming content in fixed-size chunks.
///
/// The chunk size only bounds how much of the content is held in memory at
/// once; it never changes the resulting digest.
///
/// # Examples
///
/// ```
/// use twin_hash::{ChunkedHasher, MemorySource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = MemorySource::new(*b"hello world");
/// let hasher = ChunkedHasher::new(4).unwrap();
/// let digest = hasher.digest(&source).await.unwrap();
/// assert_eq!(digest.as_str(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedHasher {
    chunk_size: NonZeroU64,
}

impl Default for ChunkedHasher {
    fn default() -> Self {
        Self { chunk_size: NonZeroU64::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroU64::MIN) }
    }
}

impl ChunkedHasher {
    /// Returns [`InvalidChunkSize`](ErrorKind::InvalidChunkSize) for zero.
    pub fn new(chunk_size: u64) -> Result<Self> {
        let Some(chunk_size) = NonZeroU64::new(chunk_size) else {
            exn::bail!(ErrorKind::InvalidChunkSize);
        };
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size.get()
    }

    pub async fn digest(&self, source: &dyn ContentSource) -> Result<Digest> {
        self.digest_with_progress(source, |_| {}).await
    }

    /// Like [`digest()`](Self::digest), calling `observer` after every chunk.
    pub async fn digest_with_progress(
        &self,
        source: &dyn ContentSource,
        mut observer: impl FnMut(HashProgress) + Send,
    ) -> Result<Digest> {
        let mut accumulator = Md5::new();
        let mut stream = pin!(chunks(source, self.chunk_size));
        while let Some(chunk) = stream.try_next().await? {
            accumulator.update(&chunk.bytes);
            let progress = HashProgress { chunk: chunk.index + 1, total: chunk.total };
            tracing::trace!(chunk = progress.chunk, total = progress.total, "hashed chunk");
            observer(progress);
        }
        let digest = Digest::from_bytes(&accumulator.finalize());
        tracing::debug!(%digest, size = source.len(), "computed digest");
        Ok(digest)
    }
}
