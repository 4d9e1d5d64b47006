//! Streaming, chunked content hashing.
//!
//! Content is read through a [`ContentSource`] one fixed-size range at a
//! time and folded into an MD5 accumulator, so files of any size can be
//! fingerprinted without being loaded into memory. The resulting [`Digest`]
//! is the deduplication key used against the remote catalog.

mod digest;
pub mod error;
mod hasher;
pub mod source;

pub use crate::digest::Digest;
pub use crate::hasher::{Chunk, ChunkedHasher, DEFAULT_CHUNK_SIZE, HashProgress, chunks};
pub use crate::source::{ContentSource, LocalSource, MemorySource, SourceHandle};
