//! Persistent digest cache keyed by file identity.
//!
//! Hashing a large file is the slowest step of preparing an upload, so the
//! digest computed for a file is remembered under the file's stable
//! identifier and reused the next time that identifier shows up.
//!
//! # Staleness
//! The key is the identifier the host assigns to a file, not anything derived
//! from its content. If the host reuses an identifier for different bytes,
//! the cache returns the old digest. Entries are never invalidated
//! automatically; callers that can't accept this should clear the cache or
//! use a content-derived key.

mod db;
pub mod error;
mod memory;
mod models;
mod store;

pub use crate::db::Database;
pub use crate::memory::MemoryDigestCache;
pub use crate::models::CacheEntry;
pub use crate::store::SqliteDigestCache;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use twin_hash::Digest;

/// Key→digest store consulted before hashing a file.
///
/// Concurrent writes for different keys need no coordination; racing writes
/// for the same key resolve last-write-wins.
#[async_trait]
pub trait DigestCache: Send + Sync {
    /// Previously computed digest for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Digest>>;

    /// Remember `digest` for `key`, replacing any earlier value.
    async fn set(&self, key: &str, digest: &Digest) -> Result<()>;
}

pub type CacheHandle = Arc<dyn DigestCache>;
