//! In-memory digest cache.

use crate::DigestCache;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use twin_hash::Digest;

/// Process-local [`DigestCache`]; forgotten when dropped.
///
/// Useful in tests, and for runs that should never touch the persistent
/// cache.
///
/// # Examples
///
/// ```
/// use twin_cache::{DigestCache, MemoryDigestCache};
/// use twin_hash::Digest;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = MemoryDigestCache::with_entries([("file-1", Digest::parse("abc123").unwrap())]);
/// assert!(cache.get("file-1").await.unwrap().is_some());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryDigestCache {
    entries: RwLock<HashMap<String, Digest>>,
}

impl MemoryDigestCache {
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<String>, Digest)>) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self { entries: RwLock::new(entries) }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DigestCache for MemoryDigestCache {
    async fn get(&self, key: &str) -> Result<Option<Digest>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, digest: &Digest) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), digest.clone());
        Ok(())
    }
}
