//! In-memory catalog for tests.

use crate::error::{ErrorKind, Result};
use crate::{CatalogRecord, Lookup, RemoteCatalog, validate_query};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// [`RemoteCatalog`] answering from a map of known records.
///
/// Can be switched into a failing mode where every lookup errors with
/// [`ErrorKind::Network`], and counts the lookups it has served.
#[derive(Debug, Default)]
pub struct MockCatalog {
    records: RwLock<HashMap<String, CatalogRecord>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl MockCatalog {
    pub fn with_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.digest.clone(), r)).collect();
        Self { records: RwLock::new(records), ..Self::default() }
    }

    pub async fn insert(&self, record: CatalogRecord) {
        self.records.write().await.insert(record.digest.clone(), record);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups that reached the catalog (rejected queries excluded).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalog for MockCatalog {
    async fn lookup(&self, digest: &str) -> Result<Lookup> {
        validate_query(digest)?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network);
        }
        Ok(match self.records.read().await.get(digest) {
            Some(record) => Lookup::Found(record.clone()),
            None => Lookup::NotFound { status: "fail".to_string(), message: Some("file not found".to_string()) },
        })
    }
}
