//! Remote catalog lookups.
//!
//! The store indexes everything it holds by content digest. Before sending
//! any bytes, a client asks the catalog whether a digest is already present;
//! a [`Lookup::Found`] answer carries the URL to reuse instead of uploading.

pub mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod record;

pub use crate::http::{CatalogOptions, DEFAULT_LOOKUP_PATH, DEFAULT_TIMEOUT, HttpCatalog};
#[cfg(feature = "mock")]
pub use crate::mock::MockCatalog;
pub use crate::record::{CatalogRecord, Lookup};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Ask the catalog whether it holds content with this digest.
    ///
    /// A catalog that answers "no" yields `Ok(Lookup::NotFound { .. })`;
    /// errors are reserved for lookups that could not be made or answered.
    async fn lookup(&self, digest: &str) -> Result<Lookup>;
}

pub type CatalogHandle = Arc<dyn RemoteCatalog>;

pub(crate) fn validate_query(digest: &str) -> Result<()> {
    if digest.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidQuery);
    }
    Ok(())
}
