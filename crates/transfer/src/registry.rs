//! Access to the host's file registry.

use crate::error::{ErrorKind, Result};
use crate::file::{FileId, Meta, StatePatch, TransferFile};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The host's set of files and their transfer state.
///
/// The orchestrator never owns a [`TransferFile`]; every change goes through
/// these calls and fresh copies are read back with
/// [`get_file()`](Self::get_file).
#[async_trait]
pub trait FileRegistry: Send + Sync {
    async fn get_file(&self, id: &FileId) -> Result<Option<TransferFile>>;

    async fn set_file_state(&self, id: &FileId, patch: StatePatch) -> Result<()>;

    /// Merge `patch` into the file's metadata.
    async fn set_file_meta(&self, id: &FileId, patch: Meta) -> Result<()>;

    /// Drop the file, and any transfer queued for it.
    async fn remove_file(&self, id: &FileId) -> Result<()>;

    async fn add_file(&self, file: TransferFile) -> Result<()>;
}

pub type RegistryHandle = Arc<dyn FileRegistry>;

/// [`FileRegistry`] kept in memory, in registration order.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use twin_hash::MemorySource;
/// use twin_transfer::{FileId, FileRegistry, MemoryRegistry, TransferFile};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = MemoryRegistry::default();
/// let file = TransferFile::new("f1", "notes.txt", Arc::new(MemorySource::new(*b"hi")));
/// registry.add_file(file).await.unwrap();
/// assert_eq!(registry.transfer_queue().await, vec![FileId::from("f1")]);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    files: RwLock<Vec<TransferFile>>,
}

impl MemoryRegistry {
    pub fn with_files(files: impl IntoIterator<Item = TransferFile>) -> Self {
        Self { files: RwLock::new(files.into_iter().collect()) }
    }

    pub async fn ids(&self) -> Vec<FileId> {
        self.files.read().await.iter().map(|f| f.id.clone()).collect()
    }

    /// Files the host would still send: registered, not yet complete.
    pub async fn transfer_queue(&self) -> Vec<FileId> {
        self.files.read().await.iter().filter(|f| !f.is_complete()).map(|f| f.id.clone()).collect()
    }

    async fn update(&self, id: &FileId, f: impl FnOnce(&mut TransferFile)) -> Result<()> {
        let mut files = self.files.write().await;
        let Some(file) = files.iter_mut().find(|file| &file.id == id) else {
            exn::bail!(ErrorKind::UnknownFile(id.clone()));
        };
        f(file);
        Ok(())
    }
}

#[async_trait]
impl FileRegistry for MemoryRegistry {
    async fn get_file(&self, id: &FileId) -> Result<Option<TransferFile>> {
        Ok(self.files.read().await.iter().find(|f| &f.id == id).cloned())
    }

    async fn set_file_state(&self, id: &FileId, patch: StatePatch) -> Result<()> {
        self.update(id, |file| patch.apply(&mut file.state)).await
    }

    async fn set_file_meta(&self, id: &FileId, patch: Meta) -> Result<()> {
        self.update(id, |file| file.meta.extend(patch)).await
    }

    async fn remove_file(&self, id: &FileId) -> Result<()> {
        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|f| &f.id != id);
        if files.len() == before {
            exn::bail!(ErrorKind::UnknownFile(id.clone()));
        }
        Ok(())
    }

    async fn add_file(&self, file: TransferFile) -> Result<()> {
        let mut files = self.files.write().await;
        // Re-adding an identifier replaces the old entry in place.
        match files.iter_mut().find(|f| f.id == file.id) {
            Some(existing) => *existing = file,
            None => files.push(file),
        }
        Ok(())
    }
}
