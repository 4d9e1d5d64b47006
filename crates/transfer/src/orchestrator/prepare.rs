use super::Orchestrator;
use crate::error::{ErrorKind, Result};
use crate::event::{PreprocessProgress, TransferEvent};
use crate::file::{FileId, META_MD5, META_SRC, Meta, Progress, StatePatch, TransferFile, TransferResponse};
use crate::result::TransferResult;
use crate::stage::{Stage, TransferDecision};
use exn::ResultExt;
use futures::future::join_all;
use serde_json::Value;
use twin_catalog::{CatalogRecord, Lookup};
use twin_hash::Digest;

impl Orchestrator {
    /// Decide, for every file in `ids`, whether it still needs transferring.
    ///
    /// Files are processed concurrently and independently. The returned
    /// decisions are in input order and every input gets one: a file whose
    /// dedup attempt fails for any reason is left to transfer normally.
    pub async fn prepare(&self, ids: &[FileId]) -> Vec<(FileId, TransferDecision)> {
        let tasks = ids.iter().map(|id| async move {
            let decision = match self.prepare_file(id).await {
                Ok(decision) => decision,
                Err(err) => {
                    tracing::warn!(file_id = %id, error = ?err, "dedup failed, transferring normally");
                    self.proceed(id).await;
                    TransferDecision::ProceedToTransfer
                },
            };
            (id.clone(), decision)
        });
        join_all(tasks).await
    }

    async fn prepare_file(&self, id: &FileId) -> Result<TransferDecision> {
        self.set_stage(id, Stage::Pending).await;
        let file = self.file(id).await?;
        self.events.emit(TransferEvent::PreprocessProgress {
            file_id: id.clone(),
            progress: PreprocessProgress::Indeterminate { message: format!("Preprocessing {}...", file.name) },
        });

        let digest = self.resolve_digest(&file).await?;
        let meta = Meta::from([(META_MD5.to_string(), Value::from(digest.as_str()))]);
        self.registry.set_file_meta(id, meta).await.or_raise(|| ErrorKind::Registry)?;

        self.set_stage(id, Stage::LookingUp).await;
        let record = match self.catalog.lookup(digest.as_str()).await {
            Ok(Lookup::Found(record)) => record,
            Ok(Lookup::NotFound { status, message }) => {
                tracing::debug!(file_id = %id, %digest, %status, reason = message.as_deref(), "content not in store");
                self.proceed(id).await;
                return Ok(TransferDecision::ProceedToTransfer);
            },
            Err(err) if err.is_lookup_failure() => {
                tracing::warn!(file_id = %id, %digest, retryable = err.is_retryable(), error = ?err, "lookup failed");
                self.proceed(id).await;
                return Ok(TransferDecision::ProceedToTransfer);
            },
            Err(err) => return Err(err.raise(ErrorKind::Catalog)),
        };

        self.instant_complete(file, &digest, record).await?;
        Ok(TransferDecision::InstantComplete)
    }

    /// Cached digest for the file, or a freshly computed one. Cache trouble
    /// only costs a re-hash.
    async fn resolve_digest(&self, file: &TransferFile) -> Result<Digest> {
        let id = &file.id;
        match self.cache.get(id.as_str()).await {
            Ok(Some(digest)) => {
                tracing::debug!(file_id = %id, %digest, "digest cache hit");
                return Ok(digest);
            },
            Ok(None) => {},
            Err(err) => {
                let err = err.raise(ErrorKind::Cache);
                tracing::warn!(file_id = %id, error = ?err, "digest cache read failed");
            },
        }

        self.set_stage(id, Stage::Hashing).await;
        let events = &self.events;
        let message = format!("Hashing {}...", file.name);
        let digest = self
            .hasher
            .digest_with_progress(file.data.as_ref(), |progress| {
                events.emit(TransferEvent::PreprocessProgress {
                    file_id: id.clone(),
                    progress: PreprocessProgress::Determinate { message: message.clone(), value: progress.fraction() },
                });
            })
            .await
            .or_raise(|| ErrorKind::Hash)?;

        if let Err(err) = self.cache.set(id.as_str(), &digest).await {
            let err = err.raise(ErrorKind::Cache);
            tracing::warn!(file_id = %id, %digest, error = ?err, "digest cache write failed");
        }
        Ok(digest)
    }

    /// The store already holds the content: complete the file without
    /// transferring it.
    ///
    /// If any registry step fails, the file is put back exactly as it was
    /// before re-registration so the normal transfer still picks it up.
    async fn instant_complete(&self, file: TransferFile, digest: &Digest, record: CatalogRecord) -> Result<()> {
        let id = file.id.clone();
        tracing::info!(file_id = %id, %digest, url = %record.url, "content already stored, skipping transfer");

        let mut meta = Meta::from([(META_MD5.to_string(), Value::from(record.digest))]);
        if let Some(src) = record.src {
            meta.insert(META_SRC.to_string(), Value::from(src));
        }
        self.registry.set_file_meta(&id, meta).await.or_raise(|| ErrorKind::Registry)?;
        let snapshot = self.file(&id).await?;

        let response = TransferResponse::instant(record.url);
        let file = match self.mark_stored(snapshot.clone(), &response).await {
            Ok(file) => file,
            Err(err) => {
                self.restore(snapshot).await;
                return Err(err);
            },
        };
        self.set_stage(&id, Stage::InstantComplete).await;
        self.events.emit(TransferEvent::TransferSucceeded { file_id: id, response });
        self.deliver(&TransferResult::from_file(&file, digest.as_str()));
        Ok(())
    }

    async fn mark_stored(&self, file: TransferFile, response: &TransferResponse) -> Result<TransferFile> {
        let id = file.id.clone();
        // Re-registering drops whatever transfer the host had queued.
        self.registry.remove_file(&id).await.or_raise(|| ErrorKind::Registry)?;
        self.registry.add_file(file).await.or_raise(|| ErrorKind::Registry)?;
        let patch = StatePatch::default().progress(Progress::complete()).response(response.clone());
        self.registry.set_file_state(&id, patch).await.or_raise(|| ErrorKind::Registry)?;
        self.file(&id).await
    }

    async fn restore(&self, snapshot: TransferFile) {
        let id = snapshot.id.clone();
        // The file may be gone if re-registration failed halfway.
        if let Err(err) = self.registry.remove_file(&id).await {
            tracing::debug!(file_id = %id, error = ?err, "nothing to remove before restoring");
        }
        if let Err(err) = self.registry.add_file(snapshot).await {
            tracing::error!(file_id = %id, error = ?err, "could not restore file after failed instant completion");
        }
    }

    async fn proceed(&self, id: &FileId) {
        self.set_stage(id, Stage::ProceedToTransfer).await;
        self.events.emit(TransferEvent::PreprocessComplete { file_id: id.clone() });
    }
}
