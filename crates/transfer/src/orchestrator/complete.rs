use super::Orchestrator;
use crate::error::{ErrorKind, Result};
use crate::file::{FileId, META_SRC, Meta, StatePatch, TransferResponse};
use crate::result::TransferResult;
use crate::stage::{Stage, TransferDecision};
use exn::ResultExt;
use serde_json::Value;
use twin_catalog::Lookup;

impl Orchestrator {
    /// Finalize a file the transfer layer reports as stored.
    ///
    /// Records `response` on the file, then (unless the transfer layer says
    /// the content was already there) looks the digest up again to attach
    /// the store's canonical URL and source. Returns the result delivered to
    /// the result callback, or `None` if the file was already finalized (or
    /// another call is finalizing it right now).
    ///
    /// Fails with [`MissingDigest`](ErrorKind::MissingDigest) if the file
    /// never had a digest attached; nothing is delivered for it. A catalog
    /// that can't resolve the digest is not an error: the file is finalized
    /// with the URL from `response`.
    pub async fn complete(&self, id: &FileId, response: TransferResponse) -> Result<Option<TransferResult>> {
        let previous = match self.claim_for_completion(id).await {
            Ok(previous) => previous,
            Err(stage) => {
                tracing::debug!(file_id = %id, %stage, "already finalized or being finalized");
                return Ok(None);
            },
        };
        match self.finalize(id, response).await {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                // Let a later attempt try again.
                self.release(id, previous).await;
                Err(err)
            },
        }
    }

    async fn finalize(&self, id: &FileId, response: TransferResponse) -> Result<TransferResult> {
        let file = self.file(id).await?;
        let Some(digest) = file.digest().map(str::to_string) else {
            exn::bail!(ErrorKind::MissingDigest(id.clone()));
        };

        let mut patch = StatePatch::default().response(response.clone());
        if let Some(url) = &response.upload_url {
            patch = patch.upload_url(url.clone());
        }
        self.registry.set_file_state(id, patch).await.or_raise(|| ErrorKind::Registry)?;

        let decision = if response.instant {
            TransferDecision::ReuseAfterTransfer
        } else {
            self.set_stage(id, Stage::ResolvingCanonical).await;
            self.resolve_canonical(id, &digest).await?;
            TransferDecision::ProceedToTransfer
        };

        let file = self.file(id).await?;
        let result = TransferResult::from_file(&file, &digest);
        self.set_stage(id, Stage::Finalized(decision)).await;
        self.deliver(&result);
        Ok(result)
    }

    async fn resolve_canonical(&self, id: &FileId, digest: &str) -> Result<()> {
        let record = match self.catalog.lookup(digest).await {
            Ok(Lookup::Found(record)) => record,
            Ok(Lookup::NotFound { status, message }) => {
                tracing::warn!(file_id = %id, digest, %status, reason = message.as_deref(), "transferred content not in catalog");
                return Ok(());
            },
            Err(err) => {
                tracing::warn!(file_id = %id, digest, error = ?err, "lookup failed");
                return Ok(());
            },
        };
        let patch = StatePatch::default().response(TransferResponse::uploaded(&record.url)).upload_url(&record.url);
        self.registry.set_file_state(id, patch).await.or_raise(|| ErrorKind::Registry)?;
        if let Some(src) = record.src {
            let meta = Meta::from([(META_SRC.to_string(), Value::from(src))]);
            self.registry.set_file_meta(id, meta).await.or_raise(|| ErrorKind::Registry)?;
        }
        Ok(())
    }
}
