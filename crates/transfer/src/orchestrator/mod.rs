//! Upload dedup decisions.
//!
//! The [`Orchestrator`] sits between the host's file registry and its
//! transfer layer. Before a batch is sent, [`prepare`](Orchestrator::prepare)
//! digests every file and asks the remote catalog whether the store already
//! has the content; files it has are marked complete on the spot and never
//! reach the transfer queue. After a real transfer,
//! [`complete`](Orchestrator::complete) looks the digest up again to learn
//! the canonical location and hands the final [`TransferResult`] to the
//! result callback.
//!
//! Dedup is strictly an optimisation: every failure along the way is logged
//! and the file falls back to a normal transfer.

mod complete;
mod prepare;

use crate::error::{ErrorKind, Result};
use crate::event::{SinkHandle, TransferEvent};
use crate::file::{FileId, TransferFile};
use crate::registry::RegistryHandle;
use crate::result::{ResultCallback, TransferResult};
use crate::stage::Stage;
use exn::{OptionExt, ResultExt};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::pin;
use tokio::sync::RwLock;
use twin_cache::CacheHandle;
use twin_catalog::CatalogHandle;
use twin_hash::ChunkedHasher;

pub struct Orchestrator {
    registry: RegistryHandle,
    events: SinkHandle,
    cache: CacheHandle,
    catalog: CatalogHandle,
    hasher: ChunkedHasher,
    on_result: Option<ResultCallback>,
    stages: RwLock<HashMap<FileId, Stage>>,
}

impl Orchestrator {
    pub fn new(registry: RegistryHandle, events: SinkHandle, cache: CacheHandle, catalog: CatalogHandle) -> Self {
        Self {
            registry,
            events,
            cache,
            catalog,
            hasher: ChunkedHasher::default(),
            on_result: None,
            stages: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_hasher(mut self, hasher: ChunkedHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.on_result = Some(callback);
        self
    }

    /// Current position of `id` in the state machine, if the orchestrator
    /// has seen it.
    pub async fn stage(&self, id: &FileId) -> Option<Stage> {
        self.stages.read().await.get(id).copied()
    }

    /// Finalize every file the stream reports as transferred, until the
    /// stream ends. Returns how many results were delivered.
    ///
    /// Failures are logged per file and do not stop the loop. Echoes of the
    /// orchestrator's own `TransferSucceeded` events are ignored.
    pub async fn drive(&self, events: impl Stream<Item = TransferEvent>) -> usize {
        let mut events = pin!(events);
        let mut delivered = 0;
        while let Some(event) = events.next().await {
            let TransferEvent::TransferSucceeded { file_id, response } = event else {
                continue;
            };
            match self.complete(&file_id, response).await {
                Ok(Some(_)) => delivered += 1,
                Ok(None) => {},
                Err(err) => tracing::warn!(%file_id, error = ?err, "could not finalize transferred file"),
            }
        }
        delivered
    }

    /// Drop what the orchestrator remembers about `id`, returning its last
    /// stage. Hosts call this once they are done with a file; afterwards
    /// [`complete`](Self::complete) no longer recognises it as finalized.
    pub async fn forget(&self, id: &FileId) -> Option<Stage> {
        self.stages.write().await.remove(id)
    }

    /// Atomically move `id` into [`Stage::Transferred`] unless it is already
    /// finalized or being finalized, in which case the current stage is
    /// returned. On success, the stage it was claimed from.
    async fn claim_for_completion(&self, id: &FileId) -> std::result::Result<Option<Stage>, Stage> {
        let mut stages = self.stages.write().await;
        match stages.get(id).copied() {
            Some(stage) if stage.is_terminal() || matches!(stage, Stage::Transferred | Stage::ResolvingCanonical) => {
                Err(stage)
            },
            previous => {
                stages.insert(id.clone(), Stage::Transferred);
                Ok(previous)
            },
        }
    }

    async fn release(&self, id: &FileId, previous: Option<Stage>) {
        let mut stages = self.stages.write().await;
        match previous {
            Some(stage) => stages.insert(id.clone(), stage),
            None => stages.remove(id),
        };
    }

    async fn set_stage(&self, id: &FileId, stage: Stage) {
        tracing::trace!(file_id = %id, %stage, "stage");
        self.stages.write().await.insert(id.clone(), stage);
    }

    async fn file(&self, id: &FileId) -> Result<TransferFile> {
        let file = self.registry.get_file(id).await.or_raise(|| ErrorKind::Registry)?;
        file.ok_or_raise(|| ErrorKind::UnknownFile(id.clone()))
    }

    fn deliver(&self, result: &TransferResult) {
        tracing::info!(digest = %result.id, url = result.url.as_deref(), instant = result.instant, "file stored");
        if let Some(callback) = &self.on_result {
            callback(result);
        }
    }
}
