//! Events reported back to the host while files move through the pipeline.

use crate::file::{FileId, TransferResponse};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessProgress {
    /// Work is under way but its extent is unknown.
    Indeterminate { message: String },
    /// `value` is the completed fraction, in `0.0..=1.0`.
    Determinate { message: String, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    PreprocessProgress { file_id: FileId, progress: PreprocessProgress },
    /// Pre-transfer work is done and the file should be transferred normally.
    PreprocessComplete { file_id: FileId },
    /// The file's content is in the store. Hosts emit this after a real
    /// transfer; the orchestrator emits it for uploads it skipped.
    TransferSucceeded { file_id: FileId, response: TransferResponse },
}
impl TransferEvent {
    pub fn file_id(&self) -> &FileId {
        match self {
            Self::PreprocessProgress { file_id, .. }
            | Self::PreprocessComplete { file_id }
            | Self::TransferSucceeded { file_id, .. } => file_id,
        }
    }
}

/// Where the orchestrator sends [`TransferEvent`]s. Emitting never blocks
/// and never fails; a sink that can't deliver drops the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

pub type SinkHandle = Arc<dyn EventSink>;

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;
impl EventSink for NullSink {
    fn emit(&self, _event: TransferEvent) {}
}

impl EventSink for UnboundedSender<TransferEvent> {
    fn emit(&self, event: TransferEvent) {
        if let Err(err) = self.send(event) {
            tracing::trace!(file_id = %err.0.file_id(), "event receiver dropped; discarding event");
        }
    }
}
