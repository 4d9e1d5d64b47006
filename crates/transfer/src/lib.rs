//! Skip uploads the store already has.
//!
//! See [`Orchestrator`] for the pipeline. The host plugs in through two
//! traits: [`FileRegistry`] for reading and updating its files, and
//! [`EventSink`] for progress and completion events.

pub mod error;
mod event;
mod file;
mod orchestrator;
mod registry;
mod result;
mod stage;

pub use crate::event::{EventSink, NullSink, PreprocessProgress, SinkHandle, TransferEvent};
pub use crate::file::{
    FileId, META_MD5, META_SRC, META_TYPE, Meta, Progress, StatePatch, TransferFile, TransferResponse, TransferState,
};
pub use crate::orchestrator::Orchestrator;
pub use crate::registry::{FileRegistry, MemoryRegistry, RegistryHandle};
pub use crate::result::{ResultCallback, TransferResult};
pub use crate::stage::{Stage, TransferDecision};
