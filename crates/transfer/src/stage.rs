use derive_more::Display;

/// Outcome of deciding how a file reaches the store.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDecision {
    /// The store already had the content before any transfer started.
    #[display("instant")]
    InstantComplete,
    /// The transfer layer found the content already present; the canonical
    /// location is only known afterwards.
    #[display("reused")]
    ReuseAfterTransfer,
    /// No match; the real transfer runs.
    #[display("transfer")]
    ProceedToTransfer,
}

/// Where a file is in the orchestrator's state machine.
///
/// ```text
/// Pending → Hashing → LookingUp → InstantComplete
///                               → ProceedToTransfer → Transferred → ResolvingCanonical → Finalized
/// ```
///
/// A digest cache hit goes straight from `Pending` to `LookingUp`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Pending,
    Hashing,
    LookingUp,
    InstantComplete,
    ProceedToTransfer,
    Transferred,
    ResolvingCanonical,
    #[display("Finalized({_0})")]
    Finalized(TransferDecision),
}
impl Stage {
    /// No further work will be done for the file.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InstantComplete | Self::Finalized(_))
    }
}
