//! Multi-document merge batches: collect, confirm order, merge.

pub mod batch;
pub mod coordinator;

pub use batch::{BatchPhase, Direction, MergeBatch};
pub use coordinator::{BatchSnapshot, CancelledBatch, MergeCoordinator, RemoveOutcome};
