//! The incremental sync engine: cursor tracking, the batch
//! fetch-and-persist pipeline, best-effort media acquisition, and the
//! optional edit/delete reconciliation pass.

pub mod cursor;
pub mod media;
pub mod pipeline;
pub mod reconcile;
pub mod runner;

#[cfg(test)]
pub(crate) mod testutil;

pub use pipeline::{sync_conversation, ConversationOutcome};
pub use reconcile::{reconcile_conversation, ReconcileOutcome};
pub use runner::{run_reconcile_pass, run_sync_pass, PassSummary, ReconcileSummary};
