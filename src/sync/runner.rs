//! Top-level sync entry points, invoked by an external scheduler.
//!
//! One run at a time; conversations are processed sequentially so no two
//! workers ever touch the same cursor. A conversation's failure is recorded
//! in its sync_status row and does not abort the run — unless recording
//! itself fails, which means the storage backend as a whole is down and the
//! run ends cleanly for the next schedule to retry.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::VaultError;
use crate::filter::ChatFilter;
use crate::remote::{ChatClient, RemoteConversation};
use crate::storage::Storage;
use crate::sync::media::MediaQueue;
use crate::sync::{pipeline, reconcile};

#[derive(Debug, Default)]
pub struct PassSummary {
    pub conversations_seen: usize,
    pub conversations_synced: usize,
    pub conversations_failed: usize,
    pub messages_inserted: usize,
}

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub conversations_checked: usize,
    pub messages_deleted: usize,
    pub messages_edited: usize,
}

/// Run one full sync pass over every conversation that passes the filter.
/// The client handle is externally owned; acquisition and release bracket
/// this call in the caller.
pub async fn run_sync_pass(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    config: &Config,
) -> Result<PassSummary, VaultError> {
    let conversations = list_conversations(client).await?;
    let filter = ChatFilter::new(&config.filter);
    let queue = MediaQueue::new();

    info!("Starting sync pass over {} conversations", conversations.len());

    let mut summary = PassSummary::default();
    for conv in &conversations {
        if !filter.should_sync(conv.kind, conv.id) {
            debug!("Skipping conversation {} ({})", conv.id, conv.kind.as_str());
            continue;
        }
        summary.conversations_seen += 1;

        match pipeline::sync_conversation(client, storage, config, &queue, conv).await {
            Ok(outcome) => {
                summary.conversations_synced += 1;
                summary.messages_inserted += outcome.inserted;
                if outcome.batches == 0 {
                    // Nothing new; still refresh the audit trail
                    storage.record_sync_ok(conv.id)?;
                }
            }
            Err(VaultError::RemoteUnavailable(e)) => {
                // Transport is gone; every later conversation would fail too
                return Err(VaultError::RemoteUnavailable(e));
            }
            Err(e) => {
                error!("Sync failed for conversation {}: {}", conv.id, e);
                summary.conversations_failed += 1;
                storage.record_sync_error(conv.id, &e.to_string())?;
            }
        }
    }

    info!(
        "Sync pass done: {} conversations, {} new messages, {} failed",
        summary.conversations_synced, summary.messages_inserted, summary.conversations_failed
    );
    Ok(summary)
}

/// Run the edit/delete reconciliation pass over already-synced
/// conversations. A no-op unless enabled in configuration.
pub async fn run_reconcile_pass(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    config: &Config,
) -> Result<ReconcileSummary, VaultError> {
    if !config.reconcile.enabled {
        debug!("Reconciliation disabled, skipping");
        return Ok(ReconcileSummary::default());
    }

    let filter = ChatFilter::new(&config.filter);
    let mut summary = ReconcileSummary::default();

    for conv in storage.list_conversations(false)? {
        if !filter.should_sync(conv.kind, conv.id) {
            continue;
        }
        summary.conversations_checked += 1;

        match reconcile::reconcile_conversation(client, storage, config.reconcile.window, conv.id)
            .await
        {
            Ok(outcome) => {
                summary.messages_deleted += outcome.deleted;
                summary.messages_edited += outcome.edited;
            }
            Err(VaultError::RemoteUnavailable(e)) => {
                return Err(VaultError::RemoteUnavailable(e));
            }
            Err(e) => {
                error!("Reconciliation failed for conversation {}: {}", conv.id, e);
            }
        }
    }

    info!(
        "Reconcile pass done: {} conversations, {} deleted, {} edited",
        summary.conversations_checked, summary.messages_deleted, summary.messages_edited
    );
    Ok(summary)
}

async fn list_conversations(
    client: &dyn ChatClient,
) -> Result<Vec<RemoteConversation>, VaultError> {
    loop {
        match client.list_conversations().await {
            Ok(conversations) => return Ok(conversations),
            Err(VaultError::RateLimited(seconds)) => {
                warn!("Rate limited listing conversations, cooling down {}s", seconds);
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
