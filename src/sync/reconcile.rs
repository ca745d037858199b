//! Reconciliation pass: detect remote edits and deletions after initial
//! sync. Independent of the cursor; bounded to a recent window of each
//! conversation and safe to run on its own, less frequent schedule.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::VaultError;
use crate::remote::{ChatClient, RemoteMessage};
use crate::storage::Storage;

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub deleted: usize,
    pub edited: usize,
}

/// Re-list the newest `window` remote messages and diff them against the
/// same local window. Local ids at or above the remote window floor that
/// are gone remotely get the soft-delete flag; ids present on both sides
/// with a newer remote edit timestamp get their latest revision.
pub async fn reconcile_conversation(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    window: u32,
    conversation_id: i64,
) -> Result<ReconcileOutcome, VaultError> {
    let remote = fetch_window(client, conversation_id, window).await?;
    if remote.is_empty() {
        // Indistinguishable from a failed listing; touch nothing
        debug!(
            "Empty remote window for conversation {}, skipping reconciliation",
            conversation_id
        );
        return Ok(ReconcileOutcome::default());
    }

    let floor = remote.iter().map(|m| m.id).min().unwrap_or(0);
    let remote_by_id: HashMap<i64, &RemoteMessage> =
        remote.iter().map(|m| (m.id, m)).collect();

    let local = storage.list_recent_messages(conversation_id, window)?;

    let mut outcome = ReconcileOutcome::default();
    for (remote_id, local_edited_at) in local {
        // Below the window floor we cannot tell "deleted" from "aged out"
        if remote_id < floor {
            continue;
        }

        match remote_by_id.get(&remote_id) {
            None => {
                if storage.mark_message_deleted(conversation_id, remote_id)? {
                    outcome.deleted += 1;
                }
            }
            Some(msg) => {
                if let Some(remote_edited_at) = msg.edited_at {
                    let is_newer = local_edited_at.map_or(true, |local| remote_edited_at > local);
                    if is_newer
                        && storage.update_message_edit(
                            conversation_id,
                            remote_id,
                            msg.text.as_deref(),
                            remote_edited_at,
                        )?
                    {
                        outcome.edited += 1;
                    }
                }
            }
        }
    }

    if outcome.deleted > 0 || outcome.edited > 0 {
        info!(
            "Reconciled conversation {}: {} deleted, {} edited",
            conversation_id, outcome.deleted, outcome.edited
        );
    }
    Ok(outcome)
}

async fn fetch_window(
    client: &dyn ChatClient,
    conversation_id: i64,
    window: u32,
) -> Result<Vec<RemoteMessage>, VaultError> {
    loop {
        match client.fetch_recent_messages(conversation_id, window).await {
            Ok(messages) => return Ok(messages),
            Err(VaultError::RateLimited(seconds)) => {
                warn!(
                    "Rate limited listing recent messages of {}, cooling down {}s",
                    conversation_id, seconds
                );
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
