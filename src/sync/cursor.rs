//! Per-conversation sync cursor: the resumability anchor.
//!
//! The cursor is the last remote message id known to be durably persisted,
//! never the last id attempted. It lives in the `sync_status` table and is
//! only written after the corresponding batch has committed.

use tracing::debug;

use crate::config::InitialSync;
use crate::error::VaultError;
use crate::remote::ChatClient;
use crate::storage::Storage;

pub struct CursorTracker<'a> {
    storage: &'a dyn Storage,
    initial_sync: InitialSync,
}

impl<'a> CursorTracker<'a> {
    pub fn new(storage: &'a dyn Storage, initial_sync: InitialSync) -> Self {
        Self {
            storage,
            initial_sync,
        }
    }

    /// The id to fetch strictly after. A conversation with no stored cursor
    /// resolves per the first-sync policy: `Full` starts from the oldest
    /// retrievable message; `NewOnly` seeds the cursor at the remote's
    /// current latest id so history is never backfilled.
    pub async fn resume_point(
        &self,
        client: &dyn ChatClient,
        conversation_id: i64,
    ) -> Result<i64, VaultError> {
        if let Some(cursor) = self.storage.get_sync_cursor(conversation_id)? {
            return Ok(cursor);
        }

        match self.initial_sync {
            InitialSync::Full => Ok(0),
            InitialSync::NewOnly => {
                let latest = loop {
                    match client.latest_message_id(conversation_id).await {
                        Ok(latest) => break latest.unwrap_or(0),
                        Err(VaultError::RateLimited(seconds)) => {
                            tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
                        }
                        Err(e) => return Err(e),
                    }
                };
                if latest > 0 {
                    debug!(
                        "Seeding cursor for conversation {} at {} (no history backfill)",
                        conversation_id, latest
                    );
                    self.storage.set_sync_cursor(conversation_id, latest)?;
                }
                Ok(latest)
            }
        }
    }

    /// Advance after a durably committed batch.
    pub fn advance(&self, conversation_id: i64, cursor: i64) -> Result<(), VaultError> {
        self.storage.set_sync_cursor(conversation_id, cursor)
    }
}
