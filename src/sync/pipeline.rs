//! Batch fetch-and-persist pipeline for one conversation.
//!
//! Pages are requested strictly after the cursor in ascending remote-id
//! order, normalized, and committed as one transaction each. The cursor is
//! advanced only after its batch has durably committed; a crash between the
//! two leaves a batch that the conflict-ignore insert policy makes harmless
//! to replay. A storage failure aborts paging for this conversation — retry
//! belongs to the next scheduled run.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::VaultError;
use crate::remote::{ChatClient, RemoteConversation, RemoteMessage};
use crate::storage::records::{
    AttachmentRecord, ConversationRecord, MessageBatch, NewMessage, ReactionUpdate, SenderRecord,
};
use crate::storage::Storage;
use crate::sync::cursor::CursorTracker;
use crate::sync::media::{self, MediaQueue};
use crate::types::DownloadStatus;

#[derive(Debug, Default)]
pub struct ConversationOutcome {
    pub batches: u32,
    pub inserted: usize,
    pub cursor: Option<i64>,
}

pub async fn sync_conversation(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    config: &Config,
    queue: &MediaQueue,
    remote: &RemoteConversation,
) -> Result<ConversationOutcome, VaultError> {
    storage.upsert_conversation(&normalize_conversation(remote))?;

    let tracker = CursorTracker::new(storage, config.sync.initial_sync);
    let mut cursor = tracker.resume_point(client, remote.id).await?;
    let batch_size = config.sync.batch_size;

    let mut outcome = ConversationOutcome::default();

    loop {
        let page = fetch_page(client, remote.id, cursor, batch_size).await?;
        if page.is_empty() {
            break;
        }

        let batch = build_batch(remote.id, &page);
        let inserted = storage.commit_message_batch(&batch)?;

        let max_id = page.iter().map(|m| m.id).max().unwrap_or(cursor);
        if max_id <= cursor {
            warn!(
                "Remote returned ids at or below cursor {} for conversation {}, stopping",
                cursor, remote.id
            );
            break;
        }

        tracker.advance(remote.id, max_id)?;
        cursor = max_id;
        outcome.batches += 1;
        outcome.inserted += inserted;
        outcome.cursor = Some(max_id);

        debug!(
            "Committed batch of {} ({} new) for conversation {}, cursor now {}",
            page.len(),
            inserted,
            remote.id,
            max_id
        );

        // Media is acquired only for committed messages
        for attachment in batch.attachments {
            queue.push(attachment);
        }
        media::drain_queue(client, storage, &config.media, queue).await;

        if (page.len() as u32) < batch_size {
            break;
        }
    }

    // Attachments left pending by an earlier interrupted run
    for attachment in storage.list_pending_attachments(remote.id)? {
        queue.push(attachment);
    }
    media::drain_queue(client, storage, &config.media, queue).await;

    if outcome.batches > 0 {
        info!(
            "Synced conversation {}: {} new messages in {} batches, cursor {}",
            remote.id,
            outcome.inserted,
            outcome.batches,
            cursor
        );
    }

    Ok(outcome)
}

/// Fetch one page, honoring the remote's cooldown instruction. A rate limit
/// is a pause, not a failure: progress already committed in this run keeps
/// its cursor and the same page is retried after the wait.
async fn fetch_page(
    client: &dyn ChatClient,
    conversation_id: i64,
    after_id: i64,
    limit: u32,
) -> Result<Vec<RemoteMessage>, VaultError> {
    loop {
        match client.fetch_messages(conversation_id, after_id, limit).await {
            Ok(page) => return Ok(page),
            Err(VaultError::RateLimited(seconds)) => {
                warn!(
                    "Rate limited on conversation {}, cooling down {}s",
                    conversation_id, seconds
                );
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn normalize_conversation(remote: &RemoteConversation) -> ConversationRecord {
    ConversationRecord {
        id: remote.id,
        kind: remote.kind,
        title: remote.title.clone(),
        username: remote.username.clone(),
        description: remote.description.clone(),
        participant_count: remote.participant_count,
        last_synced_message_id: None,
    }
}

/// Normalize one remote page into the shapes the storage contract commits:
/// deduplicated senders, conflict-ignorable messages, attachment
/// placeholders, and full reaction sets.
pub fn build_batch(conversation_id: i64, page: &[RemoteMessage]) -> MessageBatch {
    let mut senders: HashMap<i64, SenderRecord> = HashMap::new();
    let mut batch = MessageBatch::default();

    for msg in page {
        if let Some(sender) = &msg.sender {
            senders.insert(
                sender.id,
                SenderRecord {
                    id: sender.id,
                    username: sender.username.clone(),
                    first_name: sender.first_name.clone(),
                    last_name: sender.last_name.clone(),
                    is_bot: sender.is_bot,
                },
            );
        }

        if let Some(media) = &msg.media {
            batch.attachments.push(AttachmentRecord {
                id: media.id.clone(),
                conversation_id,
                message_id: msg.id,
                kind: media.kind,
                file_name: media.file_name.clone(),
                mime_type: media.mime_type.clone(),
                size_bytes: media.size_bytes,
                width: media.width,
                height: media.height,
                duration_secs: media.duration_secs,
                local_path: None,
                status: DownloadStatus::Pending,
            });
        }

        if !msg.reactions.is_empty() {
            batch.reactions.push(ReactionUpdate {
                conversation_id,
                message_id: msg.id,
                counts: msg.reactions.clone(),
            });
        }

        batch.messages.push(NewMessage {
            conversation_id,
            remote_id: msg.id,
            sender_id: msg.sender.as_ref().map(|s| s.id),
            text: msg.text.clone(),
            sent_at: msg.sent_at,
            edited_at: msg.edited_at,
            reply_to_id: msg.reply_to_id,
            is_outgoing: msg.is_outgoing,
            media_id: msg.media.as_ref().map(|m| m.id.clone()),
            raw_data: msg.raw_data.as_ref().map(|v| v.to_string()),
        });
    }

    batch.senders = senders.into_values().collect();
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialSync;
    use crate::storage::sqlite::SqliteStorage;
    use crate::sync::testutil::{
        remote_conversation, remote_message, remote_message_with_media, FailingStorage,
        ScriptedClient,
    };
    use crate::types::{ConversationKind, ReactionCount};

    fn open_storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize_schema().unwrap();
        storage
    }

    fn test_config(media_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.media.dir = media_dir.to_path_buf();
        config
    }

    fn history_client(conversation_id: i64, count: i64) -> ScriptedClient {
        ScriptedClient::new().with_conversation(
            remote_conversation(conversation_id, ConversationKind::Group),
            (1..=count).map(remote_message).collect(),
        )
    }

    #[test]
    fn test_build_batch_normalizes_page() {
        let mut page = vec![remote_message(1), remote_message(2)];
        page.push(remote_message_with_media(3, 2048));
        page[0].reactions = vec![ReactionCount {
            emoji: "👍".to_string(),
            count: 2,
        }];

        let batch = build_batch(7, &page);
        assert_eq!(batch.messages.len(), 3);
        // One sender shared by all three messages
        assert_eq!(batch.senders.len(), 1);
        assert_eq!(batch.senders[0].id, 500);
        assert_eq!(batch.attachments.len(), 1);
        assert_eq!(batch.attachments[0].message_id, 3);
        assert_eq!(batch.attachments[0].status, DownloadStatus::Pending);
        assert_eq!(batch.reactions.len(), 1);
        assert_eq!(batch.messages[2].media_id.as_deref(), Some("media-3"));
    }

    #[tokio::test]
    async fn test_full_history_in_three_batches() {
        let dir = tempfile::tempdir().unwrap();
        let client = history_client(7, 250);
        let storage = open_storage();
        let config = test_config(dir.path());
        let queue = MediaQueue::new();

        let conv = remote_conversation(7, ConversationKind::Group);
        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();

        // 250 messages at batch size 100: exactly 3 committed batches
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.inserted, 250);
        assert_eq!(outcome.cursor, Some(250));
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(250));
        assert_eq!(storage.message_count(7, None).unwrap(), 250);
        assert_eq!(
            client.fetch_log().iter().map(|(_, a)| *a).collect::<Vec<_>>(),
            vec![0, 100, 200]
        );

        let status = storage.get_sync_status(7).unwrap().unwrap();
        assert_eq!(status.message_count, 250);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_preserves_cursor_then_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let client = history_client(7, 250);
        let storage = FailingStorage::new(open_storage(), 2);
        let config = test_config(dir.path());
        let queue = MediaQueue::new();
        let conv = remote_conversation(7, ConversationKind::Group);

        // Second batch fails: the run stops with the cursor at 100
        let err = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(100));
        assert_eq!(storage.message_count(7, None).unwrap(), 100);

        // Resumed run fetches only 101..250
        storage.disarm();
        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();
        assert_eq!(outcome.batches, 2);
        assert_eq!(outcome.inserted, 150);
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(250));
        assert_eq!(storage.message_count(7, None).unwrap(), 250);

        let resumed_after_ids: Vec<i64> = client
            .fetch_log()
            .iter()
            .skip(2) // two fetches from the failed run
            .map(|(_, a)| *a)
            .collect();
        assert_eq!(resumed_after_ids, vec![100, 200]);
    }

    #[tokio::test]
    async fn test_replay_after_crash_between_commit_and_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let client = history_client(7, 250);
        let storage = open_storage();
        let config = test_config(dir.path());
        let queue = MediaQueue::new();
        let conv = remote_conversation(7, ConversationKind::Group);

        // Simulate a crash after the first batch committed but before the
        // cursor write: rows exist, watermark does not.
        storage
            .upsert_conversation(&normalize_conversation(&conv))
            .unwrap();
        let first_page: Vec<_> = (1..=100).map(remote_message).collect();
        storage
            .commit_message_batch(&build_batch(7, &first_page))
            .unwrap();
        assert_eq!(storage.get_sync_cursor(7).unwrap(), None);

        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();

        // The replayed first page inserts nothing; no duplicates, cursor
        // advances correctly
        assert_eq!(outcome.inserted, 150);
        assert_eq!(storage.message_count(7, None).unwrap(), 250);
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(250));
    }

    #[tokio::test]
    async fn test_rate_limit_is_pause_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let client = history_client(7, 150);
        client.inject_fetch_error(7, VaultError::RateLimited(0));
        let storage = open_storage();
        let config = test_config(dir.path());
        let queue = MediaQueue::new();
        let conv = remote_conversation(7, ConversationKind::Group);

        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 150);
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(150));
        // One extra fetch for the rate-limited attempt
        assert_eq!(client.fetch_log().len(), 3);
    }

    #[tokio::test]
    async fn test_media_acquired_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new()
            .with_conversation(
                remote_conversation(7, ConversationKind::Group),
                vec![
                    remote_message(1),
                    remote_message_with_media(2, 1024),
                    remote_message_with_media(3, 500 * 1024 * 1024),
                ],
            )
            .with_media_bytes(b"jpeg".to_vec());
        let storage = open_storage();
        let config = test_config(dir.path());
        let queue = MediaQueue::new();
        let conv = remote_conversation(7, ConversationKind::Group);

        sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();

        let small = storage.get_attachment("media-2").unwrap().unwrap();
        assert_eq!(small.status, DownloadStatus::Downloaded);
        let path = small.local_path.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");

        // Oversized sibling was never attempted
        let big = storage.get_attachment("media-3").unwrap().unwrap();
        assert_eq!(big.status, DownloadStatus::SkippedTooLarge);
        assert_eq!(client.download_count(), 1);
    }

    #[tokio::test]
    async fn test_new_only_seeds_cursor_without_backfill() {
        let dir = tempfile::tempdir().unwrap();
        let client = history_client(7, 50);
        let storage = open_storage();
        let mut config = test_config(dir.path());
        config.sync.initial_sync = InitialSync::NewOnly;
        let queue = MediaQueue::new();
        let conv = remote_conversation(7, ConversationKind::Group);

        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();

        assert_eq!(outcome.batches, 0);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(storage.message_count(7, None).unwrap(), 0);
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(50));

        // Messages arriving later are picked up from the seeded cursor
        let client = history_client(7, 60);
        let outcome = sync_conversation(&client, &storage, &config, &queue, &conv)
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 10);
        assert_eq!(storage.get_sync_cursor(7).unwrap(), Some(60));
        assert_eq!(client.fetch_log()[0].1, 50);
    }
}
