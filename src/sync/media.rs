//! Media acquisition sub-pipeline.
//!
//! Attachments are acquired best-effort after their messages are committed:
//! a task queue is fed once per persisted message carrying an attachment and
//! drained with bounded concurrency after each batch commit. Nothing here
//! ever fails the sync — a download error is recorded on the attachment row
//! and forgotten.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::VaultError;
use crate::remote::ChatClient;
use crate::storage::records::AttachmentRecord;
use crate::storage::Storage;
use crate::types::DownloadStatus;

/// Pending downloads, fed by the pipeline after each committed batch.
pub struct MediaQueue {
    tx: flume::Sender<AttachmentRecord>,
    rx: flume::Receiver<AttachmentRecord>,
}

impl MediaQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, attachment: AttachmentRecord) {
        // Receiver lives as long as the queue; send cannot fail
        let _ = self.tx.send(attachment);
    }

    fn take_all(&self) -> Vec<AttachmentRecord> {
        self.rx.try_iter().collect()
    }
}

impl Default for MediaQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the queue, downloading with bounded concurrency. No ordering
/// guarantee relative to message persistence: attachment state is
/// independently idempotent.
pub async fn drain_queue(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    config: &MediaConfig,
    queue: &MediaQueue,
) {
    let tasks = queue.take_all();
    if tasks.is_empty() {
        return;
    }

    futures::stream::iter(tasks)
        .for_each_concurrent(config.concurrency.max(1), |attachment| async move {
            if let Err(e) = acquire(client, storage, config, &attachment).await {
                warn!("Media bookkeeping failed for {}: {}", attachment.id, e);
            }
        })
        .await;
}

/// Decide and (maybe) download one attachment. Policy first, then a streamed
/// write to the deterministic local path. Only storage bookkeeping errors
/// escape; download failures are recorded as `failed` on the row.
async fn acquire(
    client: &dyn ChatClient,
    storage: &dyn Storage,
    config: &MediaConfig,
    attachment: &AttachmentRecord,
) -> Result<(), VaultError> {
    // Re-read stored state: a replayed batch re-enqueues attachments that
    // may already be resolved.
    let current = match storage.get_attachment(&attachment.id)? {
        Some(current) => current,
        None => return Ok(()),
    };
    if current.status != DownloadStatus::Pending {
        return Ok(());
    }

    if !config.download {
        storage.update_attachment_status(&current.id, DownloadStatus::SkippedByPolicy, None)?;
        return Ok(());
    }

    if let Some(size) = current.size_bytes {
        if size as u64 > config.max_size_bytes() {
            debug!(
                "Skipping {} ({} bytes over {} limit)",
                current.id,
                size,
                config.max_size_bytes()
            );
            storage.update_attachment_status(&current.id, DownloadStatus::SkippedTooLarge, None)?;
            return Ok(());
        }
    }

    let dest = media_path(&config.dir, &current);
    match download(client, &current.id, &dest).await {
        Ok(bytes) => {
            info!("Downloaded {} ({} bytes) to {:?}", current.id, bytes, dest);
            storage.update_attachment_status(
                &current.id,
                DownloadStatus::Downloaded,
                Some(&dest.to_string_lossy()),
            )?;
        }
        Err(e) => {
            warn!("Download failed for {}: {}", current.id, e);
            storage.update_attachment_status(&current.id, DownloadStatus::Failed, None)?;
        }
    }
    Ok(())
}

/// Deterministic local path: conversation directory plus a stable content
/// name derived from the remote id (so re-downloads overwrite, never fork).
pub fn media_path(dir: &Path, attachment: &AttachmentRecord) -> PathBuf {
    let name = match &attachment.file_name {
        Some(file_name) => format!("{}_{}", attachment.id, file_name),
        None => format!("{}.{}", attachment.id, attachment.kind.extension()),
    };
    dir.join(attachment.conversation_id.to_string()).join(name)
}

async fn download(
    client: &dyn ChatClient,
    media_id: &str,
    dest: &Path,
) -> Result<u64, VaultError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| VaultError::MediaDownload(format!("mkdir {:?}: {}", parent, e)))?;
    }

    let mut reader = client.download_media(media_id).await?;
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| VaultError::MediaDownload(format!("create {:?}: {}", dest, e)))?;

    let bytes = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| VaultError::MediaDownload(format!("stream to {:?}: {}", dest, e)))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testutil::ScriptedClient;
    use crate::storage::records::ConversationRecord;
    use crate::storage::sqlite::SqliteStorage;
    use crate::types::{ConversationKind, MediaKind};

    fn storage_with_attachment(size_bytes: Option<i64>) -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize_schema().unwrap();
        storage
            .upsert_conversation(&ConversationRecord {
                id: 1,
                kind: ConversationKind::Direct,
                title: None,
                username: None,
                description: None,
                participant_count: None,
                last_synced_message_id: None,
            })
            .unwrap();
        storage
            .upsert_attachment(&attachment(size_bytes))
            .unwrap();
        storage
    }

    fn attachment(size_bytes: Option<i64>) -> AttachmentRecord {
        AttachmentRecord {
            id: "media-1".to_string(),
            conversation_id: 1,
            message_id: 10,
            kind: MediaKind::Photo,
            file_name: Some("photo.jpg".to_string()),
            mime_type: Some("image/jpeg".to_string()),
            size_bytes,
            width: None,
            height: None,
            duration_secs: None,
            local_path: None,
            status: DownloadStatus::Pending,
        }
    }

    fn media_config(dir: &Path, download: bool) -> MediaConfig {
        MediaConfig {
            download,
            max_size_mb: 100,
            dir: dir.to_path_buf(),
            concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_toggle_off_records_skipped_by_policy() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_with_attachment(Some(1024));
        let client = ScriptedClient::new();
        let config = media_config(dir.path(), false);

        let queue = MediaQueue::new();
        queue.push(attachment(Some(1024)));
        drain_queue(&client, &storage, &config, &queue).await;

        let stored = storage.get_attachment("media-1").unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::SkippedByPolicy);
        assert_eq!(client.download_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_attachment_not_attempted() {
        let dir = tempfile::tempdir().unwrap();
        // 150MB against a 100MB threshold
        let storage = storage_with_attachment(Some(150 * 1024 * 1024));
        let client = ScriptedClient::new();
        let config = media_config(dir.path(), true);

        let queue = MediaQueue::new();
        queue.push(attachment(Some(150 * 1024 * 1024)));
        drain_queue(&client, &storage, &config, &queue).await;

        let stored = storage.get_attachment("media-1").unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::SkippedTooLarge);
        assert_eq!(client.download_count(), 0);
    }

    #[tokio::test]
    async fn test_download_writes_file_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_with_attachment(Some(11));
        let client = ScriptedClient::new().with_media_bytes(b"hello media".to_vec());
        let config = media_config(dir.path(), true);

        let queue = MediaQueue::new();
        queue.push(attachment(Some(11)));
        drain_queue(&client, &storage, &config, &queue).await;

        let stored = storage.get_attachment("media-1").unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Downloaded);
        let path = stored.local_path.expect("local path recorded");
        assert_eq!(std::fs::read(&path).unwrap(), b"hello media");
        assert!(path.contains(&format!("{}1{}", std::path::MAIN_SEPARATOR, std::path::MAIN_SEPARATOR)));
    }

    #[tokio::test]
    async fn test_download_failure_recorded_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_with_attachment(Some(11));
        let client = ScriptedClient::new().with_failing_media();
        let config = media_config(dir.path(), true);

        let queue = MediaQueue::new();
        queue.push(attachment(Some(11)));
        drain_queue(&client, &storage, &config, &queue).await;

        let stored = storage.get_attachment("media-1").unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Failed);
    }

    #[tokio::test]
    async fn test_rerun_on_downloaded_attachment_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_with_attachment(Some(11));
        let client = ScriptedClient::new().with_media_bytes(b"x".to_vec());
        let config = media_config(dir.path(), true);

        let queue = MediaQueue::new();
        queue.push(attachment(Some(11)));
        drain_queue(&client, &storage, &config, &queue).await;
        assert_eq!(client.download_count(), 1);

        // Re-enqueue (replayed batch): no second download
        queue.push(attachment(Some(11)));
        drain_queue(&client, &storage, &config, &queue).await;
        assert_eq!(client.download_count(), 1);
        let stored = storage.get_attachment("media-1").unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Downloaded);
    }

    #[test]
    fn test_media_path_is_deterministic() {
        let att = attachment(None);
        let a = media_path(Path::new("/tmp/media"), &att);
        let b = media_path(Path::new("/tmp/media"), &att);
        assert_eq!(a, b);
        assert!(a.ends_with("1/media-1_photo.jpg"));

        let mut unnamed = attachment(None);
        unnamed.file_name = None;
        let c = media_path(Path::new("/tmp/media"), &unnamed);
        assert!(c.ends_with("1/media-1.jpg"));
    }
}
