//! Test doubles for the sync engine: a scripted remote client and a
//! failure-injecting storage wrapper.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::VaultError;
use crate::remote::{
    ChatClient, MediaStream, RemoteConversation, RemoteMedia, RemoteMessage, RemoteSender,
};
use crate::storage::records::{
    ArchiveStats, AttachmentRecord, ConversationRecord, MediaStats, MessageBatch, NewMessage,
    ReactionUpdate, SenderRecord, StoredMessage, SyncStatusRecord,
};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::Storage;
use crate::types::{ConversationKind, DownloadStatus, MediaKind};

pub(crate) fn remote_conversation(id: i64, kind: ConversationKind) -> RemoteConversation {
    RemoteConversation {
        id,
        kind,
        title: Some(format!("Conversation {}", id)),
        username: None,
        description: None,
        participant_count: Some(2),
    }
}

pub(crate) fn remote_message(id: i64) -> RemoteMessage {
    RemoteMessage {
        id,
        sender: Some(RemoteSender {
            id: 500,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: None,
            is_bot: false,
        }),
        text: Some(format!("message {}", id)),
        sent_at: 1_700_000_000_000 + id,
        edited_at: None,
        reply_to_id: None,
        is_outgoing: false,
        media: None,
        reactions: Vec::new(),
        raw_data: None,
    }
}

pub(crate) fn remote_message_with_media(id: i64, size_bytes: i64) -> RemoteMessage {
    let mut msg = remote_message(id);
    msg.media = Some(RemoteMedia {
        id: format!("media-{}", id),
        kind: MediaKind::Photo,
        file_name: Some(format!("photo-{}.jpg", id)),
        mime_type: Some("image/jpeg".to_string()),
        size_bytes: Some(size_bytes),
        width: Some(640),
        height: Some(480),
        duration_secs: None,
    });
    msg
}

/// Scripted in-memory remote service. Errors are injected per conversation
/// and consumed in order, ahead of the real page.
pub(crate) struct ScriptedClient {
    conversations: Vec<RemoteConversation>,
    messages: HashMap<i64, Vec<RemoteMessage>>,
    list_errors: Mutex<VecDeque<VaultError>>,
    fetch_errors: Mutex<HashMap<i64, VecDeque<VaultError>>>,
    fetch_log: Mutex<Vec<(i64, i64)>>,
    download_calls: AtomicUsize,
    media_bytes: Vec<u8>,
    media_fails: bool,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            messages: HashMap::new(),
            list_errors: Mutex::new(VecDeque::new()),
            fetch_errors: Mutex::new(HashMap::new()),
            fetch_log: Mutex::new(Vec::new()),
            download_calls: AtomicUsize::new(0),
            media_bytes: b"media bytes".to_vec(),
            media_fails: false,
        }
    }

    pub fn with_conversation(mut self, conv: RemoteConversation, messages: Vec<RemoteMessage>) -> Self {
        self.conversations.push(conv);
        let id = self.conversations.last().map(|c| c.id).unwrap_or(0);
        self.messages.insert(id, messages);
        self
    }

    pub fn with_media_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.media_bytes = bytes;
        self
    }

    pub fn with_failing_media(mut self) -> Self {
        self.media_fails = true;
        self
    }

    pub fn inject_list_error(&self, err: VaultError) {
        self.list_errors.lock().unwrap().push_back(err);
    }

    pub fn inject_fetch_error(&self, conversation_id: i64, err: VaultError) {
        self.fetch_errors
            .lock()
            .unwrap()
            .entry(conversation_id)
            .or_default()
            .push_back(err);
    }

    /// Remove a message, as if deleted on the remote side.
    pub fn delete_message(&mut self, conversation_id: i64, remote_id: i64) {
        if let Some(messages) = self.messages.get_mut(&conversation_id) {
            messages.retain(|m| m.id != remote_id);
        }
    }

    pub fn edit_message(&mut self, conversation_id: i64, remote_id: i64, text: &str, edited_at: i64) {
        if let Some(msg) = self
            .messages
            .get_mut(&conversation_id)
            .and_then(|m| m.iter_mut().find(|m| m.id == remote_id))
        {
            msg.text = Some(text.to_string());
            msg.edited_at = Some(edited_at);
        }
    }

    pub fn download_count(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// `(conversation_id, after_id)` for every fetch_messages call.
    pub fn fetch_log(&self) -> Vec<(i64, i64)> {
        self.fetch_log.lock().unwrap().clone()
    }

    fn pop_fetch_error(&self, conversation_id: i64) -> Option<VaultError> {
        self.fetch_errors
            .lock()
            .unwrap()
            .get_mut(&conversation_id)
            .and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, VaultError> {
        if let Some(err) = self.list_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.conversations.clone())
    }

    async fn fetch_messages(
        &self,
        conversation_id: i64,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, VaultError> {
        self.fetch_log.lock().unwrap().push((conversation_id, after_id));
        if let Some(err) = self.pop_fetch_error(conversation_id) {
            return Err(err);
        }

        let page = self
            .messages
            .get(&conversation_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.id > after_id)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page)
    }

    async fn fetch_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, VaultError> {
        if let Some(err) = self.pop_fetch_error(conversation_id) {
            return Err(err);
        }

        let mut messages = self
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by_key(|m| std::cmp::Reverse(m.id));
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn latest_message_id(&self, conversation_id: i64) -> Result<Option<i64>, VaultError> {
        Ok(self
            .messages
            .get(&conversation_id)
            .and_then(|messages| messages.iter().map(|m| m.id).max()))
    }

    async fn download_media(&self, _media_id: &str) -> Result<MediaStream, VaultError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.media_fails {
            return Err(VaultError::MediaDownload("scripted failure".to_string()));
        }
        Ok(Box::new(std::io::Cursor::new(self.media_bytes.clone())))
    }
}

/// Delegating storage wrapper that fails the Nth `commit_message_batch`
/// call, for crash-safety scenarios.
pub(crate) struct FailingStorage {
    inner: SqliteStorage,
    commits: AtomicUsize,
    fail_on_commit: usize,
}

impl FailingStorage {
    /// `fail_on_commit` is 1-based: 2 means "the second commit fails".
    pub fn new(inner: SqliteStorage, fail_on_commit: usize) -> Self {
        Self {
            inner,
            commits: AtomicUsize::new(0),
            fail_on_commit,
        }
    }

    pub fn disarm(&self) {
        self.commits.store(usize::MAX / 2, Ordering::SeqCst);
    }
}

impl Storage for FailingStorage {
    fn initialize_schema(&self) -> Result<(), VaultError> {
        self.inner.initialize_schema()
    }

    fn upsert_conversation(&self, conv: &ConversationRecord) -> Result<(), VaultError> {
        self.inner.upsert_conversation(conv)
    }

    fn get_conversation(&self, id: i64) -> Result<Option<ConversationRecord>, VaultError> {
        self.inner.get_conversation(id)
    }

    fn list_conversations(
        &self,
        include_empty: bool,
    ) -> Result<Vec<ConversationRecord>, VaultError> {
        self.inner.list_conversations(include_empty)
    }

    fn delete_conversation(&self, id: i64) -> Result<bool, VaultError> {
        self.inner.delete_conversation(id)
    }

    fn insert_messages(&self, batch: &[NewMessage]) -> Result<usize, VaultError> {
        self.inner.insert_messages(batch)
    }

    fn commit_message_batch(&self, batch: &MessageBatch) -> Result<usize, VaultError> {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_commit {
            return Err(VaultError::Storage("injected commit failure".to_string()));
        }
        self.inner.commit_message_batch(batch)
    }

    fn get_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
        search: Option<&str>,
    ) -> Result<Vec<StoredMessage>, VaultError> {
        self.inner.get_messages(conversation_id, limit, offset, search)
    }

    fn message_count(
        &self,
        conversation_id: i64,
        search: Option<&str>,
    ) -> Result<i64, VaultError> {
        self.inner.message_count(conversation_id, search)
    }

    fn list_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<(i64, Option<i64>)>, VaultError> {
        self.inner.list_recent_messages(conversation_id, limit)
    }

    fn mark_message_deleted(
        &self,
        conversation_id: i64,
        remote_id: i64,
    ) -> Result<bool, VaultError> {
        self.inner.mark_message_deleted(conversation_id, remote_id)
    }

    fn update_message_edit(
        &self,
        conversation_id: i64,
        remote_id: i64,
        new_body: Option<&str>,
        edited_at: i64,
    ) -> Result<bool, VaultError> {
        self.inner
            .update_message_edit(conversation_id, remote_id, new_body, edited_at)
    }

    fn get_sync_cursor(&self, conversation_id: i64) -> Result<Option<i64>, VaultError> {
        self.inner.get_sync_cursor(conversation_id)
    }

    fn set_sync_cursor(&self, conversation_id: i64, cursor: i64) -> Result<(), VaultError> {
        self.inner.set_sync_cursor(conversation_id, cursor)
    }

    fn upsert_sender(&self, sender: &SenderRecord) -> Result<(), VaultError> {
        self.inner.upsert_sender(sender)
    }

    fn get_sender(&self, id: i64) -> Result<Option<SenderRecord>, VaultError> {
        self.inner.get_sender(id)
    }

    fn upsert_attachment(&self, attachment: &AttachmentRecord) -> Result<(), VaultError> {
        self.inner.upsert_attachment(attachment)
    }

    fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRecord>, VaultError> {
        self.inner.get_attachment(id)
    }

    fn update_attachment_status(
        &self,
        id: &str,
        status: DownloadStatus,
        local_path: Option<&str>,
    ) -> Result<(), VaultError> {
        self.inner.update_attachment_status(id, status, local_path)
    }

    fn list_pending_attachments(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<AttachmentRecord>, VaultError> {
        self.inner.list_pending_attachments(conversation_id)
    }

    fn media_stats(&self) -> Result<MediaStats, VaultError> {
        self.inner.media_stats()
    }

    fn replace_reactions(&self, update: &ReactionUpdate) -> Result<(), VaultError> {
        self.inner.replace_reactions(update)
    }

    fn get_reactions(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<Vec<crate::types::ReactionCount>, VaultError> {
        self.inner.get_reactions(conversation_id, message_id)
    }

    fn get_sync_status(
        &self,
        conversation_id: i64,
    ) -> Result<Option<SyncStatusRecord>, VaultError> {
        self.inner.get_sync_status(conversation_id)
    }

    fn record_sync_ok(&self, conversation_id: i64) -> Result<(), VaultError> {
        self.inner.record_sync_ok(conversation_id)
    }

    fn record_sync_error(&self, conversation_id: i64, error: &str) -> Result<(), VaultError> {
        self.inner.record_sync_error(conversation_id, error)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, VaultError> {
        self.inner.get_metadata(key)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.inner.set_metadata(key, value)
    }

    fn stats(&self) -> Result<ArchiveStats, VaultError> {
        self.inner.stats()
    }
}
