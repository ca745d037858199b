//! Backend-agnostic record shapes for the storage contract.
//!
//! These are decoupled from the remote client types: any source able to
//! produce them can be archived. All timestamps are unix epoch ms.

use serde::Serialize;

use crate::types::{ConversationKind, DownloadStatus, MediaKind, ReactionCount};

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub kind: ConversationKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub participant_count: Option<i64>,
    /// Mirror of the sync_status cursor; None until the first committed batch
    pub last_synced_message_id: Option<i64>,
}

/// A message ready to be inserted. Keyed by `(conversation_id, remote_id)`;
/// inserts are conflict-ignored so replaying a batch is harmless.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub remote_id: i64,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    pub sent_at: i64,
    pub edited_at: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub is_outgoing: bool,
    pub media_id: Option<String>,
    /// Serialized special content (polls etc.), JSON
    pub raw_data: Option<String>,
}

/// A message as stored, including reconciliation state.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub conversation_id: i64,
    pub remote_id: i64,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    pub sent_at: i64,
    pub edited_at: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub is_outgoing: bool,
    pub media_id: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderRecord {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRecord {
    /// Remote content identifier, stable across observations
    pub id: String,
    pub conversation_id: i64,
    pub message_id: i64,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<i32>,
    pub local_path: Option<String>,
    pub status: DownloadStatus,
}

/// Full reaction set observed on one message; replaces any stored set.
#[derive(Debug, Clone, Serialize)]
pub struct ReactionUpdate {
    pub conversation_id: i64,
    pub message_id: i64,
    pub counts: Vec<ReactionCount>,
}

/// Everything one page of remote messages normalizes into. Committed as a
/// single transaction by `Storage::commit_message_batch`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageBatch {
    pub senders: Vec<SenderRecord>,
    pub messages: Vec<NewMessage>,
    pub attachments: Vec<AttachmentRecord>,
    pub reactions: Vec<ReactionUpdate>,
}

/// Durable per-conversation resumability record.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusRecord {
    pub conversation_id: i64,
    pub last_message_id: Option<i64>,
    pub last_sync_at: Option<i64>,
    pub message_count: i64,
    pub last_error: Option<String>,
    pub consecutive_failures: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaStats {
    pub total: i64,
    pub downloaded: i64,
    pub pending: i64,
    pub skipped: i64,
    pub failed: i64,
    pub downloaded_bytes: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveStats {
    pub conversations: i64,
    pub messages: i64,
    pub senders: i64,
    pub attachments: i64,
}
