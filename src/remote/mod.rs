//! Remote messaging service collaborator.
//!
//! The archive never talks to the wire itself: a [`ChatClient`] implementation
//! owns the transport, the session, and authentication. The sync engine only
//! sees paginated listings, a media byte stream, and the rate-limit signal
//! (`VaultError::RateLimited`), which it treats as a suspend-then-resume point
//! rather than a failure.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::VaultError;
use crate::types::{ConversationKind, MediaKind, ReactionCount};

/// A conversation as the remote service describes it.
#[derive(Debug, Clone)]
pub struct RemoteConversation {
    pub id: i64,
    pub kind: ConversationKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub participant_count: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RemoteSender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_bot: bool,
}

/// Reference to an attachment carried by a message. `id` is the remote
/// service's stable content identifier.
#[derive(Debug, Clone)]
pub struct RemoteMedia {
    pub id: String,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<i32>,
}

/// One message from a paginated listing. Timestamps are unix epoch ms.
#[derive(Debug, Clone)]
pub struct RemoteMessage {
    pub id: i64,
    pub sender: Option<RemoteSender>,
    pub text: Option<String>,
    pub sent_at: i64,
    pub edited_at: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub is_outgoing: bool,
    pub media: Option<RemoteMedia>,
    pub reactions: Vec<ReactionCount>,
    /// Serialized special content (polls etc.), stored verbatim
    pub raw_data: Option<serde_json::Value>,
}

/// Readable byte stream for a media download.
pub type MediaStream = Box<dyn AsyncRead + Send + Unpin>;

/// The remote service seam consumed by the sync engine.
///
/// Implementations surface a cooldown instruction as
/// `Err(VaultError::RateLimited(seconds))` and transport/auth failures as
/// `Err(VaultError::RemoteUnavailable(..))`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// List every conversation visible to the account, with classification.
    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, VaultError>;

    /// Fetch up to `limit` messages strictly after `after_id`, in ascending
    /// remote-id order. An empty result means no messages remain.
    async fn fetch_messages(
        &self,
        conversation_id: i64,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, VaultError>;

    /// Fetch the `limit` newest messages of a conversation (the
    /// reconciliation window).
    async fn fetch_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, VaultError>;

    /// Highest message id currently present remotely, if any. Used to seed
    /// the cursor when history backfill is disabled.
    async fn latest_message_id(&self, conversation_id: i64) -> Result<Option<i64>, VaultError>;

    /// Open a byte stream for a media object.
    async fn download_media(&self, media_id: &str) -> Result<MediaStream, VaultError>;
}
