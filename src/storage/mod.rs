//! Storage contract and backends.
//!
//! One fixed logical schema (conversations, messages, senders, attachments,
//! reactions, sync_status, metadata) realized identically by two engines:
//! an embedded single-writer SQLite backend and a networked pooled PostgreSQL
//! backend. The sync pipeline depends only on the [`Storage`] trait and never
//! sees which engine is underneath.

pub mod postgres;
pub mod records;
pub mod sqlite;

use crate::config::{BackendKind, StorageConfig};
use crate::error::VaultError;
use crate::types::{DownloadStatus, ReactionCount};

/// Stamped into the metadata table on first initialization; a database
/// carrying a different version is rejected with a schema error.
pub const SCHEMA_VERSION: &str = "1";

pub use records::{
    ArchiveStats, AttachmentRecord, ConversationRecord, MediaStats, MessageBatch, NewMessage,
    ReactionUpdate, SenderRecord, StoredMessage, SyncStatusRecord,
};

/// The persistence contract.
///
/// Every write fails with `VaultError::Storage` on connectivity loss,
/// constraint violation, or timeout; callers must treat such a failure as
/// "batch not committed" and must not advance the cursor.
pub trait Storage: Send + Sync {
    /// Create all tables and indices if absent. Idempotent. Fails with
    /// `VaultError::Schema` when an existing database is incompatible.
    fn initialize_schema(&self) -> Result<(), VaultError>;

    // -- conversations ------------------------------------------------------

    /// Insert-or-update by id. Updates title/kind/username/description/
    /// participant_count; preserves the stored cursor.
    fn upsert_conversation(&self, conv: &ConversationRecord) -> Result<(), VaultError>;

    fn get_conversation(&self, id: i64) -> Result<Option<ConversationRecord>, VaultError>;

    /// All known conversations, most recent sync activity first.
    fn list_conversations(&self, include_empty: bool)
        -> Result<Vec<ConversationRecord>, VaultError>;

    /// Remove a conversation and everything hanging off it. Returns whether
    /// a row existed. Never called by the sync engine itself.
    fn delete_conversation(&self, id: i64) -> Result<bool, VaultError>;

    // -- messages -----------------------------------------------------------

    /// Batched insert, conflict policy "ignore if (conversation, remote id)
    /// already present". Returns the number of rows actually inserted.
    fn insert_messages(&self, batch: &[NewMessage]) -> Result<usize, VaultError>;

    /// Commit one normalized page as a single transaction: sender upserts,
    /// conflict-ignored message inserts, attachment placeholders, reaction
    /// replacement. Returns the number of messages actually inserted.
    fn commit_message_batch(&self, batch: &MessageBatch) -> Result<usize, VaultError>;

    /// Viewer query: newest-first page of messages, optional substring search.
    fn get_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
        search: Option<&str>,
    ) -> Result<Vec<StoredMessage>, VaultError>;

    fn message_count(&self, conversation_id: i64, search: Option<&str>)
        -> Result<i64, VaultError>;

    /// The `limit` highest remote ids of non-deleted messages, with their
    /// edit timestamps. Reconciliation's local window.
    fn list_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<(i64, Option<i64>)>, VaultError>;

    /// Reconciliation only: set the soft-delete flag. Returns whether a live
    /// row was flagged.
    fn mark_message_deleted(&self, conversation_id: i64, remote_id: i64)
        -> Result<bool, VaultError>;

    /// Reconciliation only: overwrite body and edit timestamp (latest
    /// revision wins; no history is kept).
    fn update_message_edit(
        &self,
        conversation_id: i64,
        remote_id: i64,
        new_body: Option<&str>,
        edited_at: i64,
    ) -> Result<bool, VaultError>;

    // -- cursor -------------------------------------------------------------

    /// Last remote id known to be durably persisted, or None before the
    /// first committed batch.
    fn get_sync_cursor(&self, conversation_id: i64) -> Result<Option<i64>, VaultError>;

    /// Advance the watermark. Must only be called after the corresponding
    /// batch has durably committed. Monotonic: a lower cursor never
    /// overwrites a higher one. Also refreshes last_sync_at/message_count
    /// and clears the error fields.
    fn set_sync_cursor(&self, conversation_id: i64, cursor: i64) -> Result<(), VaultError>;

    // -- senders ------------------------------------------------------------

    /// Last-write-wins upsert on name fields, keyed by id.
    fn upsert_sender(&self, sender: &SenderRecord) -> Result<(), VaultError>;

    fn get_sender(&self, id: i64) -> Result<Option<SenderRecord>, VaultError>;

    // -- attachments --------------------------------------------------------

    /// Metadata placeholder upsert; an existing row keeps its download
    /// status and local path.
    fn upsert_attachment(&self, attachment: &AttachmentRecord) -> Result<(), VaultError>;

    fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRecord>, VaultError>;

    fn update_attachment_status(
        &self,
        id: &str,
        status: DownloadStatus,
        local_path: Option<&str>,
    ) -> Result<(), VaultError>;

    fn list_pending_attachments(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<AttachmentRecord>, VaultError>;

    fn media_stats(&self) -> Result<MediaStats, VaultError>;

    // -- reactions ----------------------------------------------------------

    /// Fully replace the stored reaction set for one message.
    fn replace_reactions(&self, update: &ReactionUpdate) -> Result<(), VaultError>;

    /// Viewer query: the stored reaction set of one message.
    fn get_reactions(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<Vec<ReactionCount>, VaultError>;

    // -- sync status --------------------------------------------------------

    fn get_sync_status(&self, conversation_id: i64)
        -> Result<Option<SyncStatusRecord>, VaultError>;

    /// Record a successful run with no cursor movement: refreshes
    /// last_sync_at and clears last_error/consecutive_failures.
    fn record_sync_ok(&self, conversation_id: i64) -> Result<(), VaultError>;

    /// Record a failed run: stores the message and bumps the
    /// consecutive-failure count.
    fn record_sync_error(&self, conversation_id: i64, error: &str) -> Result<(), VaultError>;

    // -- metadata -----------------------------------------------------------

    fn get_metadata(&self, key: &str) -> Result<Option<String>, VaultError>;

    fn set_metadata(&self, key: &str, value: &str) -> Result<(), VaultError>;

    fn stats(&self) -> Result<ArchiveStats, VaultError>;
}

/// Open the backend selected by configuration.
pub fn open_storage(config: &StorageConfig) -> Result<Box<dyn Storage>, VaultError> {
    match config.backend {
        BackendKind::Sqlite => {
            tracing::info!("Opening SQLite archive at {:?}", config.sqlite_path);
            Ok(Box::new(sqlite::SqliteStorage::open(&config.sqlite_path)?))
        }
        BackendKind::Postgres => {
            tracing::info!(
                "Connecting to PostgreSQL archive at {}:{}/{}",
                config.postgres.host,
                config.postgres.port,
                config.postgres.database
            );
            Ok(Box::new(postgres::PostgresStorage::connect(
                &config.postgres,
            )?))
        }
    }
}
