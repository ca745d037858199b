//! Backend A: embedded single-writer engine (SQLite).
//!
//! All writers share one pooled connection (see `pool`), which is the
//! process-wide write serialization point SQLite requires. Batch operations
//! run inside a single transaction on that connection.

pub mod pool;
pub mod schema;

mod attachments;
mod conversations;
mod messages;
mod metadata;
mod reactions;
mod senders;
mod sync_status;

use std::path::Path;

pub use pool::DbPool;

use crate::error::VaultError;
use crate::storage::records::{
    ArchiveStats, AttachmentRecord, ConversationRecord, MediaStats, MessageBatch, NewMessage,
    ReactionUpdate, SenderRecord, StoredMessage, SyncStatusRecord,
};
use crate::storage::Storage;
use crate::types::DownloadStatus;

pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    VaultError::Storage(format!("Failed to create data dir: {}", e))
                })?;
            }
        }
        Ok(Self {
            pool: pool::create_pool(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, VaultError> {
        Ok(Self {
            pool: pool::create_memory_pool()?,
        })
    }
}

impl Storage for SqliteStorage {
    fn initialize_schema(&self) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        schema::initialize_schema(&conn)
    }

    fn upsert_conversation(&self, conv: &ConversationRecord) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        conversations::upsert(&conn, conv)
    }

    fn get_conversation(&self, id: i64) -> Result<Option<ConversationRecord>, VaultError> {
        let conn = self.pool.get()?;
        conversations::get(&conn, id)
    }

    fn list_conversations(
        &self,
        include_empty: bool,
    ) -> Result<Vec<ConversationRecord>, VaultError> {
        let conn = self.pool.get()?;
        conversations::list(&conn, include_empty)
    }

    fn delete_conversation(&self, id: i64) -> Result<bool, VaultError> {
        let conn = self.pool.get()?;
        conversations::delete(&conn, id)
    }

    fn insert_messages(&self, batch: &[NewMessage]) -> Result<usize, VaultError> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        let count = messages::insert_all(&tx, batch)?;
        tx.commit()?;
        Ok(count)
    }

    fn commit_message_batch(&self, batch: &MessageBatch) -> Result<usize, VaultError> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        for sender in &batch.senders {
            senders::upsert(&tx, sender)?;
        }
        let count = messages::insert_all(&tx, &batch.messages)?;
        for attachment in &batch.attachments {
            attachments::insert_placeholder(&tx, attachment)?;
        }
        for update in &batch.reactions {
            reactions::replace(&tx, update)?;
        }

        tx.commit()?;
        Ok(count)
    }

    fn get_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
        search: Option<&str>,
    ) -> Result<Vec<StoredMessage>, VaultError> {
        let conn = self.pool.get()?;
        messages::list_page(&conn, conversation_id, limit, offset, search)
    }

    fn message_count(
        &self,
        conversation_id: i64,
        search: Option<&str>,
    ) -> Result<i64, VaultError> {
        let conn = self.pool.get()?;
        messages::count(&conn, conversation_id, search)
    }

    fn list_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<(i64, Option<i64>)>, VaultError> {
        let conn = self.pool.get()?;
        messages::recent_ids(&conn, conversation_id, limit)
    }

    fn mark_message_deleted(
        &self,
        conversation_id: i64,
        remote_id: i64,
    ) -> Result<bool, VaultError> {
        let conn = self.pool.get()?;
        messages::mark_deleted(&conn, conversation_id, remote_id)
    }

    fn update_message_edit(
        &self,
        conversation_id: i64,
        remote_id: i64,
        new_body: Option<&str>,
        edited_at: i64,
    ) -> Result<bool, VaultError> {
        let conn = self.pool.get()?;
        messages::update_edit(&conn, conversation_id, remote_id, new_body, edited_at)
    }

    fn get_sync_cursor(&self, conversation_id: i64) -> Result<Option<i64>, VaultError> {
        let conn = self.pool.get()?;
        sync_status::get_cursor(&conn, conversation_id)
    }

    fn set_sync_cursor(&self, conversation_id: i64, cursor: i64) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        sync_status::set_cursor(&conn, conversation_id, cursor)
    }

    fn upsert_sender(&self, sender: &SenderRecord) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        senders::upsert(&conn, sender)
    }

    fn get_sender(&self, id: i64) -> Result<Option<SenderRecord>, VaultError> {
        let conn = self.pool.get()?;
        senders::get(&conn, id)
    }

    fn upsert_attachment(&self, attachment: &AttachmentRecord) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        attachments::insert_placeholder(&conn, attachment)
    }

    fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRecord>, VaultError> {
        let conn = self.pool.get()?;
        attachments::get(&conn, id)
    }

    fn update_attachment_status(
        &self,
        id: &str,
        status: DownloadStatus,
        local_path: Option<&str>,
    ) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        attachments::update_status(&conn, id, status, local_path)
    }

    fn list_pending_attachments(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<AttachmentRecord>, VaultError> {
        let conn = self.pool.get()?;
        attachments::list_pending(&conn, conversation_id)
    }

    fn media_stats(&self) -> Result<MediaStats, VaultError> {
        let conn = self.pool.get()?;
        attachments::stats(&conn)
    }

    fn replace_reactions(&self, update: &ReactionUpdate) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        reactions::replace(&tx, update)?;
        tx.commit()?;
        Ok(())
    }

    fn get_reactions(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<Vec<crate::types::ReactionCount>, VaultError> {
        let conn = self.pool.get()?;
        reactions::for_message(&conn, conversation_id, message_id)
    }

    fn get_sync_status(
        &self,
        conversation_id: i64,
    ) -> Result<Option<SyncStatusRecord>, VaultError> {
        let conn = self.pool.get()?;
        sync_status::get(&conn, conversation_id)
    }

    fn record_sync_ok(&self, conversation_id: i64) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        sync_status::record_ok(&conn, conversation_id)
    }

    fn record_sync_error(&self, conversation_id: i64, error: &str) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        sync_status::record_error(&conn, conversation_id, error)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, VaultError> {
        let conn = self.pool.get()?;
        metadata::get(&conn, key)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let conn = self.pool.get()?;
        metadata::set(&conn, key, value)
    }

    fn stats(&self) -> Result<ArchiveStats, VaultError> {
        let conn = self.pool.get()?;
        let stats = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM conversations),
                    (SELECT COUNT(*) FROM messages),
                    (SELECT COUNT(*) FROM senders),
                    (SELECT COUNT(*) FROM attachments)",
            [],
            |row| {
                Ok(ArchiveStats {
                    conversations: row.get(0)?,
                    messages: row.get(1)?,
                    senders: row.get(2)?,
                    attachments: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}
