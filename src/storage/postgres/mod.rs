//! Backend B: networked engine (PostgreSQL) behind a bounded r2d2 pool with
//! pre-flight liveness checks. Native error conditions are mapped onto the
//! same `VaultError::Storage` taxonomy as the embedded backend, so the
//! pipeline never learns which engine it is talking to.

pub mod pool;
pub mod schema;

mod attachments;
mod conversations;
mod messages;
mod metadata;
mod reactions;
mod senders;
mod sync_status;

pub use pool::PgPool;

use crate::config::PostgresConfig;
use crate::error::VaultError;
use crate::storage::records::{
    ArchiveStats, AttachmentRecord, ConversationRecord, MediaStats, MessageBatch, NewMessage,
    ReactionUpdate, SenderRecord, StoredMessage, SyncStatusRecord,
};
use crate::storage::Storage;
use crate::types::DownloadStatus;

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn connect(config: &PostgresConfig) -> Result<Self, VaultError> {
        Ok(Self {
            pool: pool::create_pool(config)?,
        })
    }
}

impl Storage for PostgresStorage {
    fn initialize_schema(&self) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        schema::initialize_schema(&mut conn)
    }

    fn upsert_conversation(&self, conv: &ConversationRecord) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        conversations::upsert(&mut *conn, conv)
    }

    fn get_conversation(&self, id: i64) -> Result<Option<ConversationRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        conversations::get(&mut *conn, id)
    }

    fn list_conversations(
        &self,
        include_empty: bool,
    ) -> Result<Vec<ConversationRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        conversations::list(&mut *conn, include_empty)
    }

    fn delete_conversation(&self, id: i64) -> Result<bool, VaultError> {
        let mut conn = self.pool.get()?;
        conversations::delete(&mut *conn, id)
    }

    fn insert_messages(&self, batch: &[NewMessage]) -> Result<usize, VaultError> {
        let mut conn = self.pool.get()?;
        let mut tx = conn.transaction()?;
        let count = messages::insert_all(&mut tx, batch)?;
        tx.commit()?;
        Ok(count)
    }

    fn commit_message_batch(&self, batch: &MessageBatch) -> Result<usize, VaultError> {
        let mut conn = self.pool.get()?;
        let mut tx = conn.transaction()?;

        for sender in &batch.senders {
            senders::upsert(&mut tx, sender)?;
        }
        let count = messages::insert_all(&mut tx, &batch.messages)?;
        for attachment in &batch.attachments {
            attachments::insert_placeholder(&mut tx, attachment)?;
        }
        for update in &batch.reactions {
            reactions::replace(&mut tx, update)?;
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
        let mut conn = self.pool.get()?;
        messages::list_page(&mut *conn, conversation_id, limit, offset, search)
    }

    fn message_count(
        &self,
        conversation_id: i64,
        search: Option<&str>,
    ) -> Result<i64, VaultError> {
        let mut conn = self.pool.get()?;
        messages::count(&mut *conn, conversation_id, search)
    }

    fn list_recent_messages(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<(i64, Option<i64>)>, VaultError> {
        let mut conn = self.pool.get()?;
        messages::recent_ids(&mut *conn, conversation_id, limit)
    }

    fn mark_message_deleted(
        &self,
        conversation_id: i64,
        remote_id: i64,
    ) -> Result<bool, VaultError> {
        let mut conn = self.pool.get()?;
        messages::mark_deleted(&mut *conn, conversation_id, remote_id)
    }

    fn update_message_edit(
        &self,
        conversation_id: i64,
        remote_id: i64,
        new_body: Option<&str>,
        edited_at: i64,
    ) -> Result<bool, VaultError> {
        let mut conn = self.pool.get()?;
        messages::update_edit(&mut *conn, conversation_id, remote_id, new_body, edited_at)
    }

    fn get_sync_cursor(&self, conversation_id: i64) -> Result<Option<i64>, VaultError> {
        let mut conn = self.pool.get()?;
        sync_status::get_cursor(&mut *conn, conversation_id)
    }

    fn set_sync_cursor(&self, conversation_id: i64, cursor: i64) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        let mut tx = conn.transaction()?;
        sync_status::set_cursor(&mut tx, conversation_id, cursor)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_sender(&self, sender: &SenderRecord) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        senders::upsert(&mut *conn, sender)
    }

    fn get_sender(&self, id: i64) -> Result<Option<SenderRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        senders::get(&mut *conn, id)
    }

    fn upsert_attachment(&self, attachment: &AttachmentRecord) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        attachments::insert_placeholder(&mut *conn, attachment)
    }

    fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        attachments::get(&mut *conn, id)
    }

    fn update_attachment_status(
        &self,
        id: &str,
        status: DownloadStatus,
        local_path: Option<&str>,
    ) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        attachments::update_status(&mut *conn, id, status, local_path)
    }

    fn list_pending_attachments(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<AttachmentRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        attachments::list_pending(&mut *conn, conversation_id)
    }

    fn media_stats(&self) -> Result<MediaStats, VaultError> {
        let mut conn = self.pool.get()?;
        attachments::stats(&mut *conn)
    }

    fn replace_reactions(&self, update: &ReactionUpdate) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        let mut tx = conn.transaction()?;
        reactions::replace(&mut tx, update)?;
        tx.commit()?;
        Ok(())
    }

    fn get_reactions(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<Vec<crate::types::ReactionCount>, VaultError> {
        let mut conn = self.pool.get()?;
        reactions::for_message(&mut *conn, conversation_id, message_id)
    }

    fn get_sync_status(
        &self,
        conversation_id: i64,
    ) -> Result<Option<SyncStatusRecord>, VaultError> {
        let mut conn = self.pool.get()?;
        sync_status::get(&mut *conn, conversation_id)
    }

    fn record_sync_ok(&self, conversation_id: i64) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        sync_status::record_ok(&mut *conn, conversation_id)
    }

    fn record_sync_error(&self, conversation_id: i64, error: &str) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        sync_status::record_error(&mut *conn, conversation_id, error)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, VaultError> {
        let mut conn = self.pool.get()?;
        metadata::get(&mut *conn, key)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let mut conn = self.pool.get()?;
        metadata::set(&mut *conn, key, value)
    }

    fn stats(&self) -> Result<ArchiveStats, VaultError> {
        let mut conn = self.pool.get()?;
        let row = conn.query_one(
            "SELECT (SELECT COUNT(*) FROM conversations),
                    (SELECT COUNT(*) FROM messages),
                    (SELECT COUNT(*) FROM senders),
                    (SELECT COUNT(*) FROM attachments)",
            &[],
        )?;
        Ok(ArchiveStats {
            conversations: row.get(0),
            messages: row.get(1),
            senders: row.get(2),
            attachments: row.get(3),
        })
    }
}
