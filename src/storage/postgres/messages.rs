use postgres::{GenericClient, Row};

use crate::error::VaultError;
use crate::storage::records::{NewMessage, StoredMessage};

/// Conflict-ignored batch insert; see the SQLite twin for the replay
/// rationale. ON CONFLICT DO NOTHING reports zero affected rows for
/// already-present messages.
pub fn insert_all(
    client: &mut impl GenericClient,
    batch: &[NewMessage],
) -> Result<usize, VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut count = 0u64;
    for msg in batch {
        count += client.execute(
            "INSERT INTO messages (
                conversation_id, remote_id, sender_id, text, sent_at, edited_at,
                reply_to_id, is_outgoing, media_id, raw_data, deleted, fetched_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11)
            ON CONFLICT (conversation_id, remote_id) DO NOTHING",
            &[
                &msg.conversation_id,
                &msg.remote_id,
                &msg.sender_id,
                &msg.text,
                &msg.sent_at,
                &msg.edited_at,
                &msg.reply_to_id,
                &msg.is_outgoing,
                &msg.media_id,
                &msg.raw_data,
                &now,
            ],
        )?;
    }
    Ok(count as usize)
}

pub fn list_page(
    client: &mut impl GenericClient,
    conversation_id: i64,
    limit: u32,
    offset: u32,
    search: Option<&str>,
) -> Result<Vec<StoredMessage>, VaultError> {
    let limit = limit as i64;
    let offset = offset as i64;

    // ILIKE mirrors the SQLite backend's case-insensitive LIKE
    let rows = match search {
        Some(query) => client.query(
            "SELECT conversation_id, remote_id, sender_id, text, sent_at, edited_at,
                    reply_to_id, is_outgoing, media_id, deleted
             FROM messages
             WHERE conversation_id = $1 AND text ILIKE '%' || $2 || '%'
             ORDER BY remote_id DESC LIMIT $3 OFFSET $4",
            &[&conversation_id, &query, &limit, &offset],
        )?,
        None => client.query(
            "SELECT conversation_id, remote_id, sender_id, text, sent_at, edited_at,
                    reply_to_id, is_outgoing, media_id, deleted
             FROM messages
             WHERE conversation_id = $1
             ORDER BY remote_id DESC LIMIT $2 OFFSET $3",
            &[&conversation_id, &limit, &offset],
        )?,
    };

    Ok(rows.iter().map(map_row).collect())
}

pub fn count(
    client: &mut impl GenericClient,
    conversation_id: i64,
    search: Option<&str>,
) -> Result<i64, VaultError> {
    let row = match search {
        Some(query) => client.query_one(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = $1 AND text ILIKE '%' || $2 || '%'",
            &[&conversation_id, &query],
        )?,
        None => client.query_one(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1",
            &[&conversation_id],
        )?,
    };
    Ok(row.get(0))
}

pub fn recent_ids(
    client: &mut impl GenericClient,
    conversation_id: i64,
    limit: u32,
) -> Result<Vec<(i64, Option<i64>)>, VaultError> {
    let rows = client.query(
        "SELECT remote_id, edited_at FROM messages
         WHERE conversation_id = $1 AND deleted = FALSE
         ORDER BY remote_id DESC LIMIT $2",
        &[&conversation_id, &(limit as i64)],
    )?;
    Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
}

pub fn mark_deleted(
    client: &mut impl GenericClient,
    conversation_id: i64,
    remote_id: i64,
) -> Result<bool, VaultError> {
    let affected = client.execute(
        "UPDATE messages SET deleted = TRUE
         WHERE conversation_id = $1 AND remote_id = $2 AND deleted = FALSE",
        &[&conversation_id, &remote_id],
    )?;
    Ok(affected > 0)
}

pub fn update_edit(
    client: &mut impl GenericClient,
    conversation_id: i64,
    remote_id: i64,
    new_body: Option<&str>,
    edited_at: i64,
) -> Result<bool, VaultError> {
    let affected = client.execute(
        "UPDATE messages SET text = $3, edited_at = $4
         WHERE conversation_id = $1 AND remote_id = $2 AND deleted = FALSE",
        &[&conversation_id, &remote_id, &new_body, &edited_at],
    )?;
    Ok(affected > 0)
}

fn map_row(row: &Row) -> StoredMessage {
    StoredMessage {
        conversation_id: row.get(0),
        remote_id: row.get(1),
        sender_id: row.get(2),
        text: row.get(3),
        sent_at: row.get(4),
        edited_at: row.get(5),
        reply_to_id: row.get(6),
        is_outgoing: row.get(7),
        media_id: row.get(8),
        deleted: row.get(9),
    }
}
