use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::{NewMessage, StoredMessage};

/// Conflict-ignored batch insert. Returns the number of rows actually
/// inserted; rows already present under (conversation_id, remote_id) count
/// as zero, which is what makes batch replay after a crash harmless.
pub fn insert_all(conn: &Connection, batch: &[NewMessage]) -> Result<usize, VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO messages (
            conversation_id, remote_id, sender_id, text, sent_at, edited_at,
            reply_to_id, is_outgoing, media_id, raw_data, deleted, fetched_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
    )?;

    let mut count = 0;
    for msg in batch {
        count += stmt.execute(params![
            msg.conversation_id,
            msg.remote_id,
            msg.sender_id,
            msg.text,
            msg.sent_at,
            msg.edited_at,
            msg.reply_to_id,
            msg.is_outgoing as i32,
            msg.media_id,
            msg.raw_data,
            now,
        ])?;
    }
    Ok(count)
}

pub fn list_page(
    conn: &Connection,
    conversation_id: i64,
    limit: u32,
    offset: u32,
    search: Option<&str>,
) -> Result<Vec<StoredMessage>, VaultError> {
    let mut messages = Vec::new();

    match search {
        Some(query) => {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, remote_id, sender_id, text, sent_at, edited_at,
                        reply_to_id, is_outgoing, media_id, deleted
                 FROM messages
                 WHERE conversation_id = ?1 AND text LIKE '%' || ?2 || '%'
                 ORDER BY remote_id DESC LIMIT ?3 OFFSET ?4",
            )?;
            let rows = stmt.query_map(params![conversation_id, query, limit, offset], map_row)?;
            for row in rows {
                messages.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, remote_id, sender_id, text, sent_at, edited_at,
                        reply_to_id, is_outgoing, media_id, deleted
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY remote_id DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit, offset], map_row)?;
            for row in rows {
                messages.push(row?);
            }
        }
    }

    Ok(messages)
}

pub fn count(
    conn: &Connection,
    conversation_id: i64,
    search: Option<&str>,
) -> Result<i64, VaultError> {
    let count = match search {
        Some(query) => conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND text LIKE '%' || ?2 || '%'",
            params![conversation_id, query],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

/// The `limit` highest remote ids still live locally, with edit timestamps.
pub fn recent_ids(
    conn: &Connection,
    conversation_id: i64,
    limit: u32,
) -> Result<Vec<(i64, Option<i64>)>, VaultError> {
    let mut stmt = conn.prepare(
        "SELECT remote_id, edited_at FROM messages
         WHERE conversation_id = ?1 AND deleted = 0
         ORDER BY remote_id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![conversation_id, limit], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn mark_deleted(
    conn: &Connection,
    conversation_id: i64,
    remote_id: i64,
) -> Result<bool, VaultError> {
    let affected = conn.execute(
        "UPDATE messages SET deleted = 1
         WHERE conversation_id = ?1 AND remote_id = ?2 AND deleted = 0",
        params![conversation_id, remote_id],
    )?;
    Ok(affected > 0)
}

pub fn update_edit(
    conn: &Connection,
    conversation_id: i64,
    remote_id: i64,
    new_body: Option<&str>,
    edited_at: i64,
) -> Result<bool, VaultError> {
    let affected = conn.execute(
        "UPDATE messages SET text = ?3, edited_at = ?4
         WHERE conversation_id = ?1 AND remote_id = ?2 AND deleted = 0",
        params![conversation_id, remote_id, new_body, edited_at],
    )?;
    Ok(affected > 0)
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        conversation_id: row.get(0)?,
        remote_id: row.get(1)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        sent_at: row.get(4)?,
        edited_at: row.get(5)?,
        reply_to_id: row.get(6)?,
        is_outgoing: row.get::<_, i32>(7)? != 0,
        media_id: row.get(8)?,
        deleted: row.get::<_, i32>(9)? != 0,
    })
}
