use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::ConversationRecord;
use crate::types::ConversationKind;

pub fn upsert(conn: &Connection, conv: &ConversationRecord) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO conversations (
            id, kind, title, username, description, participant_count,
            last_synced_message_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind,
            title = excluded.title,
            username = excluded.username,
            description = excluded.description,
            participant_count = excluded.participant_count,
            last_synced_message_id =
                COALESCE(excluded.last_synced_message_id, conversations.last_synced_message_id),
            updated_at = excluded.updated_at",
        params![
            conv.id,
            conv.kind.as_str(),
            conv.title,
            conv.username,
            conv.description,
            conv.participant_count,
            conv.last_synced_message_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<ConversationRecord>, VaultError> {
    let result = conn.query_row(
        "SELECT id, kind, title, username, description, participant_count, last_synced_message_id
         FROM conversations WHERE id = ?1",
        params![id],
        map_row,
    );

    match result {
        Ok(conv) => Ok(Some(conv)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list(conn: &Connection, include_empty: bool) -> Result<Vec<ConversationRecord>, VaultError> {
    let sql = if include_empty {
        "SELECT c.id, c.kind, c.title, c.username, c.description, c.participant_count,
                c.last_synced_message_id
         FROM conversations c
         LEFT JOIN sync_status s ON s.conversation_id = c.id
         ORDER BY COALESCE(s.last_sync_at, 0) DESC, c.id"
    } else {
        "SELECT c.id, c.kind, c.title, c.username, c.description, c.participant_count,
                c.last_synced_message_id
         FROM conversations c
         LEFT JOIN sync_status s ON s.conversation_id = c.id
         WHERE COALESCE(s.message_count, 0) > 0
         ORDER BY COALESCE(s.last_sync_at, 0) DESC, c.id"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map_row)?;

    let mut conversations = Vec::new();
    for row in rows {
        conversations.push(row?);
    }
    Ok(conversations)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool, VaultError> {
    let affected = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationRecord> {
    let kind_str: String = row.get(1)?;
    let kind = ConversationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown conversation kind: {}", kind_str).into(),
        )
    })?;

    Ok(ConversationRecord {
        id: row.get(0)?,
        kind,
        title: row.get(2)?,
        username: row.get(3)?,
        description: row.get(4)?,
        participant_count: row.get(5)?,
        last_synced_message_id: row.get(6)?,
    })
}
