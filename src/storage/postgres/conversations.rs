use postgres::{GenericClient, Row};

use crate::error::VaultError;
use crate::storage::records::ConversationRecord;
use crate::types::ConversationKind;

pub fn upsert(
    client: &mut impl GenericClient,
    conv: &ConversationRecord,
) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    client.execute(
        "INSERT INTO conversations (
            id, kind, title, username, description, participant_count,
            last_synced_message_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        ON CONFLICT (id) DO UPDATE SET
            kind = excluded.kind,
            title = excluded.title,
            username = excluded.username,
            description = excluded.description,
            participant_count = excluded.participant_count,
            last_synced_message_id =
                COALESCE(excluded.last_synced_message_id, conversations.last_synced_message_id),
            updated_at = excluded.updated_at",
        &[
            &conv.id,
            &conv.kind.as_str(),
            &conv.title,
            &conv.username,
            &conv.description,
            &conv.participant_count,
            &conv.last_synced_message_id,
            &now,
        ],
    )?;
    Ok(())
}

pub fn get(
    client: &mut impl GenericClient,
    id: i64,
) -> Result<Option<ConversationRecord>, VaultError> {
    let row = client.query_opt(
        "SELECT id, kind, title, username, description, participant_count, last_synced_message_id
         FROM conversations WHERE id = $1",
        &[&id],
    )?;
    row.map(|r| map_row(&r)).transpose()
}

pub fn list(
    client: &mut impl GenericClient,
    include_empty: bool,
) -> Result<Vec<ConversationRecord>, VaultError> {
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

    let rows = client.query(sql, &[])?;
    rows.iter().map(map_row).collect()
}

pub fn delete(client: &mut impl GenericClient, id: i64) -> Result<bool, VaultError> {
    let affected = client.execute("DELETE FROM conversations WHERE id = $1", &[&id])?;
    Ok(affected > 0)
}

fn map_row(row: &Row) -> Result<ConversationRecord, VaultError> {
    let kind_str: String = row.get(1);
    let kind = ConversationKind::parse(&kind_str)
        .ok_or_else(|| VaultError::Storage(format!("unknown conversation kind: {}", kind_str)))?;

    Ok(ConversationRecord {
        id: row.get(0),
        kind,
        title: row.get(2),
        username: row.get(3),
        description: row.get(4),
        participant_count: row.get(5),
        last_synced_message_id: row.get(6),
    })
}
