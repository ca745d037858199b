use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::ReactionUpdate;
use crate::types::ReactionCount;

/// Replace the full reaction set for one message with the observed one.
pub fn replace(conn: &Connection, update: &ReactionUpdate) -> Result<(), VaultError> {
    conn.execute(
        "DELETE FROM reactions WHERE conversation_id = ?1 AND message_id = ?2",
        params![update.conversation_id, update.message_id],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO reactions (conversation_id, message_id, emoji, count)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for reaction in &update.counts {
        stmt.execute(params![
            update.conversation_id,
            update.message_id,
            reaction.emoji,
            reaction.count,
        ])?;
    }
    Ok(())
}

pub fn for_message(
    conn: &Connection,
    conversation_id: i64,
    message_id: i64,
) -> Result<Vec<ReactionCount>, VaultError> {
    let mut stmt = conn.prepare(
        "SELECT emoji, count FROM reactions
         WHERE conversation_id = ?1 AND message_id = ?2
         ORDER BY emoji",
    )?;
    let rows = stmt.query_map(params![conversation_id, message_id], |row| {
        Ok(ReactionCount {
            emoji: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut reactions = Vec::new();
    for row in rows {
        reactions.push(row?);
    }
    Ok(reactions)
}
