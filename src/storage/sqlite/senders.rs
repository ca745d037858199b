use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::SenderRecord;

/// Last-write-wins on name fields, keyed by id.
pub fn upsert(conn: &Connection, sender: &SenderRecord) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO senders (id, username, first_name, last_name, is_bot, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            is_bot = excluded.is_bot,
            updated_at = excluded.updated_at",
        params![
            sender.id,
            sender.username,
            sender.first_name,
            sender.last_name,
            sender.is_bot as i32,
            now,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<SenderRecord>, VaultError> {
    let result = conn.query_row(
        "SELECT id, username, first_name, last_name, is_bot FROM senders WHERE id = ?1",
        params![id],
        |row| {
            Ok(SenderRecord {
                id: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                is_bot: row.get::<_, i32>(4)? != 0,
            })
        },
    );

    match result {
        Ok(sender) => Ok(Some(sender)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
