use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::SyncStatusRecord;

pub fn get_cursor(conn: &Connection, conversation_id: i64) -> Result<Option<i64>, VaultError> {
    let result = conn.query_row(
        "SELECT last_message_id FROM sync_status WHERE conversation_id = ?1",
        params![conversation_id],
        |row| row.get::<_, Option<i64>>(0),
    );

    match result {
        Ok(cursor) => Ok(cursor),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Advance the durable watermark. The guard keeps the cursor monotonic: a
/// replayed or out-of-order call with a lower id leaves the row untouched.
/// message_count is recomputed from the live table so replay cannot
/// double-count.
pub fn set_cursor(conn: &Connection, conversation_id: i64, cursor: i64) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO sync_status (
            conversation_id, last_message_id, last_sync_at, message_count,
            last_error, consecutive_failures
        ) VALUES (
            ?1, ?2, ?3,
            (SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND deleted = 0),
            NULL, 0
        )
        ON CONFLICT(conversation_id) DO UPDATE SET
            last_message_id = excluded.last_message_id,
            last_sync_at = excluded.last_sync_at,
            message_count = excluded.message_count,
            last_error = NULL,
            consecutive_failures = 0
        WHERE excluded.last_message_id >= COALESCE(sync_status.last_message_id, 0)",
        params![conversation_id, cursor, now],
    )?;

    conn.execute(
        "UPDATE conversations SET last_synced_message_id = ?2, updated_at = ?3
         WHERE id = ?1 AND COALESCE(last_synced_message_id, 0) <= ?2",
        params![conversation_id, cursor, now],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, conversation_id: i64) -> Result<Option<SyncStatusRecord>, VaultError> {
    let result = conn.query_row(
        "SELECT conversation_id, last_message_id, last_sync_at, message_count,
                last_error, consecutive_failures
         FROM sync_status WHERE conversation_id = ?1",
        params![conversation_id],
        |row| {
            Ok(SyncStatusRecord {
                conversation_id: row.get(0)?,
                last_message_id: row.get(1)?,
                last_sync_at: row.get(2)?,
                message_count: row.get(3)?,
                last_error: row.get(4)?,
                consecutive_failures: row.get(5)?,
            })
        },
    );

    match result {
        Ok(status) => Ok(Some(status)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Successful run with no cursor movement: refresh the run time, clear the
/// error trail.
pub fn record_ok(conn: &Connection, conversation_id: i64) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO sync_status (conversation_id, last_message_id, last_sync_at,
                                  message_count, last_error, consecutive_failures)
         VALUES (?1, NULL, ?2, 0, NULL, 0)
         ON CONFLICT(conversation_id) DO UPDATE SET
            last_sync_at = excluded.last_sync_at,
            last_error = NULL,
            consecutive_failures = 0",
        params![conversation_id, now],
    )?;
    Ok(())
}

pub fn record_error(conn: &Connection, conversation_id: i64, error: &str) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO sync_status (conversation_id, last_message_id, last_sync_at,
                                  message_count, last_error, consecutive_failures)
         VALUES (?1, NULL, ?2, 0, ?3, 1)
         ON CONFLICT(conversation_id) DO UPDATE SET
            last_sync_at = excluded.last_sync_at,
            last_error = excluded.last_error,
            consecutive_failures = sync_status.consecutive_failures + 1",
        params![conversation_id, now, error],
    )?;
    Ok(())
}
