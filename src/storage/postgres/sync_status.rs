use postgres::GenericClient;

use crate::error::VaultError;
use crate::storage::records::SyncStatusRecord;

pub fn get_cursor(
    client: &mut impl GenericClient,
    conversation_id: i64,
) -> Result<Option<i64>, VaultError> {
    let row = client.query_opt(
        "SELECT last_message_id FROM sync_status WHERE conversation_id = $1",
        &[&conversation_id],
    )?;
    Ok(row.and_then(|r| r.get(0)))
}

/// Monotonic watermark advancement; twin of the SQLite backend.
pub fn set_cursor(
    client: &mut impl GenericClient,
    conversation_id: i64,
    cursor: i64,
) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    client.execute(
        "INSERT INTO sync_status (
            conversation_id, last_message_id, last_sync_at, message_count,
            last_error, consecutive_failures
        ) VALUES (
            $1, $2, $3,
            (SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND deleted = FALSE),
            NULL, 0
        )
        ON CONFLICT (conversation_id) DO UPDATE SET
            last_message_id = excluded.last_message_id,
            last_sync_at = excluded.last_sync_at,
            message_count = excluded.message_count,
            last_error = NULL,
            consecutive_failures = 0
        WHERE excluded.last_message_id >= COALESCE(sync_status.last_message_id, 0)",
        &[&conversation_id, &cursor, &now],
    )?;

    client.execute(
        "UPDATE conversations SET last_synced_message_id = $2, updated_at = $3
         WHERE id = $1 AND COALESCE(last_synced_message_id, 0) <= $2",
        &[&conversation_id, &cursor, &now],
    )?;
    Ok(())
}

pub fn get(
    client: &mut impl GenericClient,
    conversation_id: i64,
) -> Result<Option<SyncStatusRecord>, VaultError> {
    let row = client.query_opt(
        "SELECT conversation_id, last_message_id, last_sync_at, message_count,
                last_error, consecutive_failures
         FROM sync_status WHERE conversation_id = $1",
        &[&conversation_id],
    )?;
    Ok(row.map(|r| SyncStatusRecord {
        conversation_id: r.get(0),
        last_message_id: r.get(1),
        last_sync_at: r.get(2),
        message_count: r.get(3),
        last_error: r.get(4),
        consecutive_failures: r.get(5),
    }))
}

pub fn record_ok(client: &mut impl GenericClient, conversation_id: i64) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    client.execute(
        "INSERT INTO sync_status (conversation_id, last_message_id, last_sync_at,
                                  message_count, last_error, consecutive_failures)
         VALUES ($1, NULL, $2, 0, NULL, 0)
         ON CONFLICT (conversation_id) DO UPDATE SET
            last_sync_at = excluded.last_sync_at,
            last_error = NULL,
            consecutive_failures = 0",
        &[&conversation_id, &now],
    )?;
    Ok(())
}

pub fn record_error(
    client: &mut impl GenericClient,
    conversation_id: i64,
    error: &str,
) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    client.execute(
        "INSERT INTO sync_status (conversation_id, last_message_id, last_sync_at,
                                  message_count, last_error, consecutive_failures)
         VALUES ($1, NULL, $2, 0, $3, 1)
         ON CONFLICT (conversation_id) DO UPDATE SET
            last_sync_at = excluded.last_sync_at,
            last_error = excluded.last_error,
            consecutive_failures = sync_status.consecutive_failures + 1",
        &[&conversation_id, &now, &error],
    )?;
    Ok(())
}
