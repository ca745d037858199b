use rusqlite::{params, Connection};

use crate::error::VaultError;
use crate::storage::records::{AttachmentRecord, MediaStats};
use crate::types::{DownloadStatus, MediaKind};

/// Metadata placeholder insert. An existing row keeps its download status
/// and local path, so replaying a batch never regresses a finished download.
pub fn insert_placeholder(conn: &Connection, att: &AttachmentRecord) -> Result<(), VaultError> {
    conn.execute(
        "INSERT OR IGNORE INTO attachments (
            id, conversation_id, message_id, kind, file_name, mime_type,
            size_bytes, width, height, duration_secs, local_path, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            att.id,
            att.conversation_id,
            att.message_id,
            att.kind.as_str(),
            att.file_name,
            att.mime_type,
            att.size_bytes,
            att.width,
            att.height,
            att.duration_secs,
            att.local_path,
            att.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<AttachmentRecord>, VaultError> {
    let result = conn.query_row(
        "SELECT id, conversation_id, message_id, kind, file_name, mime_type,
                size_bytes, width, height, duration_secs, local_path, status
         FROM attachments WHERE id = ?1",
        params![id],
        map_row,
    );

    match result {
        Ok(att) => Ok(Some(att)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_status(
    conn: &Connection,
    id: &str,
    status: DownloadStatus,
    local_path: Option<&str>,
) -> Result<(), VaultError> {
    let downloaded_at = match status {
        DownloadStatus::Downloaded => Some(chrono::Utc::now().timestamp_millis()),
        _ => None,
    };
    conn.execute(
        "UPDATE attachments SET
            status = ?2,
            local_path = COALESCE(?3, local_path),
            downloaded_at = COALESCE(?4, downloaded_at)
         WHERE id = ?1",
        params![id, status.as_str(), local_path, downloaded_at],
    )?;
    Ok(())
}

pub fn list_pending(
    conn: &Connection,
    conversation_id: i64,
) -> Result<Vec<AttachmentRecord>, VaultError> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, message_id, kind, file_name, mime_type,
                size_bytes, width, height, duration_secs, local_path, status
         FROM attachments
         WHERE conversation_id = ?1 AND status = 'pending'
         ORDER BY message_id",
    )?;
    let rows = stmt.query_map(params![conversation_id], map_row)?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row?);
    }
    Ok(attachments)
}

pub fn stats(conn: &Connection) -> Result<MediaStats, VaultError> {
    let stats = conn.query_row(
        "SELECT COUNT(*),
                SUM(CASE WHEN status = 'downloaded' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status IN ('skipped_too_large', 'skipped_by_policy') THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'downloaded' THEN COALESCE(size_bytes, 0) ELSE 0 END)
         FROM attachments",
        [],
        |row| {
            Ok(MediaStats {
                total: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                downloaded: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                pending: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                skipped: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                failed: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                downloaded_bytes: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            })
        },
    )?;
    Ok(stats)
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<AttachmentRecord> {
    let kind_str: String = row.get(3)?;
    let kind = MediaKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown media kind: {}", kind_str).into(),
        )
    })?;

    let status_str: String = row.get(11)?;
    let status = DownloadStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            rusqlite::types::Type::Text,
            format!("unknown download status: {}", status_str).into(),
        )
    })?;

    Ok(AttachmentRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        message_id: row.get(2)?,
        kind,
        file_name: row.get(4)?,
        mime_type: row.get(5)?,
        size_bytes: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        duration_secs: row.get(9)?,
        local_path: row.get(10)?,
        status,
    })
}
