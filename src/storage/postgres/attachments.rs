use postgres::{GenericClient, Row};

use crate::error::VaultError;
use crate::storage::records::{AttachmentRecord, MediaStats};
use crate::types::{DownloadStatus, MediaKind};

pub fn insert_placeholder(
    client: &mut impl GenericClient,
    att: &AttachmentRecord,
) -> Result<(), VaultError> {
    client.execute(
        "INSERT INTO attachments (
            id, conversation_id, message_id, kind, file_name, mime_type,
            size_bytes, width, height, duration_secs, local_path, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO NOTHING",
        &[
            &att.id,
            &att.conversation_id,
            &att.message_id,
            &att.kind.as_str(),
            &att.file_name,
            &att.mime_type,
            &att.size_bytes,
            &att.width,
            &att.height,
            &att.duration_secs,
            &att.local_path,
            &att.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get(
    client: &mut impl GenericClient,
    id: &str,
) -> Result<Option<AttachmentRecord>, VaultError> {
    let row = client.query_opt(
        "SELECT id, conversation_id, message_id, kind, file_name, mime_type,
                size_bytes, width, height, duration_secs, local_path, status
         FROM attachments WHERE id = $1",
        &[&id],
    )?;
    row.map(|r| map_row(&r)).transpose()
}

pub fn update_status(
    client: &mut impl GenericClient,
    id: &str,
    status: DownloadStatus,
    local_path: Option<&str>,
) -> Result<(), VaultError> {
    let downloaded_at = match status {
        DownloadStatus::Downloaded => Some(chrono::Utc::now().timestamp_millis()),
        _ => None,
    };
    client.execute(
        "UPDATE attachments SET
            status = $2,
            local_path = COALESCE($3, local_path),
            downloaded_at = COALESCE($4, downloaded_at)
         WHERE id = $1",
        &[&id, &status.as_str(), &local_path, &downloaded_at],
    )?;
    Ok(())
}

pub fn list_pending(
    client: &mut impl GenericClient,
    conversation_id: i64,
) -> Result<Vec<AttachmentRecord>, VaultError> {
    let rows = client.query(
        "SELECT id, conversation_id, message_id, kind, file_name, mime_type,
                size_bytes, width, height, duration_secs, local_path, status
         FROM attachments
         WHERE conversation_id = $1 AND status = 'pending'
         ORDER BY message_id",
        &[&conversation_id],
    )?;
    rows.iter().map(map_row).collect()
}

pub fn stats(client: &mut impl GenericClient) -> Result<MediaStats, VaultError> {
    let row = client.query_one(
        "SELECT COUNT(*),
                SUM(CASE WHEN status = 'downloaded' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status IN ('skipped_too_large', 'skipped_by_policy') THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'downloaded' THEN COALESCE(size_bytes, 0) ELSE 0 END)::BIGINT
         FROM attachments",
        &[],
    )?;
    Ok(MediaStats {
        total: row.get::<_, Option<i64>>(0).unwrap_or(0),
        downloaded: row.get::<_, Option<i64>>(1).unwrap_or(0),
        pending: row.get::<_, Option<i64>>(2).unwrap_or(0),
        skipped: row.get::<_, Option<i64>>(3).unwrap_or(0),
        failed: row.get::<_, Option<i64>>(4).unwrap_or(0),
        downloaded_bytes: row.get::<_, Option<i64>>(5).unwrap_or(0),
    })
}

fn map_row(row: &Row) -> Result<AttachmentRecord, VaultError> {
    let kind_str: String = row.get(3);
    let kind = MediaKind::parse(&kind_str)
        .ok_or_else(|| VaultError::Storage(format!("unknown media kind: {}", kind_str)))?;

    let status_str: String = row.get(11);
    let status = DownloadStatus::parse(&status_str)
        .ok_or_else(|| VaultError::Storage(format!("unknown download status: {}", status_str)))?;

    Ok(AttachmentRecord {
        id: row.get(0),
        conversation_id: row.get(1),
        message_id: row.get(2),
        kind,
        file_name: row.get(4),
        mime_type: row.get(5),
        size_bytes: row.get(6),
        width: row.get(7),
        height: row.get(8),
        duration_secs: row.get(9),
        local_path: row.get(10),
        status,
    })
}
