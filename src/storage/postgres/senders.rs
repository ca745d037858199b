use postgres::GenericClient;

use crate::error::VaultError;
use crate::storage::records::SenderRecord;

pub fn upsert(client: &mut impl GenericClient, sender: &SenderRecord) -> Result<(), VaultError> {
    let now = chrono::Utc::now().timestamp_millis();
    client.execute(
        "INSERT INTO senders (id, username, first_name, last_name, is_bot, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            is_bot = excluded.is_bot,
            updated_at = excluded.updated_at",
        &[
            &sender.id,
            &sender.username,
            &sender.first_name,
            &sender.last_name,
            &sender.is_bot,
            &now,
        ],
    )?;
    Ok(())
}

pub fn get(client: &mut impl GenericClient, id: i64) -> Result<Option<SenderRecord>, VaultError> {
    let row = client.query_opt(
        "SELECT id, username, first_name, last_name, is_bot FROM senders WHERE id = $1",
        &[&id],
    )?;
    Ok(row.map(|r| SenderRecord {
        id: r.get(0),
        username: r.get(1),
        first_name: r.get(2),
        last_name: r.get(3),
        is_bot: r.get(4),
    }))
}
