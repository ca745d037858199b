use postgres::GenericClient;

use crate::error::VaultError;
use crate::storage::records::ReactionUpdate;
use crate::types::ReactionCount;

pub fn replace(client: &mut impl GenericClient, update: &ReactionUpdate) -> Result<(), VaultError> {
    client.execute(
        "DELETE FROM reactions WHERE conversation_id = $1 AND message_id = $2",
        &[&update.conversation_id, &update.message_id],
    )?;

    for reaction in &update.counts {
        client.execute(
            "INSERT INTO reactions (conversation_id, message_id, emoji, count)
             VALUES ($1, $2, $3, $4)",
            &[
                &update.conversation_id,
                &update.message_id,
                &reaction.emoji,
                &reaction.count,
            ],
        )?;
    }
    Ok(())
}

pub fn for_message(
    client: &mut impl GenericClient,
    conversation_id: i64,
    message_id: i64,
) -> Result<Vec<ReactionCount>, VaultError> {
    let rows = client.query(
        "SELECT emoji, count FROM reactions
         WHERE conversation_id = $1 AND message_id = $2
         ORDER BY emoji",
        &[&conversation_id, &message_id],
    )?;
    Ok(rows
        .iter()
        .map(|r| ReactionCount {
            emoji: r.get(0),
            count: r.get(1),
        })
        .collect())
}
