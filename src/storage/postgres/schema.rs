use postgres::Client;

use crate::error::VaultError;
use crate::storage::SCHEMA_VERSION;

/// Same logical schema as the SQLite backend; only native type mapping
/// differs (BIGINT ids and epoch-ms timestamps, BOOLEAN flags).
pub fn initialize_schema(client: &mut Client) -> Result<(), VaultError> {
    client
        .batch_execute(
            "
            CREATE TABLE IF NOT EXISTS conversations (
                id                      BIGINT PRIMARY KEY,
                kind                    TEXT NOT NULL,
                title                   TEXT,
                username                TEXT,
                description             TEXT,
                participant_count       BIGINT,
                last_synced_message_id  BIGINT,
                created_at              BIGINT NOT NULL,
                updated_at              BIGINT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_kind     ON conversations(kind);
            CREATE INDEX IF NOT EXISTS idx_conversations_username ON conversations(username);

            CREATE TABLE IF NOT EXISTS messages (
                conversation_id BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                remote_id       BIGINT NOT NULL,
                sender_id       BIGINT,
                text            TEXT,
                sent_at         BIGINT NOT NULL,
                edited_at       BIGINT,
                reply_to_id     BIGINT,
                is_outgoing     BOOLEAN NOT NULL DEFAULT FALSE,
                media_id        TEXT,
                raw_data        TEXT,
                deleted         BOOLEAN NOT NULL DEFAULT FALSE,
                fetched_at      BIGINT NOT NULL,
                PRIMARY KEY (conversation_id, remote_id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_sent   ON messages(conversation_id, sent_at);
            CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);

            CREATE TABLE IF NOT EXISTS senders (
                id          BIGINT PRIMARY KEY,
                username    TEXT,
                first_name  TEXT,
                last_name   TEXT,
                is_bot      BOOLEAN NOT NULL DEFAULT FALSE,
                updated_at  BIGINT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_senders_username ON senders(username);

            CREATE TABLE IF NOT EXISTS attachments (
                id              TEXT PRIMARY KEY,
                conversation_id BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                message_id      BIGINT NOT NULL,
                kind            TEXT NOT NULL,
                file_name       TEXT,
                mime_type       TEXT,
                size_bytes      BIGINT,
                width           INTEGER,
                height          INTEGER,
                duration_secs   INTEGER,
                local_path      TEXT,
                status          TEXT NOT NULL DEFAULT 'pending',
                downloaded_at   BIGINT
            );

            CREATE INDEX IF NOT EXISTS idx_attachments_status  ON attachments(status);
            CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(conversation_id, message_id);

            CREATE TABLE IF NOT EXISTS reactions (
                conversation_id BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                message_id      BIGINT NOT NULL,
                emoji           TEXT NOT NULL,
                count           BIGINT NOT NULL DEFAULT 1,
                PRIMARY KEY (conversation_id, message_id, emoji)
            );

            CREATE TABLE IF NOT EXISTS sync_status (
                conversation_id      BIGINT PRIMARY KEY REFERENCES conversations(id) ON DELETE CASCADE,
                last_message_id      BIGINT,
                last_sync_at         BIGINT,
                message_count        BIGINT NOT NULL DEFAULT 0,
                last_error           TEXT,
                consecutive_failures BIGINT NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key     TEXT PRIMARY KEY,
                value   TEXT
            );
            ",
        )
        .map_err(|e| VaultError::Schema(e.to_string()))?;

    check_version(client)
}

fn check_version(client: &mut Client) -> Result<(), VaultError> {
    let row = client
        .query_opt("SELECT value FROM metadata WHERE key = 'schema_version'", &[])
        .map_err(|e| VaultError::Schema(e.to_string()))?;

    match row {
        Some(row) => {
            let version: String = row.get(0);
            if version == SCHEMA_VERSION {
                Ok(())
            } else {
                Err(VaultError::Schema(format!(
                    "Unsupported schema version {} (expected {})",
                    version, SCHEMA_VERSION
                )))
            }
        }
        None => {
            client
                .execute(
                    "INSERT INTO metadata (key, value) VALUES ('schema_version', $1)",
                    &[&SCHEMA_VERSION],
                )
                .map_err(|e| VaultError::Schema(e.to_string()))?;
            Ok(())
        }
    }
}
