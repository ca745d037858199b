use rusqlite::Connection;

use crate::error::VaultError;
use crate::storage::SCHEMA_VERSION;

pub fn initialize_schema(conn: &Connection) -> Result<(), VaultError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id                      INTEGER PRIMARY KEY,    -- remote-assigned, stable
            kind                    TEXT NOT NULL,          -- 'direct' | 'group' | 'channel'
            title                   TEXT,
            username                TEXT,
            description             TEXT,
            participant_count       INTEGER,
            last_synced_message_id  INTEGER,                -- mirror of the sync_status cursor
            created_at              INTEGER NOT NULL,       -- unix epoch ms
            updated_at              INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_kind     ON conversations(kind);
        CREATE INDEX IF NOT EXISTS idx_conversations_username ON conversations(username);

        -- Remote ids are monotonically non-decreasing within a conversation,
        -- so (conversation_id, remote_id) is both identity and order.
        CREATE TABLE IF NOT EXISTS messages (
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            remote_id       INTEGER NOT NULL,
            sender_id       INTEGER,
            text            TEXT,
            sent_at         INTEGER NOT NULL,
            edited_at       INTEGER,
            reply_to_id     INTEGER,
            is_outgoing     INTEGER NOT NULL DEFAULT 0,
            media_id        TEXT,
            raw_data        TEXT,                           -- JSON, polls and other special content
            deleted         INTEGER NOT NULL DEFAULT 0,     -- soft delete, set by reconciliation only
            fetched_at      INTEGER NOT NULL,
            PRIMARY KEY (conversation_id, remote_id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sent   ON messages(conversation_id, sent_at);
        CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);

        CREATE TABLE IF NOT EXISTS senders (
            id          INTEGER PRIMARY KEY,
            username    TEXT,
            first_name  TEXT,
            last_name   TEXT,
            is_bot      INTEGER NOT NULL DEFAULT 0,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_senders_username ON senders(username);

        CREATE TABLE IF NOT EXISTS attachments (
            id              TEXT PRIMARY KEY,               -- remote content identifier
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            message_id      INTEGER NOT NULL,
            kind            TEXT NOT NULL,                  -- photo | video | document | audio | voice | sticker | gif
            file_name       TEXT,
            mime_type       TEXT,
            size_bytes      INTEGER,
            width           INTEGER,
            height          INTEGER,
            duration_secs   INTEGER,
            local_path      TEXT,                           -- NULL until downloaded
            status          TEXT NOT NULL DEFAULT 'pending',
            downloaded_at   INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_status  ON attachments(status);
        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(conversation_id, message_id);

        CREATE TABLE IF NOT EXISTS reactions (
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            message_id      INTEGER NOT NULL,
            emoji           TEXT NOT NULL,
            count           INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (conversation_id, message_id, emoji)
        );

        -- Durable resumability record, authoritative over any in-memory state
        CREATE TABLE IF NOT EXISTS sync_status (
            conversation_id      INTEGER PRIMARY KEY REFERENCES conversations(id) ON DELETE CASCADE,
            last_message_id      INTEGER,
            last_sync_at         INTEGER,
            message_count        INTEGER NOT NULL DEFAULT 0,
            last_error           TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS metadata (
            key     TEXT PRIMARY KEY,
            value   TEXT
        );
        ",
    )
    .map_err(|e| VaultError::Schema(e.to_string()))?;

    check_version(conn)
}

fn check_version(conn: &Connection) -> Result<(), VaultError> {
    let result = conn.query_row(
        "SELECT value FROM metadata WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(version) if version == SCHEMA_VERSION => Ok(()),
        Ok(version) => Err(VaultError::Schema(format!(
            "Unsupported schema version {} (expected {})",
            version, SCHEMA_VERSION
        ))),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            conn.execute(
                "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION],
            )
            .map_err(|e| VaultError::Schema(e.to_string()))?;
            Ok(())
        }
        Err(e) => Err(VaultError::Schema(e.to_string())),
    }
}
