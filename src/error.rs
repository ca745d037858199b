#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Existing database carries a schema this build does not understand.
    /// Fatal at startup; the run does not proceed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Backend I/O, constraint or timeout failure. Batch-scoped: the caller
    /// must treat the current batch as not committed and must not advance
    /// the cursor.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote transport or auth failure. Fatal to the current run; the
    /// scheduler retries at the next cycle.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// Structured cooldown signal from the remote side. Not a failure:
    /// callers sleep the given number of seconds and resume.
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Attachment-scoped download failure. Recorded as a `failed` status on
    /// the attachment row, never propagated out of the media sub-pipeline.
    #[error("Media download failed: {0}")]
    MediaDownload(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for VaultError {
    fn from(e: r2d2::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

impl From<postgres::Error> for VaultError {
    fn from(e: postgres::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}
