use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::VaultError;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn create_pool(db_path: &Path) -> Result<DbPool, VaultError> {
    build(SqliteConnectionManager::file(db_path))
}

pub fn create_memory_pool() -> Result<DbPool, VaultError> {
    build(SqliteConnectionManager::memory())
}

fn build(manager: SqliteConnectionManager) -> Result<DbPool, VaultError> {
    let manager = manager.with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )
    });

    // SQLite permits one writer at a time. A single pooled connection is the
    // process-wide write serialization point; every caller funnels through it.
    let pool = Pool::builder().max_size(1).build(manager)?;

    Ok(pool)
}
