use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use crate::config::PostgresConfig;
use crate::error::VaultError;

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

pub fn create_pool(config: &PostgresConfig) -> Result<PgPool, VaultError> {
    let mut pg = postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.database)
        .user(&config.user)
        .password(&config.password);

    let manager = PostgresConnectionManager::new(pg, NoTls);

    // Bounded pool. Every checkout is liveness-validated, so a connection the
    // server dropped is recycled instead of being handed to a writer.
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .test_on_check_out(true)
        .build(manager)?;

    Ok(pool)
}
