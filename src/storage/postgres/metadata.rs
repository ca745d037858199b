use postgres::GenericClient;

use crate::error::VaultError;

pub fn get(client: &mut impl GenericClient, key: &str) -> Result<Option<String>, VaultError> {
    let row = client.query_opt("SELECT value FROM metadata WHERE key = $1", &[&key])?;
    Ok(row.map(|r| r.get(0)))
}

pub fn set(client: &mut impl GenericClient, key: &str, value: &str) -> Result<(), VaultError> {
    client.execute(
        "INSERT INTO metadata (key, value) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        &[&key, &value],
    )?;
    Ok(())
}
