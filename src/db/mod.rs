//! Database initialization and migration runner.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect to Postgres without touching the schema.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(max_connections).connect(database_url).await
}

/// Connect and bring the schema up to date, including the zone tombstone columns.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = connect(database_url, max_connections).await?;
    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    Ok(pool)
}
