use anyhow::{Context, Result};
use diesel::{Connection, PgConnection};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

pub type DbPool = Pool<AsyncPgConnection>;

pub async fn create_pool(url: &str) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    Pool::builder()
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Migrations need a synchronous connection, so they run on the blocking pool.
pub async fn run_migrations_blocking(migrations: EmbeddedMigrations, url: &str) -> Result<usize> {
    let url = url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&url).context("Failed to connect to run migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow::anyhow!("Failed to run migrations: {err}"))?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
