//! Database module

pub mod queries;

use anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run embedded migrations after reconciling `_sqlx_migrations` with them.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    reconcile_migration_history(pool, &MIGRATOR).await?;
    MIGRATOR.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}

/// Drop history rows for migrations no longer embedded and refresh
/// checksums that differ only by line endings.
async fn reconcile_migration_history(pool: &PgPool, migrator: &Migrator) -> Result<()> {
    let history_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !history_exists {
        return Ok(());
    }

    let applied: Vec<(i64, Vec<u8>)> =
        sqlx::query_as("SELECT version, checksum FROM _sqlx_migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    for (version, stored_checksum) in applied {
        let embedded = migrator
            .iter()
            .find(|m| m.version == version && !m.migration_type.is_down_migration());

        match embedded {
            None => {
                warn!("Removing history for migration {} (no longer embedded)", version);
                sqlx::query("DELETE FROM _sqlx_migrations WHERE version = $1")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
            Some(migration) if stored_checksum.as_slice() != &*migration.checksum => {
                warn!(
                    "Migration {} ({}) checksum changed, updating history",
                    version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2")
                    .bind(&*migration.checksum)
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
            Some(_) => {}
        }
    }

    Ok(())
}
