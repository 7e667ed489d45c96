//! Database migration runner
//!
//! Migrations live in the workspace `migrations/` directory as reversible
//! pairs (`{version}_{name}.up.sql` / `{version}_{name}.down.sql`) and are
//! embedded into the binary at compile time.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Runs all pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails; sqlx rolls that migration back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("../migrations").run(pool).await {
        Ok(()) => {
            info!("Database migrations complete");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Creates the database if it doesn't exist
///
/// Used by local development setups; production databases are provisioned
/// ahead of time.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    } else {
        debug!("Database already exists");
    }

    Ok(())
}
