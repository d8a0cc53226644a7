/// Embedded schema migrations
///
/// Migrations live in `taskboard-shared/migrations/` and are compiled into
/// the binary, so the server and the seed script always carry the schema
/// they were built against.

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Applies every pending migration
///
/// # Errors
///
/// Returns the migrator's error if any migration fails; sqlx rolls back the
/// failing migration's transaction.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}
