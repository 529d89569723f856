pub mod memory;
pub mod orcid_tokens;
pub mod profiles;

pub use memory::{InMemoryProfileRepository, InMemoryTokenRepository};
pub use orcid_tokens::{PgTokenRepository, TokenRepository};
pub use profiles::{PgProfileRepository, ProfileRepository, SortOrder};

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::services::ServiceError;

/// Open the connection pool and bring the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, ServiceError> {
    tracing::info!(
        max_connections = config.max_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database migration failed: {}", e))?;

    tracing::info!("Database ready");
    Ok(pool)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
