use crate::config::AppConfig;
use crate::migrator::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Establishes the database connection pool from configuration.
pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(config.is_development());

    let db = Database::connect(opt).await?;
    info!("database connection established");
    Ok(db)
}

/// Runs all pending migrations.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    info!("running database migrations");
    Migrator::up(db, None).await?;
    info!("database migrations complete");
    Ok(())
}

/// Simple connectivity check used by the health endpoint.
pub async fn ping(db: &Arc<DatabaseConnection>) -> Result<(), DbErr> {
    db.ping().await
}
