use crate::config::DatabaseSettings;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::{io, time::Duration};

/// Пул соединений sea-orm
pub type DB = DatabaseConnection;

fn pool_options(settings: &DatabaseSettings) -> ConnectOptions {
    let mut opt = ConnectOptions::new(settings.url.clone());
    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .sqlx_logging(settings.sql_log);
    opt
}

/// Подключение по `DATABASE_URL` и остальным `DATABASE_*`
pub async fn connect() -> io::Result<DB> {
    let settings = DatabaseSettings::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    connect_with_settings(&settings).await
}

pub async fn connect_with_settings(settings: &DatabaseSettings) -> io::Result<DB> {
    let db = Database::connect(pool_options(settings))
        .await
        .map_err(|e| io::Error::other(format!("Failed to connect to database: {}", e)))?;

    ping(&db)
        .await
        .map_err(|e| io::Error::other(format!("Failed to ping database: {}", e)))?;

    log::info!(
        "Connected to database (max_connections={})",
        settings.max_connections
    );
    Ok(db)
}

/// `SELECT 1`, используется в /api/health
pub async fn ping(db: &DB) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "SELECT 1")).await?;
    Ok(())
}
