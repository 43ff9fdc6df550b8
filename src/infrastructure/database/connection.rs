//! SurrealDB connection management
//!
//! The endpoint comes from `DATABASE_URL`: `rocksdb://<path>` for the embedded
//! store, `ws://host:port` for a remote server, `mem://` for tests.

use surrealdb::engine::any::{self, Any};
use surrealdb::Surreal;
use std::path::Path;

use super::schema::run_migrations;
use crate::config::{redact_url, Settings};
use crate::shared::errors::{AppError, Result};

/// Database connection handle (cheap to clone)
pub type Database = Surreal<Any>;

/// Create the on-disk directory for embedded endpoints
fn prepare_local_path(database_url: &str) -> Result<()> {
    if let Some(path) = database_url.strip_prefix("rocksdb://") {
        std::fs::create_dir_all(Path::new(path))
            .map_err(|e| AppError::Database(format!("Failed to create database directory: {}", e)))?;
    }
    Ok(())
}

/// Initialize the database connection and run migrations
pub async fn init_database(settings: &Settings) -> Result<Database> {
    prepare_local_path(&settings.database_url)?;

    tracing::info!(
        endpoint = %redact_url(&settings.database_url),
        namespace = %settings.database_namespace,
        database = %settings.database_name,
        "Initializing SurrealDB"
    );

    let db = any::connect(settings.database_url.as_str())
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to SurrealDB: {}", e)))?;

    db.use_ns(settings.database_namespace.as_str())
        .use_db(settings.database_name.as_str())
        .await
        .map_err(|e| AppError::Database(format!("Failed to select namespace/database: {}", e)))?;

    run_migrations(&db).await?;

    tracing::info!("SurrealDB initialized successfully");

    Ok(db)
}

/// Check that the database answers
pub async fn ping(db: &Database) -> Result<()> {
    db.health()
        .await
        .map_err(|e| AppError::Database(format!("Health check failed: {}", e)))
}

/// Fresh in-memory database with the schema applied
#[cfg(test)]
pub async fn test_database() -> Database {
    init_database(&Settings::for_testing())
        .await
        .expect("in-memory database should initialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_local_path_ignores_remote_endpoints() {
        assert!(prepare_local_path("mem://").is_ok());
        assert!(prepare_local_path("ws://localhost:8000").is_ok());
    }

    #[tokio::test]
    async fn test_memory_database_answers_ping() {
        let db = test_database().await;
        assert!(ping(&db).await.is_ok());
    }
}
