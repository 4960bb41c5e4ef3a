//! PostgreSQL pool bootstrap and schema

use crate::{config::DatabaseConfig, error::AppError, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS todos (
        id          TEXT PRIMARY KEY,
        title       VARCHAR(255) NOT NULL,
        done        BOOLEAN NOT NULL DEFAULT FALSE,
        owner_id    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_todos_owner_created ON todos (owner_id, created_at)",
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!("Initializing database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .connect(&config.url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to database: {}", e)))?;

    health_check(&pool)
        .await
        .map_err(|e| AppError::configuration(format!("Database health check failed: {}", e)))?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Idempotent; safe to run on every start-up.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema verified");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
