//! Shared SQLite database access
//!
//! All CastLink jobs share one SQLite database in the root folder. The
//! schema is created on first connection; every statement is
//! `CREATE TABLE IF NOT EXISTS` so startup is idempotent.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool against the shared castlink.db
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_schema(&pool).await?;

    Ok(pool)
}

/// Create the pipeline tables if they don't exist
///
/// Public so integration tests can run against `:memory:` pools.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    // Products are created by upstream ingestion; this pipeline reads
    // unresolved rows and stamps last_attempt_at.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            guid TEXT PRIMARY KEY,
            source_name TEXT NOT NULL,
            original_product_id TEXT NOT NULL,
            normalized_product_id TEXT NOT NULL UNIQUE,
            title TEXT,
            last_attempt_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Uniqueness is on the stored spelling; canonical-form uniqueness is
    // maintained by the cleanup engine.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performer_aliases (
            alias TEXT PRIMARY KEY,
            performer_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_performers (
            product_id TEXT NOT NULL,
            performer_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (product_id, performer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // names holds a JSON array of candidate strings; the latest crawl for a
    // (code, source) pair overwrites the previous one.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lookup_cache (
            code TEXT NOT NULL,
            source TEXT NOT NULL,
            names TEXT NOT NULL,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (code, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database schema initialized");

    Ok(())
}
