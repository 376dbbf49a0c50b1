//! Database access for newscast-server
//!
//! SQLite-backed storage for tags, subscribers and channels. The schema is
//! created on startup; all reads and writes go through [`Repository`].

mod repository;

pub use repository::Repository;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the newscast tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            value TEXT PRIMARY KEY,
            restricted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            id TEXT PRIMARY KEY,
            window_start TEXT NOT NULL DEFAULT '08:00',
            window_end TEXT NOT NULL DEFAULT '17:00'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_tags (
            subscriber_id TEXT NOT NULL,
            tag_value TEXT NOT NULL,
            PRIMARY KEY (subscriber_id, tag_value)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_phases (
            subscriber_id TEXT NOT NULL,
            phase_id INTEGER NOT NULL,
            PRIMARY KEY (subscriber_id, phase_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_likes (
            subscriber_id TEXT NOT NULL,
            like_id TEXT NOT NULL,
            PRIMARY KEY (subscriber_id, like_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            name TEXT PRIMARY KEY,
            url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_channels (
            subscriber_id TEXT NOT NULL,
            channel_name TEXT NOT NULL,
            handle TEXT NOT NULL,
            PRIMARY KEY (subscriber_id, channel_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
