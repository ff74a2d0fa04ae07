//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and brings the schema up
//! idempotently. Safe to call on every service start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer, which keeps
    // status polling responsive while an import is committing rows
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Set busy timeout
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog tables if they don't exist (idempotent)
///
/// Also used directly by tests against `sqlite::memory:` pools.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_employees_table(pool).await?;
    create_artists_table(pool).await?;
    create_releases_table(pool).await?;
    create_tracks_table(pool).await?;
    create_release_artists_table(pool).await?;
    create_track_artists_table(pool).await?;
    create_platform_requests_table(pool).await?;
    create_import_sessions_table(pool).await?;
    create_import_failed_rows_table(pool).await?;

    info!("Database schema initialized");
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'staff',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_employees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            user_id TEXT REFERENCES users(id),
            name TEXT NOT NULL,
            email TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            legal_name TEXT,
            contact TEXT,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lookup is case-insensitive; no UNIQUE constraint because duplicates
    // from insert races are reconciled by merge, not prevented
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_artists_name_nocase ON artists(name COLLATE NOCASE)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_releases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS releases (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            release_type TEXT NOT NULL DEFAULT 'single',
            primary_artist_id TEXT NOT NULL REFERENCES artists(id),
            notes TEXT,
            raw_row TEXT,
            ar_contact TEXT,
            ar_employee_id TEXT REFERENCES employees(id),
            import_session_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_releases_primary_artist ON releases(primary_artist_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            release_id TEXT NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            track_number INTEGER NOT NULL,
            performer TEXT,
            composer TEXT,
            band TEXT,
            producer TEXT,
            studio TEXT,
            label TEXT,
            genre TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(release_id, track_number)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_release_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS release_artists (
            release_id TEXT NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
            artist_id TEXT NOT NULL REFERENCES artists(id),
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (release_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_track_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_artists (
            track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            artist_id TEXT NOT NULL REFERENCES artists(id),
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (track_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_platform_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS platform_requests (
            id TEXT PRIMARY KEY,
            release_id TEXT NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
            track_id TEXT REFERENCES tracks(id) ON DELETE CASCADE,
            platform TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_import_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_sessions (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            source_name TEXT NOT NULL,
            source_hash TEXT NOT NULL,
            mapping TEXT NOT NULL,
            rows_processed INTEGER NOT NULL DEFAULT 0,
            total_rows INTEGER NOT NULL DEFAULT 0,
            percentage REAL NOT NULL DEFAULT 0.0,
            current_operation TEXT NOT NULL DEFAULT '',
            errors TEXT NOT NULL DEFAULT '[]',
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_import_sessions_hash ON import_sessions(source_hash)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_import_failed_rows_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_failed_rows (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES import_sessions(session_id) ON DELETE CASCADE,
            row_index INTEGER NOT NULL,
            row_json TEXT NOT NULL,
            error TEXT NOT NULL,
            failed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_import_failed_rows_session ON import_failed_rows(session_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
