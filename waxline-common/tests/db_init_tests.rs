//! Tests for database initialization and schema idempotence

use sqlx::Row;
use waxline_common::db::{init_database, init_schema};

#[tokio::test]
async fn database_created_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("waxline.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.expect("init_database failed");
    assert!(db_path.exists(), "database file was not created");

    // All catalog tables should exist
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .expect("table listing failed");

    let names: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
    for expected in [
        "artists",
        "employees",
        "import_failed_rows",
        "import_sessions",
        "platform_requests",
        "release_artists",
        "releases",
        "settings",
        "track_artists",
        "tracks",
        "users",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing table: {}", expected);
    }
}

#[tokio::test]
async fn schema_init_is_idempotent() {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory pool");

    init_schema(&pool).await.expect("first init failed");
    init_schema(&pool).await.expect("second init failed");
}

#[tokio::test]
async fn foreign_keys_enforced_after_init() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("waxline.db");
    let pool = init_database(&db_path).await.expect("init_database failed");

    // A release referencing a nonexistent artist must be rejected
    let result = sqlx::query(
        "INSERT INTO releases (id, title, primary_artist_id) VALUES ('r1', 'Test', 'no-such-artist')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign key violation was not enforced");
}
