//! Artist merge tests against an in-memory database

use sqlx::SqlitePool;
use uuid::Uuid;
use waxline_import::db::artists::{merge_artists, Artist, MergeError, MergeOptions};

async fn pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    waxline_common::db::init_schema(&pool)
        .await
        .expect("schema init");
    pool
}

async fn seed_artist(pool: &SqlitePool, name: &str) -> Uuid {
    let artist = Artist::new(name);
    let mut conn = pool.acquire().await.unwrap();
    waxline_import::db::artists::insert(&mut conn, &artist)
        .await
        .unwrap();
    artist.id
}

async fn seed_release(pool: &SqlitePool, title: &str, artist_id: Uuid) -> Uuid {
    let release_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO releases (id, title, release_type, primary_artist_id) \
         VALUES (?, ?, 'single', ?)",
    )
    .bind(release_id.to_string())
    .bind(title)
    .bind(artist_id.to_string())
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO release_artists (release_id, artist_id, is_primary) VALUES (?, ?, 1)")
        .bind(release_id.to_string())
        .bind(artist_id.to_string())
        .execute(pool)
        .await
        .unwrap();
    release_id
}

async fn seed_track(pool: &SqlitePool, release_id: Uuid, artist_id: Uuid) -> Uuid {
    let track_id = Uuid::new_v4();
    sqlx::query("INSERT INTO tracks (id, release_id, name, track_number) VALUES (?, ?, 'Track', 1)")
        .bind(track_id.to_string())
        .bind(release_id.to_string())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO track_artists (track_id, artist_id, is_primary) VALUES (?, ?, 1)")
        .bind(track_id.to_string())
        .bind(artist_id.to_string())
        .execute(pool)
        .await
        .unwrap();
    track_id
}

#[tokio::test]
async fn merge_moves_catalog_and_deletes_source() {
    let pool = pool().await;
    let source = seed_artist(&pool, "Jane Do").await;
    let target = seed_artist(&pool, "Jane Doe").await;
    let release = seed_release(&pool, "Starlight", source).await;
    let track = seed_track(&pool, release, source).await;

    let summary = merge_artists(&pool, source, target, MergeOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.releases_moved, 1);

    let primary: String = sqlx::query_scalar("SELECT primary_artist_id FROM releases WHERE id = ?")
        .bind(release.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(primary, target.to_string());

    // Every track on a moved release keeps a primary credit
    let track_primary: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM track_artists WHERE track_id = ? AND artist_id = ? AND is_primary = 1",
    )
    .bind(track.to_string())
    .bind(target.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(track_primary, 1);

    let source_rows: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM artists WHERE id = ?1) \
         + (SELECT COUNT(*) FROM release_artists WHERE artist_id = ?1) \
         + (SELECT COUNT(*) FROM track_artists WHERE artist_id = ?1)",
    )
    .bind(source.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(source_rows, 0);
}

#[tokio::test]
async fn secondary_artist_added_without_displacing_primary() {
    let pool = pool().await;
    let source = seed_artist(&pool, "Echoes").await;
    let target = seed_artist(&pool, "The Echoes").await;
    let secondary = seed_artist(&pool, "Jane Doe").await;
    let release = seed_release(&pool, "Moonrise", source).await;
    let track = seed_track(&pool, release, source).await;

    let options = MergeOptions {
        secondary_artist_id: Some(secondary),
        ..Default::default()
    };
    let summary = merge_artists(&pool, source, target, options).await.unwrap();
    assert_eq!(summary.secondary_links_added, 1);

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT artist_id, is_primary FROM track_artists WHERE track_id = ? ORDER BY is_primary DESC",
    )
    .bind(track.to_string())
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], (target.to_string(), 1));
    assert_eq!(rows[1], (secondary.to_string(), 0));
}

#[tokio::test]
async fn merging_artist_into_itself_is_rejected() {
    let pool = pool().await;
    let artist = seed_artist(&pool, "Jane Doe").await;

    let err = merge_artists(&pool, artist, artist, MergeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::SameArtist));
}

#[tokio::test]
async fn merge_with_unknown_artist_is_rejected() {
    let pool = pool().await;
    let artist = seed_artist(&pool, "Jane Doe").await;
    let missing = Uuid::new_v4();

    let err = merge_artists(&pool, artist, missing, MergeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::NotFound(id) if id == missing));

    // Nothing was touched
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn merge_combines_shared_release_credits() {
    let pool = pool().await;
    let source = seed_artist(&pool, "Jane Do").await;
    let target = seed_artist(&pool, "Jane Doe").await;

    // Both artists already credited on one release; source is primary there
    let release = seed_release(&pool, "Duet", source).await;
    sqlx::query("INSERT INTO release_artists (release_id, artist_id, is_primary) VALUES (?, ?, 0)")
        .bind(release.to_string())
        .bind(target.to_string())
        .execute(&pool)
        .await
        .unwrap();

    merge_artists(&pool, source, target, MergeOptions::default())
        .await
        .unwrap();

    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT artist_id, is_primary FROM release_artists WHERE release_id = ?")
            .bind(release.to_string())
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows, vec![(target.to_string(), 1)]);
}
