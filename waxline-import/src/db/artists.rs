//! Artist persistence and the administrative merge operation

use sqlx::{Row, SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

/// Canonical performer identity
#[derive(Debug, Clone)]
pub struct Artist {
    pub id: Uuid,
    pub name: String,
    pub legal_name: Option<String>,
    pub contact: Option<String>,
    pub notes: Option<String>,
}

impl Artist {
    /// Create a new artist record from a (trimmed) display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            legal_name: None,
            contact: None,
            notes: None,
        }
    }
}

fn artist_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Artist, sqlx::Error> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Artist {
        id,
        name: row.get("name"),
        legal_name: row.get("legal_name"),
        contact: row.get("contact"),
        notes: row.get("notes"),
    })
}

/// Case-insensitive exact-match lookup by display name
pub async fn find_by_name_nocase(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Artist>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, name, legal_name, contact, notes
        FROM artists
        WHERE name = ? COLLATE NOCASE
        LIMIT 1
        "#,
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(artist_from_row).transpose()
}

/// Insert a new artist record
pub async fn insert(conn: &mut SqliteConnection, artist: &Artist) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO artists (id, name, legal_name, contact, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(artist.id.to_string())
    .bind(&artist.name)
    .bind(&artist.legal_name)
    .bind(&artist.contact)
    .bind(&artist.notes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Load an artist by id
pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Artist>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, name, legal_name, contact, notes FROM artists WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(artist_from_row).transpose()
}

/// Merge invoked with bad preconditions, or the underlying writes failed
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("source and target artist are the same")]
    SameArtist,
    #[error("artist not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Caller-supplied merge behavior
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Override the `is_primary` flag applied to rewritten join rows;
    /// None preserves each row's existing flag
    pub primary_override: Option<bool>,
    /// Additional secondary artist attached to every affected track that
    /// already has a primary artist
    pub secondary_artist_id: Option<Uuid>,
}

/// Counts of what the merge touched
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MergeSummary {
    pub releases_moved: usize,
    pub release_links_moved: usize,
    pub track_links_moved: usize,
    pub secondary_links_added: usize,
}

/// Merge `source` into `target`: reassign owned releases, rewrite join
/// rows, optionally attach a secondary artist, delete the source.
///
/// Preconditions are rejected before any transaction opens; all writes
/// happen atomically — a partial merge is never observable.
pub async fn merge_artists(
    pool: &SqlitePool,
    source_id: Uuid,
    target_id: Uuid,
    options: MergeOptions,
) -> Result<MergeSummary, MergeError> {
    if source_id == target_id {
        return Err(MergeError::SameArtist);
    }

    {
        let mut conn = pool.acquire().await?;
        if load(&mut conn, source_id).await?.is_none() {
            return Err(MergeError::NotFound(source_id));
        }
        if load(&mut conn, target_id).await?.is_none() {
            return Err(MergeError::NotFound(target_id));
        }
        if let Some(secondary) = options.secondary_artist_id {
            if load(&mut conn, secondary).await?.is_none() {
                return Err(MergeError::NotFound(secondary));
            }
        }
    }

    let source = source_id.to_string();
    let target = target_id.to_string();
    let mut summary = MergeSummary::default();
    let mut tx = pool.begin().await?;

    // (a) Reassign every release owned by source
    let moved_release_ids: Vec<String> =
        sqlx::query("SELECT id FROM releases WHERE primary_artist_id = ?")
            .bind(&source)
            .fetch_all(tx.as_mut())
            .await?
            .iter()
            .map(|r| r.get::<String, _>("id"))
            .collect();

    sqlx::query("UPDATE releases SET primary_artist_id = ? WHERE primary_artist_id = ?")
        .bind(&target)
        .bind(&source)
        .execute(tx.as_mut())
        .await?;
    summary.releases_moved = moved_release_ids.len();

    // (b) Rewrite release-level join rows from source to target
    let release_links = sqlx::query(
        "SELECT release_id, is_primary FROM release_artists WHERE artist_id = ?",
    )
    .bind(&source)
    .fetch_all(tx.as_mut())
    .await?;
    for link in &release_links {
        let release_id: String = link.get("release_id");
        let is_primary: i64 = link.get("is_primary");
        let flag = options.primary_override.map(i64::from).unwrap_or(is_primary);
        upsert_release_artist(tx.as_mut(), &release_id, &target, flag).await?;
    }
    sqlx::query("DELETE FROM release_artists WHERE artist_id = ?")
        .bind(&source)
        .execute(tx.as_mut())
        .await?;
    summary.release_links_moved = release_links.len();

    // Releases previously reachable only through source's direct ownership
    // gain an explicit join entry pointing at target
    for release_id in &moved_release_ids {
        let flag = options.primary_override.map(i64::from).unwrap_or(1);
        upsert_release_artist(tx.as_mut(), release_id, &target, flag).await?;
    }

    // (b) Rewrite track-level join rows from source to target
    let track_links = sqlx::query(
        "SELECT track_id, is_primary FROM track_artists WHERE artist_id = ?",
    )
    .bind(&source)
    .fetch_all(tx.as_mut())
    .await?;
    let mut affected_tracks: Vec<String> = Vec::new();
    for link in &track_links {
        let track_id: String = link.get("track_id");
        let is_primary: i64 = link.get("is_primary");
        let flag = options.primary_override.map(i64::from).unwrap_or(is_primary);
        upsert_track_artist(tx.as_mut(), &track_id, &target, flag).await?;
        affected_tracks.push(track_id);
    }
    sqlx::query("DELETE FROM track_artists WHERE artist_id = ?")
        .bind(&source)
        .execute(tx.as_mut())
        .await?;
    summary.track_links_moved = track_links.len();

    // Tracks on moved releases get an explicit primary credit for target
    for release_id in &moved_release_ids {
        let track_ids: Vec<String> = sqlx::query("SELECT id FROM tracks WHERE release_id = ?")
            .bind(release_id)
            .fetch_all(tx.as_mut())
            .await?
            .iter()
            .map(|r| r.get::<String, _>("id"))
            .collect();
        for track_id in track_ids {
            let flag = options.primary_override.map(i64::from).unwrap_or(1);
            upsert_track_artist(tx.as_mut(), &track_id, &target, flag).await?;
            affected_tracks.push(track_id);
        }
    }

    // (c) Optional secondary artist, only on tracks that already have a
    // primary — never leaving a track without a primary credit
    if let Some(secondary) = options.secondary_artist_id {
        let secondary = secondary.to_string();
        affected_tracks.sort();
        affected_tracks.dedup();
        for track_id in &affected_tracks {
            let has_primary: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM track_artists WHERE track_id = ? AND is_primary = 1",
            )
            .bind(track_id)
            .fetch_one(tx.as_mut())
            .await?;
            if has_primary > 0 && secondary != target {
                upsert_track_artist(tx.as_mut(), track_id, &secondary, 0).await?;
                summary.secondary_links_added += 1;
            }
        }
    }

    // (d) Delete the duplicate
    sqlx::query("DELETE FROM artists WHERE id = ?")
        .bind(&source)
        .execute(tx.as_mut())
        .await?;

    tx.commit().await?;
    Ok(summary)
}

async fn upsert_release_artist(
    conn: &mut SqliteConnection,
    release_id: &str,
    artist_id: &str,
    is_primary: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO release_artists (release_id, artist_id, is_primary)
        VALUES (?, ?, ?)
        ON CONFLICT(release_id, artist_id) DO UPDATE SET
            is_primary = MAX(is_primary, excluded.is_primary)
        "#,
    )
    .bind(release_id)
    .bind(artist_id)
    .bind(is_primary)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_track_artist(
    conn: &mut SqliteConnection,
    track_id: &str,
    artist_id: &str,
    is_primary: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO track_artists (track_id, artist_id, is_primary)
        VALUES (?, ?, ?)
        ON CONFLICT(track_id, artist_id) DO UPDATE SET
            is_primary = MAX(is_primary, excluded.is_primary)
        "#,
    )
    .bind(track_id)
    .bind(artist_id)
    .bind(is_primary)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
