//! Release graph persistence
//!
//! One imported row becomes a release, its tracks, its artist joins, and
//! any platform requests. The whole graph is written through the caller's
//! transaction so a failure partway through one row rolls back that row
//! only.

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::artists::Artist;
use crate::import::mapping::RawRow;
use crate::import::row_mapper::RowDrafts;

/// Persist one mapped row's full graph; returns the new release id
pub async fn insert_row_graph(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    drafts: &RowDrafts,
    artists: &[Artist],
) -> Result<Uuid, sqlx::Error> {
    let release_id = Uuid::new_v4();
    let primary = artists
        .first()
        .ok_or_else(|| sqlx::Error::Protocol("row graph requires at least one artist".into()))?;
    let raw_row_json = serde_json::to_string(&drafts.release.raw_row)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO releases (
            id, title, release_type, primary_artist_id,
            notes, raw_row, ar_contact, import_session_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(release_id.to_string())
    .bind(&drafts.release.title)
    .bind(drafts.release.release_type.as_str())
    .bind(primary.id.to_string())
    .bind(&drafts.release.notes)
    .bind(&raw_row_json)
    .bind(&drafts.release.ar_contact)
    .bind(session_id.to_string())
    .execute(&mut *conn)
    .await?;

    // Join rows in credit order; the first artist is primary. Duplicate
    // artists in one row collapse onto a single join entry.
    for (index, artist) in artists.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO release_artists (release_id, artist_id, is_primary)
            VALUES (?, ?, ?)
            ON CONFLICT(release_id, artist_id) DO UPDATE SET
                is_primary = MAX(is_primary, excluded.is_primary)
            "#,
        )
        .bind(release_id.to_string())
        .bind(artist.id.to_string())
        .bind(i64::from(index == 0))
        .execute(&mut *conn)
        .await?;
    }

    for track in &drafts.tracks {
        sqlx::query(
            r#"
            INSERT INTO tracks (
                id, release_id, name, track_number,
                performer, composer, band, producer, studio, label, genre
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(release_id.to_string())
        .bind(&track.name)
        .bind(track.track_number as i64)
        .bind(&track.performer)
        .bind(&track.composer)
        .bind(&track.band)
        .bind(&track.producer)
        .bind(&track.studio)
        .bind(&track.label)
        .bind(&track.genre)
        .execute(&mut *conn)
        .await?;
    }

    for request in &drafts.platform_requests {
        sqlx::query(
            r#"
            INSERT INTO platform_requests (id, release_id, platform, status, notes)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(release_id.to_string())
        .bind(&request.platform)
        .bind(&request.status)
        .bind(&request.notes)
        .execute(&mut *conn)
        .await?;
    }

    Ok(release_id)
}

/// Release fields needed by the repair passes
#[derive(Debug, Clone)]
pub struct ReleaseScanRow {
    pub id: Uuid,
    pub title: String,
    pub release_type: String,
    pub notes: Option<String>,
    pub raw_row: Option<RawRow>,
    pub ar_contact: Option<String>,
}

/// Load every persisted release for an offline repair scan
pub async fn scan_releases(pool: &SqlitePool) -> Result<Vec<ReleaseScanRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, title, release_type, notes, raw_row, ar_contact FROM releases ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut releases = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let id = Uuid::parse_str(&id_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let raw_row: Option<String> = row.get("raw_row");
        // A release with unparseable raw_row still gets scanned; it just
        // loses the fallback-column source
        let raw_row = raw_row.and_then(|json| serde_json::from_str(&json).ok());
        releases.push(ReleaseScanRow {
            id,
            title: row.get("title"),
            release_type: row.get("release_type"),
            notes: row.get("notes"),
            raw_row,
            ar_contact: row.get("ar_contact"),
        });
    }
    Ok(releases)
}

/// Rewrite a repaired title, replacing the notes field wholesale (the
/// repair pass appends, so prior notes content is already included)
pub async fn update_title_and_notes(
    pool: &SqlitePool,
    release_id: Uuid,
    title: &str,
    notes: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE releases SET title = ?, notes = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(title)
    .bind(notes)
    .bind(release_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a contaminated A&R credit into notes and clear the assignment
pub async fn clear_ar_contact(
    pool: &SqlitePool,
    release_id: Uuid,
    notes: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE releases
        SET ar_contact = NULL, ar_employee_id = NULL, notes = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(notes)
    .bind(release_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Name of the first track (by track number) on a release, if any
pub async fn first_track_name(
    pool: &SqlitePool,
    release_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT name FROM tracks WHERE release_id = ? ORDER BY track_number LIMIT 1",
    )
    .bind(release_id.to_string())
    .fetch_optional(pool)
    .await
}
