//! Find-or-create artist resolution
//!
//! Resolves free-text artist names to canonical artist records,
//! case-insensitively, preserving the caller's credit order (first entry
//! is primary). Runs against the caller's connection so resolution
//! participates in the per-row import transaction: a failed row rolls
//! back the artists it created.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use thiserror::Error;

use crate::db::artists::{self, Artist};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Empty or whitespace-only input name
    #[error("artist name is empty")]
    EmptyName,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Resolve each name to an existing or newly created artist.
///
/// The output preserves input order and length: case-variants of one name
/// all map to the same artist record, which appears once per input entry.
/// Within one invocation no two case-insensitively equal names can create
/// separate records; races between independent invocations are reconciled
/// later by merge, not prevented here.
pub async fn find_or_create_artists(
    conn: &mut SqliteConnection,
    names: &[String],
) -> Result<Vec<Artist>, ResolveError> {
    let mut resolved: Vec<Artist> = Vec::with_capacity(names.len());
    let mut seen: HashMap<String, Artist> = HashMap::new();

    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyName);
        }
        let key = trimmed.to_lowercase();

        if let Some(artist) = seen.get(&key) {
            resolved.push(artist.clone());
            continue;
        }

        let artist = match artists::find_by_name_nocase(conn, trimmed).await? {
            Some(existing) => existing,
            None => {
                let created = Artist::new(trimmed);
                artists::insert(conn, &created).await?;
                tracing::debug!(artist = %created.name, "Created artist");
                created
            }
        };

        seen.insert(key, artist.clone());
        resolved.push(artist);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        waxline_common::db::init_schema(&pool)
            .await
            .expect("schema init");
        pool
    }

    #[tokio::test]
    async fn case_variants_resolve_to_one_artist() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let names = vec![
            "Jane Doe".to_string(),
            "jane doe".to_string(),
            "JANE DOE".to_string(),
        ];
        let resolved = find_or_create_artists(&mut conn, &names).await.unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].id, resolved[1].id);
        assert_eq!(resolved[1].id, resolved[2].id);
        // First sighting's casing is canonical
        assert_eq!(resolved[0].name, "Jane Doe");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn existing_artist_is_reused_across_calls() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = find_or_create_artists(&mut conn, &["The Echoes".to_string()])
            .await
            .unwrap();
        let second = find_or_create_artists(&mut conn, &["the echoes".to_string()])
            .await
            .unwrap();
        assert_eq!(first[0].id, second[0].id);
    }

    #[tokio::test]
    async fn input_order_is_preserved() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let names = vec!["Beta".to_string(), "Alpha".to_string(), "beta".to_string()];
        let resolved = find_or_create_artists(&mut conn, &names).await.unwrap();
        assert_eq!(resolved[0].name, "Beta");
        assert_eq!(resolved[1].name, "Alpha");
        assert_eq!(resolved[2].id, resolved[0].id);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let err = find_or_create_artists(&mut conn, &["   ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::EmptyName));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn names_are_trimmed_on_create() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let resolved = find_or_create_artists(&mut conn, &["  Jane Doe  ".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved[0].name, "Jane Doe");
    }
}
