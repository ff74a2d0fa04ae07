//! End-to-end import pipeline tests against an in-memory database

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use waxline_common::events::EventBus;
use waxline_import::db::sessions;
use waxline_import::import::mapping::{MappingConfig, RawRow};
use waxline_import::import::orchestrator::{compute_source_hash, ImportOrchestrator};
use waxline_import::models::{IdempotencePolicy, ImportSession, ImportState};

async fn pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    waxline_common::db::init_schema(&pool)
        .await
        .expect("schema init");
    pool
}

fn orchestrator(pool: &SqlitePool) -> ImportOrchestrator {
    ImportOrchestrator::new(
        pool.clone(),
        EventBus::new(16),
        MappingConfig::default(),
        IdempotencePolicy::default(),
    )
}

fn row(pairs: &[(&str, &str)]) -> RawRow {
    RawRow::from_pairs(
        pairs
            .iter()
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect(),
    )
}

async fn run_import(
    pool: &SqlitePool,
    source_name: &str,
    rows: Vec<RawRow>,
) -> ImportSession {
    let orch = orchestrator(pool);
    let hash = compute_source_hash(source_name, &rows);
    let session = ImportSession::new(source_name.to_string(), hash, MappingConfig::default());
    orch.run(session, rows, CancellationToken::new())
        .await
        .expect("orchestrator run")
}

#[tokio::test]
async fn import_creates_full_catalog_graph() {
    let pool = pool().await;
    let rows = vec![
        row(&[
            ("Artist Name", "Jane Doe"),
            ("Album/Single Name", "Starlight"),
            ("Song 1", "Opening"),
            ("Song 2", "Closing"),
            ("YouTube Status", "uploaded"),
        ]),
        row(&[
            ("Artist Name", "The Echoes"),
            ("Album/Single Name", "Moonrise"),
            ("Song 1", "Moonrise"),
        ]),
    ];

    let session = run_import(&pool, "legacy.csv", rows).await;
    assert_eq!(session.state, ImportState::Completed);
    assert!(session.errors.is_empty());

    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 2);

    let artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(artists, 2);

    let track_numbers: Vec<i64> = sqlx::query_scalar(
        "SELECT t.track_number FROM tracks t \
         JOIN releases r ON t.release_id = r.id \
         WHERE r.title = 'Starlight' ORDER BY t.track_number",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(track_numbers, vec![1, 2]);

    let requests: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM platform_requests")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(requests, 1);

    let primary_joins: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM release_artists WHERE is_primary = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(primary_joins, 2);
}

#[tokio::test]
async fn row_failure_rolls_back_only_that_row() {
    let pool = pool().await;
    let mut rows: Vec<RawRow> = (1..=4)
        .map(|i| {
            row(&[
                ("Artist Name", "Jane Doe"),
                ("Album/Single Name", &format!("Release {}", i)),
                ("Song 1", "Track"),
            ])
        })
        .collect();
    // No artist anywhere in this row
    rows.insert(2, row(&[("Album/Single Name", "Orphan"), ("Song 1", "Lost")]));

    let session = run_import(&pool, "mixed.csv", rows).await;
    assert_eq!(session.state, ImportState::Completed);
    assert_eq!(session.errors.len(), 1);
    assert_eq!(session.errors[0].row_index, 2);

    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 4);

    let queued = sessions::count_failed_rows(&pool, session.session_id)
        .await
        .unwrap();
    assert_eq!(queued, 1);
}

#[tokio::test]
async fn reprocess_removes_only_rows_that_now_succeed() {
    let pool = pool().await;
    let missing_artist_id = Uuid::new_v4();
    let rows = vec![
        // Fails until the referenced artist exists
        row(&[
            ("Artist ID", &missing_artist_id.to_string()),
            ("Album/Single Name", "Starlight"),
            ("Song 1", "Opening"),
        ]),
        // Never succeeds: no artist information at all
        row(&[("Album/Single Name", "Orphan"), ("Song 1", "Lost")]),
    ];

    let session = run_import(&pool, "broken.csv", rows).await;
    assert_eq!(
        sessions::count_failed_rows(&pool, session.session_id)
            .await
            .unwrap(),
        2
    );

    sqlx::query("INSERT INTO artists (id, name) VALUES (?, 'Jane Doe')")
        .bind(missing_artist_id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let orch = orchestrator(&pool);
    let summary = orch.reprocess_failed(session.session_id).await.unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.reprocessed, 1);
    assert_eq!(summary.still_failing, 1);

    assert_eq!(
        sessions::count_failed_rows(&pool, session.session_id)
            .await
            .unwrap(),
        1
    );
    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 1);

    // Re-running changes nothing further
    let again = orch.reprocess_failed(session.session_id).await.unwrap();
    assert_eq!(again.reprocessed, 0);
    assert_eq!(again.still_failing, 1);
}

#[tokio::test]
async fn unchanged_source_matches_prior_session() {
    let pool = pool().await;
    let rows = vec![row(&[
        ("Artist Name", "Jane Doe"),
        ("Album/Single Name", "Starlight"),
        ("Song 1", "Opening"),
    ])];
    let hash = compute_source_hash("legacy.csv", &rows);

    let session = run_import(&pool, "legacy.csv", rows).await;
    assert_eq!(session.state, ImportState::Completed);

    let orch = orchestrator(&pool);
    let blocking = orch.check_duplicate(&hash).await.unwrap();
    assert_eq!(blocking, Some((session.session_id, ImportState::Completed)));

    let other = compute_source_hash("legacy-v2.csv", &[]);
    assert!(orch.check_duplicate(&other).await.unwrap().is_none());
}

#[tokio::test]
async fn cancellation_stops_before_next_row() {
    let pool = pool().await;
    let rows = vec![
        row(&[
            ("Artist Name", "Jane Doe"),
            ("Album/Single Name", "Starlight"),
            ("Song 1", "Opening"),
        ]),
        row(&[
            ("Artist Name", "Jane Doe"),
            ("Album/Single Name", "Moonrise"),
            ("Song 1", "Moonrise"),
        ]),
    ];

    let orch = orchestrator(&pool);
    let hash = compute_source_hash("cancelled.csv", &rows);
    let session = ImportSession::new("cancelled.csv".to_string(), hash, MappingConfig::default());
    let token = CancellationToken::new();
    token.cancel();

    let result = orch.run(session, rows, token).await.unwrap();
    assert_eq!(result.state, ImportState::Cancelled);

    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 0);

    let stored = sessions::load_session(&pool, result.session_id)
        .await
        .unwrap()
        .expect("session persisted");
    assert_eq!(stored.state, ImportState::Cancelled);
}

#[tokio::test]
async fn single_track_forces_single_release_type() {
    let pool = pool().await;
    let rows = vec![row(&[
        ("Artist Name", "Jane Doe"),
        ("Album/Single Name", "One Song"),
        ("Release Type", "ALBUM"),
        ("Song 1", "Only"),
    ])];

    run_import(&pool, "typed.csv", rows).await;

    let release_type: String = sqlx::query_scalar("SELECT release_type FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(release_type, "single");
}
