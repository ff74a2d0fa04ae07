//! Import session persistence and the failed-rows retry queue

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use waxline_common::{Error, Result};

use crate::import::mapping::RawRow;
use crate::models::{IdempotencePolicy, ImportProgress, ImportSession, ImportState, RowFailure};

/// Save (upsert) an import session
pub async fn save_session(pool: &SqlitePool, session: &ImportSession) -> Result<()> {
    let mapping = serde_json::to_string(&session.mapping)
        .map_err(|e| Error::Internal(format!("Failed to serialize mapping: {}", e)))?;
    let errors = serde_json::to_string(&session.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO import_sessions (
            session_id, state, source_name, source_hash, mapping,
            rows_processed, total_rows, percentage, current_operation,
            errors, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            state = excluded.state,
            rows_processed = excluded.rows_processed,
            total_rows = excluded.total_rows,
            percentage = excluded.percentage,
            current_operation = excluded.current_operation,
            errors = excluded.errors,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(session.session_id.to_string())
    .bind(session.state.as_str())
    .bind(&session.source_name)
    .bind(&session.source_hash)
    .bind(&mapping)
    .bind(session.progress.rows_processed as i64)
    .bind(session.progress.total_rows as i64)
    .bind(session.progress.percentage)
    .bind(&session.progress.current_operation)
    .bind(&errors)
    .bind(session.started_at.to_rfc3339())
    .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an import session by id
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<ImportSession>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, state, source_name, source_hash, mapping,
               rows_processed, total_rows, percentage, current_operation,
               errors, started_at, ended_at
        FROM import_sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let state_str: String = row.get("state");
    let state = ImportState::parse(&state_str)
        .ok_or_else(|| Error::Internal(format!("Unknown session state: {}", state_str)))?;

    let mapping: String = row.get("mapping");
    let mapping = serde_json::from_str(&mapping)
        .map_err(|e| Error::Internal(format!("Failed to deserialize mapping: {}", e)))?;

    let errors: String = row.get("errors");
    let errors: Vec<RowFailure> = serde_json::from_str(&errors)
        .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&Utc));

    let elapsed_seconds = match ended_at {
        Some(end) => (end - started_at).num_seconds().max(0) as u64,
        None => (Utc::now() - started_at).num_seconds().max(0) as u64,
    };

    let progress = ImportProgress {
        rows_processed: row.get::<i64, _>("rows_processed") as usize,
        total_rows: row.get::<i64, _>("total_rows") as usize,
        percentage: row.get("percentage"),
        rows_per_second: 0.0, // recalculated while the session runs
        elapsed_seconds,
        estimated_remaining_seconds: None,
        current_operation: row.get("current_operation"),
    };

    Ok(Some(ImportSession {
        session_id,
        state,
        source_name: row.get("source_name"),
        source_hash: row.get("source_hash"),
        mapping,
        progress,
        errors,
        started_at,
        ended_at,
    }))
}

/// True if any session is currently `in_progress`
pub async fn has_running_session(pool: &SqlitePool) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM import_sessions WHERE state = 'in_progress'")
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Idempotence guard: find a prior session with the same source hash that
/// blocks a re-import under the given policy.
///
/// An `in_progress` session with the hash always blocks (at most one may
/// run per hash); terminal sessions block according to policy. Best-effort
/// check, not serialized against concurrent imports.
pub async fn find_blocking_session(
    pool: &SqlitePool,
    source_hash: &str,
    policy: IdempotencePolicy,
) -> Result<Option<(Uuid, ImportState)>> {
    let states: &[&str] = match policy {
        IdempotencePolicy::CompletedOnly => &["in_progress", "completed"],
        IdempotencePolicy::AnyTerminal => &["in_progress", "completed", "failed", "cancelled"],
    };
    let placeholders = vec!["?"; states.len()].join(", ");
    let sql = format!(
        "SELECT session_id, state FROM import_sessions \
         WHERE source_hash = ? AND state IN ({}) \
         ORDER BY started_at DESC LIMIT 1",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(source_hash);
    for state in states {
        query = query.bind(*state);
    }
    let row = query.fetch_optional(pool).await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let id_str: String = row.get("session_id");
    let session_id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))?;
    let state_str: String = row.get("state");
    let state = ImportState::parse(&state_str)
        .ok_or_else(|| Error::Internal(format!("Unknown session state: {}", state_str)))?;
    Ok(Some((session_id, state)))
}

/// Cleanup stale import sessions on startup
///
/// Any session still `in_progress` when the service starts is from a
/// previous run and will never advance; mark it cancelled.
pub async fn cleanup_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE import_sessions
        SET state = 'cancelled',
            ended_at = ?,
            current_operation = 'Import cancelled - service was restarted'
        WHERE state = 'in_progress'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() as usize)
}

// ========================================
// Failed-rows queue
// ========================================

/// One entry in a session's failed-rows queue
#[derive(Debug, Clone)]
pub struct FailedRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub row_index: usize,
    pub row: RawRow,
    pub error: String,
}

/// Append a failed row to the session's retry queue
pub async fn queue_failed_row(
    pool: &SqlitePool,
    session_id: Uuid,
    row_index: usize,
    row: &RawRow,
    error: &str,
) -> Result<()> {
    let row_json = serde_json::to_string(row)
        .map_err(|e| Error::Internal(format!("Failed to serialize row: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO import_failed_rows (id, session_id, row_index, row_json, error, failed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(row_index as i64)
    .bind(&row_json)
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a session's failed rows, in original row order
pub async fn load_failed_rows(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<FailedRow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, row_index, row_json, error
        FROM import_failed_rows
        WHERE session_id = ?
        ORDER BY row_index
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut failed = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| Error::Internal(format!("Failed to parse failed-row id: {}", e)))?;
        let row_json: String = row.get("row_json");
        let raw_row = serde_json::from_str(&row_json)
            .map_err(|e| Error::Internal(format!("Failed to deserialize row: {}", e)))?;
        failed.push(FailedRow {
            id,
            session_id,
            row_index: row.get::<i64, _>("row_index") as usize,
            row: raw_row,
            error: row.get("error"),
        });
    }
    Ok(failed)
}

/// Remove a queue entry after its row was successfully reprocessed
pub async fn delete_failed_row(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_failed_rows WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Update the recorded error for a row that failed again
pub async fn update_failed_row_error(pool: &SqlitePool, id: Uuid, error: &str) -> Result<()> {
    sqlx::query("UPDATE import_failed_rows SET error = ?, failed_at = ? WHERE id = ?")
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Number of rows still queued for a session
pub async fn count_failed_rows(pool: &SqlitePool, session_id: Uuid) -> Result<usize> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM import_failed_rows WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}
