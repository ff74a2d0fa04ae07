//! Import workflow API handlers
//!
//! POST /import/start, GET /import/status, POST /import/cancel,
//! POST /import/reprocess

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::import::mapping::{MappingConfig, RawRow};
use crate::import::orchestrator::{compute_source_hash, ImportOrchestrator, ReprocessSummary};
use crate::models::{IdempotencePolicy, ImportProgress, ImportSession, ImportState, RowFailure};
use crate::AppState;

/// POST /import/start request
#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub source_name: String,
    pub rows: Vec<RawRow>,
    #[serde(default)]
    pub mapping: Option<MappingConfig>,
    #[serde(default)]
    pub policy: Option<IdempotencePolicy>,
}

/// POST /import/start response
#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub session_id: Uuid,
    pub state: ImportState,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// True when the idempotence guard matched a prior session; no new
    /// work was started and `session_id` names the prior session
    pub duplicate: bool,
}

/// GET /import/status response
#[derive(Debug, Serialize)]
pub struct ImportStatusResponse {
    pub session_id: Uuid,
    pub state: ImportState,
    pub progress: ImportProgress,
    pub current_operation: String,
    pub errors: Vec<RowFailure>,
    pub failed_rows_queued: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_seconds: u64,
    pub estimated_remaining_seconds: Option<u64>,
}

/// POST /import/cancel request
#[derive(Debug, Default, Deserialize)]
pub struct CancelImportRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /import/cancel response
#[derive(Debug, Serialize)]
pub struct CancelImportResponse {
    pub session_id: Uuid,
    pub state: ImportState,
    pub rows_processed: usize,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

/// POST /import/start
///
/// Begin an import session over rows already parsed by the caller.
/// Returns 202 Accepted with the session id; the orchestrator runs in a
/// background task. A source-hash match against a prior session short
/// circuits with `duplicate: true` instead of re-importing.
pub async fn start_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartImportRequest>,
) -> ApiResult<(StatusCode, Json<StartImportResponse>)> {
    require_admin(&headers)?;

    if request.source_name.trim().is_empty() {
        return Err(ApiError::BadRequest("source_name is required".to_string()));
    }
    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("rows must not be empty".to_string()));
    }

    // One import at a time
    if crate::db::sessions::has_running_session(&state.db).await? {
        return Err(ApiError::Conflict(
            "Import session already running".to_string(),
        ));
    }

    let mapping = request.mapping.unwrap_or_default();
    let policy = match request.policy {
        Some(policy) => policy,
        None => crate::db::settings::get_default_idempotence_policy(&state.db).await?,
    };
    let source_hash = compute_source_hash(&request.source_name, &request.rows);

    let orchestrator = ImportOrchestrator::new(
        state.db.clone(),
        state.event_bus.clone(),
        mapping.clone(),
        policy,
    );

    // Idempotence guard: an unchanged source maps to a prior session
    if let Some((prior_id, prior_state)) = orchestrator.check_duplicate(&source_hash).await? {
        if prior_state == ImportState::InProgress {
            return Err(ApiError::Conflict(format!(
                "Import of this source is already running: {}",
                prior_id
            )));
        }
        let prior = crate::db::sessions::load_session(&state.db, prior_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Prior session disappeared".to_string()))?;
        tracing::info!(
            session_id = %prior_id,
            source_name = %request.source_name,
            "Re-import matched prior session, skipping"
        );
        return Ok((
            StatusCode::OK,
            Json(StartImportResponse {
                session_id: prior_id,
                state: prior.state,
                started_at: prior.started_at,
                duplicate: true,
            }),
        ));
    }

    let session = ImportSession::new(request.source_name.clone(), source_hash, mapping);
    let session_id = session.session_id;
    crate::db::sessions::save_session(&state.db, &session).await?;

    let token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session_id, token.clone());

    tracing::info!(
        session_id = %session_id,
        source_name = %request.source_name,
        total_rows = request.rows.len(),
        "Import session started"
    );

    let response = StartImportResponse {
        session_id,
        state: session.state,
        started_at: session.started_at,
        duplicate: false,
    };

    let task_state = state.clone();
    let rows = request.rows;
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run(session, rows, token).await {
            tracing::error!(session_id = %session_id, error = %e, "Import task failed");
            *task_state.last_error.write().await = Some(e.to_string());
            mark_session_failed(&task_state, session_id, &e).await;
        }
        task_state
            .cancellation_tokens
            .write()
            .await
            .remove(&session_id);
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Mark a session failed after an orchestration-level error, falling back
/// to a direct update if the session cannot be loaded
async fn mark_session_failed(state: &AppState, session_id: Uuid, error: &waxline_common::Error) {
    match crate::db::sessions::load_session(&state.db, session_id).await {
        Ok(Some(mut session)) => {
            session.transition_to(ImportState::Failed);
            session.progress.current_operation = format!("Import failed: {}", error);
            if let Err(e) = crate::db::sessions::save_session(&state.db, &session).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to persist failure state");
            }
            state
                .event_bus
                .publish(waxline_common::events::CatalogEvent::ImportSessionFailed {
                    session_id,
                    error: error.to_string(),
                    timestamp: chrono::Utc::now(),
                });
        }
        _ => {
            let _ = sqlx::query(
                r#"UPDATE import_sessions
                   SET state = 'failed', ended_at = ?, current_operation = ?
                   WHERE session_id = ?"#,
            )
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(format!("Import failed: {}", error))
            .bind(session_id.to_string())
            .execute(&state.db)
            .await;
        }
    }
}

/// GET /import/status/{session_id}
pub async fn get_import_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ImportStatusResponse>> {
    require_admin(&headers)?;

    let session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import session not found: {}", session_id)))?;

    let failed_rows_queued = crate::db::sessions::count_failed_rows(&state.db, session_id).await?;

    Ok(Json(ImportStatusResponse {
        session_id: session.session_id,
        state: session.state,
        current_operation: session.progress.current_operation.clone(),
        errors: session.errors.clone(),
        failed_rows_queued,
        started_at: session.started_at,
        elapsed_seconds: session.progress.elapsed_seconds,
        estimated_remaining_seconds: session.progress.estimated_remaining_seconds,
        progress: session.progress,
    }))
}

/// POST /import/cancel/{session_id}
///
/// Request cooperative cancellation. The running task observes the token
/// between rows; already-committed rows stay committed.
pub async fn cancel_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
    body: Option<Json<CancelImportRequest>>,
) -> ApiResult<Json<CancelImportResponse>> {
    require_admin(&headers)?;
    let reason = body
        .and_then(|Json(r)| r.reason)
        .unwrap_or_else(|| "Cancelled by operator".to_string());

    let mut session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import session not found: {}", session_id)))?;

    if session.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Import session already in terminal state: {}",
            session.state.as_str()
        )));
    }

    if let Some(token) = state.cancellation_tokens.read().await.get(&session_id) {
        token.cancel();
    }

    session.transition_to(ImportState::Cancelled);
    session.progress.current_operation = reason;
    crate::db::sessions::save_session(&state.db, &session).await?;

    tracing::info!(session_id = %session_id, "Import session cancelled");

    Ok(Json(CancelImportResponse {
        session_id: session.session_id,
        state: session.state,
        rows_processed: session.progress.rows_processed,
        cancelled_at: session.ended_at.unwrap_or_else(chrono::Utc::now),
    }))
}

/// POST /import/reprocess/{session_id}
///
/// Re-run the session's failed-rows queue, typically after fixing source
/// data problems (e.g. creating a missing artist).
pub async fn reprocess_failed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ReprocessSummary>> {
    require_admin(&headers)?;

    let session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import session not found: {}", session_id)))?;

    if !session.is_terminal() {
        return Err(ApiError::Conflict(
            "Session is still running; wait for it to finish".to_string(),
        ));
    }

    let orchestrator = ImportOrchestrator::new(
        state.db.clone(),
        state.event_bus.clone(),
        session.mapping.clone(),
        IdempotencePolicy::default(),
    );
    let summary = orchestrator.reprocess_failed(session_id).await?;
    Ok(Json(summary))
}

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import/start", post(start_import))
        .route("/import/status/:session_id", get(get_import_status))
        .route("/import/cancel/:session_id", post(cancel_import))
        .route("/import/reprocess/:session_id", post(reprocess_failed))
}
