//! Artist merge endpoint

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::require_admin;
use crate::db::artists::{merge_artists, MergeError, MergeOptions, MergeSummary};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /artists/merge request
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    /// Artist to be absorbed and deleted
    pub source_id: Uuid,
    /// Artist that receives the source's catalog
    pub target_id: Uuid,
    #[serde(default)]
    pub primary_override: Option<bool>,
    /// Optional extra artist credited as secondary on affected tracks
    #[serde(default)]
    pub secondary_artist_id: Option<Uuid>,
}

/// POST /artists/merge
pub async fn merge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<MergeSummary>> {
    require_admin(&headers)?;

    let options = MergeOptions {
        primary_override: request.primary_override,
        secondary_artist_id: request.secondary_artist_id,
    };

    let summary = merge_artists(&state.db, request.source_id, request.target_id, options)
        .await
        .map_err(|e| match e {
            MergeError::SameArtist => {
                ApiError::BadRequest("source and target are the same artist".to_string())
            }
            MergeError::NotFound(id) => ApiError::NotFound(format!("Artist not found: {}", id)),
            MergeError::Database(err) => ApiError::Internal(format!("Merge failed: {}", err)),
        })?;

    state
        .event_bus
        .publish(waxline_common::events::CatalogEvent::ArtistsMerged {
            source_id: request.source_id,
            target_id: request.target_id,
            releases_moved: summary.releases_moved,
            timestamp: chrono::Utc::now(),
        });
    tracing::info!(
        source_id = %request.source_id,
        target_id = %request.target_id,
        releases_moved = summary.releases_moved,
        "Artists merged"
    );

    Ok(Json(summary))
}

pub fn artist_routes() -> Router<AppState> {
    Router::new().route("/artists/merge", post(merge))
}
