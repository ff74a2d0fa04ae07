//! Repair pass endpoints

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::Deserialize;

use crate::auth::require_admin;
use crate::error::ApiResult;
use crate::import::mapping::MappingConfig;
use crate::repair::employees::EmployeeRepair;
use crate::repair::titles::TitleRepair;
use crate::repair::RepairReport;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RepairRequest {
    #[serde(default)]
    pub dry_run: bool,
    /// Title repair only: override the fallback-column mapping
    #[serde(default)]
    pub mapping: Option<MappingConfig>,
}

/// POST /repair/titles
pub async fn repair_titles(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RepairRequest>>,
) -> ApiResult<Json<RepairReport>> {
    require_admin(&headers)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let repair = TitleRepair::new(state.db.clone(), request.mapping.unwrap_or_default());
    let report = repair.run(request.dry_run).await?;
    publish_report(&state, "titles", &report);
    Ok(Json(report))
}

/// POST /repair/employees
pub async fn repair_employees(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RepairRequest>>,
) -> ApiResult<Json<RepairReport>> {
    require_admin(&headers)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let repair = EmployeeRepair::new(state.db.clone());
    let report = repair.run(request.dry_run).await?;
    publish_report(&state, "employees", &report);
    Ok(Json(report))
}

fn publish_report(state: &AppState, tool: &str, report: &RepairReport) {
    state
        .event_bus
        .publish(waxline_common::events::CatalogEvent::RepairCompleted {
            tool: tool.to_string(),
            scanned: report.scanned,
            fixed: report.fixed,
            dry_run: report.dry_run,
            timestamp: chrono::Utc::now(),
        });
}

pub fn repair_routes() -> Router<AppState> {
    Router::new()
        .route("/repair/titles", post(repair_titles))
        .route("/repair/employees", post(repair_employees))
}
