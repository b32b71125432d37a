//! Pipeline API Handlers
//!
//! Status API and the run updates the engine pushes while it works.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use strata_core::domain::pipeline::PipelineRun;
use strata_core::dto::pipeline::{OpenRun, RunUpdate};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::tenant::Tenant;
use crate::service::{rollback_service, run_service};

/// GET /api/services/{name}/pipeline
/// Latest run: stage, status, progress and logs
pub async fn latest_run(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<Json<PipelineRun>> {
    let run = run_service::latest_run(&state.pool, &tenant, &name).await?;
    Ok(Json(run))
}

/// POST /api/services/{name}/pipeline
/// Open a run; 409 while another run of the service is active
pub async fn open_run(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
    Json(req): Json<OpenRun>,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    let run = run_service::open_run(&state.pool, &tenant, &name, req.kind).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// PUT /api/pipelines/{id}
/// Apply a progress update; 409 once the run is finished
pub async fn update_run(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<Uuid>,
    Json(update): Json<RunUpdate>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Updating run {}: {:?}", id, update.status);

    let run = run_service::update_run(&state.pool, &tenant, id, update).await?;
    Ok(Json(run))
}

/// POST /api/services/{name}/rollback
/// Open a rollback run and revert the deployment in the background
pub async fn request_rollback(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    tracing::info!("Rollback requested for {}", name);

    let run = rollback_service::request_rollback(
        &state.pool,
        state.cluster.clone(),
        state.rollback.clone(),
        tenant,
        &name,
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}
