//! Developer API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use strata_core::domain::developer::Developer;
use strata_core::dto::developer::CreateDeveloper;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::tenant::Tenant;
use crate::service::developer_service;

/// POST /api/developers
pub async fn create_developer(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(req): Json<CreateDeveloper>,
) -> ApiResult<(StatusCode, Json<Developer>)> {
    tracing::info!("Registering developer: {}", req.name);

    let developer = developer_service::create_developer(&state.pool, &tenant, req).await?;
    Ok((StatusCode::CREATED, Json(developer)))
}

/// GET /api/developers
pub async fn list_developers(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> ApiResult<Json<Vec<Developer>>> {
    let developers = developer_service::list_developers(&state.pool, &tenant).await?;
    Ok(Json(developers))
}

/// GET /api/developers/{id}
pub async fn get_developer(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Developer>> {
    let developer = developer_service::get_developer(&state.pool, &tenant, id).await?;
    Ok(Json(developer))
}
