//! Service Record API Handlers
//!
//! Registration API: register, list, fetch, update and delete service records.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use strata_core::domain::service::ServiceDescriptor;
use strata_core::dto::service::{RegisterService, ServiceFilter, UpdateService};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::tenant::Tenant;
use crate::service::catalog_service;

/// POST /api/services
/// Register a service; 409 when the name is taken
pub async fn register_service(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(req): Json<RegisterService>,
) -> ApiResult<(StatusCode, Json<ServiceDescriptor>)> {
    tracing::info!("Registering service: {}", req.name);

    let service = catalog_service::register_service(&state.pool, &tenant, req).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// GET /api/services?developer=
pub async fn list_services(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(filter): Query<ServiceFilter>,
) -> ApiResult<Json<Vec<ServiceDescriptor>>> {
    tracing::debug!("Listing services (developer: {:?})", filter.developer);

    let services =
        catalog_service::list_services(&state.pool, &tenant, filter.developer.as_deref()).await?;
    Ok(Json(services))
}

/// GET /api/services/{name}
pub async fn get_service(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceDescriptor>> {
    let service = catalog_service::get_service(&state.pool, &tenant, &name).await?;
    Ok(Json(service))
}

/// PATCH /api/services/{name}
pub async fn update_service(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
    Json(req): Json<UpdateService>,
) -> ApiResult<Json<ServiceDescriptor>> {
    let service = catalog_service::update_service(&state.pool, &tenant, &name, req).await?;
    Ok(Json(service))
}

/// DELETE /api/services/{name}
/// Removes the record and all of its pipeline runs
pub async fn delete_service(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting service: {}", name);

    catalog_service::delete_service(&state.pool, &tenant, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
