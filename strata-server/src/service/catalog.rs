//! Catalog Service
//!
//! Registration and lifecycle of service records.

use chrono::Utc;
use strata_core::domain::service::{ServiceDescriptor, ServiceStatus, validate_service_name};
use strata_core::dto::service::{RegisterService, UpdateService};
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Result, StoreError, conflict_on_duplicate};
use crate::repository::service_repository;

/// Register a service; the name must be free in the partition
pub async fn register_service(
    pool: &PgPool,
    tenant: &TenantKey,
    req: RegisterService,
) -> Result<ServiceDescriptor> {
    validate_registration(&req)?;

    let now = Utc::now();
    let service = ServiceDescriptor {
        id: Uuid::new_v4(),
        name: req.name,
        kind: req.kind,
        description: req.description,
        developer: req.developer,
        image: req.image,
        source_url: req.source_url,
        url: None,
        status: ServiceStatus::Registered,
        created_at: now,
        updated_at: now,
    };

    service_repository::insert(pool, tenant, &service)
        .await
        .map_err(|e| conflict_on_duplicate(e, || format!("Service {} already exists", service.name)))?;

    tracing::info!("Service registered: {} ({})", service.name, service.kind);
    Ok(service)
}

pub async fn get_service(pool: &PgPool, tenant: &TenantKey, name: &str) -> Result<ServiceDescriptor> {
    service_repository::find_by_name(pool, tenant, name)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Service {} not found", name)))
}

pub async fn list_services(
    pool: &PgPool,
    tenant: &TenantKey,
    developer: Option<&str>,
) -> Result<Vec<ServiceDescriptor>> {
    Ok(service_repository::list(pool, tenant, developer).await?)
}

/// Apply a partial update, refusing status moves the lifecycle does not allow
pub async fn update_service(
    pool: &PgPool,
    tenant: &TenantKey,
    name: &str,
    req: UpdateService,
) -> Result<ServiceDescriptor> {
    let mut service = get_service(pool, tenant, name).await?;
    apply_update(&mut service, req)?;

    if !service_repository::update(pool, tenant, &service).await? {
        return Err(StoreError::NotFound(format!("Service {} not found", name)));
    }

    tracing::debug!("Service {} updated (status {})", service.name, service.status);
    Ok(service)
}

/// Delete a record and its pipeline runs
pub async fn delete_service(pool: &PgPool, tenant: &TenantKey, name: &str) -> Result<()> {
    if !service_repository::delete(pool, tenant, name).await? {
        return Err(StoreError::NotFound(format!("Service {} not found", name)));
    }

    tracing::info!("Service deleted: {}", name);
    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_registration(req: &RegisterService) -> Result<()> {
    validate_service_name(&req.name).map_err(StoreError::Validation)?;

    if req.description.trim().is_empty() {
        return Err(StoreError::Validation(
            "Service description cannot be empty".to_string(),
        ));
    }

    if req.developer.trim().is_empty() {
        return Err(StoreError::Validation(
            "Service owner cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn apply_update(service: &mut ServiceDescriptor, req: UpdateService) -> Result<()> {
    if let Some(next) = req.status {
        if !service.status.can_transition_to(next) {
            return Err(StoreError::Conflict(format!(
                "Service {} cannot move from {} to {}",
                service.name, service.status, next
            )));
        }
        service.status = next;
    }

    if req.image.is_some() {
        service.image = req.image;
    }
    if req.source_url.is_some() {
        service.source_url = req.source_url;
    }
    if req.url.is_some() {
        service.url = req.url;
    }

    service.updated_at = Utc::now();
    Ok(())
}
