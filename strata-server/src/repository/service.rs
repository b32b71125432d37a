//! Service Repository
//!
//! Handles database operations for service records.

use strata_core::domain::service::{ServiceDescriptor, ServiceKind, ServiceStatus};
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::decode_column;

const COLUMNS: &str = "id, name, kind, description, developer, image, source_url, url, status, \
                       created_at, updated_at";

/// Insert a new service record
///
/// A name already taken in the partition surfaces as a unique violation.
pub async fn insert(
    pool: &PgPool,
    tenant: &TenantKey,
    service: &ServiceDescriptor,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO services (
            id, tenant_key, name, kind, description, developer,
            image, source_url, url, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(service.id)
    .bind(tenant.as_str())
    .bind(&service.name)
    .bind(service.kind.as_str())
    .bind(&service.description)
    .bind(&service.developer)
    .bind(&service.image)
    .bind(&service.source_url)
    .bind(&service.url)
    .bind(service.status.as_str())
    .bind(service.created_at)
    .bind(service.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_name(
    pool: &PgPool,
    tenant: &TenantKey,
    name: &str,
) -> Result<Option<ServiceDescriptor>, sqlx::Error> {
    let row = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {} FROM services WHERE tenant_key = $1 AND name = $2",
        COLUMNS
    ))
    .bind(tenant.as_str())
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// List services in the partition, optionally only one developer's
pub async fn list(
    pool: &PgPool,
    tenant: &TenantKey,
    developer: Option<&str>,
) -> Result<Vec<ServiceDescriptor>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ServiceRow>(&format!(
        r#"
        SELECT {}
        FROM services
        WHERE tenant_key = $1 AND ($2::TEXT IS NULL OR developer = $2::TEXT)
        ORDER BY name
        "#,
        COLUMNS
    ))
    .bind(tenant.as_str())
    .bind(developer)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Overwrite the mutable fields of a record
pub async fn update(
    pool: &PgPool,
    tenant: &TenantKey,
    service: &ServiceDescriptor,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET image = $1, source_url = $2, url = $3, status = $4, updated_at = $5
        WHERE tenant_key = $6 AND name = $7
        "#,
    )
    .bind(&service.image)
    .bind(&service.source_url)
    .bind(&service.url)
    .bind(service.status.as_str())
    .bind(service.updated_at)
    .bind(tenant.as_str())
    .bind(&service.name)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a record together with all of its pipeline runs
pub async fn delete(pool: &PgPool, tenant: &TenantKey, name: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM pipeline_runs WHERE tenant_key = $1 AND service_name = $2")
        .bind(tenant.as_str())
        .bind(name)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM services WHERE tenant_key = $1 AND name = $2")
        .bind(tenant.as_str())
        .bind(name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    name: String,
    kind: String,
    description: String,
    developer: String,
    image: Option<String>,
    source_url: Option<String>,
    url: Option<String>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ServiceRow> for ServiceDescriptor {
    type Error = sqlx::Error;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(ServiceDescriptor {
            id: row.id,
            kind: decode_column::<ServiceKind>("kind", &row.kind)?,
            status: decode_column::<ServiceStatus>("status", &row.status)?,
            name: row.name,
            description: row.description,
            developer: row.developer,
            image: row.image,
            source_url: row.source_url,
            url: row.url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
