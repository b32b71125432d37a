//! Pipeline Run Repository

use strata_core::domain::pipeline::{PipelineRun, RunKind, RunStatus, Stage};
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::decode_column;

const COLUMNS: &str = "id, service_name, kind, stage, status, progress, logs, created_at, updated_at";

/// Insert a new run
///
/// Fails with a unique violation while another run for the same service
/// is still pending or running.
pub async fn insert(pool: &PgPool, tenant: &TenantKey, run: &PipelineRun) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_runs (
            id, tenant_key, service_name, kind, stage, status,
            progress, logs, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(run.id)
    .bind(tenant.as_str())
    .bind(&run.service_name)
    .bind(run.kind.as_str())
    .bind(run.stage.as_str())
    .bind(run.status.as_str())
    .bind(i16::from(run.progress))
    .bind(&run.logs)
    .bind(run.created_at)
    .bind(run.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant: &TenantKey,
    id: Uuid,
) -> Result<Option<PipelineRun>, sqlx::Error> {
    let row = sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {} FROM pipeline_runs WHERE tenant_key = $1 AND id = $2",
        COLUMNS
    ))
    .bind(tenant.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Most recently opened run of a service
pub async fn find_latest(
    pool: &PgPool,
    tenant: &TenantKey,
    service_name: &str,
) -> Result<Option<PipelineRun>, sqlx::Error> {
    let row = sqlx::query_as::<_, RunRow>(&format!(
        r#"
        SELECT {}
        FROM pipeline_runs
        WHERE tenant_key = $1 AND service_name = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        COLUMNS
    ))
    .bind(tenant.as_str())
    .bind(service_name)
    .fetch_optional(pool)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Persist stage, status, progress and logs of a run
pub async fn save(pool: &PgPool, tenant: &TenantKey, run: &PipelineRun) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_runs
        SET stage = $1, status = $2, progress = $3, logs = $4, updated_at = $5
        WHERE tenant_key = $6 AND id = $7
        "#,
    )
    .bind(run.stage.as_str())
    .bind(run.status.as_str())
    .bind(i16::from(run.progress))
    .bind(&run.logs)
    .bind(run.updated_at)
    .bind(tenant.as_str())
    .bind(run.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    service_name: String,
    kind: String,
    stage: String,
    status: String,
    progress: i16,
    logs: Vec<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<RunRow> for PipelineRun {
    type Error = sqlx::Error;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(PipelineRun {
            id: row.id,
            kind: decode_column::<RunKind>("kind", &row.kind)?,
            stage: decode_column::<Stage>("stage", &row.stage)?,
            status: decode_column::<RunStatus>("status", &row.status)?,
            progress: row.progress.clamp(0, 100) as u8,
            service_name: row.service_name,
            logs: row.logs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
