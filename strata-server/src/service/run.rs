//! Pipeline Run Service
//!
//! Opening runs, recording engine progress and answering status queries.

use strata_core::domain::pipeline::{PipelineRun, RunKind};
use strata_core::domain::service::validate_service_name;
use strata_core::dto::pipeline::RunUpdate;
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Result, StoreError, conflict_on_duplicate};
use crate::repository::run_repository;

/// Open a run for a service name
///
/// The record may not exist yet: a create run is opened before the service
/// is registered. Rejected with a conflict while another run of the same
/// name is active.
pub async fn open_run(
    pool: &PgPool,
    tenant: &TenantKey,
    service_name: &str,
    kind: RunKind,
) -> Result<PipelineRun> {
    validate_service_name(service_name).map_err(StoreError::Validation)?;

    let run = PipelineRun::new(service_name, kind);
    run_repository::insert(pool, tenant, &run)
        .await
        .map_err(|e| {
            conflict_on_duplicate(e, || {
                format!("Service {} already has an active pipeline run", service_name)
            })
        })?;

    tracing::info!("Opened {} run {} for {}", kind.as_str(), run.id, service_name);
    Ok(run)
}

pub async fn get_run(pool: &PgPool, tenant: &TenantKey, id: Uuid) -> Result<PipelineRun> {
    run_repository::find_by_id(pool, tenant, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Pipeline run {} not found", id)))
}

/// Latest run of a service, as shown by the status API
pub async fn latest_run(pool: &PgPool, tenant: &TenantKey, service_name: &str) -> Result<PipelineRun> {
    run_repository::find_latest(pool, tenant, service_name)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("No pipeline run for service {}", service_name)))
}

/// Apply an engine update to a run
///
/// Progress never decreases, stages never move backwards and a finished
/// run rejects further updates with a conflict.
pub async fn update_run(
    pool: &PgPool,
    tenant: &TenantKey,
    id: Uuid,
    update: RunUpdate,
) -> Result<PipelineRun> {
    let mut run = get_run(pool, tenant, id).await?;
    apply_update(&mut run, &update)?;
    save_run(pool, tenant, &run).await?;

    if run.is_terminal() {
        tracing::info!("Run {} for {} finished: {}", run.id, run.service_name, run.status);
    }
    Ok(run)
}

/// Persist a run the caller already moved forward
pub async fn save_run(pool: &PgPool, tenant: &TenantKey, run: &PipelineRun) -> Result<()> {
    if !run_repository::save(pool, tenant, run).await? {
        return Err(StoreError::NotFound(format!("Pipeline run {} not found", run.id)));
    }
    Ok(())
}

fn apply_update(run: &mut PipelineRun, update: &RunUpdate) -> Result<()> {
    run.apply(update)
        .map_err(|e| StoreError::Conflict(format!("Pipeline run {}: {}", run.id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::domain::pipeline::{RunStatus, Stage};

    #[test]
    fn test_update_clamps_progress() {
        let mut run = PipelineRun::new("orders", RunKind::Create);
        apply_update(&mut run, &RunUpdate::progress(Stage::BuildImage, 55, "building")).unwrap();

        let stale = RunUpdate::progress(Stage::BuildImage, 30, "late event");
        apply_update(&mut run, &stale).unwrap();

        assert_eq!(run.progress, 55);
        assert_eq!(run.logs, vec!["building", "late event"]);
    }

    #[test]
    fn test_update_rejects_backward_stage() {
        let mut run = PipelineRun::new("orders", RunKind::Create);
        apply_update(&mut run, &RunUpdate::progress(Stage::Register, 75, "registering")).unwrap();

        let result = apply_update(&mut run, &RunUpdate::progress(Stage::Scan, 10, "rescan"));
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_finished_run_is_conflict() {
        let mut run = PipelineRun::new("orders", RunKind::Deploy);
        apply_update(&mut run, &RunUpdate::finished(RunStatus::Success, "done")).unwrap();

        let result = apply_update(&mut run, &RunUpdate::finished(RunStatus::Failed, "again"));
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.progress, 100);
    }
}
