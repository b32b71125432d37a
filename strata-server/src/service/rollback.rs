//! Rollback Service
//!
//! A rollback request opens a run and returns at once; a background worker
//! reverts the deployment and finishes the run. Clients follow it through
//! the status API.

use std::sync::Arc;
use std::time::Duration;

use strata_core::domain::pipeline::{
    PipelineRun, RunKind, RunStatus, Stage, StagePlan, TransitionError,
};
use strata_core::domain::service::ServiceStatus;
use strata_core::dto::service::UpdateService;
use strata_core::tenant::TenantKey;
use strata_engine::AdapterError;
use strata_engine::EngineSettings;
use strata_engine::cluster::Cluster;
use sqlx::PgPool;

use super::{Result, StoreError, catalog_service, run_service};

/// Where and how long the rollback worker operates
#[derive(Debug, Clone)]
pub struct RollbackTarget {
    /// Cluster to switch the kubectl context to; `None` keeps the current one
    pub cluster: Option<String>,
    pub region: String,
    pub timeout: Duration,
}

impl RollbackTarget {
    /// Read `STRATA_CLUSTER`, `STRATA_REGION` and `STRATA_ROLLOUT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineSettings::default();
        Self {
            cluster: lookup("STRATA_CLUSTER").filter(|c| !c.trim().is_empty()),
            region: lookup("STRATA_REGION").unwrap_or(defaults.region),
            timeout: lookup("STRATA_ROLLOUT_TIMEOUT_SECS")
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rollout_timeout),
        }
    }
}

/// Open a rollback run for `name` and start the worker
pub async fn request_rollback(
    pool: &PgPool,
    cluster: Arc<dyn Cluster>,
    target: RollbackTarget,
    tenant: TenantKey,
    name: &str,
) -> Result<PipelineRun> {
    let service = catalog_service::get_service(pool, &tenant, name).await?;
    if !service.status.can_transition_to(ServiceStatus::RollingBack) {
        return Err(StoreError::Validation(format!(
            "Service {} has no deployment to roll back (status {})",
            name, service.status
        )));
    }

    let mut run = run_service::open_run(pool, &tenant, name, RunKind::Rollback).await?;
    if let Err(e) = catalog_service::update_service(
        pool,
        &tenant,
        name,
        UpdateService::status(ServiceStatus::RollingBack),
    )
    .await
    {
        // Close the run so it does not hold the active-run slot
        abandon(&mut run, &e);
        if let Err(save) = run_service::save_run(pool, &tenant, &run).await {
            tracing::error!("Rollback run {} left open: {:?}", run.id, save);
        }
        return Err(e);
    }

    tracing::info!("Rollback of {} requested (run {})", name, run.id);
    tokio::spawn(run_rollback(pool.clone(), cluster, target, tenant, run.clone()));

    Ok(run)
}

async fn run_rollback(
    pool: PgPool,
    cluster: Arc<dyn Cluster>,
    target: RollbackTarget,
    tenant: TenantKey,
    mut run: PipelineRun,
) {
    let name = run.service_name.clone();

    if let Err(e) = begin(&mut run) {
        tracing::error!("Rollback run {} could not start: {}", run.id, e);
        return;
    }
    if let Err(e) = run_service::save_run(&pool, &tenant, &run).await {
        tracing::warn!("Failed to record rollback start for {}: {:?}", name, e);
    }

    let status = match revert(cluster.as_ref(), &target, &mut run).await {
        RunStatus::Success => ServiceStatus::Running,
        _ => ServiceStatus::Failed,
    };

    // Service first, so a client that sees the run finish reads the final status
    if let Err(e) =
        catalog_service::update_service(&pool, &tenant, &name, UpdateService::status(status)).await
    {
        tracing::error!("Failed to set {} to {}: {:?}", name, status, e);
    }
    if let Err(e) = run_service::save_run(&pool, &tenant, &run).await {
        tracing::error!("Failed to record rollback result for {}: {:?}", name, e);
    }
}

/// Finish a run whose service could not be marked rolling back
fn abandon(run: &mut PipelineRun, cause: &StoreError) {
    let reason = match cause {
        StoreError::NotFound(msg) | StoreError::Validation(msg) | StoreError::Conflict(msg) => {
            msg.clone()
        }
        StoreError::DatabaseError(e) => e.to_string(),
    };
    conclude(
        run,
        RunStatus::Failed,
        format!("Rollback not started: {}", reason),
    );
}

fn begin(run: &mut PipelineRun) -> std::result::Result<(), TransitionError> {
    run.enter(Stage::Rollback, &StagePlan::single(Stage::Rollback))?;
    run.log(format!("Rolling back {} to its previous revision", run.service_name));
    Ok(())
}

/// Revert the deployment and finish `run`; returns the terminal status
async fn revert(cluster: &dyn Cluster, target: &RollbackTarget, run: &mut PipelineRun) -> RunStatus {
    let name = run.service_name.clone();

    if let Some(cluster_name) = &target.cluster {
        if let Err(e) = cluster.ensure_context(cluster_name, &target.region).await {
            return conclude(run, RunStatus::Failed, format!("Cluster context unavailable: {}", e));
        }
    }
    run.advance_within(20);

    match cluster.rollout_undo(&name, target.timeout).await {
        Ok(()) => conclude(run, RunStatus::Success, "Previous revision is rolled out"),
        Err(AdapterError::AlreadyAbsent) => conclude(
            run,
            RunStatus::Failed,
            format!("No deployment named {} in the cluster", name),
        ),
        Err(e) => conclude(run, RunStatus::Failed, format!("Rollback failed: {}", e)),
    }
}

fn conclude(run: &mut PipelineRun, status: RunStatus, message: impl Into<String>) -> RunStatus {
    let message = message.into();
    match status {
        RunStatus::Success => tracing::info!("{}: {}", run.service_name, message),
        _ => tracing::warn!("{}: {}", run.service_name, message),
    }

    run.log(message);
    if let Err(e) = run.finish(status) {
        tracing::warn!("Rollback run {} already finished: {}", run.id, e);
    }
    run.status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use strata_engine::cluster::{NodeAddress, PodDiagnostic};

    /// Cluster that only knows how to roll back
    struct UndoOnly {
        result: std::result::Result<(), AdapterError>,
        calls: Mutex<Vec<String>>,
    }

    impl UndoOnly {
        fn new(result: std::result::Result<(), AdapterError>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Cluster for UndoOnly {
        async fn ensure_context(&self, cluster: &str, region: &str) -> std::result::Result<(), AdapterError> {
            self.calls.lock().unwrap().push(format!("context {} {}", cluster, region));
            Ok(())
        }

        async fn apply(&self, _manifest_yaml: &str) -> std::result::Result<(), AdapterError> {
            Err(AdapterError::failed("unexpected apply"))
        }

        async fn available_replicas(&self, _name: &str) -> std::result::Result<u32, AdapterError> {
            Err(AdapterError::failed("unexpected replica query"))
        }

        async fn pod_diagnostics(&self, _name: &str) -> std::result::Result<Vec<PodDiagnostic>, AdapterError> {
            Ok(Vec::new())
        }

        async fn node_addresses(&self) -> std::result::Result<Vec<NodeAddress>, AdapterError> {
            Ok(Vec::new())
        }

        async fn node_port(&self, _name: &str) -> std::result::Result<u16, AdapterError> {
            Err(AdapterError::failed("unexpected node port query"))
        }

        async fn ready_endpoints(&self, _name: &str) -> std::result::Result<usize, AdapterError> {
            Ok(0)
        }

        async fn delete_deployment(&self, _name: &str) -> std::result::Result<(), AdapterError> {
            Err(AdapterError::failed("unexpected delete"))
        }

        async fn delete_exposure(&self, _name: &str) -> std::result::Result<(), AdapterError> {
            Err(AdapterError::failed("unexpected delete"))
        }

        async fn rollout_undo(&self, name: &str, timeout: Duration) -> std::result::Result<(), AdapterError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("undo {} {}s", name, timeout.as_secs()));
            self.result.clone()
        }
    }

    fn target(cluster: Option<&str>) -> RollbackTarget {
        RollbackTarget {
            cluster: cluster.map(str::to_string),
            region: "eu-west-1".to_string(),
            timeout: Duration::from_secs(90),
        }
    }

    fn started_run() -> PipelineRun {
        let mut run = PipelineRun::new("orders", RunKind::Rollback);
        begin(&mut run).unwrap();
        run
    }

    #[tokio::test]
    async fn test_successful_rollback() {
        let cluster = UndoOnly::new(Ok(()));
        let mut run = started_run();

        let status = revert(&cluster, &target(None), &mut run).await;

        assert_eq!(status, RunStatus::Success);
        assert_eq!(run.progress, 100);
        assert_eq!(cluster.calls(), vec!["undo orders 90s"]);
    }

    #[tokio::test]
    async fn test_switches_context_when_configured() {
        let cluster = UndoOnly::new(Ok(()));
        let mut run = started_run();

        revert(&cluster, &target(Some("prod")), &mut run).await;

        assert_eq!(cluster.calls(), vec!["context prod eu-west-1", "undo orders 90s"]);
    }

    #[tokio::test]
    async fn test_missing_deployment_fails_run() {
        let cluster = UndoOnly::new(Err(AdapterError::AlreadyAbsent));
        let mut run = started_run();

        let status = revert(&cluster, &target(None), &mut run).await;

        assert_eq!(status, RunStatus::Failed);
        assert!(run.logs.last().unwrap().contains("No deployment named orders"));
    }

    #[tokio::test]
    async fn test_rollout_failure_is_logged() {
        let cluster = UndoOnly::new(Err(AdapterError::failed("rollout status timed out")));
        let mut run = started_run();

        let status = revert(&cluster, &target(None), &mut run).await;

        assert_eq!(status, RunStatus::Failed);
        assert!(run.is_terminal());
        assert!(run.logs.last().unwrap().contains("rollout status timed out"));
    }

    #[test]
    fn test_abandoned_run_is_closed() {
        let mut run = PipelineRun::new("orders", RunKind::Rollback);

        abandon(
            &mut run,
            &StoreError::Conflict("Invalid status transition from failed to rolling_back".into()),
        );

        assert!(run.is_terminal());
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.logs.last().unwrap().starts_with("Rollback not started:"));
    }

    #[test]
    fn test_target_from_lookup() {
        let target = RollbackTarget::from_lookup(|key| match key {
            "STRATA_CLUSTER" => Some("prod".to_string()),
            "STRATA_ROLLOUT_TIMEOUT_SECS" => Some("45".to_string()),
            _ => None,
        });

        assert_eq!(target.cluster.as_deref(), Some("prod"));
        assert_eq!(target.region, EngineSettings::default().region);
        assert_eq!(target.timeout, Duration::from_secs(45));

        let fallback = RollbackTarget::from_lookup(|key| match key {
            "STRATA_CLUSTER" => Some(" ".to_string()),
            "STRATA_ROLLOUT_TIMEOUT_SECS" => Some("soon".to_string()),
            _ => None,
        });
        assert!(fallback.cluster.is_none());
        assert_eq!(fallback.timeout, EngineSettings::default().rollout_timeout);
    }
}
