//! Teardown of everything a service left behind
//!
//! Steps run in a fixed order and every one is attempted: a resource that is
//! already gone counts as done, and a failure is recorded in the report
//! without stopping the remaining steps. Running teardown twice is safe.

use std::sync::Arc;

use strata_core::domain::service::ServiceDescriptor;
use tracing::{info, warn};

use crate::cluster::Cluster;
use crate::error::AdapterError;
use crate::registry::ImageRegistry;
use crate::source::SourceHost;
use crate::store::RecordStore;

/// What to tear down; built from the service name and whatever record exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownTarget {
    pub name: String,
    pub source_url: Option<String>,
    pub image: Option<String>,
}

impl TeardownTarget {
    pub fn new(name: impl Into<String>, descriptor: Option<&ServiceDescriptor>) -> Self {
        Self {
            name: name.into(),
            source_url: descriptor.and_then(|d| d.source_url.clone()),
            image: descriptor.and_then(|d| d.image.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownResource {
    SourceRepository,
    ImageTag,
    ImageRepository,
    Deployment,
    Exposure,
    Record,
}

impl std::fmt::Display for TeardownResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TeardownResource::SourceRepository => "source repository",
            TeardownResource::ImageTag => "image tag",
            TeardownResource::ImageRepository => "image repository",
            TeardownResource::Deployment => "cluster deployment",
            TeardownResource::Exposure => "cluster service",
            TeardownResource::Record => "service record",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Deleted,
    AlreadyAbsent,
    /// Nothing was recorded for this resource
    Skipped,
    Failed(String),
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed(_))
    }
}

impl From<Result<(), AdapterError>> for StepStatus {
    fn from(result: Result<(), AdapterError>) -> Self {
        match result {
            Ok(()) => StepStatus::Deleted,
            Err(AdapterError::AlreadyAbsent) => StepStatus::AlreadyAbsent,
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownStep {
    pub resource: TeardownResource,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
}

impl TeardownReport {
    /// No step failed
    pub fn is_clean(&self) -> bool {
        !self.steps.iter().any(|s| s.status.is_failure())
    }

    pub fn status_of(&self, resource: TeardownResource) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|s| s.resource == resource)
            .map(|s| &s.status)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps.iter().filter(|s| s.status.is_failure())
    }

    fn record(&mut self, resource: TeardownResource, status: StepStatus) {
        match &status {
            StepStatus::Failed(cause) => warn!("Teardown of {} failed: {}", resource, cause),
            other => info!("Teardown of {}: {:?}", resource, other),
        }
        self.steps.push(TeardownStep { resource, status });
    }
}

pub struct TeardownCoordinator {
    source: Option<Arc<dyn SourceHost>>,
    registry: Option<Arc<dyn ImageRegistry>>,
    cluster: Arc<dyn Cluster>,
    store: Arc<dyn RecordStore>,
}

impl TeardownCoordinator {
    /// `source` and `registry` may be absent when they are not configured;
    /// recorded resources on them are then reported as failed.
    pub fn new(
        source: Option<Arc<dyn SourceHost>>,
        registry: Option<Arc<dyn ImageRegistry>>,
        cluster: Arc<dyn Cluster>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            source,
            registry,
            cluster,
            store,
        }
    }

    pub async fn teardown(&self, target: &TeardownTarget) -> TeardownReport {
        let mut report = TeardownReport::default();
        info!("Tearing down {}", target.name);

        let status = match (&target.source_url, &self.source) {
            (None, _) => StepStatus::Skipped,
            (Some(_), None) => StepStatus::Failed("source host not configured".into()),
            (Some(url), Some(source)) => source.delete_repository(url).await.into(),
        };
        report.record(TeardownResource::SourceRepository, status);

        match (&target.image, &self.registry) {
            (None, _) => {
                report.record(TeardownResource::ImageTag, StepStatus::Skipped);
                report.record(TeardownResource::ImageRepository, StepStatus::Skipped);
            }
            (Some(_), None) => {
                let cause = StepStatus::Failed("image registry not configured".into());
                report.record(TeardownResource::ImageTag, cause.clone());
                report.record(TeardownResource::ImageRepository, cause);
            }
            (Some(image), Some(registry)) => {
                report.record(
                    TeardownResource::ImageTag,
                    registry.delete_tag(image).await.into(),
                );
                report.record(
                    TeardownResource::ImageRepository,
                    registry.delete_repository_if_empty(image).await.into(),
                );
            }
        }

        report.record(
            TeardownResource::Deployment,
            self.cluster.delete_deployment(&target.name).await.into(),
        );
        report.record(
            TeardownResource::Exposure,
            self.cluster.delete_exposure(&target.name).await.into(),
        );

        report.record(
            TeardownResource::Record,
            self.store.delete_service(&target.name).await.into(),
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fakes;
    use strata_core::domain::service::ServiceStatus;

    fn coordinator(fakes: &Fakes) -> TeardownCoordinator {
        TeardownCoordinator::new(
            Some(fakes.source.clone()),
            Some(fakes.registry.clone()),
            fakes.cluster.clone(),
            fakes.store.clone(),
        )
    }

    #[tokio::test]
    async fn test_full_teardown() {
        let fakes = Fakes::new();
        let descriptor = fakes.seed_deployed_service("svc-a").await;

        let report = coordinator(&fakes)
            .teardown(&TeardownTarget::new("svc-a", Some(&descriptor)))
            .await;

        assert!(report.is_clean());
        for step in &report.steps {
            assert_eq!(step.status, StepStatus::Deleted, "{}", step.resource);
        }
        assert!(fakes.store.service("svc-a").is_none());
        assert!(fakes.source.repositories().is_empty());
        assert!(fakes.cluster.deployments().is_empty());
    }

    #[tokio::test]
    async fn test_half_created_service() {
        let fakes = Fakes::new();
        // Registered with --skip-source: no repository, no image, nothing deployed
        let descriptor = fakes.seed_service("svc-a", ServiceStatus::Registered).await;

        let report = coordinator(&fakes)
            .teardown(&TeardownTarget::new("svc-a", Some(&descriptor)))
            .await;

        assert!(report.is_clean());
        assert_eq!(
            report.status_of(TeardownResource::SourceRepository),
            Some(&StepStatus::Skipped)
        );
        assert_eq!(
            report.status_of(TeardownResource::ImageTag),
            Some(&StepStatus::Skipped)
        );
        assert_eq!(
            report.status_of(TeardownResource::Deployment),
            Some(&StepStatus::AlreadyAbsent)
        );
        assert_eq!(
            report.status_of(TeardownResource::Record),
            Some(&StepStatus::Deleted)
        );
    }

    #[tokio::test]
    async fn test_teardown_twice_succeeds() {
        let fakes = Fakes::new();
        let descriptor = fakes.seed_deployed_service("svc-a").await;
        let target = TeardownTarget::new("svc-a", Some(&descriptor));
        let coordinator = coordinator(&fakes);

        assert!(coordinator.teardown(&target).await.is_clean());

        let second = coordinator.teardown(&target).await;
        assert!(second.is_clean());
        assert!(
            second
                .steps
                .iter()
                .all(|s| s.status == StepStatus::AlreadyAbsent)
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_steps() {
        let fakes = Fakes::new();
        let descriptor = fakes.seed_deployed_service("svc-a").await;
        fakes.source.fail_deletes();

        let report = coordinator(&fakes)
            .teardown(&TeardownTarget::new("svc-a", Some(&descriptor)))
            .await;

        assert!(!report.is_clean());
        assert_eq!(report.failures().count(), 1);
        assert!(matches!(
            report.status_of(TeardownResource::SourceRepository),
            Some(StepStatus::Failed(_))
        ));
        assert_eq!(
            report.status_of(TeardownResource::Record),
            Some(&StepStatus::Deleted)
        );
        assert!(fakes.cluster.deployments().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_registry_with_recorded_image() {
        let fakes = Fakes::new();
        let descriptor = fakes.seed_deployed_service("svc-a").await;
        let coordinator = TeardownCoordinator::new(
            Some(fakes.source.clone()),
            None,
            fakes.cluster.clone(),
            fakes.store.clone(),
        );

        let report = coordinator
            .teardown(&TeardownTarget::new("svc-a", Some(&descriptor)))
            .await;

        assert!(matches!(
            report.status_of(TeardownResource::ImageTag),
            Some(StepStatus::Failed(_))
        ));
        assert_eq!(
            report.status_of(TeardownResource::Record),
            Some(&StepStatus::Deleted)
        );
    }

    #[tokio::test]
    async fn test_no_record_at_all() {
        let fakes = Fakes::new();
        let report = coordinator(&fakes)
            .teardown(&TeardownTarget::new("ghost", None))
            .await;

        assert!(report.is_clean());
        assert_eq!(
            report.status_of(TeardownResource::Record),
            Some(&StepStatus::AlreadyAbsent)
        );
    }
}
