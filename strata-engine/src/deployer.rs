//! Cluster deployment
//!
//! [`ClusterDeployer::deploy`] applies a generated manifest, waits a bounded
//! time for the deployment to become available and resolves the address
//! the service can be reached on. A readiness timeout is not a failure:
//! the report comes back with `ready = false` and per-container
//! diagnostics, since the rollout may still finish later.

use std::sync::Arc;

use strata_core::domain::pipeline::PipelineRun;
use strata_core::manifest::ResourceManifest;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cluster::{AddressKind, Cluster, NodeAddress, PodDiagnostic};
use crate::error::{AdapterError, EngineError, ExternalSystem, Result};
use crate::settings::EngineSettings;
use crate::store::RecordStore;

/// Where a deployed service can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentAccess {
    pub host: String,
    pub port: u16,
    pub address_kind: AddressKind,
}

impl std::fmt::Display for DeploymentAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub name: String,
    pub ready: bool,
    pub available_replicas: u32,
    /// Filled when readiness was not confirmed in time
    pub diagnostics: Vec<PodDiagnostic>,
    pub access: Option<DeploymentAccess>,
}

/// Milestones of a deploy, with their share of the deploy stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    ContextReady,
    Applied,
    Available,
    TimedOut,
    Addressed,
}

impl DeployStep {
    pub fn percent_of_stage(self) -> u8 {
        match self {
            DeployStep::ContextReady => 10,
            DeployStep::Applied => 30,
            DeployStep::Available | DeployStep::TimedOut => 80,
            DeployStep::Addressed => 95,
        }
    }
}

pub struct ClusterDeployer {
    cluster: Arc<dyn Cluster>,
    store: Arc<dyn RecordStore>,
    settings: EngineSettings,
}

impl ClusterDeployer {
    pub fn new(cluster: Arc<dyn Cluster>, store: Arc<dyn RecordStore>, settings: EngineSettings) -> Self {
        Self {
            cluster,
            store,
            settings,
        }
    }

    /// Apply `manifest` and confirm it
    ///
    /// `on_step` is called at every milestone with a human readable message.
    pub async fn deploy<F>(&self, manifest: &ResourceManifest, mut on_step: F) -> Result<DeploymentReport>
    where
        F: FnMut(DeployStep, &str) + Send,
    {
        let name = manifest.name();
        let cluster_name = self.settings.require_cluster()?;

        self.cluster
            .ensure_context(cluster_name, &self.settings.region)
            .await
            .map_err(EngineError::external(ExternalSystem::Cluster))?;
        on_step(
            DeployStep::ContextReady,
            &format!("using cluster {} ({})", cluster_name, self.settings.region),
        );

        let yaml = manifest.to_yaml().map_err(|e| EngineError::External {
            system: ExternalSystem::Cluster,
            cause: AdapterError::failed(format!("manifest rendering failed: {}", e)),
        })?;
        self.cluster
            .apply(&yaml)
            .await
            .map_err(EngineError::external(ExternalSystem::Cluster))?;
        on_step(
            DeployStep::Applied,
            &format!("applied deployment and service {} on port {}", name, manifest.port()),
        );

        let mut report = DeploymentReport {
            name: name.to_string(),
            ready: false,
            available_replicas: 0,
            diagnostics: Vec::new(),
            access: None,
        };

        match self.wait_available(name).await {
            Some(replicas) => {
                report.available_replicas = replicas;
                report.ready = true;
                on_step(
                    DeployStep::Available,
                    &format!("{} replica(s) available", replicas),
                );
            }
            None => {
                warn!(
                    "{} not available after {:?}; collecting diagnostics",
                    name, self.settings.readiness_timeout
                );
                report.diagnostics = match self.cluster.pod_diagnostics(name).await {
                    Ok(diagnostics) => diagnostics,
                    Err(e) => {
                        warn!("Cannot collect pod diagnostics for {}: {}", name, e);
                        Vec::new()
                    }
                };
                let detail = if report.diagnostics.is_empty() {
                    "no pods scheduled".to_string()
                } else {
                    report
                        .diagnostics
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                on_step(
                    DeployStep::TimedOut,
                    &format!(
                        "readiness not confirmed within {}s: {}",
                        self.settings.readiness_timeout.as_secs(),
                        detail
                    ),
                );
            }
        }

        report.access = Some(self.resolve_access(name).await?);

        if report.ready && self.settings.verify_endpoints {
            let endpoints = self
                .cluster
                .ready_endpoints(name)
                .await
                .or_else(|e| match e {
                    AdapterError::AlreadyAbsent => Ok(0),
                    other => Err(other),
                })
                .map_err(EngineError::external(ExternalSystem::Cluster))?;
            if endpoints == 0 {
                warn!("{} has available replicas but no ready endpoints", name);
                report.ready = false;
            }
        }

        if let Some(access) = &report.access {
            on_step(DeployStep::Addressed, &format!("reachable at {}", access));
        }
        info!("Deploy of {} finished (ready: {})", name, report.ready);
        Ok(report)
    }

    /// Ask the record store to redeploy the previous revision
    ///
    /// Asynchronous: the returned run completes later and must be polled.
    pub async fn rollback(&self, name: &str) -> Result<PipelineRun> {
        info!("Requesting rollback of {}", name);
        self.store.request_rollback(name).await.map_err(|e| match e {
            AdapterError::AlreadyAbsent => {
                EngineError::Validation(format!("service '{}' is not registered", name))
            }
            AdapterError::Conflict(msg) => EngineError::RunConflict(msg),
            other => EngineError::External {
                system: ExternalSystem::RecordStore,
                cause: other,
            },
        })
    }

    /// Poll until at least one replica is available or the bound expires
    ///
    /// Errors from a single poll are logged and retried until the deadline.
    async fn wait_available(&self, name: &str) -> Option<u32> {
        let interval = self.settings.readiness_poll_interval;
        let deadline = Instant::now() + self.settings.readiness_timeout;

        loop {
            match self.cluster.available_replicas(name).await {
                Ok(replicas) if replicas > 0 => return Some(replicas),
                Ok(_) => {}
                // Not visible yet right after apply
                Err(AdapterError::AlreadyAbsent) => {}
                Err(e) => warn!("Polling replicas of {} failed: {}", name, e),
            }
            if Instant::now() + interval > deadline {
                return None;
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn resolve_access(&self, name: &str) -> Result<DeploymentAccess> {
        let addresses = self
            .cluster
            .node_addresses()
            .await
            .map_err(EngineError::external(ExternalSystem::Cluster))?;
        let (host, address_kind) = pick_address(&addresses).ok_or_else(|| EngineError::External {
            system: ExternalSystem::Cluster,
            cause: AdapterError::failed("no node addresses reported"),
        })?;
        if address_kind == AddressKind::Internal {
            warn!(
                "No external node address; {} is only reachable inside the cluster network",
                name
            );
        }

        let port = self
            .cluster
            .node_port(name)
            .await
            .map_err(EngineError::external(ExternalSystem::Cluster))?;

        Ok(DeploymentAccess {
            host,
            port,
            address_kind,
        })
    }
}

/// First external address, else the first internal one
pub fn pick_address(addresses: &[NodeAddress]) -> Option<(String, AddressKind)> {
    addresses
        .iter()
        .find(|a| a.kind == AddressKind::External)
        .or_else(|| addresses.iter().find(|a| a.kind == AddressKind::Internal))
        .map(|a| (a.address.clone(), a.kind))
}
