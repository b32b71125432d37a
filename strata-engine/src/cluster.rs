//! Cluster access
//!
//! [`Cluster`] is the narrow set of operations the deployer, teardown and
//! rollback need. [`Kubectl`] implements it by shelling out to `kubectl`
//! (and `aws eks` for context selection) and reading `-o json` output.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AdapterError;
use crate::process;

/// State of one container, as reported on timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Waiting,
    Running,
    Terminated,
    Unknown,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerState::Waiting => "waiting",
            ContainerState::Running => "running",
            ContainerState::Terminated => "terminated",
            ContainerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodDiagnostic {
    pub pod: String,
    pub container: String,
    pub state: ContainerState,
    pub reason: Option<String>,
}

impl std::fmt::Display for PodDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.pod, self.container, self.state)?;
        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    pub kind: AddressKind,
    pub address: String,
}

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Point the local client at `cluster`
    async fn ensure_context(&self, cluster: &str, region: &str) -> Result<(), AdapterError>;

    /// Apply a multi-document manifest
    async fn apply(&self, manifest_yaml: &str) -> Result<(), AdapterError>;

    async fn available_replicas(&self, name: &str) -> Result<u32, AdapterError>;

    async fn pod_diagnostics(&self, name: &str) -> Result<Vec<PodDiagnostic>, AdapterError>;

    async fn node_addresses(&self) -> Result<Vec<NodeAddress>, AdapterError>;

    /// Cluster-assigned node port of the exposure resource
    async fn node_port(&self, name: &str) -> Result<u16, AdapterError>;

    async fn ready_endpoints(&self, name: &str) -> Result<usize, AdapterError>;

    async fn delete_deployment(&self, name: &str) -> Result<(), AdapterError>;

    async fn delete_exposure(&self, name: &str) -> Result<(), AdapterError>;

    /// Revert the deployment to its previous revision and wait for it
    async fn rollout_undo(&self, name: &str, timeout: Duration) -> Result<(), AdapterError>;
}

// Subsets of the kubectl JSON we read

#[derive(Debug, Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
struct List<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    #[serde(default)]
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentStatus {
    #[serde(default)]
    available_replicas: u32,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: Metadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    name: String,
    #[serde(default)]
    state: StateDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StateDetail {
    waiting: Option<Reason>,
    running: Option<serde_json::Value>,
    terminated: Option<Reason>,
}

#[derive(Debug, Deserialize)]
struct Reason {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
struct ServiceSpec {
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServicePort {
    node_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Endpoints {
    #[serde(default)]
    subsets: Vec<Subset>,
}

#[derive(Debug, Deserialize)]
struct Subset {
    #[serde(default)]
    addresses: Vec<serde_json::Value>,
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str, what: &str) -> Result<T, AdapterError> {
    serde_json::from_str(json)
        .map_err(|e| AdapterError::failed(format!("unreadable kubectl {} output: {}", what, e)))
}

pub fn parse_available_replicas(json: &str) -> Result<u32, AdapterError> {
    let deployment: Deployment = parse(json, "deployment")?;
    Ok(deployment.status.available_replicas)
}

pub fn parse_pod_diagnostics(json: &str) -> Result<Vec<PodDiagnostic>, AdapterError> {
    let pods: List<Pod> = parse(json, "pod")?;
    let diagnostics = pods
        .items
        .into_iter()
        .flat_map(|pod| {
            let pod_name = pod.metadata.name;
            pod.status
                .container_statuses
                .into_iter()
                .map(move |c| {
                    let (state, reason) = match c.state {
                        StateDetail {
                            waiting: Some(w), ..
                        } => (ContainerState::Waiting, w.reason),
                        StateDetail {
                            terminated: Some(t),
                            ..
                        } => (ContainerState::Terminated, t.reason),
                        StateDetail {
                            running: Some(_), ..
                        } => (ContainerState::Running, None),
                        _ => (ContainerState::Unknown, None),
                    };
                    PodDiagnostic {
                        pod: pod_name.clone(),
                        container: c.name,
                        state,
                        reason,
                    }
                })
        })
        .collect();
    Ok(diagnostics)
}

pub fn parse_node_addresses(json: &str) -> Result<Vec<NodeAddress>, AdapterError> {
    let nodes: List<Node> = parse(json, "node")?;
    let addresses = nodes
        .items
        .into_iter()
        .flat_map(|n| n.status.addresses)
        .filter_map(|a| {
            let kind = match a.kind.as_str() {
                "ExternalIP" => AddressKind::External,
                "InternalIP" => AddressKind::Internal,
                _ => return None,
            };
            Some(NodeAddress {
                kind,
                address: a.address,
            })
        })
        .collect();
    Ok(addresses)
}

pub fn parse_node_port(json: &str) -> Result<u16, AdapterError> {
    let service: Service = parse(json, "service")?;
    service
        .spec
        .ports
        .into_iter()
        .find_map(|p| p.node_port)
        .ok_or_else(|| AdapterError::failed("service has no node port assigned"))
}

pub fn parse_ready_endpoints(json: &str) -> Result<usize, AdapterError> {
    let endpoints: Endpoints = parse(json, "endpoints")?;
    Ok(endpoints.subsets.iter().map(|s| s.addresses.len()).sum())
}

/// Whether kubectl context `current` is the one for `cluster`
///
/// EKS contexts are ARNs ending in `cluster/<name>`; anything else must
/// match the name exactly.
pub fn context_targets(current: &str, cluster: &str) -> bool {
    let current = current.trim();
    current == cluster
        || current
            .strip_suffix(cluster)
            .is_some_and(|prefix| prefix.ends_with(":cluster/"))
}

/// `kubectl` against the current context
#[derive(Debug, Clone, Default)]
pub struct Kubectl;

impl Kubectl {
    async fn get_json(&self, args: &[&str]) -> Result<String, AdapterError> {
        let mut full = vec!["get"];
        full.extend_from_slice(args);
        full.extend_from_slice(&["-o", "json"]);

        let output = process::run("kubectl", &full, None, None).await?;
        if !output.success() && output.reports_missing() {
            return Err(AdapterError::AlreadyAbsent);
        }
        output.require_success("kubectl", &full)
    }

    /// Delete with `--ignore-not-found`; an empty answer means nothing was there
    async fn delete(&self, kind: &str, name: &str) -> Result<(), AdapterError> {
        let args = ["delete", kind, name, "--ignore-not-found"];
        let stdout = process::run_checked("kubectl", &args, None).await?;
        if stdout.is_empty() {
            return Err(AdapterError::AlreadyAbsent);
        }
        info!("Deleted {} {}", kind, name);
        Ok(())
    }
}

#[async_trait]
impl Cluster for Kubectl {
    async fn ensure_context(&self, cluster: &str, region: &str) -> Result<(), AdapterError> {
        let current = process::run("kubectl", &["config", "current-context"], None, None).await?;
        if current.success() && context_targets(&current.stdout, cluster) {
            debug!("kubectl context {} already targets {}", current.stdout, cluster);
            return Ok(());
        }

        info!("Switching kubectl context to {} ({})", cluster, region);
        process::run_checked(
            "aws",
            &[
                "eks",
                "update-kubeconfig",
                "--name",
                cluster,
                "--region",
                region,
            ],
            None,
        )
        .await?;
        Ok(())
    }

    async fn apply(&self, manifest_yaml: &str) -> Result<(), AdapterError> {
        let args = ["apply", "-f", "-"];
        let output = process::run("kubectl", &args, None, Some(manifest_yaml)).await?;
        let stdout = output.require_success("kubectl", &args)?;
        info!("kubectl apply: {}", stdout.replace('\n', "; "));
        Ok(())
    }

    async fn available_replicas(&self, name: &str) -> Result<u32, AdapterError> {
        let json = self.get_json(&["deployment", name]).await?;
        parse_available_replicas(&json)
    }

    async fn pod_diagnostics(&self, name: &str) -> Result<Vec<PodDiagnostic>, AdapterError> {
        let selector = format!("app={}", name);
        let json = self.get_json(&["pods", "-l", &selector]).await?;
        parse_pod_diagnostics(&json)
    }

    async fn node_addresses(&self) -> Result<Vec<NodeAddress>, AdapterError> {
        let json = self.get_json(&["nodes"]).await?;
        parse_node_addresses(&json)
    }

    async fn node_port(&self, name: &str) -> Result<u16, AdapterError> {
        let json = self.get_json(&["service", name]).await?;
        parse_node_port(&json)
    }

    async fn ready_endpoints(&self, name: &str) -> Result<usize, AdapterError> {
        let json = self.get_json(&["endpoints", name]).await?;
        parse_ready_endpoints(&json)
    }

    async fn delete_deployment(&self, name: &str) -> Result<(), AdapterError> {
        self.delete("deployment", name).await
    }

    async fn delete_exposure(&self, name: &str) -> Result<(), AdapterError> {
        self.delete("service", name).await
    }

    async fn rollout_undo(&self, name: &str, timeout: Duration) -> Result<(), AdapterError> {
        let target = format!("deployment/{}", name);
        let undo = process::run("kubectl", &["rollout", "undo", &target], None, None).await?;
        if !undo.success() && undo.reports_missing() {
            return Err(AdapterError::AlreadyAbsent);
        }
        undo.require_success("kubectl", &["rollout", "undo", &target])?;

        let timeout_arg = format!("--timeout={}s", timeout.as_secs().max(1));
        process::run_checked(
            "kubectl",
            &["rollout", "status", &target, &timeout_arg],
            None,
        )
        .await?;
        info!("Rolled back {}", target);
        Ok(())
    }
}
