//! Cluster manifest generation
//!
//! Turns a service descriptor into a Deployment and a NodePort Service.
//! Pure: identical inputs always serialize to identical bytes, so
//! re-applying an unchanged service is a no-op on the cluster side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::service::ServiceKind;

pub const REPLICAS: u32 = 2;
pub const CPU: &str = "250m";
pub const MEMORY: &str = "256Mi";
/// Client affinity window for the exposure resource (3 hours)
pub const SESSION_AFFINITY_SECONDS: u32 = 10_800;

const PROBE_PATH: &str = "/";

/// Inputs to [`generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInput {
    pub name: String,
    pub image: String,
    pub kind: ServiceKind,
    /// Port requested explicitly by the caller
    pub port: Option<u16>,
    /// Port declared as exposed by the built image, when it could be inspected
    pub image_port: Option<u16>,
}

/// Resolve the container port: explicit, then image-declared, then the kind default
pub fn resolve_port(explicit: Option<u16>, image_port: Option<u16>, kind: ServiceKind) -> u16 {
    explicit
        .or(image_port)
        .unwrap_or_else(|| kind.default_port())
}

/// Generate the deployment and exposure resources for a service
pub fn generate(input: &ManifestInput) -> ResourceManifest {
    let port = resolve_port(input.port, input.image_port, input.kind);
    let labels = BTreeMap::from([("app".to_string(), input.name.clone())]);

    let readiness = Probe::http(port, 5, 3);
    // Restarting is more disruptive than dropping out of the endpoints,
    // so liveness waits longer and tolerates more failures.
    let liveness = Probe::http(port, 30, 6);

    let amounts = ResourceAmounts {
        cpu: CPU.to_string(),
        memory: MEMORY.to_string(),
    };

    let deployment = DeploymentSpec {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        metadata: ObjectMeta {
            name: input.name.clone(),
            labels: labels.clone(),
        },
        spec: DeploymentBody {
            replicas: REPLICAS,
            selector: LabelSelector {
                match_labels: labels.clone(),
            },
            template: PodTemplate {
                metadata: TemplateMeta {
                    labels: labels.clone(),
                },
                spec: PodSpec {
                    containers: vec![Container {
                        name: input.name.clone(),
                        image: input.image.clone(),
                        ports: vec![ContainerPort {
                            container_port: port,
                            protocol: "TCP".to_string(),
                        }],
                        resources: Resources {
                            requests: amounts.clone(),
                            limits: amounts,
                        },
                        readiness_probe: readiness,
                        liveness_probe: liveness,
                    }],
                },
            },
        },
    };

    let exposure = ExposureSpec {
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        metadata: ObjectMeta {
            name: input.name.clone(),
            labels: labels.clone(),
        },
        spec: ServiceBody {
            service_type: "NodePort".to_string(),
            selector: labels,
            ports: vec![ServicePort {
                name: "http".to_string(),
                protocol: "TCP".to_string(),
                port,
                target_port: port,
            }],
            session_affinity: "ClientIP".to_string(),
            session_affinity_config: SessionAffinityConfig {
                client_ip: ClientIpConfig {
                    timeout_seconds: SESSION_AFFINITY_SECONDS,
                },
            },
        },
    };

    ResourceManifest {
        deployment,
        exposure,
    }
}

/// The pair of resources applied for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub deployment: DeploymentSpec,
    pub exposure: ExposureSpec,
}

impl ResourceManifest {
    pub fn name(&self) -> &str {
        &self.deployment.metadata.name
    }

    /// The resolved container port (also the probe and exposure target port)
    pub fn port(&self) -> u16 {
        self.exposure.spec.ports[0].target_port
    }

    /// Render both resources as one multi-document YAML stream
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let deployment = serde_yaml::to_string(&self.deployment)?;
        let exposure = serde_yaml::to_string(&self.exposure)?;
        Ok(format!("{deployment}---\n{exposure}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DeploymentBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentBody {
    pub replicas: u32,
    pub selector: LabelSelector,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub metadata: TemplateMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub ports: Vec<ContainerPort>,
    pub resources: Resources,
    pub readiness_probe: Probe,
    pub liveness_probe: Probe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub requests: ResourceAmounts,
    pub limits: ResourceAmounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmounts {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub http_get: HttpGetAction,
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
    pub failure_threshold: u32,
}

impl Probe {
    fn http(port: u16, initial_delay_seconds: u32, failure_threshold: u32) -> Self {
        Self {
            http_get: HttpGetAction {
                path: PROBE_PATH.to_string(),
                port,
            },
            initial_delay_seconds,
            period_seconds: 10,
            failure_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGetAction {
    pub path: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSpec {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ServiceBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBody {
    #[serde(rename = "type")]
    pub service_type: String,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    pub session_affinity: String,
    pub session_affinity_config: SessionAffinityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAffinityConfig {
    #[serde(rename = "clientIP")]
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIpConfig {
    pub timeout_seconds: u32,
}
