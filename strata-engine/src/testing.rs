//! In-memory adapters for tests

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use strata_core::domain::pipeline::{PipelineRun, RunKind};
use strata_core::domain::service::{ServiceDescriptor, ServiceKind, ServiceStatus};
use strata_core::dto::pipeline::RunUpdate;
use strata_core::dto::service::{RegisterService, UpdateService};
use uuid::Uuid;

use crate::cluster::{AddressKind, Cluster, NodeAddress, PodDiagnostic};
use crate::error::AdapterError;
use crate::pipeline::Adapters;
use crate::prompt::OperatorPrompt;
use crate::registry::ImageRegistry;
use crate::scanner::{Finding, ScanReport, Scanner};
use crate::settings::EngineSettings;
use crate::source::{RepositoryRef, SourceHost};
use crate::store::RecordStore;

pub fn fast_settings() -> EngineSettings {
    let mut settings = EngineSettings::new(Some("test-cluster".into()), "eu-west-1")
        .with_readiness(Duration::from_millis(1), Duration::from_millis(5));
    settings.status_poll_interval = Duration::from_millis(1);
    settings.status_poll_attempts = 5;
    settings
}

// =============================================================================
// Record store
// =============================================================================

#[derive(Default)]
struct StoreState {
    services: BTreeMap<String, ServiceDescriptor>,
    runs: Vec<PipelineRun>,
    fail_next_register: bool,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn insert_service(&self, descriptor: ServiceDescriptor) {
        let mut state = self.state.lock().unwrap();
        state.services.insert(descriptor.name.clone(), descriptor);
    }

    pub fn service(&self, name: &str) -> Option<ServiceDescriptor> {
        self.state.lock().unwrap().services.get(name).cloned()
    }

    pub fn run(&self, id: Uuid) -> Option<PipelineRun> {
        let state = self.state.lock().unwrap();
        state.runs.iter().find(|r| r.id == id).cloned()
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn fail_next_register(&self) {
        self.state.lock().unwrap().fail_next_register = true;
    }

    /// Apply an update to a run directly, as the rollback worker would
    pub fn complete_run(&self, id: Uuid, update: &RunUpdate) {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.iter_mut().find(|r| r.id == id) {
            run.apply(update).unwrap();
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn find_service(&self, name: &str) -> Result<Option<ServiceDescriptor>, AdapterError> {
        Ok(self.service(name))
    }

    async fn register_service(
        &self,
        req: &RegisterService,
    ) -> Result<ServiceDescriptor, AdapterError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_register) {
            return Err(AdapterError::failed("record store unavailable"));
        }
        if state.services.contains_key(&req.name) {
            return Err(AdapterError::Conflict(format!("{} exists", req.name)));
        }

        let now = Utc::now();
        let descriptor = ServiceDescriptor {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            kind: req.kind,
            description: req.description.clone(),
            developer: req.developer.clone(),
            image: req.image.clone(),
            source_url: req.source_url.clone(),
            url: None,
            status: ServiceStatus::Registered,
            created_at: now,
            updated_at: now,
        };
        state.services.insert(req.name.clone(), descriptor.clone());
        Ok(descriptor)
    }

    async fn update_service(
        &self,
        name: &str,
        req: &UpdateService,
    ) -> Result<ServiceDescriptor, AdapterError> {
        let mut state = self.state.lock().unwrap();
        let service = state
            .services
            .get_mut(name)
            .ok_or(AdapterError::AlreadyAbsent)?;

        if let Some(status) = req.status {
            if !service.status.can_transition_to(status) {
                return Err(AdapterError::Conflict(format!(
                    "{} -> {}",
                    service.status, status
                )));
            }
            service.status = status;
        }
        if let Some(image) = &req.image {
            service.image = Some(image.clone());
        }
        if let Some(source_url) = &req.source_url {
            service.source_url = Some(source_url.clone());
        }
        if let Some(url) = &req.url {
            service.url = Some(url.clone());
        }
        service.updated_at = Utc::now();
        Ok(service.clone())
    }

    async fn delete_service(&self, name: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.runs.retain(|r| r.service_name != name);
        state
            .services
            .remove(name)
            .map(|_| ())
            .ok_or(AdapterError::AlreadyAbsent)
    }

    async fn open_run(&self, name: &str, kind: RunKind) -> Result<PipelineRun, AdapterError> {
        let mut state = self.state.lock().unwrap();
        if state
            .runs
            .iter()
            .any(|r| r.service_name == name && !r.is_terminal())
        {
            return Err(AdapterError::Conflict(format!("{} has an active run", name)));
        }
        let run = PipelineRun::new(name, kind);
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn update_run(&self, id: Uuid, update: &RunUpdate) -> Result<PipelineRun, AdapterError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AdapterError::AlreadyAbsent)?;
        run.apply(update)
            .map_err(|e| AdapterError::Conflict(e.to_string()))?;
        Ok(run.clone())
    }

    async fn latest_run(&self, name: &str) -> Result<Option<PipelineRun>, AdapterError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .iter()
            .rev()
            .find(|r| r.service_name == name)
            .cloned())
    }

    async fn request_rollback(&self, name: &str) -> Result<PipelineRun, AdapterError> {
        if self.service(name).is_none() {
            return Err(AdapterError::AlreadyAbsent);
        }
        self.open_run(name, RunKind::Rollback).await
    }
}

// =============================================================================
// Source host
// =============================================================================

#[derive(Default)]
struct SourceState {
    repositories: BTreeSet<String>,
    pushes: Vec<String>,
    fail_deletes: bool,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn url_for(name: &str) -> String {
        format!("https://github.com/acme/{}", name)
    }

    pub fn repositories(&self) -> Vec<String> {
        self.state.lock().unwrap().repositories.iter().cloned().collect()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }
}

#[async_trait]
impl SourceHost for FakeSource {
    async fn ensure_repository(
        &self,
        name: &str,
        _description: &str,
    ) -> Result<RepositoryRef, AdapterError> {
        let url = Self::url_for(name);
        let created = self.state.lock().unwrap().repositories.insert(url.clone());
        Ok(RepositoryRef { url, created })
    }

    async fn push_folder(&self, _folder: &Path, repo: &RepositoryRef) -> Result<(), AdapterError> {
        self.state.lock().unwrap().pushes.push(repo.url.clone());
        Ok(())
    }

    async fn delete_repository(&self, url: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(AdapterError::failed("403 Must have admin rights"));
        }
        if state.repositories.remove(url) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
struct RegistryState {
    images: BTreeSet<String>,
    repositories: BTreeSet<String>,
    exposed_port: Option<u16>,
    fail_builds: bool,
    fail_inspections: bool,
}

#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
}

impl FakeRegistry {
    pub fn images(&self) -> Vec<String> {
        self.state.lock().unwrap().images.iter().cloned().collect()
    }

    pub fn fail_builds(&self) {
        self.state.lock().unwrap().fail_builds = true;
    }

    pub fn fail_inspections(&self) {
        self.state.lock().unwrap().fail_inspections = true;
    }

    pub fn set_exposed_port(&self, port: Option<u16>) {
        self.state.lock().unwrap().exposed_port = port;
    }

    fn repository_of(image: &str) -> String {
        image.split(':').next().unwrap_or(image).to_string()
    }
}

#[async_trait]
impl ImageRegistry for FakeRegistry {
    fn image_ref(&self, service_name: &str) -> String {
        format!("acme/{}:latest", service_name)
    }

    async fn build(&self, _folder: &Path, image: &str) -> Result<(), AdapterError> {
        if self.state.lock().unwrap().fail_builds {
            return Err(AdapterError::failed(format!(
                "docker build -t {} failed (exit 1)",
                image
            )));
        }
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.images.insert(image.to_string());
        state.repositories.insert(Self::repository_of(image));
        Ok(())
    }

    async fn exposed_port(&self, image: &str) -> Result<Option<u16>, AdapterError> {
        let state = self.state.lock().unwrap();
        if state.fail_inspections {
            return Err(AdapterError::failed(format!("docker inspect {} failed (exit 1)", image)));
        }
        Ok(state.exposed_port)
    }

    async fn delete_tag(&self, image: &str) -> Result<(), AdapterError> {
        if self.state.lock().unwrap().images.remove(image) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }

    async fn delete_repository_if_empty(&self, image: &str) -> Result<(), AdapterError> {
        let repository = Self::repository_of(image);
        let mut state = self.state.lock().unwrap();
        if state
            .images
            .iter()
            .any(|i| Self::repository_of(i) == repository)
        {
            return Ok(());
        }
        if state.repositories.remove(&repository) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }
}

// =============================================================================
// Scanner
// =============================================================================

#[derive(Default)]
pub struct FakeScanner {
    findings: Mutex<Vec<Finding>>,
    calls: Mutex<usize>,
}

impl FakeScanner {
    pub fn set_findings(&self, findings: Vec<Finding>) {
        *self.findings.lock().unwrap() = findings;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn scan(&self, _folder: &Path) -> Result<ScanReport, AdapterError> {
        *self.calls.lock().unwrap() += 1;
        Ok(ScanReport {
            findings: self.findings.lock().unwrap().clone(),
        })
    }
}

// =============================================================================
// Cluster
// =============================================================================

struct ClusterState {
    calls: Vec<String>,
    applied: Vec<String>,
    deployments: BTreeSet<String>,
    exposures: BTreeSet<String>,
    replicas: u32,
    endpoints: usize,
    diagnostics: Vec<PodDiagnostic>,
    addresses: Vec<NodeAddress>,
    node_port: u16,
    fail_applies: bool,
    failing_replica_polls: u32,
    fail_diagnostics: bool,
}

pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    /// A cluster where every deployment becomes available at once
    pub fn ready() -> Self {
        Self {
            state: Mutex::new(ClusterState {
                calls: Vec::new(),
                applied: Vec::new(),
                deployments: BTreeSet::new(),
                exposures: BTreeSet::new(),
                replicas: 2,
                endpoints: 2,
                diagnostics: Vec::new(),
                addresses: vec![
                    NodeAddress {
                        kind: AddressKind::Internal,
                        address: "10.0.1.5".into(),
                    },
                    NodeAddress {
                        kind: AddressKind::External,
                        address: "54.1.2.3".into(),
                    },
                ],
                node_port: 31234,
                fail_applies: false,
                failing_replica_polls: 0,
                fail_diagnostics: false,
            }),
        }
    }

    pub fn with_replicas(self, replicas: u32) -> Self {
        self.set_replicas(replicas);
        self
    }

    pub fn with_endpoints(self, endpoints: usize) -> Self {
        self.state.lock().unwrap().endpoints = endpoints;
        self
    }

    pub fn with_diagnostic(self, diagnostic: PodDiagnostic) -> Self {
        self.state.lock().unwrap().diagnostics.push(diagnostic);
        self
    }

    pub fn set_replicas(&self, replicas: u32) {
        self.state.lock().unwrap().replicas = replicas;
    }

    pub fn fail_applies(&self) {
        self.state.lock().unwrap().fail_applies = true;
    }

    /// The next `count` replica polls fail
    pub fn fail_replica_polls(&self, count: u32) {
        self.state.lock().unwrap().failing_replica_polls = count;
    }

    pub fn fail_diagnostics(&self) {
        self.state.lock().unwrap().fail_diagnostics = true;
    }

    /// Pretend `name` was deployed earlier
    pub fn insert(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.deployments.insert(name.to_string());
        state.exposures.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn applied(&self) -> Vec<String> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn deployments(&self) -> Vec<String> {
        self.state.lock().unwrap().deployments.iter().cloned().collect()
    }

    fn call(&self, what: String) -> std::sync::MutexGuard<'_, ClusterState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(what);
        state
    }
}

/// `metadata.name` of the first document in a rendered manifest
fn manifest_name(yaml: &str) -> Option<String> {
    yaml.lines()
        .find_map(|line| line.strip_prefix("  name: "))
        .map(str::to_string)
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn ensure_context(&self, cluster: &str, _region: &str) -> Result<(), AdapterError> {
        self.call(format!("context {}", cluster));
        Ok(())
    }

    async fn apply(&self, manifest_yaml: &str) -> Result<(), AdapterError> {
        let mut state = self.call("apply".into());
        if state.fail_applies {
            return Err(AdapterError::failed("kubectl apply failed (exit 1): forbidden"));
        }
        state.applied.push(manifest_yaml.to_string());
        if let Some(name) = manifest_name(manifest_yaml) {
            state.deployments.insert(name.clone());
            state.exposures.insert(name);
        }
        Ok(())
    }

    async fn available_replicas(&self, name: &str) -> Result<u32, AdapterError> {
        let mut state = self.call(format!("replicas {}", name));
        if state.failing_replica_polls > 0 {
            state.failing_replica_polls -= 1;
            return Err(AdapterError::failed("kubectl get deployment: connection reset"));
        }
        Ok(state.replicas)
    }

    async fn pod_diagnostics(&self, name: &str) -> Result<Vec<PodDiagnostic>, AdapterError> {
        let state = self.call(format!("pods {}", name));
        if state.fail_diagnostics {
            return Err(AdapterError::failed("kubectl get pods: connection reset"));
        }
        Ok(state.diagnostics.clone())
    }

    async fn node_addresses(&self) -> Result<Vec<NodeAddress>, AdapterError> {
        Ok(self.call("nodes".into()).addresses.clone())
    }

    async fn node_port(&self, name: &str) -> Result<u16, AdapterError> {
        Ok(self.call(format!("node-port {}", name)).node_port)
    }

    async fn ready_endpoints(&self, name: &str) -> Result<usize, AdapterError> {
        Ok(self.call(format!("endpoints {}", name)).endpoints)
    }

    async fn delete_deployment(&self, name: &str) -> Result<(), AdapterError> {
        let mut state = self.call(format!("delete deployment {}", name));
        if state.deployments.remove(name) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }

    async fn delete_exposure(&self, name: &str) -> Result<(), AdapterError> {
        let mut state = self.call(format!("delete service {}", name));
        if state.exposures.remove(name) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }

    async fn rollout_undo(&self, name: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let state = self.call(format!("rollout undo {}", name));
        if state.deployments.contains(name) {
            Ok(())
        } else {
            Err(AdapterError::AlreadyAbsent)
        }
    }
}

// =============================================================================
// Prompt
// =============================================================================

pub struct FakePrompt {
    answer: Mutex<bool>,
    asked: Mutex<usize>,
}

impl Default for FakePrompt {
    fn default() -> Self {
        Self {
            answer: Mutex::new(true),
            asked: Mutex::new(0),
        }
    }
}

impl FakePrompt {
    pub fn answer(&self, answer: bool) {
        *self.answer.lock().unwrap() = answer;
    }

    pub fn asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

#[async_trait]
impl OperatorPrompt for FakePrompt {
    async fn confirm(&self, _question: &str) -> bool {
        *self.asked.lock().unwrap() += 1;
        *self.answer.lock().unwrap()
    }
}

// =============================================================================
// All of them
// =============================================================================

pub struct Fakes {
    pub source: Arc<FakeSource>,
    pub registry: Arc<FakeRegistry>,
    pub scanner: Arc<FakeScanner>,
    pub cluster: Arc<FakeCluster>,
    pub store: Arc<FakeStore>,
    pub prompt: Arc<FakePrompt>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            source: Arc::new(FakeSource::default()),
            registry: Arc::new(FakeRegistry::default()),
            scanner: Arc::new(FakeScanner::default()),
            cluster: Arc::new(FakeCluster::ready()),
            store: Arc::new(FakeStore::default()),
            prompt: Arc::new(FakePrompt::default()),
        }
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            source: Some(self.source.clone()),
            registry: Some(self.registry.clone()),
            scanner: self.scanner.clone(),
            cluster: self.cluster.clone(),
            store: self.store.clone(),
            prompt: self.prompt.clone(),
        }
    }

    /// A bare record with nothing behind it
    pub async fn seed_service(&self, name: &str, status: ServiceStatus) -> ServiceDescriptor {
        let now = Utc::now();
        let descriptor = ServiceDescriptor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: ServiceKind::Api,
            description: "seeded".to_string(),
            developer: "alice".to_string(),
            image: None,
            source_url: None,
            url: None,
            status,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_service(descriptor.clone());
        descriptor
    }

    /// A running service with a repository, an image and cluster resources
    pub async fn seed_deployed_service(&self, name: &str) -> ServiceDescriptor {
        let repo = self.source.ensure_repository(name, "seeded").await.unwrap();
        let image = self.registry.image_ref(name);
        self.registry.push(&image).await.unwrap();
        self.cluster.insert(name);

        let mut descriptor = self.seed_service(name, ServiceStatus::Running).await;
        descriptor.source_url = Some(repo.url);
        descriptor.image = Some(image);
        descriptor.url = Some("http://54.1.2.3:31234".to_string());
        self.store.insert_service(descriptor.clone());
        descriptor
    }
}
