//! Pipeline orchestration
//!
//! [`PipelineOrchestrator::create`] takes a local folder through
//! validate, scan, publish_source, build_image, register and deploy.
//! [`PipelineOrchestrator::deploy`] re-enters at the deploy stage for a
//! registered service. Each run is opened in the record store first (which
//! rejects a second active run for the same service) and every change is
//! emitted as a progress event.
//!
//! A failing stage ends the run `failed` with the cause in its log. Nothing
//! is undone automatically: the error carries the side effects completed so
//! far so the caller can report them.

use std::path::PathBuf;
use std::sync::Arc;

use strata_core::domain::pipeline::{PipelineRun, RunKind, RunStatus, Stage, StagePlan};
use strata_core::domain::service::{
    ServiceDescriptor, ServiceKind, ServiceStatus, validate_service_name,
};
use strata_core::dto::service::{RegisterService, UpdateService};
use strata_core::manifest::{self, ManifestInput};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::Cluster;
use crate::deployer::{ClusterDeployer, DeployStep, DeploymentReport};
use crate::error::{AdapterError, EngineError, ExternalSystem, Result};
use crate::progress::{ProgressSender, RunTracker};
use crate::prompt::OperatorPrompt;
use crate::registry::ImageRegistry;
use crate::scanner::{ScanReport, Scanner};
use crate::settings::EngineSettings;
use crate::source::SourceHost;
use crate::store::RecordStore;
use crate::teardown::TeardownCoordinator;
use crate::template;

/// External collaborators of a run
///
/// Source host and registry are optional because a run that skips the
/// source stages needs neither credentials.
#[derive(Clone)]
pub struct Adapters {
    pub source: Option<Arc<dyn SourceHost>>,
    pub registry: Option<Arc<dyn ImageRegistry>>,
    pub scanner: Arc<dyn Scanner>,
    pub cluster: Arc<dyn Cluster>,
    pub store: Arc<dyn RecordStore>,
    pub prompt: Arc<dyn OperatorPrompt>,
}

impl Adapters {
    fn source(&self) -> Result<&Arc<dyn SourceHost>> {
        self.source.as_ref().ok_or_else(|| {
            EngineError::Configuration(
                "source hosting is not configured; set github_owner and github_token".into(),
            )
        })
    }

    fn registry(&self) -> Result<&Arc<dyn ImageRegistry>> {
        self.registry.as_ref().ok_or_else(|| {
            EngineError::Configuration(
                "image registry is not configured; set registry_namespace".into(),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub name: String,
    pub kind: ServiceKind,
    pub description: String,
    /// Owning developer reference
    pub developer: String,
    /// Folder holding the service source
    pub location: PathBuf,
    pub port: Option<u16>,
    pub plan: StagePlan,
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub name: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub descriptor: ServiceDescriptor,
    pub scan: Option<ScanReport>,
    pub deployment: Option<DeploymentReport>,
    pub side_effects: Vec<String>,
}

/// What earlier create stages produced
#[derive(Debug, Default)]
struct CreateState {
    scan: Option<ScanReport>,
    source_url: Option<String>,
    image: Option<String>,
    image_port: Option<u16>,
    descriptor: Option<ServiceDescriptor>,
    deployment: Option<DeploymentReport>,
}

pub struct PipelineOrchestrator {
    adapters: Adapters,
    settings: EngineSettings,
    events: ProgressSender,
}

impl PipelineOrchestrator {
    pub fn new(adapters: Adapters, settings: EngineSettings, events: ProgressSender) -> Self {
        Self {
            adapters,
            settings,
            events,
        }
    }

    pub fn deployer(&self) -> ClusterDeployer {
        ClusterDeployer::new(
            self.adapters.cluster.clone(),
            self.adapters.store.clone(),
            self.settings.clone(),
        )
    }

    pub fn teardown_coordinator(&self) -> TeardownCoordinator {
        TeardownCoordinator::new(
            self.adapters.source.clone(),
            self.adapters.registry.clone(),
            self.adapters.cluster.clone(),
            self.adapters.store.clone(),
        )
    }

    // =============================================================================
    // Create
    // =============================================================================

    pub async fn create(&self, req: CreateRequest) -> Result<PipelineOutcome> {
        self.check_create(&req)?;
        self.check_name_free(&req.name).await?;

        let run = self.open_run(&req.name, RunKind::Create).await?;
        info!("Create run {} opened for {}", run.id, req.name);
        let mut tracker = RunTracker::new(run, req.plan.clone(), self.events.clone());
        let mut state = CreateState::default();

        match self.run_create(&req, &mut tracker, &mut state).await {
            Ok(()) => {
                let descriptor = state.descriptor.ok_or_else(|| {
                    EngineError::Validation("create finished without a service record".into())
                })?;
                let summary = match &state.deployment {
                    Some(report) if report.ready => format!("{} is running", req.name),
                    Some(_) => format!("{} deployed but not confirmed ready", req.name),
                    None => format!("{} registered", req.name),
                };
                tracker.finish(RunStatus::Success, summary)?;
                Ok(PipelineOutcome {
                    run_id: tracker.run_id(),
                    descriptor,
                    scan: state.scan,
                    deployment: state.deployment,
                    side_effects: tracker.take_side_effects(),
                })
            }
            Err(e) => Err(self.fail(&mut tracker, e)),
        }
    }

    /// Local checks; nothing external has happened when these fail
    fn check_create(&self, req: &CreateRequest) -> Result<()> {
        validate_service_name(&req.name).map_err(EngineError::Validation)?;
        self.settings.validate()?;

        let plan = &req.plan;
        if plan.includes(Stage::PublishSource) {
            self.adapters.source()?;
        }
        if plan.includes(Stage::BuildImage) {
            self.adapters.registry()?;
        }
        if plan.includes(Stage::Deploy) {
            self.settings.require_cluster()?;
            if !plan.includes(Stage::BuildImage) {
                return Err(EngineError::Validation(
                    "deploying needs a built image; combine --skip-source with --skip-deploy"
                        .into(),
                ));
            }
        }

        let reads_folder = [Stage::Scan, Stage::PublishSource, Stage::BuildImage]
            .into_iter()
            .any(|s| plan.includes(s));
        if reads_folder && !req.location.is_dir() {
            return Err(EngineError::Validation(format!(
                "{} is not a directory",
                req.location.display()
            )));
        }

        Ok(())
    }

    async fn run_create(
        &self,
        req: &CreateRequest,
        tracker: &mut RunTracker,
        state: &mut CreateState,
    ) -> Result<()> {
        let mut next = tracker.plan().first();
        while let Some(stage) = next {
            match stage {
                Stage::Validate => self.validate(req, tracker).await?,
                Stage::Scan => self.scan(req, tracker, state).await?,
                Stage::PublishSource => self.publish_source(req, tracker, state).await?,
                Stage::BuildImage => self.build_image(req, tracker, state).await?,
                Stage::Register => self.register(req, tracker, state).await?,
                Stage::Deploy => {
                    tracker.enter(Stage::Deploy, format!("deploying {}", req.name))?;
                    let image = state.image.clone().ok_or_else(|| {
                        EngineError::Validation(format!("{} has no image to deploy", req.name))
                    })?;
                    let (descriptor, report) = self
                        .deploy_stage(tracker, &req.name, req.kind, &image, req.port, state.image_port)
                        .await?;
                    state.descriptor = Some(descriptor);
                    state.deployment = Some(report);
                }
                Stage::Rollback => {
                    return Err(EngineError::Validation(
                        "rollback is not a create stage".into(),
                    ));
                }
            }
            next = tracker.plan().next(stage);
        }
        Ok(())
    }

    /// A taken name is rejected before any run is recorded against it
    async fn check_name_free(&self, name: &str) -> Result<()> {
        let existing = self
            .adapters
            .store
            .find_service(name)
            .await
            .map_err(EngineError::external(ExternalSystem::RecordStore))?;
        if existing.is_some() {
            return Err(EngineError::Validation(format!(
                "service '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    async fn validate(&self, req: &CreateRequest, tracker: &mut RunTracker) -> Result<()> {
        tracker.enter(Stage::Validate, format!("validating {}", req.name))?;
        tracker.step(100, format!("{} is available", req.name));
        Ok(())
    }

    async fn scan(
        &self,
        req: &CreateRequest,
        tracker: &mut RunTracker,
        state: &mut CreateState,
    ) -> Result<()> {
        tracker.enter(Stage::Scan, format!("scanning {}", req.location.display()))?;

        let report = self
            .adapters
            .scanner
            .scan(&req.location)
            .await
            .map_err(EngineError::external(ExternalSystem::Scanner))?;
        tracker.step(80, format!("scan finished: {}", report.summary()));

        if report.has_critical() {
            for finding in report.criticals() {
                tracker.log(format!(
                    "critical: {} at {}:{} ({})",
                    finding.rule, finding.path, finding.line, finding.message
                ));
            }
            let question = format!(
                "{} critical finding(s) in {}. Continue anyway?",
                report.count(crate::scanner::Severity::Critical),
                req.name
            );
            if !self.adapters.prompt.confirm(&question).await {
                return Err(EngineError::AbortedByOperator);
            }
            tracker.log("critical findings accepted by operator");
        }

        tracker.step(100, "scan accepted");
        state.scan = Some(report);
        Ok(())
    }

    async fn publish_source(
        &self,
        req: &CreateRequest,
        tracker: &mut RunTracker,
        state: &mut CreateState,
    ) -> Result<()> {
        tracker.enter(Stage::PublishSource, "publishing source")?;
        let source = self.adapters.source()?;

        let repo = source
            .ensure_repository(&req.name, &req.description)
            .await
            .map_err(EngineError::external(ExternalSystem::SourceHost))?;
        if repo.created {
            tracker.side_effect(format!("source repository created: {}", repo.url));
        } else {
            tracker.log(format!("reusing source repository {}", repo.url));
        }
        tracker.step(40, "repository ready");

        source
            .push_folder(&req.location, &repo)
            .await
            .map_err(EngineError::external(ExternalSystem::SourceHost))?;
        tracker.side_effect(format!("source pushed to {} (main)", repo.url));
        tracker.step(100, "source published");

        state.source_url = Some(repo.url);
        Ok(())
    }

    async fn build_image(
        &self,
        req: &CreateRequest,
        tracker: &mut RunTracker,
        state: &mut CreateState,
    ) -> Result<()> {
        tracker.enter(Stage::BuildImage, "building image")?;
        let registry = self.adapters.registry()?;

        if template::ensure_dockerfile(&req.location, req.kind)? {
            tracker.side_effect(format!(
                "generated {} Dockerfile in {}",
                req.kind,
                req.location.display()
            ));
        }

        let image = registry.image_ref(&req.name);
        tracker.step(10, format!("docker build {}", image));
        registry
            .build(&req.location, &image)
            .await
            .map_err(EngineError::external(ExternalSystem::Registry))?;
        tracker.step(70, format!("built {}", image));

        registry
            .push(&image)
            .await
            .map_err(EngineError::external(ExternalSystem::Registry))?;
        tracker.side_effect(format!("image pushed: {}", image));

        state.image_port = inspect_port(registry.as_ref(), &image).await;
        tracker.step(100, "image published");

        state.image = Some(image);
        Ok(())
    }

    async fn register(
        &self,
        req: &CreateRequest,
        tracker: &mut RunTracker,
        state: &mut CreateState,
    ) -> Result<()> {
        tracker.enter(Stage::Register, "registering service")?;

        let registration = RegisterService {
            name: req.name.clone(),
            kind: req.kind,
            description: req.description.clone(),
            developer: req.developer.clone(),
            image: state.image.clone(),
            source_url: state.source_url.clone(),
        };
        let descriptor = self
            .adapters
            .store
            .register_service(&registration)
            .await
            .map_err(|e| match e {
                AdapterError::Conflict(_) => {
                    EngineError::Validation(format!("service '{}' already exists", req.name))
                }
                other => EngineError::External {
                    system: ExternalSystem::RecordStore,
                    cause: other,
                },
            })?;

        tracker.side_effect(format!("service record registered: {}", descriptor.name));
        tracker.step(100, "registered");
        state.descriptor = Some(descriptor);
        Ok(())
    }

    // =============================================================================
    // Deploy
    // =============================================================================

    pub async fn deploy(&self, req: DeployRequest) -> Result<PipelineOutcome> {
        validate_service_name(&req.name).map_err(EngineError::Validation)?;
        self.settings.validate()?;
        self.settings.require_cluster()?;

        let descriptor = self
            .adapters
            .store
            .find_service(&req.name)
            .await
            .map_err(EngineError::external(ExternalSystem::RecordStore))?
            .ok_or_else(|| {
                EngineError::Validation(format!("service '{}' is not registered", req.name))
            })?;
        let image = descriptor.image.clone().ok_or_else(|| {
            EngineError::Validation(format!(
                "service '{}' has no image; it was created without its source",
                req.name
            ))
        })?;

        let run = self.open_run(&req.name, RunKind::Deploy).await?;
        info!("Deploy run {} opened for {}", run.id, req.name);
        let mut tracker = RunTracker::new(run, StagePlan::single(Stage::Deploy), self.events.clone());

        let result: Result<(ServiceDescriptor, DeploymentReport)> = async {
            tracker.enter(Stage::Deploy, format!("deploying {}", image))?;
            let image_port = match &self.adapters.registry {
                Some(registry) => inspect_port(registry.as_ref(), &image).await,
                None => None,
            };
            self.deploy_stage(
                &mut tracker,
                &req.name,
                descriptor.kind,
                &image,
                req.port,
                image_port,
            )
            .await
        }
        .await;

        match result {
            Ok((descriptor, report)) => {
                let summary = if report.ready {
                    format!("{} is running", req.name)
                } else {
                    format!("{} deployed but not confirmed ready", req.name)
                };
                tracker.finish(RunStatus::Success, summary)?;
                Ok(PipelineOutcome {
                    run_id: tracker.run_id(),
                    descriptor,
                    scan: None,
                    deployment: Some(report),
                    side_effects: tracker.take_side_effects(),
                })
            }
            Err(e) => Err(self.fail(&mut tracker, e)),
        }
    }

    /// Ask the record store to roll the service back; returns the rollback run
    pub async fn rollback(&self, name: &str) -> Result<PipelineRun> {
        validate_service_name(name).map_err(EngineError::Validation)?;
        self.deployer().rollback(name).await
    }

    /// Mark the record deploying, apply and confirm, then record the result
    async fn deploy_stage(
        &self,
        tracker: &mut RunTracker,
        name: &str,
        kind: ServiceKind,
        image: &str,
        port: Option<u16>,
        image_port: Option<u16>,
    ) -> Result<(ServiceDescriptor, DeploymentReport)> {
        let store = &self.adapters.store;
        store
            .update_service(name, &UpdateService::status(ServiceStatus::Deploying))
            .await
            .map_err(EngineError::external(ExternalSystem::RecordStore))?;

        let manifest = manifest::generate(&ManifestInput {
            name: name.to_string(),
            image: image.to_string(),
            kind,
            port,
            image_port,
        });
        tracker.log(format!(
            "manifest: {} replicas of {} on port {}",
            manifest::REPLICAS,
            image,
            manifest.port()
        ));

        let deployed = self
            .deployer()
            .deploy(&manifest, |step, message| {
                if step == DeployStep::Applied {
                    tracker.side_effect(format!("cluster resources applied: {}", name));
                }
                tracker.step(step.percent_of_stage(), message);
            })
            .await;

        let report = match deployed {
            Ok(report) => report,
            Err(e) => {
                if let Err(update) = store
                    .update_service(name, &UpdateService::status(ServiceStatus::Failed))
                    .await
                {
                    warn!("Could not mark {} failed: {}", name, update);
                }
                return Err(e);
            }
        };

        let status = if report.ready {
            ServiceStatus::Running
        } else {
            ServiceStatus::Unready
        };
        let update = UpdateService {
            url: report.access.as_ref().map(ToString::to_string),
            status: Some(status),
            ..Default::default()
        };
        let descriptor = store
            .update_service(name, &update)
            .await
            .map_err(EngineError::external(ExternalSystem::RecordStore))?;

        Ok((descriptor, report))
    }

    // =============================================================================
    // Helpers
    // =============================================================================

    async fn open_run(&self, name: &str, kind: RunKind) -> Result<PipelineRun> {
        self.adapters
            .store
            .open_run(name, kind)
            .await
            .map_err(|e| match e {
                AdapterError::Conflict(_) => {
                    EngineError::RunConflict(format!("a pipeline for '{}' is already running", name))
                }
                other => EngineError::External {
                    system: ExternalSystem::RecordStore,
                    cause: other,
                },
            })
    }

    /// End the run as failed and shape the error for the caller
    fn fail(&self, tracker: &mut RunTracker, err: EngineError) -> EngineError {
        let stage = tracker.stage();
        let message = match &err {
            EngineError::AbortedByOperator => "aborted by operator".to_string(),
            other => format!("{} failed: {}", stage, other),
        };
        warn!("Run {}: {}", tracker.run_id(), message);
        if let Err(e) = tracker.finish(RunStatus::Failed, message) {
            warn!("Run {} could not be finished: {}", tracker.run_id(), e);
        }

        match err {
            EngineError::Validation(_)
            | EngineError::Configuration(_)
            | EngineError::AbortedByOperator
            | EngineError::RunConflict(_) => err,
            cause => EngineError::PipelineFailed {
                stage,
                cause: Box::new(cause),
                side_effects: tracker.take_side_effects(),
            },
        }
    }
}

/// Port declared by `image`; an inspection failure only loses the hint
async fn inspect_port(registry: &dyn ImageRegistry, image: &str) -> Option<u16> {
    match registry.exposed_port(image).await {
        Ok(port) => port,
        Err(e) => {
            warn!("Could not inspect {}: {}", image, e);
            None
        }
    }
}
