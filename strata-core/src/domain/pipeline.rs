//! Pipeline domain types
//!
//! A [`PipelineRun`] is one attempt to advance a service through the
//! ordered [`Stage`]s. Movement between stages only happens through
//! [`PipelineRun::enter`], which checks the move against a [`StagePlan`],
//! and progress never decreases within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::dto::pipeline::RunUpdate;

/// A discrete, ordered phase of a pipeline run
///
/// The derived ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Scan,
    PublishSource,
    BuildImage,
    Register,
    Deploy,
    Rollback,
}

impl Stage {
    /// Stages of a create run, in order
    pub const CREATE_ORDER: [Stage; 6] = [
        Stage::Validate,
        Stage::Scan,
        Stage::PublishSource,
        Stage::BuildImage,
        Stage::Register,
        Stage::Deploy,
    ];

    /// Progress band (start, end) in percent
    pub fn band(self) -> (u8, u8) {
        match self {
            Stage::Validate => (0, 5),
            Stage::Scan => (5, 20),
            Stage::PublishSource => (20, 40),
            Stage::BuildImage => (40, 70),
            Stage::Register => (70, 80),
            Stage::Deploy => (80, 100),
            Stage::Rollback => (0, 100),
        }
    }

    /// Whether a caller option may leave this stage out of a create run
    pub fn is_skippable(self) -> bool {
        matches!(
            self,
            Stage::Scan | Stage::PublishSource | Stage::BuildImage | Stage::Deploy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Scan => "scan",
            Stage::PublishSource => "publish_source",
            Stage::BuildImage => "build_image",
            Stage::Register => "register",
            Stage::Deploy => "deploy",
            Stage::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate" => Ok(Stage::Validate),
            "scan" => Ok(Stage::Scan),
            "publish_source" => Ok(Stage::PublishSource),
            "build_image" => Ok(Stage::BuildImage),
            "register" => Ok(Stage::Register),
            "deploy" => Ok(Stage::Deploy),
            "rollback" => Ok(Stage::Rollback),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

/// Which stages a run will execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: BTreeSet<Stage>,
}

impl StagePlan {
    /// Every create stage
    pub fn create() -> Self {
        Self {
            stages: Stage::CREATE_ORDER.into_iter().collect(),
        }
    }

    /// A plan holding a single stage (deploy and rollback runs)
    pub fn single(stage: Stage) -> Self {
        Self {
            stages: BTreeSet::from([stage]),
        }
    }

    pub fn skip_scan(mut self) -> Self {
        self.skip(Stage::Scan);
        self
    }

    /// Skips source publishing and the image build that depends on it
    pub fn skip_source(mut self) -> Self {
        self.skip(Stage::PublishSource);
        self.skip(Stage::BuildImage);
        self
    }

    pub fn skip_deploy(mut self) -> Self {
        self.skip(Stage::Deploy);
        self
    }

    fn skip(&mut self, stage: Stage) {
        debug_assert!(stage.is_skippable());
        if stage.is_skippable() {
            self.stages.remove(&stage);
        }
    }

    pub fn includes(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn first(&self) -> Option<Stage> {
        self.stages.iter().next().copied()
    }

    /// The stage that follows `current` in this plan
    pub fn next(&self, current: Stage) -> Option<Stage> {
        self.stages.range(current..).find(|s| **s > current).copied()
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().copied()
    }
}

/// What a run is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Create,
    Deploy,
    Rollback,
}

impl RunKind {
    pub fn first_stage(self) -> Stage {
        match self {
            RunKind::Create => Stage::Validate,
            RunKind::Deploy => Stage::Deploy,
            RunKind::Rollback => Stage::Rollback,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::Create => "create",
            RunKind::Deploy => "deploy",
            RunKind::Rollback => "rollback",
        }
    }
}

impl std::str::FromStr for RunKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(RunKind::Create),
            "deploy" => Ok(RunKind::Deploy),
            "rollback" => Ok(RunKind::Rollback),
            other => Err(format!("unknown run kind '{}'", other)),
        }
    }
}

/// Run status as reported by the pipeline status API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// Invalid movement of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("run already finished with status {0}")]
    Finished(RunStatus),

    #[error("cannot move from {from} back to {to}")]
    NotForward { from: Stage, to: Stage },

    #[error("stage {0} is not part of this run")]
    NotPlanned(Stage),

    #[error("cannot move from {from} to {to} without running {missing}")]
    SkipsRequired {
        from: Stage,
        to: Stage,
        missing: Stage,
    },

    #[error("{0} is not a terminal status")]
    NotTerminal(RunStatus),
}

/// One attempt to advance a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub service_name: String,
    pub kind: RunKind,
    pub stage: Stage,
    pub status: RunStatus,
    pub progress: u8,
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(service_name: impl Into<String>, kind: RunKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service_name: service_name.into(),
            kind,
            stage: kind.first_stage(),
            status: RunStatus::Pending,
            progress: 0,
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the run into `stage`
    ///
    /// The first call may re-enter the initial stage of a pending run.
    /// Every later call must move strictly forward and may only pass over
    /// stages the plan leaves out.
    pub fn enter(&mut self, stage: Stage, plan: &StagePlan) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Finished(self.status));
        }
        if !plan.includes(stage) {
            return Err(TransitionError::NotPlanned(stage));
        }

        let first_entry = self.status == RunStatus::Pending && stage == self.stage;
        if !first_entry {
            if stage <= self.stage {
                return Err(TransitionError::NotForward {
                    from: self.stage,
                    to: stage,
                });
            }
            if let Some(missing) = plan.next(self.stage).filter(|next| *next != stage) {
                return Err(TransitionError::SkipsRequired {
                    from: self.stage,
                    to: stage,
                    missing,
                });
            }
        }

        self.stage = stage;
        self.status = RunStatus::Running;
        self.raise_progress(stage.band().0);
        Ok(())
    }

    /// Record sub-step progress inside the current stage
    ///
    /// `percent_of_stage` (0-100) is interpolated into the stage band.
    /// Returns the overall progress after the update.
    pub fn advance_within(&mut self, percent_of_stage: u8) -> u8 {
        let (start, end) = self.stage.band();
        let span = u16::from(end - start);
        let offset = span * u16::from(percent_of_stage.min(100)) / 100;
        self.raise_progress(start + offset as u8);
        self.progress
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(message.into());
        self.updated_at = Utc::now();
    }

    /// Finish the run; allowed exactly once
    pub fn finish(&mut self, status: RunStatus) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Finished(self.status));
        }
        if !status.is_terminal() {
            return Err(TransitionError::NotTerminal(status));
        }

        self.status = status;
        if status == RunStatus::Success {
            self.raise_progress(100);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply an update received over the wire
    ///
    /// Used by the record store, which only sees the run through updates:
    /// stages must not move backwards, progress is clamped so it never
    /// decreases, and terminal runs reject further changes.
    pub fn apply(&mut self, update: &RunUpdate) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Finished(self.status));
        }

        if let Some(stage) = update.stage {
            if stage < self.stage {
                return Err(TransitionError::NotForward {
                    from: self.stage,
                    to: stage,
                });
            }
            self.stage = stage;
        }
        if let Some(progress) = update.progress {
            self.raise_progress(progress.min(100));
        }
        self.logs.extend(update.logs.iter().cloned());

        match update.status {
            Some(status) if status.is_terminal() => self.finish(status)?,
            Some(RunStatus::Running) => self.status = RunStatus::Running,
            _ => {}
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    fn raise_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value);
        self.updated_at = Utc::now();
    }
}
