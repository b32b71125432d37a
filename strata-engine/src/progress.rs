//! Progress reporting
//!
//! The orchestrator never writes run state itself. It emits a
//! [`ProgressEvent`] for every change on an unbounded channel, and the
//! consumer ([`forward`]) renders each event and pushes it to the record
//! store, so producing progress is decoupled from displaying it.

use strata_core::domain::pipeline::{PipelineRun, RunStatus, Stage, StagePlan, TransitionError};
use strata_core::dto::pipeline::RunUpdate;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub stage: Stage,
    pub status: RunStatus,
    pub progress: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn to_update(&self) -> RunUpdate {
        RunUpdate {
            stage: Some(self.stage),
            status: Some(self.status),
            progress: Some(self.progress),
            logs: vec![self.message.clone()],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Drain `events`, rendering each one and forwarding it to `store`
///
/// Returns once every sender is dropped. A failed store update is logged
/// and counted but does not stop rendering; the count is returned.
pub async fn forward<F>(mut events: ProgressReceiver, store: &dyn RecordStore, mut render: F) -> usize
where
    F: FnMut(&ProgressEvent),
{
    let mut failed = 0;
    while let Some(event) = events.recv().await {
        render(&event);
        if let Err(e) = store.update_run(event.run_id, &event.to_update()).await {
            warn!("Failed to record progress for run {}: {}", event.run_id, e);
            failed += 1;
        }
    }
    debug!("Progress channel closed");
    failed
}

/// Local mirror of a run that emits an event for every change
///
/// All stage movement goes through [`PipelineRun::enter`], so the events a
/// tracker emits are forward-only with non-decreasing progress.
pub(crate) struct RunTracker {
    run: PipelineRun,
    plan: StagePlan,
    events: ProgressSender,
    side_effects: Vec<String>,
}

impl RunTracker {
    pub fn new(run: PipelineRun, plan: StagePlan, events: ProgressSender) -> Self {
        Self {
            run,
            plan,
            events,
            side_effects: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run.id
    }

    pub fn stage(&self) -> Stage {
        self.run.stage
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn enter(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), TransitionError> {
        self.run.enter(stage, &self.plan)?;
        info!("Run {}: entering {}", self.run.id, stage);
        self.emit(message.into());
        Ok(())
    }

    /// Sub-step inside the current stage, `percent_of_stage` 0-100
    pub fn step(&mut self, percent_of_stage: u8, message: impl Into<String>) {
        self.run.advance_within(percent_of_stage);
        self.emit(message.into());
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.emit(message.into());
    }

    /// Record a completed external effect
    pub fn side_effect(&mut self, description: impl Into<String>) {
        let description = description.into();
        self.side_effects.push(description.clone());
        self.emit(description);
    }

    pub fn side_effects(&self) -> &[String] {
        &self.side_effects
    }

    pub fn take_side_effects(&mut self) -> Vec<String> {
        std::mem::take(&mut self.side_effects)
    }

    pub fn finish(&mut self, status: RunStatus, message: impl Into<String>) -> Result<(), TransitionError> {
        self.run.finish(status)?;
        info!("Run {} finished: {}", self.run.id, status);
        self.emit(message.into());
        Ok(())
    }

    fn emit(&mut self, message: String) {
        self.run.log(message.clone());
        let event = ProgressEvent {
            run_id: self.run.id,
            stage: self.run.stage,
            status: self.run.status,
            progress: self.run.progress,
            message,
        };
        if self.events.send(event).is_err() {
            debug!("Progress receiver dropped; event not delivered");
        }
    }
}
