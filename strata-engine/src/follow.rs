//! Polling a service's latest run until it finishes

use std::future::Future;
use std::time::Duration;

use strata_core::domain::pipeline::PipelineRun;
use tracing::debug;

use crate::error::{EngineError, ExternalSystem, Result};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub enum FollowOutcome {
    /// The run reached a terminal status
    Finished(PipelineRun),
    /// `cancel` completed first; the run is left untouched
    Interrupted(Option<PipelineRun>),
    /// The attempt bound ran out before the run finished
    GaveUp(Option<PipelineRun>),
}

/// Poll the latest run of `name` every `interval`, at most `attempts` times
///
/// `on_poll` sees every answer, including `None` while no run exists yet.
/// Completion of `cancel` (typically Ctrl-C) stops the loop between polls.
pub async fn follow_run<C, F>(
    store: &dyn RecordStore,
    name: &str,
    interval: Duration,
    attempts: u32,
    cancel: C,
    mut on_poll: F,
) -> Result<FollowOutcome>
where
    C: Future<Output = ()>,
    F: FnMut(Option<&PipelineRun>),
{
    tokio::pin!(cancel);
    let mut last = None;

    for attempt in 1..=attempts {
        let run = store
            .latest_run(name)
            .await
            .map_err(EngineError::external(ExternalSystem::RecordStore))?;
        on_poll(run.as_ref());

        if let Some(run) = &run {
            if run.is_terminal() {
                return Ok(FollowOutcome::Finished(run.clone()));
            }
        }
        last = run;

        if attempt == attempts {
            break;
        }
        tokio::select! {
            _ = &mut cancel => {
                debug!("Follow of {} interrupted after {} poll(s)", name, attempt);
                return Ok(FollowOutcome::Interrupted(last));
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(FollowOutcome::GaveUp(last))
}
