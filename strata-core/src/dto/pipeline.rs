//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{RunKind, RunStatus, Stage};

/// Request to open a new pipeline run for a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRun {
    pub kind: RunKind,
}

/// Incremental update of a pipeline run, sent by the engine as it progresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Log lines to append
    #[serde(default)]
    pub logs: Vec<String>,
}

impl RunUpdate {
    pub fn progress(stage: Stage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            status: Some(RunStatus::Running),
            progress: Some(progress),
            logs: vec![message.into()],
        }
    }

    pub fn finished(status: RunStatus, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            status: Some(status),
            progress: None,
            logs: vec![message.into()],
        }
    }
}
