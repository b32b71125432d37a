//! Engine error taxonomy

use std::fmt;

use strata_core::domain::pipeline::{Stage, TransitionError};

/// External collaborator an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSystem {
    SourceHost,
    Registry,
    Scanner,
    Cluster,
    RecordStore,
}

impl fmt::Display for ExternalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalSystem::SourceHost => "source host",
            ExternalSystem::Registry => "image registry",
            ExternalSystem::Scanner => "scanner",
            ExternalSystem::Cluster => "cluster",
            ExternalSystem::RecordStore => "record store",
        };
        f.write_str(name)
    }
}

/// Failure reported by an adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The resource does not exist; teardown treats this as done
    #[error("already absent")]
    AlreadyAbsent,

    /// The external system refused because of a competing resource
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Failed(String),
}

impl AdapterError {
    pub fn failed(message: impl Into<String>) -> Self {
        AdapterError::Failed(message.into())
    }
}

impl From<strata_client::ClientError> for AdapterError {
    fn from(err: strata_client::ClientError) -> Self {
        if err.is_not_found() {
            AdapterError::AlreadyAbsent
        } else if err.is_conflict() {
            AdapterError::Conflict(err.to_string())
        } else {
            AdapterError::Failed(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{system} call failed: {cause}")]
    External {
        system: ExternalSystem,
        cause: AdapterError,
    },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("another run is already active: {0}")]
    RunConflict(String),

    #[error("aborted by operator")]
    AbortedByOperator,

    #[error("pipeline failed at stage {stage}: {cause}")]
    PipelineFailed {
        stage: Stage,
        cause: Box<EngineError>,
        /// Completed external effects, oldest first
        side_effects: Vec<String>,
    },

    #[error("invalid pipeline transition: {0}")]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn external(system: ExternalSystem) -> impl FnOnce(AdapterError) -> EngineError {
        move |cause| EngineError::External { system, cause }
    }

    /// Side effects completed before the failure, if any
    pub fn side_effects(&self) -> &[String] {
        match self {
            EngineError::PipelineFailed { side_effects, .. } => side_effects,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
