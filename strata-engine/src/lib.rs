//! Strata deployment engine
//!
//! Runs the service pipeline from the operator's machine:
//!
//! - [`pipeline::PipelineOrchestrator`] drives create and deploy runs
//! - [`deployer::ClusterDeployer`] applies manifests and confirms readiness
//! - [`teardown::TeardownCoordinator`] removes everything a service left behind
//!
//! External systems sit behind narrow traits ([`source::SourceHost`],
//! [`registry::ImageRegistry`], [`scanner::Scanner`], [`cluster::Cluster`],
//! [`store::RecordStore`], [`prompt::OperatorPrompt`]) with one production
//! implementation each.

pub mod cluster;
pub mod deployer;
pub mod error;
pub mod follow;
pub mod pipeline;
mod process;
pub mod progress;
pub mod prompt;
pub mod registry;
pub mod scanner;
pub mod settings;
pub mod source;
pub mod store;
pub mod teardown;
mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AdapterError, EngineError, ExternalSystem, Result};
pub use pipeline::{Adapters, CreateRequest, DeployRequest, PipelineOrchestrator, PipelineOutcome};
pub use settings::EngineSettings;
