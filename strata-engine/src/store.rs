//! Record store access
//!
//! The engine reads and writes service records and pipeline runs through
//! [`RecordStore`]; [`StrataClient`] is the production implementation.

use async_trait::async_trait;
use strata_client::StrataClient;
use strata_core::domain::pipeline::{PipelineRun, RunKind};
use strata_core::domain::service::ServiceDescriptor;
use strata_core::dto::pipeline::RunUpdate;
use strata_core::dto::service::{RegisterService, UpdateService};
use uuid::Uuid;

use crate::error::AdapterError;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_service(&self, name: &str) -> Result<Option<ServiceDescriptor>, AdapterError>;

    async fn register_service(
        &self,
        req: &RegisterService,
    ) -> Result<ServiceDescriptor, AdapterError>;

    async fn update_service(
        &self,
        name: &str,
        req: &UpdateService,
    ) -> Result<ServiceDescriptor, AdapterError>;

    async fn delete_service(&self, name: &str) -> Result<(), AdapterError>;

    /// Open a run; [`AdapterError::Conflict`] while another is active
    async fn open_run(&self, name: &str, kind: RunKind) -> Result<PipelineRun, AdapterError>;

    async fn update_run(&self, id: Uuid, update: &RunUpdate) -> Result<PipelineRun, AdapterError>;

    async fn latest_run(&self, name: &str) -> Result<Option<PipelineRun>, AdapterError>;

    async fn request_rollback(&self, name: &str) -> Result<PipelineRun, AdapterError>;
}

#[async_trait]
impl RecordStore for StrataClient {
    async fn find_service(&self, name: &str) -> Result<Option<ServiceDescriptor>, AdapterError> {
        Ok(StrataClient::find_service(self, name).await?)
    }

    async fn register_service(
        &self,
        req: &RegisterService,
    ) -> Result<ServiceDescriptor, AdapterError> {
        Ok(StrataClient::register_service(self, req).await?)
    }

    async fn update_service(
        &self,
        name: &str,
        req: &UpdateService,
    ) -> Result<ServiceDescriptor, AdapterError> {
        Ok(StrataClient::update_service(self, name, req).await?)
    }

    async fn delete_service(&self, name: &str) -> Result<(), AdapterError> {
        Ok(StrataClient::delete_service(self, name).await?)
    }

    async fn open_run(&self, name: &str, kind: RunKind) -> Result<PipelineRun, AdapterError> {
        Ok(StrataClient::open_run(self, name, kind).await?)
    }

    async fn update_run(&self, id: Uuid, update: &RunUpdate) -> Result<PipelineRun, AdapterError> {
        Ok(StrataClient::update_run(self, id, update).await?)
    }

    async fn latest_run(&self, name: &str) -> Result<Option<PipelineRun>, AdapterError> {
        match StrataClient::latest_run(self, name).await {
            Ok(run) => Ok(Some(run)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn request_rollback(&self, name: &str) -> Result<PipelineRun, AdapterError> {
        Ok(StrataClient::request_rollback(self, name).await?)
    }
}
