//! Pipeline run endpoints

use crate::StrataClient;
use crate::error::Result;
use reqwest::Method;
use strata_core::domain::pipeline::{PipelineRun, RunKind};
use strata_core::dto::pipeline::{OpenRun, RunUpdate};
use uuid::Uuid;

impl StrataClient {
    // =============================================================================
    // Pipeline Runs
    // =============================================================================

    /// Open a new run for a service
    ///
    /// The record store answers 409 while another run for the same service
    /// is still pending or running.
    pub async fn open_run(&self, service_name: &str, kind: RunKind) -> Result<PipelineRun> {
        let response = self
            .request(Method::POST, &format!("/services/{}/pipeline", service_name))
            .json(&OpenRun { kind })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Push progress, log lines or a terminal status for a run
    pub async fn update_run(&self, run_id: Uuid, update: &RunUpdate) -> Result<PipelineRun> {
        let response = self
            .request(Method::PUT, &format!("/pipelines/{}", run_id))
            .json(update)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Latest run for a service (the pipeline status API)
    pub async fn latest_run(&self, service_name: &str) -> Result<PipelineRun> {
        let response = self
            .request(Method::GET, &format!("/services/{}/pipeline", service_name))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Ask the record store to redeploy the previously accepted revision
    ///
    /// Returns immediately with the rollback run; poll [`Self::latest_run`]
    /// to observe completion.
    pub async fn request_rollback(&self, service_name: &str) -> Result<PipelineRun> {
        let response = self
            .request(Method::POST, &format!("/services/{}/rollback", service_name))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
