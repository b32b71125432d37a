//! Developer endpoints

use crate::StrataClient;
use crate::error::Result;
use reqwest::Method;
use strata_core::domain::developer::Developer;
use strata_core::dto::developer::CreateDeveloper;
use uuid::Uuid;

impl StrataClient {
    pub async fn create_developer(&self, req: &CreateDeveloper) -> Result<Developer> {
        let response = self
            .request(Method::POST, "/developers")
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn list_developers(&self) -> Result<Vec<Developer>> {
        let response = self.request(Method::GET, "/developers").send().await?;

        self.handle_response(response).await
    }

    pub async fn get_developer(&self, id: Uuid) -> Result<Developer> {
        let response = self
            .request(Method::GET, &format!("/developers/{}", id))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
