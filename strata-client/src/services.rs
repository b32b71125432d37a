//! Service registration endpoints

use crate::StrataClient;
use crate::error::Result;
use reqwest::Method;
use strata_core::domain::service::ServiceDescriptor;
use strata_core::dto::service::{RegisterService, ServiceFilter, UpdateService};

impl StrataClient {
    // =============================================================================
    // Service Management
    // =============================================================================

    /// Register a service in the tenant partition
    ///
    /// Fails with a 409 API error if the name is already taken.
    pub async fn register_service(&self, req: &RegisterService) -> Result<ServiceDescriptor> {
        let response = self
            .request(Method::POST, "/services")
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List services, optionally only those owned by `developer`
    pub async fn list_services(&self, developer: Option<&str>) -> Result<Vec<ServiceDescriptor>> {
        let filter = ServiceFilter {
            developer: developer.map(str::to_string),
        };
        let response = self
            .request(Method::GET, "/services")
            .query(&filter)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a service by name
    pub async fn get_service(&self, name: &str) -> Result<ServiceDescriptor> {
        let response = self
            .request(Method::GET, &format!("/services/{}", name))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a service by name, mapping "not found" to `None`
    pub async fn find_service(&self, name: &str) -> Result<Option<ServiceDescriptor>> {
        match self.get_service(name).await {
            Ok(service) => Ok(Some(service)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Apply a partial update to a service record
    pub async fn update_service(
        &self,
        name: &str,
        req: &UpdateService,
    ) -> Result<ServiceDescriptor> {
        let response = self
            .request(Method::PATCH, &format!("/services/{}", name))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a service record and its pipeline runs
    pub async fn delete_service(&self, name: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/services/{}", name))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
