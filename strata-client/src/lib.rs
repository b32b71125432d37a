//! Strata HTTP Client
//!
//! A simple, type-safe HTTP client for the Strata record store API.
//!
//! Every request carries the caller's [`TenantKey`] in the `X-Tenant-Key`
//! header; the client cannot be constructed without one, so there is no
//! way to issue an unscoped call.
//!
//! # Example
//!
//! ```no_run
//! use strata_client::StrataClient;
//! use strata_core::tenant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = tenant::derive("alice@example.com", "ghp_token")?;
//!     let client = StrataClient::new("http://localhost:8080", key);
//!
//!     for service in client.list_services(None).await? {
//!         println!("{} ({})", service.name, service.status);
//!     }
//!     Ok(())
//! }
//! ```

mod developers;
pub mod error;
mod pipelines;
mod services;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use strata_core::tenant::{TENANT_HEADER, TenantKey};

/// HTTP client for the Strata record store API
///
/// Methods are organized into logical groups:
/// - Service registration (register, list, get, update, delete)
/// - Pipeline runs (open, update, latest, rollback)
/// - Developers
#[derive(Debug, Clone)]
pub struct StrataClient {
    /// Base URL of the record store (e.g., "http://localhost:8080")
    base_url: String,
    /// Partition selector attached to every request
    tenant: TenantKey,
    /// HTTP client instance
    client: Client,
}

impl StrataClient {
    /// Create a new client scoped to `tenant`
    ///
    /// # Example
    /// ```
    /// use strata_client::StrataClient;
    /// use strata_core::tenant;
    ///
    /// let key = tenant::derive("alice", "secret").unwrap();
    /// let client = StrataClient::new("http://localhost:8080", key);
    /// ```
    pub fn new(base_url: impl Into<String>, tenant: TenantKey) -> Self {
        Self::with_client(base_url, tenant, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, tenant: TenantKey, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant,
            client,
        }
    }

    /// Get the base URL of the record store
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    /// Build a tenant-scoped request for an `/api` path
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header(TENANT_HEADER, self.tenant.as_str())
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                extract_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response without a body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                extract_message(&error_text),
            ));
        }

        Ok(())
    }
}

/// The server wraps errors as `{"error": "..."}`; fall back to the raw body
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::tenant;

    fn key() -> TenantKey {
        tenant::derive("alice", "secret").unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = StrataClient::new("http://localhost:8080", key());
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.tenant(), &key());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = StrataClient::new("http://localhost:8080/", key());
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_request_carries_tenant_header() {
        let client = StrataClient::new("http://localhost:8080", key());
        let request = client
            .request(Method::GET, "/services")
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://localhost:8080/api/services");
        assert_eq!(
            request.headers().get(TENANT_HEADER).unwrap(),
            key().as_str()
        );
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(extract_message(r#"{"error":"Service svc-a not found"}"#), "Service svc-a not found");
        assert_eq!(extract_message("plain text"), "plain text");
    }
}
