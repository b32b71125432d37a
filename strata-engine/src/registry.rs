//! Container image registry
//!
//! Images are built and pushed with the `docker` CLI; teardown removes tags
//! and empty repositories through the Docker Hub API.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::AdapterError;
use crate::process;

pub const IMAGE_TAG: &str = "latest";

#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Registry reference for a service image
    fn image_ref(&self, service_name: &str) -> String;

    async fn build(&self, folder: &Path, image: &str) -> Result<(), AdapterError>;

    async fn push(&self, image: &str) -> Result<(), AdapterError>;

    /// Port the image declares as exposed, if it declares one
    async fn exposed_port(&self, image: &str) -> Result<Option<u16>, AdapterError>;

    async fn delete_tag(&self, image: &str) -> Result<(), AdapterError>;

    /// Delete the image repository when no tags remain
    async fn delete_repository_if_empty(&self, image: &str) -> Result<(), AdapterError>;
}

/// Split `namespace/name:tag` into its parts; the tag defaults to `latest`
pub fn parse_image_ref(image: &str) -> Option<(&str, &str, &str)> {
    let (path, tag) = match image.rsplit_once(':') {
        Some((path, tag)) if !tag.contains('/') => (path, tag),
        _ => (image, IMAGE_TAG),
    };
    let (namespace, name) = path.rsplit_once('/')?;
    let namespace = namespace.rsplit('/').next()?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace, name, tag))
}

/// First port in `docker image inspect` ExposedPorts output (`{"8080/tcp":{}}`)
pub fn parse_exposed_port(inspect_json: &str) -> Option<u16> {
    let ports: Option<BTreeMap<String, serde_json::Value>> =
        serde_json::from_str(inspect_json).ok()?;
    ports?
        .keys()
        .filter_map(|key| key.split('/').next()?.parse::<u16>().ok())
        .min()
}

#[derive(Debug, Deserialize)]
struct HubLogin {
    token: String,
}

#[derive(Debug, Deserialize)]
struct HubTagPage {
    count: u64,
}

/// Docker CLI + Docker Hub registry
#[derive(Clone)]
pub struct DockerRegistry {
    namespace: String,
    token: Option<String>,
    hub_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DockerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRegistry")
            .field("namespace", &self.namespace)
            .field("hub_base", &self.hub_base)
            .finish_non_exhaustive()
    }
}

impl DockerRegistry {
    pub fn new(namespace: impl Into<String>, token: Option<String>) -> Self {
        Self {
            namespace: namespace.into(),
            token,
            hub_base: "https://hub.docker.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Exchange the access token for a Hub API session token
    async fn login(&self) -> Result<String, AdapterError> {
        let token = self.token.as_deref().ok_or_else(|| {
            AdapterError::failed("no registry token configured for Docker Hub API calls")
        })?;

        let response = self
            .client
            .post(format!("{}/v2/users/login", self.hub_base))
            .json(&json!({ "username": self.namespace, "password": token }))
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::failed(format!(
                "Docker Hub login failed ({})",
                response.status()
            )));
        }

        let login: HubLogin = response
            .json()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;
        Ok(login.token)
    }

    async fn hub_delete(&self, session: &str, path: &str) -> Result<(), AdapterError> {
        let response = self
            .client
            .delete(format!("{}{}", self.hub_base, path))
            .bearer_auth(session)
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(AdapterError::AlreadyAbsent),
            status => Err(AdapterError::failed(format!(
                "Docker Hub DELETE {} failed ({})",
                path, status
            ))),
        }
    }

    fn split<'a>(&self, image: &'a str) -> Result<(&'a str, &'a str, &'a str), AdapterError> {
        parse_image_ref(image)
            .ok_or_else(|| AdapterError::failed(format!("malformed image reference: {}", image)))
    }
}

#[async_trait]
impl ImageRegistry for DockerRegistry {
    fn image_ref(&self, service_name: &str) -> String {
        format!("{}/{}:{}", self.namespace, service_name, IMAGE_TAG)
    }

    async fn build(&self, folder: &Path, image: &str) -> Result<(), AdapterError> {
        info!("Building image {} from {}", image, folder.display());
        let folder = folder.to_string_lossy();
        process::run_checked("docker", &["build", "-t", image, &folder], None).await?;
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), AdapterError> {
        info!("Pushing image {}", image);
        process::run_checked("docker", &["push", image], None).await?;
        Ok(())
    }

    async fn exposed_port(&self, image: &str) -> Result<Option<u16>, AdapterError> {
        let output = process::run_checked(
            "docker",
            &[
                "image",
                "inspect",
                "--format",
                "{{json .Config.ExposedPorts}}",
                image,
            ],
            None,
        )
        .await?;
        let port = parse_exposed_port(&output);
        debug!("Image {} exposes {:?}", image, port);
        Ok(port)
    }

    async fn delete_tag(&self, image: &str) -> Result<(), AdapterError> {
        let (namespace, name, tag) = self.split(image)?;
        let session = self.login().await?;
        self.hub_delete(
            &session,
            &format!("/v2/repositories/{}/{}/tags/{}/", namespace, name, tag),
        )
        .await
    }

    async fn delete_repository_if_empty(&self, image: &str) -> Result<(), AdapterError> {
        let (namespace, name, _) = self.split(image)?;
        let session = self.login().await?;

        let response = self
            .client
            .get(format!(
                "{}/v2/repositories/{}/{}/tags/?page_size=1",
                self.hub_base, namespace, name
            ))
            .bearer_auth(&session)
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(AdapterError::AlreadyAbsent),
            status if !status.is_success() => {
                return Err(AdapterError::failed(format!(
                    "Docker Hub tag listing failed ({})",
                    status
                )));
            }
            _ => {}
        }

        let page: HubTagPage = response
            .json()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;
        if page.count > 0 {
            info!("{}/{} still has {} tag(s), keeping it", namespace, name, page.count);
            return Ok(());
        }

        self.hub_delete(&session, &format!("/v2/repositories/{}/{}/", namespace, name))
            .await
    }
}
