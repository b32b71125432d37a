//! Source hosting
//!
//! [`SourceHost`] creates the remote repository for a service, publishes a
//! local folder as its `main` branch and deletes it during teardown.
//! [`GitHubSource`] talks to the GitHub REST API and drives `git`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::AdapterError;
use crate::process;

/// A remote repository that exists after [`SourceHost::ensure_repository`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Browsable URL, stored as the service's `source_url`
    pub url: String,
    /// Whether this call created it
    pub created: bool,
}

#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Create the repository unless it already exists
    async fn ensure_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepositoryRef, AdapterError>;

    /// Commit `folder` and force-push it as `main` of `repo`
    async fn push_folder(&self, folder: &Path, repo: &RepositoryRef) -> Result<(), AdapterError>;

    /// Delete the repository at `url`; [`AdapterError::AlreadyAbsent`] if it is gone
    async fn delete_repository(&self, url: &str) -> Result<(), AdapterError>;
}

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    html_url: String,
}

/// GitHub-backed source host
#[derive(Clone)]
pub struct GitHubSource {
    owner: String,
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GitHubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSource")
            .field("owner", &self.owner)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubSource {
    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            token: token.into(),
            api_base: GITHUB_API.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "strata-cli")
    }

    /// Push URL carrying the token; never logged
    fn push_url(&self, name: &str) -> String {
        format!(
            "https://x-access-token:{}@github.com/{}/{}.git",
            self.token, self.owner, name
        )
    }

    async fn error_from(response: reqwest::Response, action: &str) -> AdapterError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AdapterError::Failed(format!("GitHub {} failed ({}): {}", action, status, body))
    }
}

/// `(owner, name)` from a GitHub repository URL
pub fn parse_repository_url(url: &str) -> Option<(String, String)> {
    let path = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .split("github.com/")
        .nth(1)?;
    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), name.to_string()))
}

#[async_trait]
impl SourceHost for GitHubSource {
    async fn ensure_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepositoryRef, AdapterError> {
        let path = format!("/repos/{}/{}", self.owner, name);
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let repo: GitHubRepo = response
                    .json()
                    .await
                    .map_err(|e| AdapterError::failed(e.to_string()))?;
                info!("Repository {}/{} already exists", self.owner, name);
                return Ok(RepositoryRef {
                    url: repo.html_url,
                    created: false,
                });
            }
            StatusCode::NOT_FOUND => {}
            _ => return Err(Self::error_from(response, "repository lookup").await),
        }

        info!("Creating repository {}/{}", self.owner, name);
        let response = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&json!({
                "name": name,
                "description": description,
                "private": false,
                "auto_init": false,
            }))
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "repository creation").await);
        }

        let repo: GitHubRepo = response
            .json()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;
        Ok(RepositoryRef {
            url: repo.html_url,
            created: true,
        })
    }

    async fn push_folder(&self, folder: &Path, repo: &RepositoryRef) -> Result<(), AdapterError> {
        let (_, name) = parse_repository_url(&repo.url)
            .ok_or_else(|| AdapterError::failed(format!("not a GitHub URL: {}", repo.url)))?;

        prepare_repository(folder).await?;

        process::run_checked("git", &["add", "-A"], Some(folder)).await?;
        let commit = process::run(
            "git",
            &[
                "-c",
                "user.name=strata",
                "-c",
                "user.email=strata@localhost",
                "commit",
                "--allow-empty",
                "-m",
                "Publish service source",
            ],
            Some(folder),
            None,
        )
        .await?;
        if !commit.success() {
            return Err(AdapterError::failed(format!(
                "git commit failed: {}",
                commit.stderr
            )));
        }

        info!("Pushing {} to {}", folder.display(), repo.url);
        let push_url = self.push_url(&name);
        let push = process::run(
            "git",
            &["push", "--force", &push_url, "HEAD:refs/heads/main"],
            Some(folder),
            None,
        )
        .await?;
        if !push.success() {
            // stderr can echo the remote; keep the token out of the message
            let stderr = push.stderr.replace(&self.token, "***");
            return Err(AdapterError::failed(format!("git push failed: {}", stderr)));
        }

        Ok(())
    }

    async fn delete_repository(&self, url: &str) -> Result<(), AdapterError> {
        let (owner, name) = parse_repository_url(url)
            .ok_or_else(|| AdapterError::failed(format!("not a GitHub URL: {}", url)))?;

        let response = self
            .request(reqwest::Method::DELETE, &format!("/repos/{}/{}", owner, name))
            .send()
            .await
            .map_err(|e| AdapterError::failed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(AdapterError::AlreadyAbsent),
            _ => Err(Self::error_from(response, "repository deletion").await),
        }
    }
}

/// Make `folder` the root of its own repository
///
/// A folder nested inside another checkout, or carrying a `.git` that points
/// elsewhere, gets a fresh repository so only its contents are published.
async fn prepare_repository(folder: &Path) -> Result<(), AdapterError> {
    let folder = canonical(folder)?;
    let toplevel = process::run("git", &["rev-parse", "--show-toplevel"], Some(&folder), None)
        .await?;

    let owns_repository = toplevel.success()
        && canonical(Path::new(&toplevel.stdout)).ok().as_deref() == Some(folder.as_path());
    if owns_repository {
        debug!("{} is already a repository root", folder.display());
        return Ok(());
    }

    let stale = folder.join(".git");
    if stale.exists() {
        warn!("Removing stale .git in {}", folder.display());
        let removed = if stale.is_dir() {
            std::fs::remove_dir_all(&stale)
        } else {
            std::fs::remove_file(&stale)
        };
        removed.map_err(|e| AdapterError::failed(format!("failed to remove stale .git: {}", e)))?;
    }

    process::run_checked("git", &["init", "-b", "main"], Some(&folder)).await?;
    Ok(())
}

fn canonical(path: &Path) -> Result<PathBuf, AdapterError> {
    path.canonicalize()
        .map_err(|e| AdapterError::failed(format!("cannot resolve {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_url() {
        assert_eq!(
            parse_repository_url("https://github.com/acme/billing-api"),
            Some(("acme".into(), "billing-api".into()))
        );
        assert_eq!(
            parse_repository_url("https://github.com/acme/billing-api.git"),
            Some(("acme".into(), "billing-api".into()))
        );
        assert_eq!(parse_repository_url("https://gitlab.com/acme/x"), None);
        assert_eq!(parse_repository_url("https://github.com/acme"), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let source = GitHubSource::new("acme", "ghp_secret");
        let debug = format!("{:?}", source);
        assert!(debug.contains("acme"));
        assert!(!debug.contains("ghp_secret"));
    }
}
