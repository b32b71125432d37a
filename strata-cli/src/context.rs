//! Per-invocation wiring
//!
//! Turns the loaded configuration into a record store client and the
//! engine adapters a command needs.

use anyhow::Result;
use std::sync::Arc;
use strata_client::StrataClient;
use strata_engine::cluster::Kubectl;
use strata_engine::prompt::OperatorPrompt;
use strata_engine::registry::{DockerRegistry, ImageRegistry};
use strata_engine::scanner::Semgrep;
use strata_engine::source::{GitHubSource, SourceHost};
use strata_engine::Adapters;

use crate::config::CliConfig;

/// Everything a command reads from the environment
pub struct CommandContext {
    pub config: CliConfig,
    pub client: StrataClient,
}

impl CommandContext {
    /// Fails when no tenant key is configured; nothing is sent unscoped
    pub fn new(config: CliConfig) -> Result<Self> {
        let tenant = config.tenant_key()?.clone();
        let client = StrataClient::new(config.api_url(), tenant);
        tracing::debug!("Record store at {}", client.base_url());
        Ok(Self { config, client })
    }

    /// Production adapters; source host and registry only when configured
    pub fn adapters(&self, prompt: Arc<dyn OperatorPrompt>) -> Adapters {
        Adapters {
            source: source_host(&self.config),
            registry: image_registry(&self.config),
            scanner: Arc::new(Semgrep),
            cluster: Arc::new(Kubectl),
            store: Arc::new(self.client.clone()),
            prompt,
        }
    }
}

fn source_host(config: &CliConfig) -> Option<Arc<dyn SourceHost>> {
    match (&config.github_owner, &config.github_token) {
        (Some(owner), Some(token)) => Some(Arc::new(GitHubSource::new(owner, token))),
        _ => None,
    }
}

fn image_registry(config: &CliConfig) -> Option<Arc<dyn ImageRegistry>> {
    config.registry_namespace.as_ref().map(|namespace| {
        Arc::new(DockerRegistry::new(namespace, config.registry_token.clone()))
            as Arc<dyn ImageRegistry>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigKey;
    use strata_engine::prompt::FixedAnswer;

    fn configured() -> CliConfig {
        CliConfig::default()
            .with_value(ConfigKey::TenantKey, "0123456789abcdef")
            .unwrap()
    }

    #[test]
    fn test_requires_tenant_key() {
        assert!(CommandContext::new(CliConfig::default()).is_err());
        assert!(CommandContext::new(configured()).is_ok());
    }

    #[test]
    fn test_optional_adapters() {
        let ctx = CommandContext::new(configured()).unwrap();
        let adapters = ctx.adapters(Arc::new(FixedAnswer(true)));
        assert!(adapters.source.is_none());
        assert!(adapters.registry.is_none());

        let config = configured()
            .with_value(ConfigKey::GithubOwner, "acme")
            .unwrap()
            .with_value(ConfigKey::GithubToken, "ghp_token")
            .unwrap()
            .with_value(ConfigKey::RegistryNamespace, "acme")
            .unwrap();
        let ctx = CommandContext::new(config).unwrap();
        let adapters = ctx.adapters(Arc::new(FixedAnswer(true)));
        assert!(adapters.source.is_some());
        assert!(adapters.registry.is_some());
    }

    #[test]
    fn test_owner_without_token_is_unconfigured() {
        let config = configured().with_value(ConfigKey::GithubOwner, "acme").unwrap();
        assert!(source_host(&config).is_none());
    }
}
