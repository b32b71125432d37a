//! Configuration module
//!
//! Local CLI configuration stored as JSON under the user's config directory
//! (`~/.config/strata/config.json` on Linux). The value is read once at
//! start and never mutated in place: [`CliConfig::with_value`] returns a
//! new configuration which the caller saves explicitly.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strata_core::tenant::TenantKey;
use strata_engine::EngineSettings;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Settable configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Identifier,
    TenantKey,
    ApiUrl,
    GithubOwner,
    GithubToken,
    RegistryNamespace,
    RegistryToken,
    Cluster,
    Region,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::Identifier,
        ConfigKey::TenantKey,
        ConfigKey::ApiUrl,
        ConfigKey::GithubOwner,
        ConfigKey::GithubToken,
        ConfigKey::RegistryNamespace,
        ConfigKey::RegistryToken,
        ConfigKey::Cluster,
        ConfigKey::Region,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Identifier => "identifier",
            ConfigKey::TenantKey => "tenant_key",
            ConfigKey::ApiUrl => "api_url",
            ConfigKey::GithubOwner => "github_owner",
            ConfigKey::GithubToken => "github_token",
            ConfigKey::RegistryNamespace => "registry_namespace",
            ConfigKey::RegistryToken => "registry_token",
            ConfigKey::Cluster => "cluster",
            ConfigKey::Region => "region",
        }
    }

    /// Credentials are masked whenever they are displayed
    pub fn is_secret(self) -> bool {
        matches!(self, ConfigKey::GithubToken | ConfigKey::RegistryToken)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
                anyhow!("unknown config key '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Partition key derived at setup time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_key: Option<TenantKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CliConfig {
    /// `$CONFIG_DIR/strata/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(dir.join("strata").join("config.json"))
    }

    /// Read the configuration at `path`; a missing file is an empty configuration
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Config file {} is not valid", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        // Holds credentials
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }
        Ok(())
    }

    /// A copy with `key` set to `value`; an empty value clears the key
    pub fn with_value(&self, key: ConfigKey, value: &str) -> Result<Self> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());
        let mut next = self.clone();

        match key {
            ConfigKey::Identifier => next.identifier = text,
            ConfigKey::TenantKey => {
                next.tenant_key = text
                    .as_deref()
                    .map(TenantKey::parse)
                    .transpose()
                    .context("Invalid tenant key")?;
            }
            ConfigKey::ApiUrl => {
                if let Some(url) = &text {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        bail!("api_url must start with http:// or https://");
                    }
                }
                next.api_url = text.map(|url| url.trim_end_matches('/').to_string());
            }
            ConfigKey::GithubOwner => next.github_owner = text,
            ConfigKey::GithubToken => next.github_token = text,
            ConfigKey::RegistryNamespace => next.registry_namespace = text,
            ConfigKey::RegistryToken => next.registry_token = text,
            ConfigKey::Cluster => next.cluster = text,
            ConfigKey::Region => next.region = text,
        }

        Ok(next)
    }

    /// Raw stored value
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Identifier => self.identifier.clone(),
            ConfigKey::TenantKey => self.tenant_key.as_ref().map(ToString::to_string),
            ConfigKey::ApiUrl => self.api_url.clone(),
            ConfigKey::GithubOwner => self.github_owner.clone(),
            ConfigKey::GithubToken => self.github_token.clone(),
            ConfigKey::RegistryNamespace => self.registry_namespace.clone(),
            ConfigKey::RegistryToken => self.registry_token.clone(),
            ConfigKey::Cluster => self.cluster.clone(),
            ConfigKey::Region => self.region.clone(),
        }
    }

    /// Value for display, with credentials masked
    pub fn display_value(&self, key: ConfigKey) -> Option<String> {
        let value = self.get(key)?;
        Some(if key.is_secret() { mask(&value) } else { value })
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// A copy pointing at `url` when the command line overrides it
    pub fn with_api_url_override(self, url: Option<String>) -> Self {
        match url {
            Some(url) => Self {
                api_url: Some(url),
                ..self
            },
            None => self,
        }
    }

    pub fn tenant_key(&self) -> Result<&TenantKey> {
        self.tenant_key
            .as_ref()
            .context("No tenant key configured; run `strata config setup` first")
    }

    /// Developer reference recorded as the owner of new services
    pub fn developer(&self) -> Result<&str> {
        self.identifier
            .as_deref()
            .context("No identifier configured; run `strata config setup` first")
    }

    /// Engine settings, with command line overrides taking precedence
    pub fn engine_settings(&self, cluster: Option<String>, region: Option<String>) -> EngineSettings {
        let defaults = EngineSettings::default();
        EngineSettings::new(
            cluster.or_else(|| self.cluster.clone()),
            region
                .or_else(|| self.region.clone())
                .unwrap_or(defaults.region),
        )
    }
}

/// Keep the first four characters of a credential
fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata").join("config.json");

        let config = CliConfig::default()
            .with_value(ConfigKey::Identifier, "ada@example.com")
            .unwrap()
            .with_value(ConfigKey::TenantKey, "0123456789abcdef")
            .unwrap()
            .with_value(ConfigKey::GithubToken, "ghp_secret")
            .unwrap();
        config.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.tenant_key().unwrap().as_str(), "0123456789abcdef");
    }

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let original = CliConfig::default();
        let updated = original.with_value(ConfigKey::Cluster, "prod").unwrap();

        assert_eq!(original.cluster, None);
        assert_eq!(updated.cluster.as_deref(), Some("prod"));

        let cleared = updated.with_value(ConfigKey::Cluster, "").unwrap();
        assert_eq!(cleared.cluster, None);
    }

    #[test]
    fn test_with_value_validates() {
        let config = CliConfig::default();
        assert!(config.with_value(ConfigKey::TenantKey, "not-a-key").is_err());
        assert!(config.with_value(ConfigKey::ApiUrl, "localhost:8080").is_err());

        let trimmed = config
            .with_value(ConfigKey::ApiUrl, "https://strata.example.com/")
            .unwrap();
        assert_eq!(trimmed.api_url(), "https://strata.example.com");
    }

    #[test]
    fn test_secrets_are_masked() {
        let config = CliConfig::default()
            .with_value(ConfigKey::GithubToken, "ghp_abcdef")
            .unwrap()
            .with_value(ConfigKey::RegistryToken, "abc")
            .unwrap()
            .with_value(ConfigKey::GithubOwner, "acme")
            .unwrap();

        assert_eq!(config.display_value(ConfigKey::GithubToken).unwrap(), "ghp_****");
        assert_eq!(config.display_value(ConfigKey::RegistryToken).unwrap(), "****");
        assert_eq!(config.display_value(ConfigKey::GithubOwner).unwrap(), "acme");
        assert_eq!(config.display_value(ConfigKey::Cluster), None);
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!("api_url".parse::<ConfigKey>().unwrap(), ConfigKey::ApiUrl);
        assert_eq!("github-token".parse::<ConfigKey>().unwrap(), ConfigKey::GithubToken);
        assert!("password".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_engine_settings_precedence() {
        let config = CliConfig::default()
            .with_value(ConfigKey::Cluster, "staging")
            .unwrap()
            .with_value(ConfigKey::Region, "eu-west-1")
            .unwrap();

        let from_config = config.engine_settings(None, None);
        assert_eq!(from_config.cluster.as_deref(), Some("staging"));
        assert_eq!(from_config.region, "eu-west-1");

        let overridden = config.engine_settings(Some("prod".into()), Some("us-west-2".into()));
        assert_eq!(overridden.cluster.as_deref(), Some("prod"));
        assert_eq!(overridden.region, "us-west-2");

        let unset = CliConfig::default().engine_settings(None, None);
        assert_eq!(unset.cluster, None);
        assert_eq!(unset.region, EngineSettings::default().region);
    }

    #[test]
    fn test_api_url_override() {
        let config = CliConfig::default()
            .with_value(ConfigKey::ApiUrl, "http://saved:8080")
            .unwrap();

        assert_eq!(config.clone().with_api_url_override(None).api_url(), "http://saved:8080");
        assert_eq!(
            config
                .with_api_url_override(Some("http://flag:9090".into()))
                .api_url(),
            "http://flag:9090"
        );
    }
}
