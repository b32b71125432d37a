//! Config command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use std::path::Path;
use strata_client::StrataClient;
use strata_core::dto::developer::CreateDeveloper;
use strata_core::tenant;
use strata_engine::EngineSettings;

use crate::config::{CliConfig, ConfigKey, DEFAULT_API_URL};

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Interactively set identity, credentials and defaults
    Setup,
    /// Print one value
    Get {
        key: ConfigKey,

        /// Show credentials unmasked
        #[arg(long)]
        reveal: bool,
    },
    /// Set one value; an empty value clears it
    Set { key: ConfigKey, value: String },
    /// Print every value
    List,
    /// Remove the configuration file
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn handle_config_command(
    command: ConfigCommands,
    config: CliConfig,
    path: &Path,
) -> Result<()> {
    match command {
        ConfigCommands::Setup => setup(config, path).await,
        ConfigCommands::Get { key, reveal } => {
            let value = if reveal {
                config.get(key)
            } else {
                config.display_value(key)
            };
            match value {
                Some(value) => println!("{}", value),
                None => println!("{}", "(not set)".dimmed()),
            }
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let next = config.with_value(key, &value)?;
            next.save_to(path)?;
            match next.display_value(key) {
                Some(shown) => println!("{} {} = {}", "✓".green(), key, shown),
                None => println!("{} {} cleared", "✓".green(), key),
            }
            Ok(())
        }
        ConfigCommands::List => {
            println!("{}", format!("Configuration ({}):", path.display()).bold());
            print_values(&config);
            Ok(())
        }
        ConfigCommands::Reset { yes } => reset(path, yes),
    }
}

fn print_values(config: &CliConfig) {
    for key in ConfigKey::ALL {
        let value = config
            .display_value(key)
            .unwrap_or_else(|| "(not set)".dimmed().to_string());
        println!("  {:<20} {}", key.as_str(), value);
    }
}

async fn setup(config: CliConfig, path: &Path) -> Result<()> {
    let theme = ColorfulTheme::default();
    let defaults = EngineSettings::default();

    println!("{}", "Strata setup".bold());
    println!(
        "{}",
        "Your tenant key is derived from your identifier and GitHub token.".dimmed()
    );

    let identifier: String = Input::with_theme(&theme)
        .with_prompt("Identifier (email or username)")
        .with_initial_text(config.identifier.clone().unwrap_or_default())
        .interact_text()?;
    let api_url: String = Input::with_theme(&theme)
        .with_prompt("Record store URL")
        .default(config.api_url().to_string())
        .interact_text()?;
    let github_owner: String = Input::with_theme(&theme)
        .with_prompt("GitHub owner for source repositories")
        .with_initial_text(config.github_owner.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let github_token = Password::with_theme(&theme)
        .with_prompt("GitHub token")
        .interact()?;
    let registry_namespace: String = Input::with_theme(&theme)
        .with_prompt("Image registry namespace")
        .with_initial_text(config.registry_namespace.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let registry_token = Password::with_theme(&theme)
        .with_prompt("Registry token (empty to use the local docker login)")
        .allow_empty_password(true)
        .interact()?;
    let cluster: String = Input::with_theme(&theme)
        .with_prompt("Cluster name (empty to use the current kubectl context)")
        .with_initial_text(config.cluster.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let region: String = Input::with_theme(&theme)
        .with_prompt("Cluster region")
        .default(config.region.clone().unwrap_or(defaults.region))
        .interact_text()?;

    let tenant_key =
        tenant::derive(identifier.trim(), &github_token).context("Cannot derive tenant key")?;

    let next = config
        .with_value(ConfigKey::Identifier, &identifier)?
        .with_value(ConfigKey::TenantKey, tenant_key.as_str())?
        .with_value(ConfigKey::ApiUrl, &api_url)?
        .with_value(ConfigKey::GithubOwner, &github_owner)?
        .with_value(ConfigKey::GithubToken, &github_token)?
        .with_value(ConfigKey::RegistryNamespace, &registry_namespace)?
        .with_value(ConfigKey::RegistryToken, &registry_token)?
        .with_value(ConfigKey::Cluster, &cluster)?
        .with_value(ConfigKey::Region, &region)?;
    next.save_to(path)?;

    println!();
    println!("{}", format!("✓ Saved to {}", path.display()).green().bold());
    print_values(&next);

    if let Some(request) = developer_request(identifier.trim(), &github_owner) {
        let client = StrataClient::new(next.api_url(), tenant_key);
        match client.create_developer(&request).await {
            Ok(developer) => println!(
                "{}",
                format!("✓ Registered developer {}", developer.id).green()
            ),
            Err(e) => {
                tracing::debug!("Developer registration failed: {}", e);
                println!(
                    "{}",
                    "Developer not registered; the record store is unreachable or already has it"
                        .dimmed()
                );
            }
        }
    }

    Ok(())
}

/// Developer record for an email identifier; usernames are not registered
fn developer_request(identifier: &str, github_owner: &str) -> Option<CreateDeveloper> {
    let (local, _) = identifier.split_once('@')?;
    let github = github_owner.trim();
    Some(CreateDeveloper {
        name: local.to_string(),
        email: identifier.to_string(),
        github_username: (!github.is_empty()).then(|| github.to_string()),
    })
}

fn reset(path: &Path, yes: bool) -> Result<()> {
    if !path.exists() {
        println!("{}", "Nothing to reset".dimmed());
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Remove {}?", path.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    println!(
        "{}",
        format!("✓ Configuration reset; the default API URL is {}", DEFAULT_API_URL).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: ConfigCommands,
    }

    #[test]
    fn test_developer_request() {
        let request = developer_request("ada@example.com", "ada-l").unwrap();
        assert_eq!(request.name, "ada");
        assert_eq!(request.email, "ada@example.com");
        assert_eq!(request.github_username.as_deref(), Some("ada-l"));

        let no_owner = developer_request("ada@example.com", " ").unwrap();
        assert_eq!(no_owner.github_username, None);

        assert!(developer_request("ada", "ada-l").is_none());
    }

    #[test]
    fn test_key_argument_is_parsed() {
        let cli = TestCli::try_parse_from(["config", "set", "github-owner", "acme"]).unwrap();
        assert!(matches!(
            cli.command,
            ConfigCommands::Set { key: ConfigKey::GithubOwner, ref value } if value == "acme"
        ));

        assert!(TestCli::try_parse_from(["config", "get", "password"]).is_err());
    }

    #[test]
    fn test_reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        CliConfig::default()
            .with_value(ConfigKey::Region, "eu-west-1")
            .unwrap()
            .save_to(&path)
            .unwrap();

        reset(&path, true).unwrap();
        assert!(!path.exists());
        // A second reset is a no-op
        reset(&path, true).unwrap();
    }
}
