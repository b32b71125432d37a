//! Service domain types

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

/// Lowercase alphanumerics and hyphens, no leading/trailing hyphen, max 63 chars.
/// Doubles as a valid cluster resource name.
static SERVICE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"));

/// Check a service name against the naming pattern
///
/// Returns a human readable reason on failure.
pub fn validate_service_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("service name cannot be empty".to_string());
    }
    if !SERVICE_NAME.is_match(name) {
        return Err(format!(
            "invalid service name '{}': use lowercase letters, digits and hyphens \
             (max 63 characters, must start and end with a letter or digit)",
            name
        ));
    }
    Ok(())
}

/// Kind of deployable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Api,
    Frontend,
    Worker,
    Database,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Api,
        ServiceKind::Frontend,
        ServiceKind::Worker,
        ServiceKind::Database,
    ];

    /// Container port used when neither the caller nor the image declares one
    pub fn default_port(self) -> u16 {
        match self {
            ServiceKind::Frontend => 80,
            ServiceKind::Database => 5432,
            ServiceKind::Api | ServiceKind::Worker => 8080,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Api => "api",
            ServiceKind::Frontend => "frontend",
            ServiceKind::Worker => "worker",
            ServiceKind::Database => "database",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(ServiceKind::Api),
            "frontend" => Ok(ServiceKind::Frontend),
            "worker" => Ok(ServiceKind::Worker),
            "database" => Ok(ServiceKind::Database),
            other => Err(format!(
                "unknown service type '{}' (expected one of: api, frontend, worker, database)",
                other
            )),
        }
    }
}

/// Lifecycle status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Record persisted, nothing running in the cluster yet
    Registered,
    Deploying,
    Running,
    /// Applied but readiness was not confirmed within the wait bound
    Unready,
    RollingBack,
    Failed,
}

impl ServiceStatus {
    /// Whether a record may move from `self` to `next`
    ///
    /// Forward moves only. Going back to `Deploying` starts a new deploy
    /// cycle and `RollingBack` is reachable only from a deployed state.
    pub fn can_transition_to(self, next: ServiceStatus) -> bool {
        use ServiceStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Registered, Deploying)
                | (Registered, Failed)
                | (Deploying, Running)
                | (Deploying, Unready)
                | (Deploying, Failed)
                | (Unready, Deploying)
                | (Unready, Running)
                | (Unready, RollingBack)
                | (Unready, Failed)
                | (Running, Deploying)
                | (Running, RollingBack)
                | (Running, Failed)
                | (RollingBack, Running)
                | (RollingBack, Failed)
                | (Failed, Deploying)
                | (Failed, RollingBack)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Registered => "registered",
            ServiceStatus::Deploying => "deploying",
            ServiceStatus::Running => "running",
            ServiceStatus::Unready => "unready",
            ServiceStatus::RollingBack => "rolling_back",
            ServiceStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(ServiceStatus::Registered),
            "deploying" => Ok(ServiceStatus::Deploying),
            "running" => Ok(ServiceStatus::Running),
            "unready" => Ok(ServiceStatus::Unready),
            "rolling_back" => Ok(ServiceStatus::RollingBack),
            "failed" => Ok(ServiceStatus::Failed),
            other => Err(format!("unknown service status '{}'", other)),
        }
    }
}

/// One deployable unit, identified by its name inside a tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: Uuid,
    pub name: String,
    pub kind: ServiceKind,
    pub description: String,
    /// Owning developer reference
    pub developer: String,
    /// Registry reference, set once the image build completed
    pub image: Option<String>,
    /// Source repository URL, set once the source was published
    pub source_url: Option<String>,
    /// Externally reachable URL, set once a deploy resolved an address
    pub url: Option<String>,
    pub status: ServiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_service_names() {
        for name in ["svc-a", "a", "api2", "my-long-service-name-1"] {
            assert!(validate_service_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_service_names() {
        let too_long = "a".repeat(64);
        for name in ["", "Svc", "-svc", "svc-", "svc_a", "svc.a", too_long.as_str()] {
            assert!(validate_service_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn test_kind_default_ports() {
        assert_eq!(ServiceKind::Frontend.default_port(), 80);
        assert_eq!(ServiceKind::Database.default_port(), 5432);
        assert_eq!(ServiceKind::Api.default_port(), 8080);
        assert_eq!(ServiceKind::Worker.default_port(), 8080);
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in ServiceKind::ALL {
            assert_eq!(kind.as_str().parse::<ServiceKind>().unwrap(), kind);
        }
        assert!("cron".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use ServiceStatus::*;

        assert!(Registered.can_transition_to(Deploying));
        assert!(Deploying.can_transition_to(Running));
        assert!(Running.can_transition_to(RollingBack));
        assert!(RollingBack.can_transition_to(Running));
        assert!(Running.can_transition_to(Running));

        assert!(!Running.can_transition_to(Registered));
        assert!(!Deploying.can_transition_to(Registered));
        assert!(!Registered.can_transition_to(RollingBack));
    }
}
