//! Engine settings
//!
//! Deployment target and every wait bound the engine applies. Built by the
//! caller from its local configuration and validated once before a run.

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Engine settings
///
/// Intervals and timeouts are configurable so tests can run the readiness
/// and follow loops in milliseconds.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Cluster name; required for any stage that touches the cluster
    pub cluster: Option<String>,

    /// Cloud region of the cluster
    pub region: String,

    /// How often to poll the deployment for available replicas
    pub readiness_poll_interval: Duration,

    /// Hard bound on the readiness wait
    pub readiness_timeout: Duration,

    /// Require at least one ready endpoint before reporting a deploy as ready
    pub verify_endpoints: bool,

    /// How often `status --follow` polls the latest run
    pub status_poll_interval: Duration,

    /// Maximum number of follow polls
    pub status_poll_attempts: u32,

    /// Bound on `kubectl rollout status` during rollback
    pub rollout_timeout: Duration,
}

impl EngineSettings {
    /// Creates settings with defaults
    pub fn new(cluster: Option<String>, region: impl Into<String>) -> Self {
        Self {
            cluster,
            region: region.into(),
            readiness_poll_interval: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(300), // 5 minutes
            verify_endpoints: true,
            status_poll_interval: Duration::from_secs(3),
            status_poll_attempts: 200,
            rollout_timeout: Duration::from_secs(180),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn with_readiness(mut self, interval: Duration, timeout: Duration) -> Self {
        self.readiness_poll_interval = interval;
        self.readiness_timeout = timeout;
        self
    }

    /// The cluster name, or a configuration error naming how to set it
    pub fn require_cluster(&self) -> Result<&str> {
        self.cluster.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
            EngineError::Configuration(
                "no cluster configured; run `strata config set cluster <name>` or pass --cluster"
                    .to_string(),
            )
        })
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(EngineError::Configuration("region cannot be empty".into()));
        }

        if self.readiness_poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "readiness_poll_interval must be greater than 0".into(),
            ));
        }

        if self.readiness_timeout < self.readiness_poll_interval {
            return Err(EngineError::Configuration(
                "readiness_timeout must be at least one poll interval".into(),
            ));
        }

        if self.status_poll_interval.is_zero() || self.status_poll_attempts == 0 {
            return Err(EngineError::Configuration(
                "status polling needs a non-zero interval and attempt count".into(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new(None, "us-east-1")
    }
}
