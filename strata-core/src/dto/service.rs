//! Service DTOs

use serde::{Deserialize, Serialize};

use crate::domain::service::{ServiceKind, ServiceStatus};

/// Request to register a service in the caller's tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterService {
    pub name: String,
    pub kind: ServiceKind,
    pub description: String,
    pub developer: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Partial update of a service record; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
}

impl UpdateService {
    pub fn status(status: ServiceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Query parameters for listing services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
}
