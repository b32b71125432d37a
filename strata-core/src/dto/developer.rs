//! Developer DTOs

use serde::{Deserialize, Serialize};

/// Request to register a developer in the caller's tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeveloper {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub github_username: Option<String>,
}
