//! Developer domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A developer that owns services inside a tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Developer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub github_username: Option<String>,
    pub created_at: DateTime<Utc>,
}
