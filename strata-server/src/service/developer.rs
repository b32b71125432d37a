//! Developer Service

use strata_core::domain::developer::Developer;
use strata_core::dto::developer::CreateDeveloper;
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Result, StoreError};
use crate::repository::developer_repository;

pub async fn create_developer(
    pool: &PgPool,
    tenant: &TenantKey,
    req: CreateDeveloper,
) -> Result<Developer> {
    validate_developer_request(&req)?;

    let developer = developer_repository::create(pool, tenant, req).await?;
    tracing::info!("Developer registered: {} ({})", developer.name, developer.id);

    Ok(developer)
}

pub async fn get_developer(pool: &PgPool, tenant: &TenantKey, id: Uuid) -> Result<Developer> {
    developer_repository::find_by_id(pool, tenant, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Developer {} not found", id)))
}

pub async fn list_developers(pool: &PgPool, tenant: &TenantKey) -> Result<Vec<Developer>> {
    Ok(developer_repository::list(pool, tenant).await?)
}

fn validate_developer_request(req: &CreateDeveloper) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(StoreError::Validation(
            "Developer name cannot be empty".to_string(),
        ));
    }

    if !req.email.contains('@') {
        return Err(StoreError::Validation(format!(
            "Invalid email address '{}'",
            req.email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str) -> CreateDeveloper {
        CreateDeveloper {
            name: name.to_string(),
            email: email.to_string(),
            github_username: None,
        }
    }

    #[test]
    fn test_validate_empty_name() {
        let result = validate_developer_request(&request("  ", "ada@example.com"));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_validate_bad_email() {
        let result = validate_developer_request(&request("Ada", "ada.example.com"));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(validate_developer_request(&request("Ada", "ada@example.com")).is_ok());
    }
}
