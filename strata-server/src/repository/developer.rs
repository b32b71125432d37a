//! Developer Repository

use strata_core::domain::developer::Developer;
use strata_core::dto::developer::CreateDeveloper;
use strata_core::tenant::TenantKey;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a developer into the tenant partition
pub async fn create(
    pool: &PgPool,
    tenant: &TenantKey,
    req: CreateDeveloper,
) -> Result<Developer, sqlx::Error> {
    let developer = Developer {
        id: Uuid::new_v4(),
        name: req.name,
        email: req.email,
        github_username: req.github_username,
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO developers (id, tenant_key, name, email, github_username, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(developer.id)
    .bind(tenant.as_str())
    .bind(&developer.name)
    .bind(&developer.email)
    .bind(&developer.github_username)
    .bind(developer.created_at)
    .execute(pool)
    .await?;

    Ok(developer)
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant: &TenantKey,
    id: Uuid,
) -> Result<Option<Developer>, sqlx::Error> {
    let row = sqlx::query_as::<_, DeveloperRow>(
        r#"
        SELECT id, name, email, github_username, created_at
        FROM developers
        WHERE tenant_key = $1 AND id = $2
        "#,
    )
    .bind(tenant.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

pub async fn list(pool: &PgPool, tenant: &TenantKey) -> Result<Vec<Developer>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DeveloperRow>(
        r#"
        SELECT id, name, email, github_username, created_at
        FROM developers
        WHERE tenant_key = $1
        ORDER BY created_at
        "#,
    )
    .bind(tenant.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DeveloperRow {
    id: Uuid,
    name: String,
    email: String,
    github_username: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DeveloperRow> for Developer {
    fn from(row: DeveloperRow) -> Self {
        Developer {
            id: row.id,
            name: row.name,
            email: row.email,
            github_username: row.github_username,
            created_at: row.created_at,
        }
    }
}
