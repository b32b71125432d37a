use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Create tables and indexes; every table is partitioned by `tenant_key`
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS developers (
            id UUID PRIMARY KEY,
            tenant_key VARCHAR(16) NOT NULL,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) NOT NULL,
            github_username VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id UUID PRIMARY KEY,
            tenant_key VARCHAR(16) NOT NULL,
            name VARCHAR(63) NOT NULL,
            kind VARCHAR(20) NOT NULL,
            description TEXT NOT NULL,
            developer VARCHAR(255) NOT NULL,
            image TEXT,
            source_url TEXT,
            url TEXT,
            status VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (tenant_key, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id UUID PRIMARY KEY,
            tenant_key VARCHAR(16) NOT NULL,
            service_name VARCHAR(63) NOT NULL,
            kind VARCHAR(20) NOT NULL,
            stage VARCHAR(20) NOT NULL,
            status VARCHAR(20) NOT NULL,
            progress SMALLINT NOT NULL DEFAULT 0,
            logs TEXT[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_developers_tenant ON developers(tenant_key)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_services_developer ON services(tenant_key, developer)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_pipeline_runs_service
        ON pipeline_runs(tenant_key, service_name, created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    // At most one pending or running run per service
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_pipeline_runs_active
        ON pipeline_runs(tenant_key, service_name)
        WHERE status IN ('pending', 'running')
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
