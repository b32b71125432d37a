//! API Module
//!
//! HTTP API layer for the record store.
//! Everything under `/api` is scoped to the caller's tenant partition.

pub mod developer;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod service;
pub mod tenant;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sqlx::PgPool;
use strata_engine::cluster::Cluster;
use tower_http::trace::TraceLayer;

pub use crate::service::rollback_service::RollbackTarget;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Used by the rollback worker
    pub cluster: Arc<dyn Cluster>,
    pub rollback: RollbackTarget,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Developer endpoints
        .route(
            "/api/developers",
            post(developer::create_developer).get(developer::list_developers),
        )
        .route("/api/developers/{id}", get(developer::get_developer))
        // Service record endpoints
        .route(
            "/api/services",
            post(service::register_service).get(service::list_services),
        )
        .route(
            "/api/services/{name}",
            get(service::get_service)
                .patch(service::update_service)
                .delete(service::delete_service),
        )
        // Pipeline endpoints
        .route(
            "/api/services/{name}/pipeline",
            get(pipeline::latest_run).post(pipeline::open_run),
        )
        .route("/api/services/{name}/rollback", post(pipeline::request_rollback))
        .route("/api/pipelines/{id}", put(pipeline::update_run))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
