//! Tenant partition extractor
//!
//! Every `/api` handler takes a [`Tenant`]; a request without a well-formed
//! `x-tenant-key` header is rejected with 401 before any query runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use strata_core::tenant::{TENANT_HEADER, TenantKey};

use crate::api::error::ApiError;

/// Tenant key taken from the request header
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantKey);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", TENANT_HEADER)))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Unreadable {} header", TENANT_HEADER)))?;

        TenantKey::parse(raw.trim())
            .map(Tenant)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))
    }
}
