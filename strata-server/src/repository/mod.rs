//! Repository Module
//!
//! Data access layer for the record store.
//! Every query is scoped to a tenant key; nothing reads across partitions.

pub mod developer;
pub mod run;
pub mod service;

// Re-export for convenience
pub use developer as developer_repository;
pub use run as run_repository;
pub use service as service_repository;

use std::str::FromStr;

/// Parse a text column holding one of the core enums
fn decode_column<T>(column: &str, raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| sqlx::Error::Decode(format!("column {}: {}", column, e).into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::domain::pipeline::Stage;
    use strata_core::domain::service::ServiceStatus;

    #[test]
    fn test_decode_column() {
        let stage: Stage = decode_column("stage", "build_image").unwrap();
        assert_eq!(stage, Stage::BuildImage);

        let status: ServiceStatus = decode_column("status", "rolling_back").unwrap();
        assert_eq!(status, ServiceStatus::RollingBack);

        let err = decode_column::<Stage>("stage", "compile").unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
        assert!(err.to_string().contains("column stage"));
    }
}
