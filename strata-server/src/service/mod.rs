//! Service Module
//!
//! Business logic layer for the record store.
//! Services enforce the record invariants and translate storage failures.

pub mod catalog;
pub mod developer;
pub mod rollback;
pub mod run;

// Re-export for convenience
pub use catalog as catalog_service;
pub use developer as developer_service;
pub use rollback as rollback_service;
pub use run as run_service;

/// Error shared by all record store services
#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    Validation(String),
    /// The request collides with existing state (name taken, run active, ...)
    Conflict(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a unique violation to [`StoreError::Conflict`], anything else to a database error
fn conflict_on_duplicate(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message()),
        _ => StoreError::DatabaseError(err),
    }
}
