use std::fmt::Display;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Failures surfaced by the store. Callers are expected to tell `NotFound`,
/// `PermissionDenied` and `IntegrityViolation` apart: the first two are the
/// client's problem, the last one is ours.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A counter would go negative or a referenced row is missing. The
    /// surrounding transaction has been rolled back.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, key: impl Display) -> Self {
        DbError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Re-label SQLite constraint failures (foreign key, unique, check) with a
/// domain error; everything else passes through unchanged.
pub(crate) fn on_constraint(err: rusqlite::Error, f: impl FnOnce() -> DbError) -> DbError {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => f(),
        _ => DbError::Sqlite(err),
    }
}
