//! Repository error taxonomy.
//!
//! # Responsibility
//! - Give callers semantic errors (`NotFound`, `ConstraintViolation`,
//!   `LockTimeout`, ...) on top of raw SQLite transport errors.
//!
//! # Invariants
//! - Read-by-id misses are never errors; they are `Ok(None)`.
//! - SQLite errors that are not constraint or lock failures pass through
//!   unchanged inside `RepoError::Db`.

use crate::db::DbError;
use crate::model::record::{RecordId, ValidationError};
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by store, query and repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input was rejected before touching the store.
    Validation(ValidationError),
    /// An operation that requires an existing row did not find it.
    NotFound { table: &'static str, id: RecordId },
    /// Unique, primary key, foreign key or check constraint failed.
    ConstraintViolation(String),
    /// The database stayed locked past the configured busy timeout.
    LockTimeout(String),
    /// Malformed pagination or call-context arguments.
    InvalidArgument(String),
    /// A single-result query matched more than one row.
    NonUniqueResult { count: usize },
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "record not found: {table}#{id}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::LockTimeout(message) => write!(f, "lock wait timed out: {message}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NonUniqueResult { count } => {
                write!(f, "expected at most one result, query matched {count}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. }
            | Self::ConstraintViolation(_)
            | Self::LockTimeout(_)
            | Self::InvalidArgument(_)
            | Self::NonUniqueResult { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        let code = match &value {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
            _ => None,
        };

        match code {
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation(value.to_string()),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::LockTimeout(value.to_string())
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some("boom".to_string()))
    }

    #[test]
    fn constraint_failures_map_to_constraint_violation() {
        let err: RepoError = sqlite_failure(ffi::SQLITE_CONSTRAINT).into();
        assert!(matches!(err, RepoError::ConstraintViolation(_)));
    }

    #[test]
    fn busy_and_locked_map_to_lock_timeout() {
        let busy: RepoError = sqlite_failure(ffi::SQLITE_BUSY).into();
        let locked: RepoError = sqlite_failure(ffi::SQLITE_LOCKED).into();
        assert!(matches!(busy, RepoError::LockTimeout(_)));
        assert!(matches!(locked, RepoError::LockTimeout(_)));
    }

    #[test]
    fn other_sqlite_errors_pass_through() {
        let err: RepoError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepoError::Db(_)));
    }
}
