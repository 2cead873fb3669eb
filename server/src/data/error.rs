//! Storage failures surfaced to the filter engine and services
//!
//! Anything here is a server-side fault; callers never see the details.

use thiserror::Error;

use crate::data::sqlite::SqliteError;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    #[error("Schema migration {version} ({name}) failed: {error}")]
    Migration {
        version: i32,
        name: String,
        error: String,
    },

    /// A persisted row (segment rules, callout form) no longer decodes
    #[error("Corrupt {entity} record {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

impl DataError {
    pub fn from_sqlite(e: sqlx::Error) -> Self {
        Self::Sqlite(e)
    }

    pub fn corrupt(entity: &'static str, id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corrupt {
            entity,
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<SqliteError> for DataError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::Migration {
                version,
                name,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_keeps_context() {
        let err = DataError::from(SqliteError::MigrationFailed {
            version: 2,
            name: "version_check".to_string(),
            error: "syntax error".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Schema migration 2 (version_check) failed: syntax error"
        );
    }

    #[test]
    fn test_corrupt_error_display() {
        let err = DataError::corrupt("segment", "s1", "expected value");
        assert_eq!(err.to_string(), "Corrupt segment record s1: expected value");
    }
}
