//! Filter error types
//!
//! Everything except `QueryExecution` is raised before any SQL runs and is
//! the caller's fault. Messages name the offending field, operator or value
//! but never include generated SQL or bound parameters.

use thiserror::Error;

use crate::data::DataError;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Malformed rule group: {0}")]
    MalformedRuleGroup(String),

    #[error("Unknown filter field: {field}")]
    UnknownField { field: String },

    #[error("Invalid operator '{operator}' for field {field}")]
    InvalidOperator { field: String, operator: String },

    #[error("Operator '{operator}' on field {field} expects {expected} value(s), got {actual}")]
    InvalidValueCount {
        field: String,
        operator: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value {value} for field {field}")]
    InvalidValue { field: String, value: String },

    #[error("Cannot resolve {namespace} '{instance_id}' referenced by field {field}")]
    UnresolvableDynamicField {
        field: String,
        namespace: String,
        instance_id: String,
    },

    #[error("Cannot sort by: {field}")]
    InvalidSortField { field: String },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Query execution failed")]
    QueryExecution(#[from] DataError),
}

impl FilterError {
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    pub fn invalid_operator(field: impl Into<String>, operator: impl ToString) -> Self {
        Self::InvalidOperator {
            field: field.into(),
            operator: operator.to_string(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRuleGroup(_) => "MALFORMED_RULE_GROUP",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::InvalidOperator { .. } => "INVALID_OPERATOR",
            Self::InvalidValueCount { .. } => "INVALID_VALUE_COUNT",
            Self::InvalidValue { .. } => "INVALID_VALUE",
            Self::UnresolvableDynamicField { .. } => "UNRESOLVABLE_DYNAMIC_FIELD",
            Self::InvalidSortField { .. } => "INVALID_SORT_FIELD",
            Self::InvalidPagination(_) => "INVALID_PAGINATION",
            Self::QueryExecution(_) => "QUERY_EXECUTION",
        }
    }

    /// True for errors caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::QueryExecution(_))
    }
}

impl From<sqlx::Error> for FilterError {
    fn from(e: sqlx::Error) -> Self {
        Self::QueryExecution(DataError::from_sqlite(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = FilterError::InvalidValueCount {
            field: "joined".to_string(),
            operator: "between".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Operator 'between' on field joined expects 2 value(s), got 1"
        );
        assert_eq!(err.code(), "INVALID_VALUE_COUNT");
    }

    #[test]
    fn execution_errors_hide_driver_details() {
        let err = FilterError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "Query execution failed");
        assert!(!err.is_client_error());
        assert!(FilterError::unknown_field("x").is_client_error());
    }
}
