//! Shared API types
//!
//! Error responses and the query parameters shared by every search endpoint.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use validator::Validate;

use crate::core::SearchConfig;
use crate::data::DataError;
use crate::data::filters::{
    FilterError, PageRequest, RuleGroup, SortDirection, SortSpec, parse_rule_group,
};
use crate::domain::SegmentError;

/// Maximum length of a sort field name
pub const MAX_SORT_FIELD_LENGTH: u64 = 64;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn from_data(e: DataError) -> Self {
        tracing::error!(error = %e, "Data error");
        Self::internal("Database operation failed")
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::QueryExecution(data) => Self::from_data(data),
            other => Self::bad_request(other.code(), other.to_string()),
        }
    }
}

impl From<SegmentError> for ApiError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::NotFound(_) => Self::not_found("SEGMENT_NOT_FOUND", e.to_string()),
            SegmentError::InvalidRules(source) | SegmentError::Search(source) => source.into(),
            SegmentError::StaleRules { ref source, .. } => {
                let code = source.code();
                Self::conflict("SEGMENT_RULES_STALE", format!("{} ({})", e, code))
            }
            SegmentError::Data(data) => Self::from_data(data),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

/// Paging and ordering parameters
///
/// `limit=-1` asks for every matching row.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    #[validate(length(min = 1, max = MAX_SORT_FIELD_LENGTH))]
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl PageParams {
    pub fn page_request(&self, search: &SearchConfig) -> Result<PageRequest, FilterError> {
        page_request(
            self.offset,
            self.limit,
            self.sort.as_deref(),
            self.order.as_deref(),
            search,
        )
    }
}

/// Query parameters for entity search endpoints
///
/// Kept flat rather than embedding [`PageParams`] because urlencoded
/// numbers cannot pass through `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SearchParams {
    /// Rule group as a JSON document
    pub rules: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    #[validate(length(min = 1, max = MAX_SORT_FIELD_LENGTH))]
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl SearchParams {
    pub fn rule_group(&self, search: &SearchConfig) -> Result<Option<RuleGroup>, FilterError> {
        self.rules
            .as_deref()
            .map(|json| parse_rule_group(json, search.max_rules_json_bytes))
            .transpose()
    }

    pub fn page_request(&self, search: &SearchConfig) -> Result<PageRequest, FilterError> {
        page_request(
            self.offset,
            self.limit,
            self.sort.as_deref(),
            self.order.as_deref(),
            search,
        )
    }
}

fn page_request(
    offset: Option<i64>,
    limit: Option<i64>,
    sort: Option<&str>,
    order: Option<&str>,
    search: &SearchConfig,
) -> Result<PageRequest, FilterError> {
    let direction = order
        .map(str::parse::<SortDirection>)
        .transpose()?
        .unwrap_or_default();
    let sort = sort.map(|field| SortSpec::new(field, direction));

    Ok(PageRequest::new(
        offset.unwrap_or(0),
        limit.unwrap_or(i64::from(search.default_limit)),
        search.max_page_limit,
    )?
    .sorted_by(sort))
}
