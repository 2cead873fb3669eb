//! Caller identity, path and validation extractors for API routes
//!
//! The caller is read from headers set by the upstream auth gateway:
//!
//! | Header           | Value                                   | Absent        |
//! |------------------|-----------------------------------------|---------------|
//! | `x-contact-id`   | contact id                              | no contact    |
//! | `x-contact-role` | `anonymous`/`member`/`admin`/`superadmin` | see below   |
//!
//! A missing role means `member` when a contact id is present and
//! `anonymous` otherwise.

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::core::constants::{HEADER_CONTACT_ID, HEADER_CONTACT_ROLE};
use crate::data::filters::{Caller, CallerRole};

/// Maximum length for IDs (segments, contacts)
pub const MAX_ID_LENGTH: usize = 256;

/// Validate generic ID length
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LENGTH
}

/// Validated single-id path extractor (`/{id}`)
#[derive(Debug)]
pub struct IdPath(pub String);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&id) {
            return Err(ValidationRejection::InvalidId);
        }
        Ok(Self(id))
    }
}

/// The party a request runs on behalf of
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Caller);

impl Deref for CallerIdentity {
    type Target = Caller;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ValidationRejection> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| ValidationRejection::InvalidCaller(format!("{} is not valid text", name))),
    }
}

/// Build a caller from gateway header values
pub fn caller_from_headers(
    contact_id: Option<&str>,
    role: Option<&str>,
) -> Result<Caller, ValidationRejection> {
    if let Some(id) = contact_id
        && !is_valid_id(id)
    {
        return Err(ValidationRejection::InvalidCaller(format!(
            "{} must be 1-{} characters",
            HEADER_CONTACT_ID, MAX_ID_LENGTH
        )));
    }

    let role = match role {
        Some(role) => role
            .parse::<CallerRole>()
            .map_err(ValidationRejection::InvalidCaller)?,
        None if contact_id.is_some() => CallerRole::Member,
        None => CallerRole::Anonymous,
    };

    match (role, contact_id) {
        (CallerRole::Anonymous, _) => Ok(Caller::anonymous()),
        (_, None) => Err(ValidationRejection::InvalidCaller(format!(
            "Role '{}' requires {}",
            role, HEADER_CONTACT_ID
        ))),
        (role, Some(id)) => Ok(Caller {
            contact_id: Some(id.to_string()),
            role,
        }),
    }
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let contact_id = header_str(parts, HEADER_CONTACT_ID)?;
        let role = header_str(parts, HEADER_CONTACT_ROLE)?;
        let caller = caller_from_headers(contact_id, role)?;
        tracing::trace!(role = %caller.role, contact_id = ?caller.contact_id, "Caller identified");
        Ok(Self(caller))
    }
}

/// Caller extractor that only admits admins
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

impl Deref for AdminCaller {
    type Target = Caller;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CallerIdentity(caller) = CallerIdentity::from_request_parts(parts, state).await?;
        if !caller.is_admin() {
            return Err(ValidationRejection::AdminRequired);
        }
        Ok(Self(caller))
    }
}

/// Rejection type for validated extractors
#[derive(Debug)]
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    /// Invalid id format
    InvalidId,
    /// Malformed identity headers
    InvalidCaller(String),
    /// Caller lacks the admin role
    AdminRequired,
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "PATH_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::InvalidId => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "INVALID_ID",
                format!("Invalid id: must be 1-{} characters", MAX_ID_LENGTH),
            ),
            Self::InvalidCaller(message) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "INVALID_CALLER",
                message,
            ),
            Self::AdminRequired => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "ADMIN_REQUIRED",
                "This endpoint requires an admin caller".to_string(),
            ),
            Self::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "QUERY_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Json(rejection) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "JSON_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "VALIDATION_ERROR",
                format_validation_errors(&errors),
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

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation.
///
/// Deserializes query parameters and validates them using the `validator` crate.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

/// JSON body extractor with automatic validation.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}
