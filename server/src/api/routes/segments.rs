//! Segment endpoints (admin only)

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::extractors::{AdminCaller, IdPath, ValidatedJson, ValidatedQuery};
use crate::api::types::{ApiError, PageParams};
use crate::core::SearchConfig;
use crate::data::filters::{Paginated, RuleGroup};
use crate::domain::contacts::Contact;
use crate::domain::{NewSegment, Segment, SegmentPatch, SegmentService};

#[derive(Clone)]
pub struct SegmentsApiState {
    pub segments: Arc<SegmentService>,
    pub search: SearchConfig,
}

pub fn routes(segments: Arc<SegmentService>, search: SearchConfig) -> Router<()> {
    Router::new()
        .route("/", get(list_segments).post(create_segment))
        .route(
            "/{id}",
            get(get_segment).patch(update_segment).delete(delete_segment),
        )
        .route("/{id}/contacts", get(list_segment_contacts))
        .with_state(SegmentsApiState { segments, search })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    #[serde(default)]
    pub order: i64,
    pub rule_group: RuleGroup,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSegmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub order: Option<i64>,
    pub rule_group: Option<RuleGroup>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListSegmentsQuery {
    /// Include each segment's current contact count
    #[serde(default)]
    pub with_count: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResponse {
    #[serde(flatten)]
    pub segment: Segment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_count: Option<u64>,
}

async fn list_segments(
    State(state): State<SegmentsApiState>,
    caller: AdminCaller,
    ValidatedQuery(query): ValidatedQuery<ListSegmentsQuery>,
) -> Result<Json<Vec<SegmentResponse>>, ApiError> {
    let segments = state.segments.list().await?;

    let mut response = Vec::with_capacity(segments.len());
    for segment in segments {
        let contact_count = if query.with_count {
            Some(state.segments.count_contacts(&caller, &segment.id).await?)
        } else {
            None
        };
        response.push(SegmentResponse {
            segment,
            contact_count,
        });
    }
    Ok(Json(response))
}

async fn create_segment(
    State(state): State<SegmentsApiState>,
    caller: AdminCaller,
    ValidatedJson(body): ValidatedJson<CreateSegmentRequest>,
) -> Result<(StatusCode, Json<Segment>), ApiError> {
    let segment = state
        .segments
        .create(
            &caller,
            NewSegment {
                name: body.name,
                description: body.description,
                order: body.order,
                rule_group: body.rule_group,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(segment)))
}

async fn get_segment(
    State(state): State<SegmentsApiState>,
    _caller: AdminCaller,
    IdPath(id): IdPath,
) -> Result<Json<Segment>, ApiError> {
    Ok(Json(state.segments.get(&id).await?))
}

async fn update_segment(
    State(state): State<SegmentsApiState>,
    caller: AdminCaller,
    IdPath(id): IdPath,
    ValidatedJson(body): ValidatedJson<UpdateSegmentRequest>,
) -> Result<Json<Segment>, ApiError> {
    let patch = SegmentPatch {
        name: body.name,
        description: body.description,
        order: body.order,
        rule_group: body.rule_group,
    };
    Ok(Json(state.segments.update(&caller, &id, patch).await?))
}

async fn delete_segment(
    State(state): State<SegmentsApiState>,
    _caller: AdminCaller,
    IdPath(id): IdPath,
) -> Result<StatusCode, ApiError> {
    state.segments.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Contacts in the segment; `limit=-1` returns all of them
async fn list_segment_contacts(
    State(state): State<SegmentsApiState>,
    caller: AdminCaller,
    IdPath(id): IdPath,
    ValidatedQuery(params): ValidatedQuery<PageParams>,
) -> Result<Json<Paginated<Contact>>, ApiError> {
    let page = params.page_request(&state.search)?;
    Ok(Json(
        state.segments.list_contacts(&caller, &id, &page).await?,
    ))
}
