//! Entity search endpoints
//!
//! One generic handler serves every [`Transformer`]; each entity gets its own
//! router with its own state.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::api::extractors::{CallerIdentity, ValidatedQuery};
use crate::api::types::{ApiError, SearchParams};
use crate::core::SearchConfig;
use crate::data::filters::Paginated;
use crate::domain::Transformer;
use crate::domain::transformer::search;

pub struct SearchApiState<T> {
    pub transformer: Arc<T>,
    pub pool: SqlitePool,
    pub search: SearchConfig,
}

impl<T> Clone for SearchApiState<T> {
    fn clone(&self) -> Self {
        Self {
            transformer: self.transformer.clone(),
            pool: self.pool.clone(),
            search: self.search.clone(),
        }
    }
}

/// `GET /` searching the entity with `rules`, `offset`, `limit`, `sort`, `order`
pub fn routes<T>(transformer: Arc<T>, pool: SqlitePool, search: SearchConfig) -> Router<()>
where
    T: Transformer + 'static,
{
    Router::new()
        .route("/", get(list::<T>))
        .with_state(SearchApiState {
            transformer,
            pool,
            search,
        })
}

async fn list<T>(
    State(state): State<SearchApiState<T>>,
    CallerIdentity(caller): CallerIdentity,
    ValidatedQuery(params): ValidatedQuery<SearchParams>,
) -> Result<Json<Paginated<T::Item>>, ApiError>
where
    T: Transformer + 'static,
{
    let rules = params.rule_group(&state.search)?;
    let page = params.page_request(&state.search)?;

    let result = search(
        state.transformer.as_ref(),
        &state.pool,
        &caller,
        rules.as_ref(),
        &page,
    )
    .await?;

    tracing::debug!(
        table = state.transformer.source().table,
        role = %caller.role,
        total = result.total,
        count = result.count,
        "Search served"
    );
    Ok(Json(result))
}
