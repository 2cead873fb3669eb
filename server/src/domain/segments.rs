//! Segments: saved contact searches
//!
//! A segment's rule group is validated against the contact schema when it is
//! written, and again every time it is evaluated, since callouts and their
//! forms can change underneath a stored segment.

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use super::contacts::{Contact, ContactTransformer};
use super::transformer::{count_matching, search, validate_rules};
use crate::data::DataError;
use crate::data::filters::{
    Caller, FilterError, PageRequest, Paginated, RuleGroup, ValidationContext,
};
use crate::data::sqlite::{SqliteError, repositories};
use crate::data::types::{SegmentRow, SegmentUpdate};

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Segment not found: {0}")]
    NotFound(String),

    #[error("Invalid rules: {0}")]
    InvalidRules(#[source] FilterError),

    #[error("Stored rules of segment {id} are no longer valid: {source}")]
    StaleRules { id: String, source: FilterError },

    #[error("Search failed: {0}")]
    Search(#[source] FilterError),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<SqliteError> for SegmentError {
    fn from(e: SqliteError) -> Self {
        Self::Data(e.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub description: String,
    pub order: i64,
    pub rule_group: RuleGroup,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SegmentRow> for Segment {
    type Error = DataError;

    fn try_from(row: SegmentRow) -> Result<Self, Self::Error> {
        let rule_group = serde_json::from_str(&row.rule_group)
            .map_err(|e| DataError::corrupt("segment", &row.id, e))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            order: row.order,
            rule_group,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewSegment {
    pub name: String,
    pub description: String,
    pub order: i64,
    pub rule_group: RuleGroup,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub rule_group: Option<RuleGroup>,
}

pub struct SegmentService {
    pool: SqlitePool,
    contacts: Arc<ContactTransformer>,
}

impl SegmentService {
    pub fn new(pool: SqlitePool, contacts: Arc<ContactTransformer>) -> Self {
        Self { pool, contacts }
    }

    async fn check_rules(&self, caller: &Caller, rules: &RuleGroup) -> Result<String, SegmentError> {
        let ctx = ValidationContext::for_caller(caller);
        validate_rules(self.contacts.as_ref(), caller, rules, &ctx)
            .await
            .map_err(|e| match e {
                FilterError::QueryExecution(data) => SegmentError::Data(data),
                other => SegmentError::InvalidRules(other),
            })?;
        serde_json::to_string(rules)
            .map_err(|e| SegmentError::InvalidRules(FilterError::MalformedRuleGroup(e.to_string())))
    }

    pub async fn list(&self) -> Result<Vec<Segment>, SegmentError> {
        let rows = repositories::list_segments(&self.pool).await?;
        rows.into_iter()
            .map(|row| Segment::try_from(row).map_err(SegmentError::from))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Segment, SegmentError> {
        let row = repositories::get_segment(&self.pool, id)
            .await?
            .ok_or_else(|| SegmentError::NotFound(id.to_string()))?;
        Ok(Segment::try_from(row)?)
    }

    pub async fn create(&self, caller: &Caller, segment: NewSegment) -> Result<Segment, SegmentError> {
        let rule_group = self.check_rules(caller, &segment.rule_group).await?;
        let row = repositories::create_segment(
            &self.pool,
            &segment.name,
            &segment.description,
            segment.order,
            &rule_group,
        )
        .await?;

        tracing::debug!(segment_id = %row.id, "Segment created");
        Ok(Segment::try_from(row)?)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        patch: SegmentPatch,
    ) -> Result<Segment, SegmentError> {
        let rule_group = match &patch.rule_group {
            Some(rules) => Some(self.check_rules(caller, rules).await?),
            None => None,
        };
        let update = SegmentUpdate {
            name: patch.name,
            description: patch.description,
            order: patch.order,
            rule_group,
        };
        if update.is_empty() {
            return self.get(id).await;
        }

        let row = repositories::update_segment(&self.pool, id, &update)
            .await?
            .ok_or_else(|| SegmentError::NotFound(id.to_string()))?;
        tracing::debug!(segment_id = %id, "Segment updated");
        Ok(Segment::try_from(row)?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SegmentError> {
        if !repositories::delete_segment(&self.pool, id).await? {
            return Err(SegmentError::NotFound(id.to_string()));
        }
        tracing::debug!(segment_id = %id, "Segment deleted");
        Ok(())
    }

    /// Map an evaluation failure, flagging rules the current schema rejects
    fn evaluation_error(id: &str, e: FilterError) -> SegmentError {
        match e {
            FilterError::QueryExecution(data) => SegmentError::Data(data),
            FilterError::InvalidSortField { .. } | FilterError::InvalidPagination(_) => {
                SegmentError::Search(e)
            }
            other => {
                tracing::warn!(segment_id = %id, error = %other, "Stored segment rules rejected");
                SegmentError::StaleRules {
                    id: id.to_string(),
                    source: other,
                }
            }
        }
    }

    /// Number of contacts in the segment
    pub async fn count_contacts(&self, caller: &Caller, id: &str) -> Result<u64, SegmentError> {
        let segment = self.get(id).await?;
        count_matching(
            self.contacts.as_ref(),
            &self.pool,
            caller,
            Some(&segment.rule_group),
        )
        .await
        .map_err(|e| Self::evaluation_error(id, e))
    }

    /// One page of the segment's contacts; `PageRequest::unbounded` yields all
    pub async fn list_contacts(
        &self,
        caller: &Caller,
        id: &str,
        page: &PageRequest,
    ) -> Result<Paginated<Contact>, SegmentError> {
        let segment = self.get(id).await?;
        search(
            self.contacts.as_ref(),
            &self.pool,
            caller,
            Some(&segment.rule_group),
            page,
        )
        .await
        .map_err(|e| Self::evaluation_error(id, e))
    }
}
