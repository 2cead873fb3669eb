//! Row types shared by repositories and services

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Segment types
// ============================================================================

/// Segment row from database
///
/// `rule_group` is the stored rule group JSON, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct SegmentRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub order: i64,
    pub rule_group: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields to change on a segment; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct SegmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub rule_group: Option<String>,
}

impl SegmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.order.is_none()
            && self.rule_group.is_none()
    }
}

// ============================================================================
// Callout types
// ============================================================================

/// The parts of a callout needed to derive its response fields
#[derive(Debug, Clone, PartialEq, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct CalloutFormRow {
    pub id: String,
    pub hidden: bool,
    pub form_schema: String,
}
