//! Callout responses

use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use super::transformer::{Transformer, contact_id_column, owned_by_caller};
use crate::data::filters::{
    Caller, CompileContext, FieldHandlerMap, FilterDefinition, FilterError, FilterSchema,
    HandlerArgs, QuerySource, RuleGroup, SortDirection,
};

static SOURCE: QuerySource = QuerySource {
    table: "callout_responses",
    alias: "r",
    sortable: &[
        ("createdAt", r#"r."createdAt""#),
        ("bucket", r#"r."bucket""#),
    ],
    default_sort: ("createdAt", SortDirection::Desc),
};

fn callout_id_column(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    ctx.emit_default(&args.column_named("calloutId"), args)
}

#[derive(Debug, Clone, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct ResponseRow {
    pub id: String,
    pub callout_id: String,
    pub contact_id: Option<String>,
    pub answers: String,
    pub bucket: String,
    pub is_bookmarked: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutResponse {
    pub id: String,
    pub callout: String,
    pub contact: Option<String>,
    pub answers: Value,
    pub bucket: String,
    pub is_bookmarked: bool,
    pub created_at: String,
}

pub struct ResponseTransformer {
    schema: FilterSchema,
    handlers: FieldHandlerMap,
}

impl ResponseTransformer {
    pub fn new() -> Self {
        let schema = FilterSchema::new()
            .with("id", FilterDefinition::text())
            .with("callout", FilterDefinition::text())
            .with("contact", FilterDefinition::contact().nullable())
            .with("bucket", FilterDefinition::text())
            .with("isBookmarked", FilterDefinition::boolean())
            .with("createdAt", FilterDefinition::date());
        let handlers = FieldHandlerMap::new()
            .with("callout", callout_id_column)
            .with("contact", contact_id_column);
        Self { schema, handlers }
    }
}

impl Default for ResponseTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for ResponseTransformer {
    type Row = ResponseRow;
    type Item = CalloutResponse;

    fn source(&self) -> &'static QuerySource {
        &SOURCE
    }

    fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    fn handlers(&self) -> &FieldHandlerMap {
        &self.handlers
    }

    fn implicit_rules(&self, caller: &Caller) -> Option<RuleGroup> {
        owned_by_caller(caller, "contact")
    }

    fn to_item(&self, row: ResponseRow) -> CalloutResponse {
        let answers = serde_json::from_str(&row.answers).unwrap_or_else(|e| {
            tracing::warn!(response_id = %row.id, error = %e, "Unreadable response answers");
            Value::Null
        });
        CalloutResponse {
            id: row.id,
            callout: row.callout_id,
            contact: row.contact_id,
            answers,
            bucket: row.bucket,
            is_bookmarked: row.is_bookmarked,
            created_at: row.created_at,
        }
    }
}
