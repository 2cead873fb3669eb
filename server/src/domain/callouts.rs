//! Callouts
//!
//! A callout's lifecycle `status` is not stored; it follows from `starts`
//! and `expires` against the current time. The same rules apply in SQL (the
//! virtual filter field) and in Rust (the DTO).
//!
//! Also home to [`CalloutFieldResolver`], which turns a callout's form into
//! the `callouts.<id>.*` fields contacts can be filtered by.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::transformer::Transformer;
use crate::data::DataError;
use crate::data::filters::dates::{parse_sql_datetime, to_sql_datetime};
use crate::data::filters::{
    Caller, CompileContext, DynamicFieldResolver, FieldHandlerMap, FilterDefinition,
    FilterError, FilterSchema, HandlerArgs, QuerySource, Rule, RuleGroup, RuleOperator,
    SortDirection, TypedValue,
};
use crate::data::sqlite::repositories;

/// Field prefix under a callout's namespace for response answers
pub const ANSWERS_PREFIX: &str = "responses.answers.";
pub const HAS_ANSWERED_FIELD: &str = "hasAnswered";

static SOURCE: QuerySource = QuerySource {
    table: "callouts",
    alias: "cl",
    sortable: &[
        ("title", r#"cl."title""#),
        ("starts", r#"cl."starts""#),
        ("expires", r#"cl."expires""#),
    ],
    default_sort: ("starts", SortDirection::Desc),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutStatus {
    Draft,
    Scheduled,
    Open,
    Ended,
}

impl CalloutStatus {
    pub const ALL: [CalloutStatus; 4] = [Self::Draft, Self::Scheduled, Self::Open, Self::Ended];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Open => "open",
            Self::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Status of a callout with the given window at `now`
    pub fn at(
        starts: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        match (starts, expires) {
            (None, _) => Self::Draft,
            (Some(starts), _) if starts > now => Self::Scheduled,
            (Some(_), Some(expires)) if expires <= now => Self::Ended,
            _ => Self::Open,
        }
    }
}

fn callout_status(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    if args.operator() != RuleOperator::Equal {
        return Err(FilterError::invalid_operator(args.field(), args.operator()));
    }
    let value = args
        .value()
        .first()
        .and_then(TypedValue::as_text)
        .unwrap_or_default();
    let status = CalloutStatus::parse(value)
        .ok_or_else(|| FilterError::invalid_value(args.field(), value))?;

    let starts = args.column_named("starts");
    let expires = args.column_named("expires");
    if status == CalloutStatus::Draft {
        return Ok(format!("{} IS NULL", starts));
    }

    let now = ctx.param(args.field(), to_sql_datetime(&ctx.now()));
    Ok(match status {
        CalloutStatus::Scheduled => format!("datetime({}) > datetime({})", starts, now),
        CalloutStatus::Open => format!(
            "datetime({s}) <= datetime({n}) AND ({e} IS NULL OR datetime({e}) > datetime({n}))",
            s = starts,
            e = expires,
            n = now
        ),
        _ => format!(
            "datetime({s}) <= datetime({n}) AND datetime({e}) <= datetime({n})",
            s = starts,
            e = expires,
            n = now
        ),
    })
}

#[derive(Debug, Clone, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct CalloutRow {
    pub id: String,
    pub title: String,
    pub starts: Option<String>,
    pub expires: Option<String>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Callout {
    pub id: String,
    pub title: String,
    pub starts: Option<String>,
    pub expires: Option<String>,
    pub hidden: bool,
    pub status: CalloutStatus,
}

pub struct CalloutTransformer {
    schema: FilterSchema,
    handlers: FieldHandlerMap,
}

impl CalloutTransformer {
    pub fn new() -> Self {
        let schema = FilterSchema::new()
            .with("id", FilterDefinition::text())
            .with("title", FilterDefinition::text())
            .with("starts", FilterDefinition::date().nullable())
            .with("expires", FilterDefinition::date().nullable())
            .with("hidden", FilterDefinition::boolean())
            .with(
                "status",
                FilterDefinition::enumeration(CalloutStatus::ALL.iter().map(|s| s.as_str())),
            );
        let handlers = FieldHandlerMap::new().with("status", callout_status);
        Self { schema, handlers }
    }
}

impl Default for CalloutTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for CalloutTransformer {
    type Row = CalloutRow;
    type Item = Callout;

    fn source(&self) -> &'static QuerySource {
        &SOURCE
    }

    fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    fn handlers(&self) -> &FieldHandlerMap {
        &self.handlers
    }

    /// Non-admins, anonymous included, see open callouts that are not hidden
    fn implicit_rules(&self, caller: &Caller) -> Option<RuleGroup> {
        if caller.is_admin() {
            return None;
        }
        Some(RuleGroup::and([
            Rule::new("status", RuleOperator::Equal, vec!["open".into()]).into(),
            Rule::new("hidden", RuleOperator::Equal, vec![false.into()]).into(),
        ]))
    }

    fn to_item(&self, row: CalloutRow) -> Callout {
        let status = CalloutStatus::at(
            row.starts.as_deref().and_then(parse_sql_datetime),
            row.expires.as_deref().and_then(parse_sql_datetime),
            Utc::now(),
        );
        Callout {
            id: row.id,
            title: row.title,
            starts: row.starts,
            expires: row.expires,
            hidden: row.hidden,
            status,
        }
    }
}

// ============================================================================
// Form-derived fields
// ============================================================================

#[derive(Debug, Deserialize)]
struct CalloutForm {
    #[serde(default)]
    slides: Vec<FormSlide>,
}

#[derive(Debug, Deserialize)]
struct FormSlide {
    id: String,
    #[serde(default)]
    components: Vec<FormComponent>,
}

#[derive(Debug, Deserialize)]
struct FormComponent {
    key: String,
    #[serde(rename = "type")]
    component_type: String,
    #[serde(default)]
    values: Vec<FormOption>,
}

#[derive(Debug, Deserialize)]
struct FormOption {
    value: String,
}

impl FormComponent {
    /// `None` for layout-only components
    fn filter_definition(&self) -> Option<FilterDefinition> {
        let definition = match self.component_type.as_str() {
            "textfield" | "textarea" | "email" | "url" | "phoneNumber" => FilterDefinition::text(),
            "number" | "currency" => FilterDefinition::number(),
            "checkbox" => FilterDefinition::boolean(),
            "datetime" => FilterDefinition::date(),
            "select" | "radio" => {
                FilterDefinition::enumeration(self.values.iter().map(|v| v.value.as_str()))
            }
            _ => return None,
        };
        // Unanswered questions are absent from the answers object
        Some(definition.nullable())
    }
}

/// Slide ids and component keys become JSON path labels, split on `.`
fn is_path_label(label: &str) -> bool {
    !label.is_empty() && !label.contains(['.', '"'])
}

impl CalloutForm {
    /// Answer fields whose slide id or key cannot be addressed are left out,
    /// so rules naming them fail validation as unknown fields
    fn filter_schema(&self, callout_id: &str) -> FilterSchema {
        let answers = self.slides.iter().flat_map(|slide| {
            slide.components.iter().filter_map(move |component| {
                let definition = component.filter_definition()?;
                if !is_path_label(&slide.id) || !is_path_label(&component.key) {
                    tracing::warn!(
                        callout_id,
                        slide = %slide.id,
                        key = %component.key,
                        "Form field is not filterable"
                    );
                    return None;
                }
                Some((
                    format!("{}{}.{}", ANSWERS_PREFIX, slide.id, component.key),
                    definition,
                ))
            })
        });

        std::iter::once((HAS_ANSWERED_FIELD.to_string(), FilterDefinition::boolean()))
            .chain(answers)
            .collect()
    }
}

/// Resolves `callouts.<id>.*` fields from the callout's stored form
pub struct CalloutFieldResolver {
    pool: SqlitePool,
}

impl CalloutFieldResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DynamicFieldResolver for CalloutFieldResolver {
    fn namespace(&self) -> &'static str {
        "callouts"
    }

    async fn resolve(
        &self,
        instance_id: &str,
        caller: &Caller,
    ) -> Result<Option<FilterSchema>, DataError> {
        let Some(row) = repositories::get_callout_form(&self.pool, instance_id).await? else {
            return Ok(None);
        };
        if row.hidden && !caller.is_admin() {
            return Ok(None);
        }

        let form: CalloutForm = serde_json::from_str(&row.form_schema)
            .map_err(|e| DataError::corrupt("callout", &row.id, e))?;
        Ok(Some(form.filter_schema(&row.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::{FilterType, PageRequest};
    use crate::domain::fixtures;
    use crate::domain::transformer::search;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_status_at() {
        let now = ts(2024, 6, 1);
        assert_eq!(CalloutStatus::at(None, None, now), CalloutStatus::Draft);
        assert_eq!(
            CalloutStatus::at(Some(ts(2024, 7, 1)), None, now),
            CalloutStatus::Scheduled
        );
        assert_eq!(
            CalloutStatus::at(Some(ts(2024, 5, 1)), None, now),
            CalloutStatus::Open
        );
        assert_eq!(
            CalloutStatus::at(Some(ts(2024, 5, 1)), Some(ts(2024, 7, 1)), now),
            CalloutStatus::Open
        );
        assert_eq!(
            CalloutStatus::at(Some(ts(2024, 5, 1)), Some(ts(2024, 6, 1)), now),
            CalloutStatus::Ended
        );
    }

    #[test]
    fn test_form_schema_fields() {
        let form: CalloutForm = serde_json::from_str(fixtures::SURVEY_FORM).unwrap();
        let schema = form.filter_schema("survey");

        assert_eq!(schema.len(), 3);
        assert_eq!(
            schema.get("hasAnswered").unwrap().filter_type,
            FilterType::Boolean
        );
        let colour = schema.get("responses.answers.s1.colour").unwrap();
        assert_eq!(colour.filter_type, FilterType::Enum);
        assert_eq!(
            colour.options,
            Some(vec!["red".to_string(), "blue".to_string()])
        );
        assert!(colour.nullable);
        assert!(schema.contains("responses.answers.s1.agree"));
        assert!(!schema.contains("responses.answers.s1.intro"));
    }

    #[test]
    fn test_unaddressable_form_fields_are_left_out() {
        let form: CalloutForm = serde_json::from_str(
            r#"{"slides": [
                {"id": "p.1", "components": [{"key": "q", "type": "textfield"}]},
                {"id": "p", "components": [
                    {"key": "1.q", "type": "textfield"},
                    {"key": "say \"hi\"", "type": "textfield"},
                    {"key": "ok", "type": "textfield"}
                ]}
            ]}"#,
        )
        .unwrap();
        let schema = form.filter_schema("dotted");

        assert_eq!(schema.len(), 2);
        assert!(schema.contains("hasAnswered"));
        assert!(schema.contains("responses.answers.p.ok"));
        assert!(!schema.contains("responses.answers.p.1.q"));
    }

    async fn seeded() -> fixtures::Db {
        let db = fixtures::db().await;
        let pool = db.pool();
        fixtures::callout(pool, "draft", None, None, false, "{}").await;
        fixtures::callout(pool, "soon", Some("2999-01-01 00:00:00"), None, false, "{}").await;
        fixtures::callout(pool, "live", Some("2020-01-01 00:00:00"), None, false, "{}").await;
        fixtures::callout(pool, "secret", Some("2020-01-01 00:00:00"), None, true, "{}").await;
        fixtures::callout(
            pool,
            "past",
            Some("2020-01-01 00:00:00"),
            Some("2021-01-01 00:00:00"),
            false,
            "{}",
        )
        .await;
        db
    }

    async fn ids_with_status(db: &fixtures::Db, caller: &Caller, status: &str) -> Vec<String> {
        let rules = RuleGroup::and([
            Rule::new("status", RuleOperator::Equal, vec![status.into()]).into(),
        ]);
        let mut ids: Vec<String> = search(
            &CalloutTransformer::new(),
            db.pool(),
            caller,
            Some(&rules),
            &PageRequest::unbounded(),
        )
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|c| c.id)
        .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_status_filter_for_admin() {
        let db = seeded().await;
        let admin = Caller::admin("a1");

        assert_eq!(ids_with_status(&db, &admin, "draft").await, vec!["draft"]);
        assert_eq!(ids_with_status(&db, &admin, "scheduled").await, vec!["soon"]);
        assert_eq!(ids_with_status(&db, &admin, "open").await, vec!["live", "secret"]);
        assert_eq!(ids_with_status(&db, &admin, "ended").await, vec!["past"]);
    }

    #[tokio::test]
    async fn test_non_admins_see_open_visible_callouts() {
        let db = seeded().await;

        assert_eq!(
            ids_with_status(&db, &Caller::member("m1"), "open").await,
            vec!["live"]
        );
        assert!(
            ids_with_status(&db, &Caller::anonymous(), "ended")
                .await
                .is_empty()
        );

        let page = search(
            &CalloutTransformer::new(),
            db.pool(),
            &Caller::anonymous(),
            None,
            &PageRequest::unbounded(),
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, CalloutStatus::Open);
    }

    #[tokio::test]
    async fn test_status_only_supports_equal() {
        let db = seeded().await;
        let rules = RuleGroup::and([
            Rule::new("status", RuleOperator::NotEqual, vec!["open".into()]).into(),
        ]);

        let err = search(
            &CalloutTransformer::new(),
            db.pool(),
            &Caller::admin("a1"),
            Some(&rules),
            &PageRequest::unbounded(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidOperator { ref field, .. } if field == "status"));
    }

    #[tokio::test]
    async fn test_resolver_hides_hidden_callouts_from_members() {
        let db = fixtures::db().await;
        fixtures::callout(db.pool(), "open", None, None, false, fixtures::SURVEY_FORM).await;
        fixtures::callout(db.pool(), "hidden", None, None, true, fixtures::SURVEY_FORM).await;
        let resolver = CalloutFieldResolver::new(db.pool().clone());

        let member = Caller::member("m1");
        assert!(resolver.resolve("open", &member).await.unwrap().is_some());
        assert!(resolver.resolve("hidden", &member).await.unwrap().is_none());
        assert!(resolver.resolve("missing", &member).await.unwrap().is_none());
        assert!(
            resolver
                .resolve("hidden", &Caller::admin("a1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_resolver_reports_corrupt_form() {
        let db = fixtures::db().await;
        fixtures::callout(db.pool(), "broken", None, None, false, "not json").await;
        let resolver = CalloutFieldResolver::new(db.pool().clone());

        let err = resolver
            .resolve("broken", &Caller::admin("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Corrupt { entity: "callout", .. }));
    }
}
