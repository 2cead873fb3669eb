//! Contacts
//!
//! Besides the stored columns, contacts can be filtered by:
//!
//! - `activeMembership`, `membershipStarts`, `membershipExpires` - derived
//!   from the contact's `member` role
//! - `callouts.<id>.hasAnswered` and
//!   `callouts.<id>.responses.answers.<slide>.<key>` - resolved per callout
//!   by [`CalloutFieldResolver`]

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::callouts::{ANSWERS_PREFIX, CalloutFieldResolver, HAS_ANSWERED_FIELD};
use super::transformer::{Transformer, owned_by_caller};
use crate::data::filters::dates::to_sql_datetime;
use crate::data::filters::handlers::quote_ident;
use crate::data::filters::{
    Caller, CompileContext, DynamicFieldResolver, FieldHandlerMap, FilterDefinition,
    FilterError, FilterSchema, HandlerArgs, QuerySource, RuleGroup, SortDirection, TypedValue,
};

const CALLOUTS_NAMESPACE: &str = "callouts.";

static SOURCE: QuerySource = QuerySource {
    table: "contacts",
    alias: "c",
    sortable: &[
        ("joined", r#"c."joined""#),
        ("lastSeen", r#"c."lastSeen""#),
        ("email", r#"c."email""#),
        ("firstname", r#"c."firstname""#),
        ("lastname", r#"c."lastname""#),
        ("contributionMonthlyAmount", r#"c."contributionMonthlyAmount""#),
    ],
    default_sort: ("joined", SortDirection::Desc),
};

fn bool_value(args: &HandlerArgs<'_>) -> Result<bool, FilterError> {
    args.value()
        .first()
        .and_then(TypedValue::as_bool)
        .ok_or_else(|| FilterError::invalid_value(args.field(), "non-boolean"))
}

fn active_membership(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    let active = bool_value(args)?;
    let now = ctx.param(args.field(), to_sql_datetime(&ctx.now()));
    let exists = format!(
        r#"EXISTS (SELECT 1 FROM contact_roles mr WHERE mr."contactId" = {id} AND mr."type" = 'member' AND datetime(mr."dateAdded") <= datetime({now}) AND (mr."dateExpires" IS NULL OR datetime(mr."dateExpires") > datetime({now})))"#,
        id = args.column_named("id"),
        now = now
    );
    Ok(if active { exists } else { format!("NOT {}", exists) })
}

fn membership_column(args: &HandlerArgs<'_>, column: &str) -> String {
    format!(
        r#"(SELECT mr.{} FROM contact_roles mr WHERE mr."contactId" = {} AND mr."type" = 'member')"#,
        quote_ident(column),
        args.column_named("id")
    )
}

fn membership_starts(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    ctx.emit_default(&membership_column(args, "dateAdded"), args)
}

fn membership_expires(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    ctx.emit_default(&membership_column(args, "dateExpires"), args)
}

/// JSON path of one answer; form labels never contain `.` or `"`
fn answer_path(slide: &str, key: &str) -> String {
    format!("$.\"{}\".\"{}\"", slide, key)
}

/// `callouts.<id>.*` fields, answered from `callout_responses`
///
/// Answer rules only match contacts with a response, so `is_empty` selects
/// respondents who skipped the question rather than non-respondents.
fn callout_field(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
    let field = args.field();
    let (callout_id, rest) = field
        .strip_prefix(CALLOUTS_NAMESPACE)
        .and_then(|f| f.split_once('.'))
        .ok_or_else(|| FilterError::unknown_field(field))?;

    let responses = |ctx: &mut CompileContext<'_>| {
        format!(
            r#"SELECT 1 FROM callout_responses cr WHERE cr."calloutId" = {} AND cr."contactId" = {}"#,
            ctx.param(field, callout_id),
            args.column_named("id")
        )
    };

    if rest == HAS_ANSWERED_FIELD {
        let answered = bool_value(args)?;
        let not = if answered { "" } else { "NOT " };
        return Ok(format!("{}EXISTS ({})", not, responses(ctx)));
    }

    let (slide, key) = rest
        .strip_prefix(ANSWERS_PREFIX)
        .and_then(|answer| answer.split_once('.'))
        .ok_or_else(|| FilterError::unknown_field(field))?;

    let subquery = responses(ctx);
    let path = ctx.param(field, answer_path(slide, key));
    let condition = ctx.emit_default(&format!(r#"json_extract(cr."answers", {})"#, path), args)?;
    Ok(format!("EXISTS ({} AND {})", subquery, condition))
}

#[derive(Debug, Clone, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct ContactRow {
    pub id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub joined: String,
    pub last_seen: Option<String>,
    pub contribution_type: String,
    pub contribution_monthly_amount: Option<f64>,
    pub contribution_period: Option<String>,
    pub delivery_opt_in: bool,
    pub newsletter_status: String,
    pub tags: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub joined: String,
    pub last_seen: Option<String>,
    pub contribution_type: String,
    pub contribution_monthly_amount: Option<f64>,
    pub contribution_period: Option<String>,
    pub delivery_opt_in: bool,
    pub newsletter_status: String,
    pub tags: Vec<String>,
    pub notes: String,
}

pub struct ContactTransformer {
    schema: FilterSchema,
    handlers: FieldHandlerMap,
    callouts: CalloutFieldResolver,
}

impl ContactTransformer {
    pub fn new(pool: SqlitePool) -> Self {
        let schema = FilterSchema::new()
            .with("id", FilterDefinition::contact())
            .with("email", FilterDefinition::text())
            .with("firstname", FilterDefinition::text())
            .with("lastname", FilterDefinition::text())
            .with("joined", FilterDefinition::date())
            .with("lastSeen", FilterDefinition::date().nullable())
            .with(
                "contributionType",
                FilterDefinition::enumeration(["Automatic", "Manual", "Gift", "None"]),
            )
            .with(
                "contributionMonthlyAmount",
                FilterDefinition::number().nullable(),
            )
            .with(
                "contributionPeriod",
                FilterDefinition::enumeration(["monthly", "annually"]).nullable(),
            )
            .with("deliveryOptIn", FilterDefinition::boolean())
            .with(
                "newsletterStatus",
                FilterDefinition::enumeration([
                    "subscribed",
                    "unsubscribed",
                    "cleaned",
                    "pending",
                    "none",
                ]),
            )
            .with("tags", FilterDefinition::array())
            .with("notes", FilterDefinition::blob())
            .with("activeMembership", FilterDefinition::boolean())
            .with("membershipStarts", FilterDefinition::date().nullable())
            .with("membershipExpires", FilterDefinition::date().nullable());

        let handlers = FieldHandlerMap::new()
            .with("activeMembership", active_membership)
            .with("membershipStarts", membership_starts)
            .with("membershipExpires", membership_expires)
            .with(CALLOUTS_NAMESPACE, callout_field);

        Self {
            schema,
            handlers,
            callouts: CalloutFieldResolver::new(pool),
        }
    }
}

impl Transformer for ContactTransformer {
    type Row = ContactRow;
    type Item = Contact;

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
        owned_by_caller(caller, "id")
    }

    fn resolvers(&self) -> Vec<&dyn DynamicFieldResolver> {
        vec![&self.callouts]
    }

    fn to_item(&self, row: ContactRow) -> Contact {
        let tags = serde_json::from_str(&row.tags).unwrap_or_else(|e| {
            tracing::warn!(contact_id = %row.id, error = %e, "Unreadable contact tags");
            Vec::new()
        });
        Contact {
            id: row.id,
            email: row.email,
            firstname: row.firstname,
            lastname: row.lastname,
            joined: row.joined,
            last_seen: row.last_seen,
            contribution_type: row.contribution_type,
            contribution_monthly_amount: row.contribution_monthly_amount,
            contribution_period: row.contribution_period,
            delivery_opt_in: row.delivery_opt_in,
            newsletter_status: row.newsletter_status,
            tags,
            notes: row.notes,
        }
    }
}
