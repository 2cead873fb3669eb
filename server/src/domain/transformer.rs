//! Entity search pipeline
//!
//! Each searchable entity implements [`Transformer`]; the free functions here
//! run the shared pipeline over it: extend the schema with dynamic fields,
//! validate the caller's rules, merge the implicit authorization group, then
//! compile and materialize.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqlitePool};

use crate::data::filters::{
    Caller, CompileContext, CompiledPredicate, DynamicFieldResolver, FieldHandlerMap,
    FilterError, FilterSchema, HandlerArgs, PageRequest, Paginated, QuerySource, Rule,
    RuleGroup, RuleOperator, ValidatedRuleGroup, ValidationContext, compile, count,
    extend_schema, fetch_paginated, merge_authorization, validate,
};
use crate::data::filters::validate::CALLER_CONTACT_ALIAS;

/// A searchable entity
pub trait Transformer: Send + Sync {
    type Row: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;
    type Item: Serialize + Send;

    fn source(&self) -> &'static QuerySource;

    /// Statically known filter fields
    fn schema(&self) -> &FilterSchema;

    fn handlers(&self) -> &FieldHandlerMap;

    /// Rules ANDed onto every search `caller` makes
    ///
    /// Must return `Some` for every non-admin caller. Validated against the
    /// static schema.
    fn implicit_rules(&self, caller: &Caller) -> Option<RuleGroup>;

    fn resolvers(&self) -> Vec<&dyn DynamicFieldResolver> {
        Vec::new()
    }

    fn to_item(&self, row: Self::Row) -> Self::Item;
}

/// Validate `rules` for `caller`, resolving any dynamic fields first
pub async fn validate_rules<T: Transformer>(
    transformer: &T,
    caller: &Caller,
    rules: &RuleGroup,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedRuleGroup, FilterError> {
    let schema = extend_schema(rules, transformer.schema(), &transformer.resolvers(), caller).await?;
    validate(rules, &schema, ctx).inspect_err(|e| {
        tracing::warn!(
            table = transformer.source().table,
            code = e.code(),
            error = %e,
            "Rule group rejected"
        );
    })
}

/// Build the full predicate for one search by `caller`
pub async fn build_predicate<T: Transformer>(
    transformer: &T,
    caller: &Caller,
    rules: Option<&RuleGroup>,
) -> Result<CompiledPredicate, FilterError> {
    let ctx = ValidationContext::for_caller(caller);

    let requested = match rules {
        Some(rules) => Some(validate_rules(transformer, caller, rules, &ctx).await?),
        None => None,
    };
    let implicit = transformer
        .implicit_rules(caller)
        .map(|group| validate(&group, transformer.schema(), &ctx))
        .transpose()?;

    let merged = merge_authorization(requested, implicit);
    compile(
        &merged,
        transformer.handlers(),
        &transformer.source().field_prefix(),
        ctx.now(),
    )
}

/// Run a paginated search over `transformer`
pub async fn search<T: Transformer>(
    transformer: &T,
    pool: &SqlitePool,
    caller: &Caller,
    rules: Option<&RuleGroup>,
    page: &PageRequest,
) -> Result<Paginated<T::Item>, FilterError> {
    let predicate = build_predicate(transformer, caller, rules).await?;
    let rows = fetch_paginated::<T::Row>(pool, transformer.source(), &predicate, page).await?;
    Ok(rows.map(|row| transformer.to_item(row)))
}

/// Number of rows `caller` would see for `rules`
pub async fn count_matching<T: Transformer>(
    transformer: &T,
    pool: &SqlitePool,
    caller: &Caller,
    rules: Option<&RuleGroup>,
) -> Result<u64, FilterError> {
    let predicate = build_predicate(transformer, caller, rules).await?;
    count(pool, transformer.source(), &predicate).await
}

/// Handler for a `contact` field stored in the `contactId` column
pub fn contact_id_column(
    ctx: &mut CompileContext<'_>,
    args: &HandlerArgs<'_>,
) -> Result<String, FilterError> {
    ctx.emit_default(&args.column_named("contactId"), args)
}

/// Rules limiting non-admin callers to rows they own through `field`
pub fn owned_by_caller(caller: &Caller, field: &str) -> Option<RuleGroup> {
    if caller.is_admin() {
        return None;
    }
    if caller.contact_id.is_none() {
        return Some(RuleGroup::deny_all());
    }
    Some(RuleGroup::and([Rule::new(
        field,
        RuleOperator::Equal,
        vec![CALLER_CONTACT_ALIAS.into()],
    )
    .into()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::CallerRole;

    #[test]
    fn test_owned_by_caller() {
        assert!(owned_by_caller(&Caller::admin("a1"), "contact").is_none());
        assert_eq!(
            owned_by_caller(&Caller::anonymous(), "contact"),
            Some(RuleGroup::deny_all())
        );

        let group = owned_by_caller(&Caller::member("m1"), "contact").unwrap();
        let leaves = group.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].field, "contact");
        assert_eq!(leaves[0].operator, "equal");
    }

    #[test]
    fn test_member_without_contact_is_denied() {
        let caller = Caller {
            contact_id: None,
            role: CallerRole::Member,
        };
        assert_eq!(
            owned_by_caller(&caller, "contact"),
            Some(RuleGroup::deny_all())
        );
    }
}
