//! Field handlers
//!
//! A handler replaces the default SQL emission for one field. Entities use
//! them for virtual fields (derived from other columns), fields that live
//! behind a join or subquery, and dynamic per-instance fields.
//!
//! Handlers are registered by exact field name, or by namespace with a
//! trailing dot (`"callouts."`) to catch every field under that prefix.
//! Exact registrations win over namespaces; among namespaces the longest
//! matching prefix wins.

use std::collections::BTreeMap;

use super::compiler::CompileContext;
use super::error::FilterError;
use super::operators::RuleOperator;
use super::schema::FilterType;
use super::types::{TypedValue, ValidatedRule};

/// What a handler gets to see of the rule it compiles
#[derive(Debug, Clone, Copy)]
pub struct HandlerArgs<'a> {
    /// Table alias including the trailing dot, e.g. `c.`
    pub field_prefix: &'a str,
    pub rule: &'a ValidatedRule,
}

impl<'a> HandlerArgs<'a> {
    pub fn field(&self) -> &'a str {
        self.rule.field()
    }

    pub fn operator(&self) -> RuleOperator {
        self.rule.operator()
    }

    pub fn value(&self) -> &'a [TypedValue] {
        self.rule.value()
    }

    pub fn filter_type(&self) -> FilterType {
        self.rule.filter_type()
    }

    /// A column other than the rule's own, under the same alias
    pub fn column_named(&self, name: &str) -> String {
        format!("{}{}", self.field_prefix, quote_ident(name))
    }
}

/// Emits the SQL fragment for one rule, binding values through `ctx`
pub type FieldHandler =
    fn(ctx: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError>;

#[derive(Clone, Default)]
pub struct FieldHandlerMap {
    handlers: BTreeMap<String, FieldHandler>,
}

impl FieldHandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `field`, or for a namespace when it ends with `.`
    pub fn with(mut self, field: impl Into<String>, handler: FieldHandler) -> Self {
        self.handlers.insert(field.into(), handler);
        self
    }

    pub fn get(&self, field: &str) -> Option<FieldHandler> {
        if let Some(handler) = self.handlers.get(field) {
            return Some(*handler);
        }

        self.handlers
            .iter()
            .filter(|(key, _)| key.ends_with('.') && field.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, handler)| *handler)
    }
}

impl std::fmt::Debug for FieldHandlerMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exact(_: &mut CompileContext<'_>, _: &HandlerArgs<'_>) -> Result<String, FilterError> {
        Ok("exact".to_string())
    }

    fn namespace(_: &mut CompileContext<'_>, _: &HandlerArgs<'_>) -> Result<String, FilterError> {
        Ok("namespace".to_string())
    }

    fn nested(_: &mut CompileContext<'_>, _: &HandlerArgs<'_>) -> Result<String, FilterError> {
        Ok("nested".to_string())
    }

    /// Run whichever handler `map` picks for `field`
    fn dispatch(map: &FieldHandlerMap, field: &str) -> Option<String> {
        let handler = map.get(field)?;
        let rule = ValidatedRule::new(
            field.to_string(),
            RuleOperator::Equal,
            vec![TypedValue::Boolean(true)],
            FilterType::Boolean,
            false,
        );
        let mut ctx = CompileContext::new(map, "c.", Utc::now());
        let args = HandlerArgs {
            field_prefix: "c.",
            rule: &rule,
        };
        handler(&mut ctx, &args).ok()
    }

    #[test]
    fn exact_match_beats_namespace() {
        let map = FieldHandlerMap::new()
            .with("callouts.", namespace)
            .with("callouts.special", exact);

        assert_eq!(dispatch(&map, "callouts.special").as_deref(), Some("exact"));
        assert_eq!(
            dispatch(&map, "callouts.abc.hasAnswered").as_deref(),
            Some("namespace")
        );
        assert!(map.get("email").is_none());
        assert!(map.get("callouts").is_none());
    }

    #[test]
    fn longest_namespace_wins() {
        let map = FieldHandlerMap::new()
            .with("callouts.", namespace)
            .with("callouts.abc.", nested);

        assert_eq!(
            dispatch(&map, "callouts.abc.hasAnswered").as_deref(),
            Some("nested")
        );
        assert_eq!(
            dispatch(&map, "callouts.xyz.hasAnswered").as_deref(),
            Some("namespace")
        );
    }

    #[test]
    fn column_is_prefixed_and_quoted() {
        let rule = ValidatedRule::new(
            "lastSeen".to_string(),
            RuleOperator::IsEmpty,
            vec![],
            FilterType::Date,
            true,
        );
        let args = HandlerArgs {
            field_prefix: "c.",
            rule: &rule,
        };
        assert_eq!(args.column_named("joined"), "c.\"joined\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
