//! Query compiler
//!
//! Turns a [`ValidatedRuleGroup`] into a parameterized SQLite boolean
//! expression. Values never appear in the SQL text; each one is bound as a
//! numbered placeholder (`?1`, `?2`, ...) whose number is its position in
//! [`CompiledPredicate::params`].
//!
//! Groups wrap every child in parentheses, so `{AND: [A, {OR: [B, C]}]}`
//! becomes `(A) AND ((B) OR (C))` at any depth. An empty group compiles to
//! the identity of its connective: `1=1` for AND, `1=0` for OR.
//!
//! All mutable state (the parameter counter and bound values) lives in a
//! [`CompileContext`] owned by one `compile` call.

use chrono::{DateTime, Utc};

use super::dates::to_sql_datetime;
use super::error::FilterError;
use super::handlers::{FieldHandlerMap, HandlerArgs, quote_ident};
use super::operators::RuleOperator;
use super::schema::FilterType;
use super::types::{TypedValue, ValidatedNode, ValidatedRule, ValidatedRuleGroup};
use crate::utils::sql::escape_like_pattern;

/// A value bound to a placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl From<&TypedValue> for SqlValue {
    fn from(value: &TypedValue) -> Self {
        match value {
            TypedValue::Text(s) => Self::Text(s.clone()),
            TypedValue::Number(n) => Self::Real(*n),
            TypedValue::Boolean(b) => Self::Integer(i64::from(*b)),
            TypedValue::Date(dt) => Self::Text(to_sql_datetime(dt)),
        }
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }
}

/// A named, positioned parameter
///
/// The name (`p3_joined`) identifies the parameter in logs and tests; the
/// placeholder in the SQL is its 1-based position (`?3`).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: SqlValue,
}

/// A boolean SQL expression plus the values it binds
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    sql: String,
    params: Vec<BoundParam>,
}

impl CompiledPredicate {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    /// Next free placeholder number for SQL appended after the predicate
    pub fn next_placeholder(&self) -> usize {
        self.params.len() + 1
    }
}

/// Per-call compilation state handed to field handlers
pub struct CompileContext<'a> {
    handlers: &'a FieldHandlerMap,
    field_prefix: &'a str,
    now: DateTime<Utc>,
    params: Vec<BoundParam>,
}

impl<'a> CompileContext<'a> {
    pub fn new(handlers: &'a FieldHandlerMap, field_prefix: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            handlers,
            field_prefix,
            now,
            params: Vec::new(),
        }
    }

    /// Clock for handlers that derive values from the current time
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn field_prefix(&self) -> &'a str {
        self.field_prefix
    }

    /// Bind `value` and return its placeholder
    ///
    /// Names combine the counter with the field, so the same field used in
    /// two branches still gets two distinct parameters.
    pub fn param(&mut self, field: &str, value: impl Into<SqlValue>) -> String {
        let index = self.params.len() + 1;
        self.params.push(BoundParam {
            name: format!("p{}_{}", index, sanitize_param_name(field)),
            value: value.into(),
        });
        format!("?{}", index)
    }

    /// Default emission for `args` against `column`
    ///
    /// Handlers call this with a substitute column expression to reuse the
    /// standard operator mapping for fields that live elsewhere.
    pub fn emit_default(&mut self, column: &str, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
        let field = args.field();
        let operator = args.operator();
        let filter_type = args.filter_type();
        let is_date = filter_type == FilterType::Date;

        let sql = match operator {
            RuleOperator::Equal | RuleOperator::NotEqual => {
                let cmp = if operator == RuleOperator::Equal { "=" } else { "<>" };
                let p = self.param(field, value_at(args, 0)?);
                if is_date {
                    format!("date({}) {} date({})", column, cmp, p)
                } else {
                    format!("{} {} {}", column, cmp, p)
                }
            }
            RuleOperator::Less
            | RuleOperator::LessOrEqual
            | RuleOperator::Greater
            | RuleOperator::GreaterOrEqual => {
                let cmp = match operator {
                    RuleOperator::Less => "<",
                    RuleOperator::LessOrEqual => "<=",
                    RuleOperator::Greater => ">",
                    _ => ">=",
                };
                let p = self.param(field, value_at(args, 0)?);
                format!("{} {} {}", ordered(column, is_date), cmp, p)
            }
            RuleOperator::Between | RuleOperator::NotBetween => {
                let low = self.param(field, value_at(args, 0)?);
                let high = self.param(field, value_at(args, 1)?);
                let not = if operator == RuleOperator::NotBetween { "NOT " } else { "" };
                format!("{} {}BETWEEN {} AND {}", ordered(column, is_date), not, low, high)
            }
            RuleOperator::Contains | RuleOperator::NotContains
                if filter_type == FilterType::Array =>
            {
                let p = self.param(field, value_at(args, 0)?);
                let not = if operator == RuleOperator::NotContains { "NOT " } else { "" };
                format!(
                    "{}EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value = {})",
                    not, column, p
                )
            }
            RuleOperator::BeginsWith
            | RuleOperator::NotBeginsWith
            | RuleOperator::EndsWith
            | RuleOperator::NotEndsWith
            | RuleOperator::Contains
            | RuleOperator::NotContains => {
                let escaped = escape_like_pattern(text_at(args, 0)?);
                let (pattern, negated) = match operator {
                    RuleOperator::BeginsWith => (format!("{}%", escaped), false),
                    RuleOperator::NotBeginsWith => (format!("{}%", escaped), true),
                    RuleOperator::EndsWith => (format!("%{}", escaped), false),
                    RuleOperator::NotEndsWith => (format!("%{}", escaped), true),
                    RuleOperator::Contains => (format!("%{}%", escaped), false),
                    _ => (format!("%{}%", escaped), true),
                };
                let p = self.param(field, pattern);
                let not = if negated { "NOT " } else { "" };
                format!("{} {}LIKE {} ESCAPE '\\'", column, not, p)
            }
            RuleOperator::IsEmpty | RuleOperator::IsNotEmpty => {
                if !args.rule.nullable() {
                    return Err(FilterError::invalid_operator(field, operator));
                }
                let not = if operator == RuleOperator::IsNotEmpty { "NOT " } else { "" };
                format!("{} IS {}NULL", column, not)
            }
        };

        Ok(sql)
    }

    fn compile_group(&mut self, group: &ValidatedRuleGroup) -> Result<String, FilterError> {
        if group.rules().is_empty() {
            return Ok(group.condition().empty_sql().to_string());
        }

        let parts = group
            .rules()
            .iter()
            .map(|node| {
                let sql = match node {
                    ValidatedNode::Rule(rule) => self.compile_rule(rule)?,
                    ValidatedNode::Group(child) => self.compile_group(child)?,
                };
                Ok(format!("({})", sql))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        Ok(parts.join(&format!(" {} ", group.condition().as_sql())))
    }

    fn compile_rule(&mut self, rule: &ValidatedRule) -> Result<String, FilterError> {
        let args = HandlerArgs {
            field_prefix: self.field_prefix,
            rule,
        };

        match self.handlers.get(rule.field()) {
            Some(handler) => handler(self, &args),
            None => {
                let column = format!("{}{}", self.field_prefix, quote_ident(rule.field()));
                self.emit_default(&column, &args)
            }
        }
    }
}

/// Compile `group` into a predicate over columns under `field_prefix`
pub fn compile(
    group: &ValidatedRuleGroup,
    handlers: &FieldHandlerMap,
    field_prefix: &str,
    now: DateTime<Utc>,
) -> Result<CompiledPredicate, FilterError> {
    let mut ctx = CompileContext::new(handlers, field_prefix, now);
    let sql = ctx.compile_group(group)?;

    tracing::debug!(param_count = ctx.params.len(), "Predicate compiled");
    tracing::trace!(sql = %sql, params = ?ctx.params, "Compiled predicate");

    Ok(CompiledPredicate {
        sql,
        params: ctx.params,
    })
}

fn ordered(column: &str, is_date: bool) -> String {
    if is_date {
        format!("datetime({})", column)
    } else {
        column.to_string()
    }
}

fn value_at<'a>(args: &HandlerArgs<'a>, index: usize) -> Result<&'a TypedValue, FilterError> {
    args.value()
        .get(index)
        .ok_or_else(|| FilterError::InvalidValueCount {
            field: args.field().to_string(),
            operator: args.operator().to_string(),
            expected: args.operator().arity(),
            actual: args.value().len(),
        })
}

fn text_at<'a>(args: &HandlerArgs<'a>, index: usize) -> Result<&'a str, FilterError> {
    let value = value_at(args, index)?;
    value
        .as_text()
        .ok_or_else(|| FilterError::invalid_value(args.field(), format!("{:?}", value)))
}

fn sanitize_param_name(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::schema::{FilterDefinition, FilterSchema};
    use crate::data::filters::types::RuleGroup;
    use crate::data::filters::validate::{ValidationContext, validate};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn schema() -> FilterSchema {
        FilterSchema::new()
            .with("a", FilterDefinition::boolean())
            .with("b", FilterDefinition::boolean())
            .with("c", FilterDefinition::boolean())
            .with("joined", FilterDefinition::date())
            .with("lastSeen", FilterDefinition::date().nullable())
            .with("email", FilterDefinition::text())
            .with("amount", FilterDefinition::number())
            .with("tags", FilterDefinition::array())
            .with("notes", FilterDefinition::blob())
            .with("contact", FilterDefinition::contact())
    }

    fn compile_json(json: &str, handlers: &FieldHandlerMap) -> Result<CompiledPredicate, FilterError> {
        let group: RuleGroup = serde_json::from_str(json).unwrap();
        let ctx = ValidationContext::new(Some("contact-1")).at(now());
        let validated = validate(&group, &schema(), &ctx)?;
        compile(&validated, handlers, "c.", now())
    }

    fn compile_one(field: &str, operator: &str, value: serde_json::Value) -> CompiledPredicate {
        let json = serde_json::json!({
            "condition": "AND",
            "rules": [{"field": field, "operator": operator, "value": value}]
        });
        compile_json(&json.to_string(), &FieldHandlerMap::new()).unwrap()
    }

    fn values(predicate: &CompiledPredicate) -> Vec<SqlValue> {
        predicate.params().iter().map(|p| p.value.clone()).collect()
    }

    #[test]
    fn nested_groups_are_parenthesized() {
        let predicate = compile_json(
            r#"{"condition": "AND", "rules": [
                {"field": "a", "operator": "equal", "value": [true]},
                {"condition": "OR", "rules": [
                    {"field": "b", "operator": "equal", "value": [true]},
                    {"field": "c", "operator": "equal", "value": [true]}
                ]}
            ]}"#,
            &FieldHandlerMap::new(),
        )
        .unwrap();

        assert_eq!(
            predicate.sql(),
            r#"(c."a" = ?1) AND ((c."b" = ?2) OR (c."c" = ?3))"#
        );
        assert_eq!(
            values(&predicate),
            vec![SqlValue::Integer(1), SqlValue::Integer(1), SqlValue::Integer(1)]
        );
    }

    #[test]
    fn empty_groups_are_connective_identities() {
        let predicate = compile_json(
            r#"{"condition": "AND", "rules": [{"condition": "OR", "rules": []}]}"#,
            &FieldHandlerMap::new(),
        )
        .unwrap();
        assert_eq!(predicate.sql(), "(1=0)");

        let predicate =
            compile_json(r#"{"condition": "AND", "rules": []}"#, &FieldHandlerMap::new()).unwrap();
        assert_eq!(predicate.sql(), "1=1");
        assert!(predicate.params().is_empty());
    }

    #[test]
    fn compilation_is_idempotent() {
        let json = r#"{"condition": "OR", "rules": [
            {"field": "joined", "operator": "greater", "value": ["2024-01-01"]},
            {"field": "email", "operator": "contains", "value": ["@example.com"]}
        ]}"#;
        let first = compile_json(json, &FieldHandlerMap::new()).unwrap();
        let second = compile_json(json, &FieldHandlerMap::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn repeated_field_gets_distinct_params() {
        let predicate = compile_json(
            r#"{"condition": "OR", "rules": [
                {"field": "joined", "operator": "greater", "value": ["2024-01-01"]},
                {"condition": "AND", "rules": [
                    {"field": "joined", "operator": "less", "value": ["2020-01-01"]}
                ]}
            ]}"#,
            &FieldHandlerMap::new(),
        )
        .unwrap();

        let names: Vec<&str> = predicate.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p1_joined", "p2_joined"]);
        assert_eq!(
            predicate.sql(),
            r#"(datetime(c."joined") > ?1) OR ((datetime(c."joined") < ?2))"#
        );
        assert_eq!(predicate.next_placeholder(), 3);
    }

    #[test]
    fn date_equality_is_day_granular() {
        let predicate = compile_one("joined", "equal", serde_json::json!(["2024-02-01"]));
        assert_eq!(predicate.sql(), r#"(date(c."joined") = date(?1))"#);
        assert_eq!(
            values(&predicate),
            vec![SqlValue::Text("2024-02-01 00:00:00".to_string())]
        );
    }

    #[test]
    fn between_binds_two_values() {
        let predicate = compile_one("amount", "not_between", serde_json::json!([5, 10]));
        assert_eq!(predicate.sql(), r#"(c."amount" NOT BETWEEN ?1 AND ?2)"#);
        assert_eq!(values(&predicate), vec![SqlValue::Real(5.0), SqlValue::Real(10.0)]);
    }

    #[test]
    fn like_patterns_escape_user_input() {
        let predicate = compile_one("email", "begins_with", serde_json::json!(["100%_off"]));
        assert_eq!(predicate.sql(), r#"(c."email" LIKE ?1 ESCAPE '\')"#);
        assert_eq!(
            values(&predicate),
            vec![SqlValue::Text("100\\%\\_off%".to_string())]
        );

        let predicate = compile_one("email", "not_ends_with", serde_json::json!([".org"]));
        assert_eq!(predicate.sql(), r#"(c."email" NOT LIKE ?1 ESCAPE '\')"#);
        assert_eq!(values(&predicate), vec![SqlValue::Text("%.org".to_string())]);

        let predicate = compile_one("notes", "contains", serde_json::json!(["vip"]));
        assert_eq!(values(&predicate), vec![SqlValue::Text("%vip%".to_string())]);
    }

    #[test]
    fn array_containment_uses_json_each() {
        let predicate = compile_one("tags", "not_contains", serde_json::json!(["volunteer"]));
        assert_eq!(
            predicate.sql(),
            r#"(NOT EXISTS (SELECT 1 FROM json_each(c."tags") WHERE json_each.value = ?1))"#
        );
    }

    #[test]
    fn nullable_checks_compile_to_null_tests() {
        let predicate = compile_one("lastSeen", "is_empty", serde_json::json!([]));
        assert_eq!(predicate.sql(), r#"(c."lastSeen" IS NULL)"#);

        let predicate = compile_one("lastSeen", "is_not_empty", serde_json::json!([]));
        assert_eq!(predicate.sql(), r#"(c."lastSeen" IS NOT NULL)"#);
    }

    #[test]
    fn non_nullable_null_check_is_rejected() {
        let err = compile_json(
            r#"{"condition": "AND", "rules": [{"field": "joined", "operator": "is_empty", "value": []}]}"#,
            &FieldHandlerMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidOperator { .. }));
    }

    #[test]
    fn me_is_bound_as_caller_id() {
        let predicate = compile_one("contact", "equal", serde_json::json!(["me"]));
        assert_eq!(values(&predicate), vec![SqlValue::Text("contact-1".to_string())]);
        assert!(!predicate.sql().contains("me"));
    }

    fn enabled_only(
        ctx: &mut CompileContext<'_>,
        args: &HandlerArgs<'_>,
    ) -> Result<String, FilterError> {
        if args.operator() != RuleOperator::Equal {
            return Err(FilterError::invalid_operator(args.field(), args.operator()));
        }
        let column = format!("{}\"enabled\"", ctx.field_prefix());
        ctx.emit_default(&column, args)
    }

    #[test]
    fn handlers_replace_default_emission() {
        let handlers = FieldHandlerMap::new().with("a", enabled_only);
        let predicate = compile_json(
            r#"{"condition": "AND", "rules": [
                {"field": "a", "operator": "equal", "value": [false]},
                {"field": "b", "operator": "equal", "value": [true]}
            ]}"#,
            &handlers,
        )
        .unwrap();
        assert_eq!(predicate.sql(), r#"(c."enabled" = ?1) AND (c."b" = ?2)"#);
        assert_eq!(
            values(&predicate),
            vec![SqlValue::Integer(0), SqlValue::Integer(1)]
        );
    }

    #[test]
    fn handler_errors_abort_compilation() {
        fn reject(_: &mut CompileContext<'_>, args: &HandlerArgs<'_>) -> Result<String, FilterError> {
            Err(FilterError::invalid_operator(args.field(), args.operator()))
        }

        let handlers = FieldHandlerMap::new().with("b", reject);
        let err = compile_json(
            r#"{"condition": "OR", "rules": [
                {"field": "a", "operator": "equal", "value": [true]},
                {"field": "b", "operator": "equal", "value": [true]}
            ]}"#,
            &handlers,
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidOperator { field, .. } if field == "b"));
    }
}
