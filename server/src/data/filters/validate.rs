//! Rule validation
//!
//! Checks a rule group against a schema and produces its typed form. This
//! is the only way to obtain a [`ValidatedRuleGroup`], and the compiler only
//! accepts that type, so malformed input cannot reach query construction.
//!
//! Checks per leaf, in order:
//! 1. field exists in the schema -> `UnknownField`
//! 2. operator is legal for the field type (or nullable set) -> `InvalidOperator`
//! 3. number of values matches the operator arity -> `InvalidValueCount`
//! 4. each value has the right runtime type / enum membership -> `InvalidValue`
//!
//! Contact-typed values equal to `"me"` are replaced with the caller's
//! contact id here, as part of step 4. This is the only substitution point.

use chrono::{DateTime, Utc};

use super::authz::Caller;
use super::dates::parse_date_value;
use super::error::FilterError;
use super::operators::{RuleOperator, is_allowed};
use super::schema::{FilterDefinition, FilterSchema, FilterType};
use super::types::{
    Rule, RuleGroup, RuleNode, RuleValue, TypedValue, ValidatedNode, ValidatedRule,
    ValidatedRuleGroup,
};

/// Maximum nesting depth of a rule group
pub const MAX_RULE_DEPTH: usize = 8;

/// Maximum number of leaves in a rule group
pub const MAX_RULES: usize = 100;

/// Contact value that stands for the caller
pub const CALLER_CONTACT_ALIAS: &str = "me";

/// Request-scoped inputs to validation
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    caller_contact_id: Option<&'a str>,
    now: DateTime<Utc>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(caller_contact_id: Option<&'a str>) -> Self {
        Self {
            caller_contact_id,
            now: Utc::now(),
        }
    }

    pub fn for_caller(caller: &'a Caller) -> Self {
        Self::new(caller.contact_id.as_deref())
    }

    /// Pin the clock relative dates are resolved against
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Validate `group` against `schema`
pub fn validate(
    group: &RuleGroup,
    schema: &FilterSchema,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedRuleGroup, FilterError> {
    let depth = group.depth();
    if depth > MAX_RULE_DEPTH {
        return Err(FilterError::MalformedRuleGroup(format!(
            "Rule groups may be nested at most {} levels deep",
            MAX_RULE_DEPTH
        )));
    }

    let rule_count = group.leaves().len();
    if rule_count > MAX_RULES {
        return Err(FilterError::MalformedRuleGroup(format!(
            "Maximum {} rules allowed",
            MAX_RULES
        )));
    }

    validate_group(group, schema, ctx)
}

fn validate_group(
    group: &RuleGroup,
    schema: &FilterSchema,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedRuleGroup, FilterError> {
    let rules = group
        .rules
        .iter()
        .map(|node| match node {
            RuleNode::Rule(rule) => validate_rule(rule, schema, ctx).map(ValidatedNode::Rule),
            RuleNode::Group(child) => validate_group(child, schema, ctx).map(ValidatedNode::Group),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedRuleGroup::new(group.condition, rules))
}

fn validate_rule(
    rule: &Rule,
    schema: &FilterSchema,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedRule, FilterError> {
    let definition = schema
        .get(&rule.field)
        .ok_or_else(|| FilterError::unknown_field(&rule.field))?;

    let operator: RuleOperator = rule
        .operator
        .parse()
        .map_err(|_| FilterError::invalid_operator(&rule.field, &rule.operator))?;

    if !is_allowed(definition, operator) {
        return Err(FilterError::invalid_operator(&rule.field, operator));
    }

    if rule.value.len() != operator.arity() {
        return Err(FilterError::InvalidValueCount {
            field: rule.field.clone(),
            operator: operator.to_string(),
            expected: operator.arity(),
            actual: rule.value.len(),
        });
    }

    let value = rule
        .value
        .iter()
        .map(|v| validate_value(&rule.field, definition, v, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedRule::new(
        rule.field.clone(),
        operator,
        value,
        definition.filter_type,
        definition.nullable,
    ))
}

fn validate_value(
    field: &str,
    definition: &FilterDefinition,
    value: &RuleValue,
    ctx: &ValidationContext<'_>,
) -> Result<TypedValue, FilterError> {
    let invalid = || FilterError::invalid_value(field, value);

    match (definition.filter_type, value) {
        (FilterType::Text | FilterType::Blob | FilterType::Array, RuleValue::String(s)) => {
            Ok(TypedValue::Text(s.clone()))
        }
        (FilterType::Enum, RuleValue::String(s)) => match &definition.options {
            Some(options) if !options.contains(s) => Err(invalid()),
            _ => Ok(TypedValue::Text(s.clone())),
        },
        (FilterType::Contact, RuleValue::String(s)) if s == CALLER_CONTACT_ALIAS => ctx
            .caller_contact_id
            .map(|id| TypedValue::Text(id.to_string()))
            .ok_or_else(invalid),
        (FilterType::Contact, RuleValue::String(s)) if !s.is_empty() => {
            Ok(TypedValue::Text(s.clone()))
        }
        (FilterType::Number, RuleValue::Number(n)) if n.is_finite() => Ok(TypedValue::Number(*n)),
        (FilterType::Boolean, RuleValue::Boolean(b)) => Ok(TypedValue::Boolean(*b)),
        (FilterType::Date, RuleValue::String(s)) => parse_date_value(s, ctx.now)
            .map(TypedValue::Date)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::GroupCondition;
    use chrono::TimeZone;

    fn schema() -> FilterSchema {
        FilterSchema::new()
            .with("joined", FilterDefinition::date())
            .with("email", FilterDefinition::text())
            .with("lastSeen", FilterDefinition::date().nullable())
            .with("amount", FilterDefinition::number())
            .with("deliveryOptIn", FilterDefinition::boolean())
            .with("tags", FilterDefinition::array())
            .with("contact", FilterDefinition::contact())
            .with(
                "newsletterStatus",
                FilterDefinition::enumeration(["subscribed", "unsubscribed"]),
            )
    }

    fn ctx() -> ValidationContext<'static> {
        ValidationContext::new(Some("contact-1"))
            .at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    fn single(field: &str, operator: &str, value: Vec<RuleValue>) -> RuleGroup {
        RuleGroup::and([RuleNode::Rule(Rule {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        })])
    }

    fn leaf(group: &ValidatedRuleGroup) -> &ValidatedRule {
        match &group.rules()[0] {
            ValidatedNode::Rule(rule) => rule,
            ValidatedNode::Group(_) => panic!("expected a rule"),
        }
    }

    #[test]
    fn accepts_valid_nested_group() {
        let group: RuleGroup = serde_json::from_str(
            r#"{"condition": "AND", "rules": [
                {"field": "joined", "operator": "greater", "value": ["2024-01-01"]},
                {"condition": "OR", "rules": [
                    {"field": "email", "operator": "contains", "value": ["@example.com"]},
                    {"field": "lastSeen", "operator": "is_empty", "value": []}
                ]}
            ]}"#,
        )
        .unwrap();

        let validated = validate(&group, &schema(), &ctx()).unwrap();
        assert_eq!(validated.rules().len(), 2);
        assert_eq!(leaf(&validated).field(), "joined");
        let ValidatedNode::Group(nested) = &validated.rules()[1] else {
            panic!("expected a nested group");
        };
        assert_eq!(nested.condition(), GroupCondition::Or);
        assert_eq!(nested.rules().len(), 2);
    }

    #[test]
    fn unknown_field() {
        let group = single("password", "equal", vec!["x".into()]);
        let err = validate(&group, &schema(), &ctx()).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField { field } if field == "password"));
    }

    #[test]
    fn unknown_operator_name() {
        let group = single("email", "like", vec!["x".into()]);
        let err = validate(&group, &schema(), &ctx()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidOperator { operator, .. } if operator == "like"));
    }

    #[test]
    fn operator_not_valid_for_type() {
        let group = single("deliveryOptIn", "not_equal", vec![true.into()]);
        assert!(matches!(
            validate(&group, &schema(), &ctx()),
            Err(FilterError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn is_empty_requires_nullable() {
        let group = single("joined", "is_empty", vec![]);
        assert!(matches!(
            validate(&group, &schema(), &ctx()),
            Err(FilterError::InvalidOperator { .. })
        ));

        let group = single("lastSeen", "is_not_empty", vec![]);
        assert!(validate(&group, &schema(), &ctx()).is_ok());
    }

    #[test]
    fn between_with_one_value() {
        let group = single("amount", "between", vec![1.0.into()]);
        let err = validate(&group, &schema(), &ctx()).unwrap_err();
        assert!(matches!(
            err,
            FilterError::InvalidValueCount {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn equal_with_zero_values() {
        let group = single("email", "equal", vec![]);
        assert!(matches!(
            validate(&group, &schema(), &ctx()),
            Err(FilterError::InvalidValueCount {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn value_type_mismatch() {
        let cases = [
            single("amount", "equal", vec!["10".into()]),
            single("email", "equal", vec![1.0.into()]),
            single("deliveryOptIn", "equal", vec!["true".into()]),
            single("joined", "greater", vec!["last tuesday".into()]),
            single("tags", "contains", vec![false.into()]),
        ];
        for group in cases {
            assert!(matches!(
                validate(&group, &schema(), &ctx()),
                Err(FilterError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn enum_value_must_be_an_option() {
        let group = single("newsletterStatus", "equal", vec!["cleaned".into()]);
        let err = validate(&group, &schema(), &ctx()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { field, .. } if field == "newsletterStatus"));

        let group = single("newsletterStatus", "equal", vec!["subscribed".into()]);
        assert!(validate(&group, &schema(), &ctx()).is_ok());
    }

    #[test]
    fn me_is_replaced_with_caller_id() {
        let group = single("contact", "equal", vec!["me".into()]);
        let validated = validate(&group, &schema(), &ctx()).unwrap();
        assert_eq!(
            leaf(&validated).value(),
            &[TypedValue::Text("contact-1".to_string())]
        );
    }

    #[test]
    fn me_without_caller_is_invalid() {
        let group = single("contact", "equal", vec!["me".into()]);
        let anonymous = ValidationContext::new(None);
        assert!(matches!(
            validate(&group, &schema(), &anonymous),
            Err(FilterError::InvalidValue { .. })
        ));
    }

    #[test]
    fn relative_dates_use_context_clock() {
        let group = single("joined", "greater", vec!["$now(M:-1)".into()]);
        let validated = validate(&group, &schema(), &ctx()).unwrap();
        assert_eq!(
            leaf(&validated).value(),
            &[TypedValue::Date(
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
            )]
        );
    }

    #[test]
    fn empty_group_is_valid() {
        assert!(validate(&RuleGroup::deny_all(), &schema(), &ctx()).is_ok());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut group = single("email", "equal", vec!["a".into()]);
        for _ in 0..MAX_RULE_DEPTH {
            group = RuleGroup::and([RuleNode::Group(group)]);
        }
        assert!(matches!(
            validate(&group, &schema(), &ctx()),
            Err(FilterError::MalformedRuleGroup(_))
        ));
    }

    #[test]
    fn rejects_too_many_rules() {
        let rules = (0..=MAX_RULES).map(|_| {
            RuleNode::Rule(Rule::new("email", RuleOperator::Equal, vec!["a".into()]))
        });
        let group = RuleGroup::or(rules);
        assert!(matches!(
            validate(&group, &schema(), &ctx()),
            Err(FilterError::MalformedRuleGroup(_))
        ));
    }
}
