//! Rule model
//!
//! A rule group is a boolean tree. Leaves compare one field against zero or
//! more values; groups combine their children under AND or OR. The wire
//! shape is the JSON document sent by the admin UI and stored verbatim on
//! segments:
//!
//! ```json
//! {"condition": "AND", "rules": [
//!     {"field": "joined", "operator": "greater", "value": ["2024-01-01"]},
//!     {"condition": "OR", "rules": [...]}
//! ]}
//! ```
//!
//! Whether a node is a leaf or a group is decided once, at deserialization,
//! into [`RuleNode`]. Nothing downstream inspects keys to tell them apart.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operators::RuleOperator;
use super::schema::FilterType;

/// How a group combines its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupCondition {
    And,
    Or,
}

impl GroupCondition {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// SQL for a group with no children (the identity of the connective)
    pub fn empty_sql(&self) -> &'static str {
        match self {
            Self::And => "1=1",
            Self::Or => "1=0",
        }
    }
}

impl fmt::Display for GroupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A raw value as it arrives on the wire
///
/// Dates travel as strings and only become dates during validation, once the
/// field type is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for RuleValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A single field/operator/values predicate
///
/// The operator stays a string until validation so that an unknown operator
/// is reported against its field instead of as a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Vec<RuleValue>,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: RuleOperator, value: Vec<RuleValue>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value,
        }
    }
}

/// Either a leaf or a nested group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Rule(Rule),
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        Self::Group(group)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroup {
    pub condition: GroupCondition,
    pub rules: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn new(condition: GroupCondition, rules: Vec<RuleNode>) -> Self {
        Self { condition, rules }
    }

    pub fn and(rules: impl IntoIterator<Item = RuleNode>) -> Self {
        Self::new(GroupCondition::And, rules.into_iter().collect())
    }

    pub fn or(rules: impl IntoIterator<Item = RuleNode>) -> Self {
        Self::new(GroupCondition::Or, rules.into_iter().collect())
    }

    /// A group that matches nothing
    pub fn deny_all() -> Self {
        Self::new(GroupCondition::Or, Vec::new())
    }

    /// All leaves of the tree, in document order
    pub fn leaves(&self) -> Vec<&Rule> {
        fn collect<'a>(group: &'a RuleGroup, out: &mut Vec<&'a Rule>) {
            for node in &group.rules {
                match node {
                    RuleNode::Rule(rule) => out.push(rule),
                    RuleNode::Group(child) => collect(child, out),
                }
            }
        }

        let mut leaves = Vec::new();
        collect(self, &mut leaves);
        leaves
    }

    /// Nesting depth; a group with only leaves has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .rules
            .iter()
            .filter_map(|node| match node {
                RuleNode::Group(child) => Some(child.depth()),
                RuleNode::Rule(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

// ============================================================================
// Validated form
// ============================================================================

/// A value whose runtime type has been checked against its field
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl TypedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// A leaf that passed validation
///
/// Only [`validate`](super::validate::validate) constructs these, so a
/// compiled predicate can never contain a field, operator or value the
/// schema did not allow.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRule {
    field: String,
    operator: RuleOperator,
    value: Vec<TypedValue>,
    filter_type: FilterType,
    nullable: bool,
}

impl ValidatedRule {
    pub(super) fn new(
        field: String,
        operator: RuleOperator,
        value: Vec<TypedValue>,
        filter_type: FilterType,
        nullable: bool,
    ) -> Self {
        Self {
            field,
            operator,
            value,
            filter_type,
            nullable,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> RuleOperator {
        self.operator
    }

    pub fn value(&self) -> &[TypedValue] {
        &self.value
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedNode {
    Rule(ValidatedRule),
    Group(ValidatedRuleGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRuleGroup {
    condition: GroupCondition,
    rules: Vec<ValidatedNode>,
}

impl ValidatedRuleGroup {
    pub(super) fn new(condition: GroupCondition, rules: Vec<ValidatedNode>) -> Self {
        Self { condition, rules }
    }

    pub fn condition(&self) -> GroupCondition {
        self.condition
    }

    pub fn rules(&self) -> &[ValidatedNode] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_nested_groups_as_tagged_nodes() {
        let json = r#"{
            "condition": "AND",
            "rules": [
                {"field": "a", "operator": "equal", "value": [true]},
                {"condition": "OR", "rules": [
                    {"field": "b", "operator": "equal", "value": [1]},
                    {"field": "c", "operator": "equal", "value": ["x"]}
                ]}
            ]
        }"#;
        let group: RuleGroup = serde_json::from_str(json).unwrap();

        assert_eq!(group.condition, GroupCondition::And);
        assert!(matches!(group.rules[0], RuleNode::Rule(_)));
        match &group.rules[1] {
            RuleNode::Group(child) => {
                assert_eq!(child.condition, GroupCondition::Or);
                assert_eq!(child.rules.len(), 2);
            }
            RuleNode::Rule(_) => panic!("expected nested group"),
        }
    }

    #[test]
    fn value_types_follow_json_types() {
        let rule: Rule =
            serde_json::from_str(r#"{"field": "f", "operator": "between", "value": [1, "2", false]}"#)
                .unwrap();
        assert_eq!(
            rule.value,
            vec![
                RuleValue::Number(1.0),
                RuleValue::String("2".to_string()),
                RuleValue::Boolean(false)
            ]
        );
    }

    #[test]
    fn missing_value_means_no_values() {
        let rule: Rule =
            serde_json::from_str(r#"{"field": "f", "operator": "is_empty"}"#).unwrap();
        assert!(rule.value.is_empty());
    }

    #[test]
    fn rejects_unknown_condition() {
        let result: Result<RuleGroup, _> =
            serde_json::from_str(r#"{"condition": "XOR", "rules": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mixed_shapes() {
        let result: Result<RuleGroup, _> = serde_json::from_str(
            r#"{"condition": "AND", "rules": [{"field": "a", "condition": "OR", "rules": []}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let group = RuleGroup::and([Rule::new(
            "email",
            RuleOperator::Contains,
            vec!["@example.com".into()],
        )
        .into()]);
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "condition": "AND",
                "rules": [{"field": "email", "operator": "contains", "value": ["@example.com"]}]
            })
        );
    }

    #[test]
    fn leaves_are_collected_in_document_order() {
        let group = RuleGroup::and([
            Rule::new("a", RuleOperator::Equal, vec![true.into()]).into(),
            RuleGroup::or([
                Rule::new("b", RuleOperator::Equal, vec![true.into()]).into(),
                Rule::new("c", RuleOperator::Equal, vec![true.into()]).into(),
            ])
            .into(),
            Rule::new("d", RuleOperator::Equal, vec![true.into()]).into(),
        ]);
        let fields: Vec<&str> = group.leaves().iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c", "d"]);
        assert_eq!(group.depth(), 2);
    }
}
