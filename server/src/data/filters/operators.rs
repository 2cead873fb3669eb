//! Operator table
//!
//! Which operators each filter type accepts, and how many values each
//! operator takes. The table is a process-wide constant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::schema::{FilterDefinition, FilterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Between,
    NotBetween,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
}

impl RuleOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::Less => "less",
            Self::LessOrEqual => "less_or_equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::BeginsWith => "begins_with",
            Self::NotBeginsWith => "not_begins_with",
            Self::EndsWith => "ends_with",
            Self::NotEndsWith => "not_ends_with",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }

    /// Number of values the operator takes
    pub fn arity(&self) -> usize {
        match self {
            Self::IsEmpty | Self::IsNotEmpty => 0,
            Self::Between | Self::NotBetween => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl FromStr for RuleOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_OPERATORS
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

const ALL_OPERATORS: &[RuleOperator] = &[
    RuleOperator::Equal,
    RuleOperator::NotEqual,
    RuleOperator::Less,
    RuleOperator::LessOrEqual,
    RuleOperator::Greater,
    RuleOperator::GreaterOrEqual,
    RuleOperator::Between,
    RuleOperator::NotBetween,
    RuleOperator::BeginsWith,
    RuleOperator::NotBeginsWith,
    RuleOperator::EndsWith,
    RuleOperator::NotEndsWith,
    RuleOperator::Contains,
    RuleOperator::NotContains,
    RuleOperator::IsEmpty,
    RuleOperator::IsNotEmpty,
];

const EQUALITY_OPERATORS: &[RuleOperator] = &[RuleOperator::Equal, RuleOperator::NotEqual];

const ORDERED_OPERATORS: &[RuleOperator] = &[
    RuleOperator::Equal,
    RuleOperator::NotEqual,
    RuleOperator::Less,
    RuleOperator::LessOrEqual,
    RuleOperator::Greater,
    RuleOperator::GreaterOrEqual,
    RuleOperator::Between,
    RuleOperator::NotBetween,
];

const TEXT_OPERATORS: &[RuleOperator] = &[
    RuleOperator::Equal,
    RuleOperator::NotEqual,
    RuleOperator::BeginsWith,
    RuleOperator::NotBeginsWith,
    RuleOperator::EndsWith,
    RuleOperator::NotEndsWith,
    RuleOperator::Contains,
    RuleOperator::NotContains,
];

const CONTAINMENT_OPERATORS: &[RuleOperator] = &[RuleOperator::Contains, RuleOperator::NotContains];

const BOOLEAN_OPERATORS: &[RuleOperator] = &[RuleOperator::Equal];

/// Operators accepted by every field declared nullable
pub const NULLABLE_OPERATORS: &[RuleOperator] = &[RuleOperator::IsEmpty, RuleOperator::IsNotEmpty];

/// Operators accepted by a filter type, excluding the nullable set
pub fn operators_for(filter_type: FilterType) -> &'static [RuleOperator] {
    match filter_type {
        FilterType::Text => TEXT_OPERATORS,
        FilterType::Blob | FilterType::Array => CONTAINMENT_OPERATORS,
        FilterType::Number | FilterType::Date => ORDERED_OPERATORS,
        FilterType::Boolean => BOOLEAN_OPERATORS,
        FilterType::Enum | FilterType::Contact => EQUALITY_OPERATORS,
    }
}

/// Whether `operator` is legal for a field with this definition
pub fn is_allowed(definition: &FilterDefinition, operator: RuleOperator) -> bool {
    operators_for(definition.filter_type).contains(&operator)
        || (definition.nullable && NULLABLE_OPERATORS.contains(&operator))
}
